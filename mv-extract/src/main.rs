//! Dump per-macroblock motion vectors as a deterministic text report.

use clap::*;
use mvgrid::prelude::v1::{Result, *};
use std::fs::File;
use std::io::{self, BufWriter, Write};

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("mv-extract")
        .version(crate_version!())
        .arg(Arg::new("input").takes_value(true).required(true))
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .takes_value(true)
                .required(false),
        )
        .get_matches();

    let input = matches.value_of("input").unwrap();

    let mut source = frame_loader::create_source(input)?;

    let writer: Box<dyn Write> = match matches.value_of("output") {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut reporter = Reporter::new(writer);

    // Frame numbering starts at 1 and counts intra frames too, even though
    // their blocks are skipped.
    let mut index = 1;

    while let Some(frame) = source.next_frame()? {
        if frame.pict_type() != PictureType::I {
            reporter.write_frame(index, &extract(&frame))?;
        }

        index += 1;
    }

    reporter.into_inner().flush()?;

    Ok(())
}
