use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use quadshape_core::scan::{detect_kind, scan_stats};

/// Print aggregate statistics of a record stream
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// The data file to scan
    pub data: PathBuf,
}

/// Run the `stats` command
pub fn run_stats(args: StatsArgs) -> Result<()> {
    let Some(kind) = detect_kind(&args.data)? else {
        println!("{}: no georeferenced records", args.data.display());
        return Ok(());
    };

    let stats = scan_stats(&args.data, kind)?;
    println!("kind:    {}", kind);
    println!("records: {} ({} null)", stats.records, stats.null_records);
    println!("parts:   {}", stats.parts);
    println!("points:  {}", stats.points);
    match stats.bounds {
        Some(bounds) => println!(
            "bounds:  {} {} {} {}",
            bounds.min().x,
            bounds.min().y,
            bounds.max().x,
            bounds.max().y
        ),
        None => println!("bounds:  none"),
    }
    Ok(())
}
