use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::Args;
use humantime::format_duration;
use quadshape_core::{
    files::{FileKind, ResourceFiles},
    index::{bounds_builder::RecordBoundsBuilder, IndexManager},
};

/// Build or refresh the spatial index of a record stream
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// The data file to index
    pub data: PathBuf,

    /// Rebuild even if the index is already fresh
    #[arg(long)]
    pub force: bool,
}

/// Run the `index` command
pub fn run_index(args: IndexArgs) -> Result<()> {
    if !args.data.is_file() {
        bail!("no such data file: {}", args.data.display());
    }

    let files = Arc::new(ResourceFiles::new(&args.data));
    let manager = IndexManager::new(Arc::clone(&files), Box::new(RecordBoundsBuilder));

    let started = Instant::now();
    let rebuilt = manager.ensure_index(args.force)?;
    let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);

    let index_path = files.path(FileKind::Index).display();
    if rebuilt {
        println!("Rebuilt {} in {}", index_path, format_duration(elapsed));
    } else {
        println!("{} is up to date", index_path);
    }
    Ok(())
}
