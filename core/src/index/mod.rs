use std::cmp;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::files::{advance_modified, FileKind, ResourceFiles};

pub mod bounds_builder;

/// Freshness of the spatial index relative to its data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// No index file exists
    Missing,
    /// The index file is not newer than the data file
    Stale,
    /// The index file is newer than the data file
    Fresh,
    /// A rebuild is running right now; never persisted
    Building,
}

/// Builds the physical spatial index contents for a data file.
///
/// The index manager treats the builder as opaque: it scans the data file
/// in whatever way it sees fit and returns the serialized index. The
/// manager only handles staleness, mutual exclusion and the file replace.
pub trait QuadTreeBuilder {
    fn build(&self, data_path: &Path) -> Result<Vec<u8>>;
}

/// Decides, under concurrent access, whether the derived spatial index of
/// one resource is stale and must be rebuilt.
///
/// At most one physical rebuild happens per staleness event: concurrent
/// callers that lose the race observe the freshly built index instead of
/// building again. Forced rebuilds always run but are serialized. The
/// build mutex is keyed to this manager's resource; managers of different
/// resources build concurrently.
pub struct IndexManager {
    files: Arc<ResourceFiles>,
    builder: Box<dyn QuadTreeBuilder + Send + Sync>,
    build_lock: Mutex<()>,
}

impl IndexManager {
    pub fn new(files: Arc<ResourceFiles>, builder: Box<dyn QuadTreeBuilder + Send + Sync>) -> Self {
        Self {
            files,
            builder,
            build_lock: Mutex::new(()),
        }
    }

    pub fn files(&self) -> &ResourceFiles {
        &self.files
    }

    /// Makes sure the spatial index is current, rebuilding it if it is
    /// missing or stale, or unconditionally with `force`.
    ///
    /// Returns whether this call performed a physical rebuild. Staleness is
    /// re-checked after the build mutex is acquired, so of N concurrent
    /// callers observing the same staleness event exactly one builds and
    /// returns `true`; the others find the fresh index and return `false`.
    pub fn ensure_index(&self, force: bool) -> Result<bool> {
        let _guard = self.build_lock.lock();
        if !force && !self.is_stale()? {
            debug!(
                index = %self.files.path(FileKind::Index).display(),
                "spatial index is current"
            );
            return Ok(false);
        }
        self.rebuild()?;
        Ok(true)
    }

    /// The current state of the index file
    pub fn state(&self) -> Result<IndexState> {
        if self.build_lock.is_locked() {
            return Ok(IndexState::Building);
        }
        let _data = self.files.acquire_read(FileKind::Data);
        let _index = self.files.acquire_read(FileKind::Index);
        if !self.files.exists(FileKind::Index) {
            return Ok(IndexState::Missing);
        }
        if self.index_not_newer()? {
            Ok(IndexState::Stale)
        } else {
            Ok(IndexState::Fresh)
        }
    }

    fn is_stale(&self) -> Result<bool> {
        let _data = self.files.acquire_read(FileKind::Data);
        let _index = self.files.acquire_read(FileKind::Index);
        if !self.files.exists(FileKind::Index) {
            return Ok(true);
        }
        self.index_not_newer()
    }

    fn index_not_newer(&self) -> Result<bool> {
        let data_modified = self.files.last_modified(FileKind::Data).with_context(|| {
            format!(
                "unable to stat data file {}",
                self.files.path(FileKind::Data).display()
            )
        })?;
        let index_modified = self.files.last_modified(FileKind::Index).with_context(|| {
            format!(
                "unable to stat index file {}",
                self.files.path(FileKind::Index).display()
            )
        })?;
        Ok(index_modified <= data_modified)
    }

    fn rebuild(&self) -> Result<()> {
        let started = Instant::now();

        let data = self.files.acquire_read(FileKind::Data);
        let contents = self
            .builder
            .build(data.path())
            .context("spatial index build failed")?;
        let data_modified = self.files.last_modified(FileKind::Data).ok();
        drop(data);

        let index = self.files.acquire_write(FileKind::Index);
        let pre_modified = fs::metadata(index.path())
            .and_then(|metadata| metadata.modified())
            .ok();
        fs::write(index.path(), &contents)
            .with_context(|| format!("unable to write index file {}", index.path().display()))?;

        // The new stamp must move strictly past the pre-rebuild one, and
        // past the data file, or concurrent callers re-checking staleness
        // would rebuild again on filesystems with coarse timestamps.
        let floor = match (pre_modified, data_modified) {
            (Some(pre), Some(data)) => Some(cmp::max(pre, data)),
            (pre, data) => pre.or(data),
        };
        if let Some(floor) = floor {
            let written = self
                .files
                .last_modified(FileKind::Index)
                .unwrap_or(SystemTime::UNIX_EPOCH);
            if written <= floor {
                advance_modified(index.path(), floor).with_context(|| {
                    format!("unable to advance timestamp of {}", index.path().display())
                })?;
            }
        }

        info!(
            index = %index.path().display(),
            bytes = contents.len(),
            elapsed = ?started.elapsed(),
            "rebuilt spatial index"
        );
        Ok(())
    }
}
