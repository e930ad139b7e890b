use std::cmp;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};

/// The companion files making up one logical resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// The main data file holding the geometry records
    Data,
    /// The derived spatial index file
    Index,
}

/// Scoped, keyed read/write locks over the companion files of one logical
/// resource.
///
/// Each open file set owns its own locks; two different resources never
/// contend. Acquiring returns an owned handle that releases its lock when
/// dropped, so every exit path releases exactly once.
pub struct ResourceFiles {
    data: PathBuf,
    index: PathBuf,
    data_lock: Arc<RwLock<()>>,
    index_lock: Arc<RwLock<()>>,
}

/// A held read lock on a companion file, released on drop
pub struct ReadLockHandle {
    path: PathBuf,
    _guard: ArcRwLockReadGuard<RawRwLock, ()>,
}

impl ReadLockHandle {
    /// The path of the locked file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A held write lock on a companion file, released on drop
pub struct WriteLockHandle {
    path: PathBuf,
    _guard: ArcRwLockWriteGuard<RawRwLock, ()>,
}

impl WriteLockHandle {
    /// The path of the locked file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResourceFiles {
    /// Creates the file set for a data file, deriving the index file path
    /// by replacing the extension with `qix`
    pub fn new(data: impl Into<PathBuf>) -> Self {
        let data = data.into();
        let index = data.with_extension("qix");
        Self::with_index_path(data, index)
    }

    /// Creates a file set with an explicit index file path
    pub fn with_index_path(data: impl Into<PathBuf>, index: impl Into<PathBuf>) -> Self {
        Self {
            data: data.into(),
            index: index.into(),
            data_lock: Arc::new(RwLock::new(())),
            index_lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn path(&self, kind: FileKind) -> &Path {
        match kind {
            FileKind::Data => &self.data,
            FileKind::Index => &self.index,
        }
    }

    pub fn exists(&self, kind: FileKind) -> bool {
        self.path(kind).exists()
    }

    /// Blocks until a shared read lock on the given companion file is
    /// available
    pub fn acquire_read(&self, kind: FileKind) -> ReadLockHandle {
        ReadLockHandle {
            path: self.path(kind).to_path_buf(),
            _guard: self.lock(kind).read_arc(),
        }
    }

    /// Blocks until the exclusive write lock on the given companion file is
    /// available
    pub fn acquire_write(&self, kind: FileKind) -> WriteLockHandle {
        WriteLockHandle {
            path: self.path(kind).to_path_buf(),
            _guard: self.lock(kind).write_arc(),
        }
    }

    /// Last modification time of the given companion file
    pub fn last_modified(&self, kind: FileKind) -> io::Result<SystemTime> {
        fs::metadata(self.path(kind))?.modified()
    }

    fn lock(&self, kind: FileKind) -> &Arc<RwLock<()>> {
        match kind {
            FileKind::Data => &self.data_lock,
            FileKind::Index => &self.index_lock,
        }
    }
}

/// Forces the file's modification time strictly past `floor` (and never
/// backwards), for filesystems whose timestamp granularity would otherwise
/// leave it unchanged
pub(crate) fn advance_modified(path: &Path, floor: SystemTime) -> io::Result<SystemTime> {
    let target = cmp::max(SystemTime::now(), floor + Duration::from_millis(1));
    OpenOptions::new()
        .append(true)
        .open(path)?
        .set_modified(target)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use tempdir::TempDir;

    use super::{advance_modified, FileKind, ResourceFiles};

    #[test]
    fn index_path_derived_from_data_path() {
        let files = ResourceFiles::new("/tmp/countries.shp");
        assert_eq!(
            files.path(FileKind::Index),
            std::path::Path::new("/tmp/countries.qix")
        );
    }

    #[test]
    fn read_locks_are_shared() {
        let files = ResourceFiles::new("/tmp/countries.shp");
        let first = files.acquire_read(FileKind::Data);
        let second = files.acquire_read(FileKind::Data);
        assert_eq!(first.path(), second.path());
    }

    /// A write lock waits for outstanding read handles to drop
    #[test]
    fn write_lock_waits_for_readers() {
        let files = Arc::new(ResourceFiles::new("/tmp/countries.shp"));

        let reader_files = Arc::clone(&files);
        let reader = thread::spawn(move || {
            let _handle = reader_files.acquire_read(FileKind::Index);
            thread::sleep(Duration::from_millis(100));
        });

        // give the reader time to grab its lock
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        let _write = files.acquire_write(FileKind::Index);
        assert!(started.elapsed() >= Duration::from_millis(50));

        reader.join().unwrap();
    }

    /// Locks are keyed per file kind: the index lock does not block data
    /// readers
    #[test]
    fn kinds_do_not_contend() {
        let files = ResourceFiles::new("/tmp/countries.shp");
        let _index = files.acquire_write(FileKind::Index);
        let _data = files.acquire_read(FileKind::Data);
    }

    #[test]
    fn advance_moves_strictly_past_floor() {
        let dir = TempDir::new("quadshape_files").unwrap();
        let path = dir.path().join("countries.qix");
        fs::write(&path, b"index").unwrap();

        let floor = fs::metadata(&path).unwrap().modified().unwrap();
        advance_modified(&path, floor).unwrap();
        let bumped = fs::metadata(&path).unwrap().modified().unwrap();
        assert!(bumped > floor);
    }
}
