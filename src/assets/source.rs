use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};

use crate::foundation::error::{PointreelError, PointreelResult};

/// Which buffer of a variation a key addresses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Positions of one channel.
    Channel(String),
    /// Per-sample class ids.
    ClassIds,
}

/// Address of one raw array: `(capture path, variation, buffer)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayKey {
    pub prefix: String,
    pub variation: String,
    pub buffer: BufferKind,
}

impl ArrayKey {
    pub const CLASS_IDS_FILE: &'static str = "labels.npy";

    /// Normalized relative path: `{prefix}/{variation}/{channel}.npy` or
    /// `{prefix}/{variation}/labels.npy`.
    pub fn rel_path(&self) -> PointreelResult<String> {
        let file = match &self.buffer {
            BufferKind::Channel(name) => format!("{name}.npy"),
            BufferKind::ClassIds => Self::CLASS_IDS_FILE.to_owned(),
        };
        normalize_rel_path(&format!("{}/{}/{file}", self.prefix, self.variation))
    }
}

/// Normalize and validate storage-relative paths.
///
/// The result uses `/` separators, drops `.` and empty segments, and rejects absolute paths
/// or parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> PointreelResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(PointreelError::validation("array paths must be relative"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(PointreelError::validation("array paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(PointreelError::validation(
            "array path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

/// Storage backend for raw arrays.
///
/// Implementations are called from loader worker threads.
pub trait ArraySource: Send + Sync {
    /// Total byte length of the buffer, used for progress reporting.
    fn byte_len(&self, key: &ArrayKey) -> PointreelResult<u64>;

    /// Open a reader over the buffer's bytes.
    fn open(&self, key: &ArrayKey) -> PointreelResult<Box<dyn Read + Send>>;
}

/// Arrays stored as files below a root directory.
#[derive(Clone, Debug)]
pub struct FsArraySource {
    root: PathBuf,
}

impl FsArraySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &ArrayKey) -> PointreelResult<PathBuf> {
        Ok(self.root.join(key.rel_path()?))
    }
}

impl ArraySource for FsArraySource {
    fn byte_len(&self, key: &ArrayKey) -> PointreelResult<u64> {
        let p = self.path_for(key)?;
        let meta = std::fs::metadata(&p).map_err(|e| {
            PointreelError::load(format!("failed to stat '{}': {e}", p.display()))
        })?;
        Ok(meta.len())
    }

    fn open(&self, key: &ArrayKey) -> PointreelResult<Box<dyn Read + Send>> {
        let p = self.path_for(key)?;
        let f = std::fs::File::open(&p).map_err(|e| {
            PointreelError::load(format!("failed to open '{}': {e}", p.display()))
        })?;
        Ok(Box::new(std::io::BufReader::new(f)))
    }
}

#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn wait(&self) {
        let mut open = self.open.lock().unwrap_or_else(|p| p.into_inner());
        while !*open {
            open = self.cv.wait(open).unwrap_or_else(|p| p.into_inner());
        }
    }

    fn release(&self) {
        *self.open.lock().unwrap_or_else(|p| p.into_inner()) = true;
        self.cv.notify_all();
    }
}

/// In-memory arrays keyed by relative path.
///
/// Variations can be held back with [`MemoryArraySource::hold`] so that embedders and tests
/// control when a load completes.
#[derive(Clone, Default)]
pub struct MemoryArraySource {
    blobs: Arc<Mutex<HashMap<String, Arc<Vec<u8>>>>>,
    gates: Arc<Mutex<HashMap<String, Arc<Gate>>>>,
}

impl MemoryArraySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under a relative path (normalized).
    pub fn insert(&self, rel_path: &str, bytes: Vec<u8>) -> PointreelResult<()> {
        let p = normalize_rel_path(rel_path)?;
        self.lock_blobs().insert(p, Arc::new(bytes));
        Ok(())
    }

    /// Store `bytes` for a key.
    pub fn insert_key(&self, key: &ArrayKey, bytes: Vec<u8>) -> PointreelResult<()> {
        let p = key.rel_path()?;
        self.lock_blobs().insert(p, Arc::new(bytes));
        Ok(())
    }

    /// Block every read of `variation` until [`MemoryArraySource::release`] is called.
    pub fn hold(&self, variation: &str) {
        self.lock_gates()
            .insert(variation.to_owned(), Arc::new(Gate::default()));
    }

    pub fn release(&self, variation: &str) {
        if let Some(g) = self.lock_gates().remove(variation) {
            g.release();
        }
    }

    fn lock_blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Vec<u8>>>> {
        self.blobs.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_gates(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Gate>>> {
        self.gates.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn blob(&self, key: &ArrayKey) -> PointreelResult<Arc<Vec<u8>>> {
        let p = key.rel_path()?;
        self.lock_blobs()
            .get(&p)
            .cloned()
            .ok_or_else(|| PointreelError::load(format!("no array stored at '{p}'")))
    }
}

impl ArraySource for MemoryArraySource {
    fn byte_len(&self, key: &ArrayKey) -> PointreelResult<u64> {
        Ok(self.blob(key)?.len() as u64)
    }

    fn open(&self, key: &ArrayKey) -> PointreelResult<Box<dyn Read + Send>> {
        let gate = self.lock_gates().get(&key.variation).cloned();
        if let Some(g) = gate {
            g.wait();
        }
        let blob = self.blob(key)?;
        Ok(Box::new(std::io::Cursor::new(SharedBytes(blob))))
    }
}

struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/source.rs"]
mod tests;
