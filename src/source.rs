//! Where an upload's bytes live.
//!
//! The pipeline never opens files by itself. It asks a [`SourceFile`] for a
//! local path, which may mean copying a stored file into a cache directory
//! first, and tells it where the processed result ended up.

use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An upload the pipeline can read from and report back to.
pub trait SourceFile {
    /// Whether a local copy is already available without further I/O.
    fn is_cached(&self) -> bool;

    /// Make the file available on local disk and return its path.
    fn resolve_local_path(&mut self) -> io::Result<PathBuf>;

    /// Record the path of the processed file. Called after a flush that
    /// changed the extension.
    fn set_current_path(&mut self, path: PathBuf);
}

/// A file already on local disk.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceFile for LocalFile {
    fn is_cached(&self) -> bool {
        self.path.is_file()
    }

    fn resolve_local_path(&mut self) -> io::Result<PathBuf> {
        if self.path.is_file() {
            Ok(self.path.clone())
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", self.path.display()),
            ))
        }
    }

    fn set_current_path(&mut self, path: PathBuf) {
        self.path = path;
    }
}

/// A file held in a store that must be copied into a local cache
/// directory before it can be decoded.
#[derive(Debug, Clone)]
pub struct StoredFile {
    stored: PathBuf,
    cache_dir: PathBuf,
    cached: Option<PathBuf>,
}

impl StoredFile {
    pub fn new(stored: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            stored: stored.into(),
            cache_dir: cache_dir.into(),
            cached: None,
        }
    }

    /// Location in the store. Never written by the pipeline.
    pub fn stored_path(&self) -> &Path {
        &self.stored
    }

    /// Local copy, once resolved.
    pub fn cached_path(&self) -> Option<&Path> {
        self.cached.as_deref()
    }
}

impl SourceFile for StoredFile {
    fn is_cached(&self) -> bool {
        self.cached.as_deref().is_some_and(Path::is_file)
    }

    fn resolve_local_path(&mut self) -> io::Result<PathBuf> {
        if let Some(cached) = self.cached.as_ref().filter(|p| p.is_file()) {
            return Ok(cached.clone());
        }

        let name = self.stored.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", self.stored.display()),
            )
        })?;
        std::fs::create_dir_all(&self.cache_dir)?;
        let local = self.cache_dir.join(name);
        std::fs::copy(&self.stored, &local)?;
        debug!(
            stored = %self.stored.display(),
            cached = %local.display(),
            "copied stored file into cache"
        );

        self.cached = Some(local.clone());
        Ok(local)
    }

    fn set_current_path(&mut self, path: PathBuf) {
        self.cached = Some(path);
    }
}
