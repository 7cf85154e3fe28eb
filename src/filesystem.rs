use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem access used by the loader and the canonicalizer. Hosts swap this out to serve
/// scripts from somewhere other than the local disk.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn read_all(&self, path: &Path) -> io::Result<String>;

    /// Resolves symlinks and relative components of a path that exists.
    fn resolve_canonical(&self, path: &Path) -> io::Result<PathBuf>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_all(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn resolve_canonical(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }
}
