use std::env;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::ScriptError;
use crate::filesystem::{FileSystem, OsFileSystem};

/// Normalized identity of a script file: absolute, symlinks resolved, `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    fn from_resolved(path: &Path) -> Self {
        let text = path.to_string_lossy().replace('\\', "/");
        let text = text.strip_prefix("//?/").map(str::to_string).unwrap_or(text);
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn extension(&self) -> Option<&str> {
        self.as_path().extension().and_then(|ext| ext.to_str())
    }

    /// Containing directory with a trailing `/`, the form scripts concatenate file names onto.
    pub fn directory(&self) -> String {
        let parent = match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        };
        format!("{parent}/")
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for CanonicalPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A reference to a script as a caller wrote it, or an identity that was already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileReference {
    Path(PathBuf),
    Resolved(CanonicalPath),
}

impl From<&str> for FileReference {
    fn from(value: &str) -> Self {
        FileReference::Path(PathBuf::from(value))
    }
}

impl From<String> for FileReference {
    fn from(value: String) -> Self {
        FileReference::Path(PathBuf::from(value))
    }
}

impl From<&Path> for FileReference {
    fn from(value: &Path) -> Self {
        FileReference::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for FileReference {
    fn from(value: PathBuf) -> Self {
        FileReference::Path(value)
    }
}

impl From<&PathBuf> for FileReference {
    fn from(value: &PathBuf) -> Self {
        FileReference::Path(value.clone())
    }
}

impl From<CanonicalPath> for FileReference {
    fn from(value: CanonicalPath) -> Self {
        FileReference::Resolved(value)
    }
}

impl From<&CanonicalPath> for FileReference {
    fn from(value: &CanonicalPath) -> Self {
        FileReference::Resolved(value.clone())
    }
}

pub struct PathCanonicalizer {
    base_dir: PathBuf,
    default_extension: Option<String>,
    fs: Arc<dyn FileSystem>,
}

impl Default for PathCanonicalizer {
    fn default() -> Self {
        Self::new(Arc::new(OsFileSystem))
    }
}

impl PathCanonicalizer {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        let base_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { base_dir, default_extension: None, fs }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Extension tried when a reference names no extension and the bare path does not exist.
    pub fn with_default_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        let trimmed = extension.trim_start_matches('.');
        self.default_extension = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Missing files are not an error here; they canonicalize under their nearest existing
    /// ancestor so the loader can report them by identity.
    pub fn canonicalize(&self, reference: &FileReference) -> Result<CanonicalPath, ScriptError> {
        let path = match reference {
            FileReference::Resolved(canonical) => return Ok(canonical.clone()),
            FileReference::Path(path) => path,
        };
        let joined = if path.is_absolute() { path.clone() } else { self.base_dir.join(path) };
        let target = self.apply_default_extension(joined);
        let resolved = self
            .resolve(&target)
            .map_err(|source| ScriptError::PathResolution { path: path.clone(), source })?;
        Ok(CanonicalPath::from_resolved(&resolved))
    }

    fn apply_default_extension(&self, path: PathBuf) -> PathBuf {
        let Some(ext) = &self.default_extension else {
            return path;
        };
        if path.extension().is_some() || self.fs.exists(&path) {
            return path;
        }
        let candidate = path.with_extension(ext);
        if self.fs.exists(&candidate) {
            candidate
        } else {
            path
        }
    }

    fn resolve(&self, target: &Path) -> io::Result<PathBuf> {
        if self.fs.exists(target) {
            return self.fs.resolve_canonical(target);
        }
        let normalized = normalize_lexically(target);
        let mut missing = Vec::new();
        let mut cursor = normalized.as_path();
        while let Some(parent) = cursor.parent() {
            if let Some(name) = cursor.file_name() {
                missing.push(name.to_os_string());
            }
            if !parent.as_os_str().is_empty() && self.fs.exists(parent) {
                let mut resolved = self.fs.resolve_canonical(parent)?;
                for name in missing.iter().rev() {
                    resolved.push(name);
                }
                return Ok(resolved);
            }
            cursor = parent;
        }
        Ok(normalized)
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
