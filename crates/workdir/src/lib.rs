use std::env;
use std::fmt;
use std::fs::DirBuilder;
use std::io;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use thiserror::Error;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum WorkDirError {
    #[error("empty path")]
    EmptyPath,
    #[error("resolving absolute path for {path}: {source}")]
    Resolve {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("path {0:?} is not valid UTF-8")]
    NonUtf8(PathBuf),
    #[error("creating directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A directory addressed by its absolute path.
///
/// Every path handed out by a `WorkDir` is slash separated, whatever the
/// host separator is, so callers can compare and rewrite them as plain
/// strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    abs: String,
    path: String,
}

impl fmt::Display for WorkDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.path, self.abs)
    }
}

impl WorkDir {
    pub fn new(path: impl AsRef<str>) -> Result<Self, WorkDirError> {
        let path = path.as_ref();
        if path.is_empty() {
            return Err(WorkDirError::EmptyPath);
        }
        let abs = absolute(path)?;
        Ok(Self {
            abs,
            path: path.to_string(),
        })
    }

    /// Resolves `segments` against `parent` and wraps the result.
    pub fn relative(parent: &WorkDir, segments: &[&str]) -> Result<Self, WorkDirError> {
        Self::new(parent.join_absolute(segments))
    }

    pub fn absolute(&self) -> &str {
        &self.abs
    }

    pub fn original(&self) -> &str {
        &self.path
    }

    pub fn as_path(&self) -> &Utf8Path {
        Utf8Path::new(&self.abs)
    }

    pub fn join_absolute(&self, segments: &[&str]) -> String {
        let mut joined = self.abs.clone();
        for segment in segments.iter().filter(|s| !s.is_empty()) {
            joined.push('/');
            joined.push_str(segment);
        }
        clean_path(&joined)
    }

    pub fn metadata(&self) -> Result<std::fs::Metadata, WorkDirError> {
        Ok(fs::metadata(&self.abs)?)
    }

    pub fn is_directory(&self) -> Result<bool, WorkDirError> {
        Ok(self.metadata()?.is_dir())
    }

    /// Removes `relative` and everything below it. A missing path is not an error.
    pub fn remove_all(&self, relative: &str) -> Result<(), WorkDirError> {
        let target = self.join_absolute(&[relative]);
        let meta = match fs::symlink_metadata(&target) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        debug!("removing {target}");
        if meta.is_dir() {
            fs::remove_dir_all(&target)?;
        } else {
            fs::remove_file(&target)?;
        }
        Ok(())
    }

    pub fn open(&self, relative: &str) -> Result<fs::File, WorkDirError> {
        Ok(fs::File::open(self.join_absolute(&[relative]))?)
    }

    /// Opens `relative` with the caller's options. `permission` is the mode
    /// used if the file gets created (unix only).
    pub fn open_for_write(
        &self,
        relative: &str,
        mut options: fs::OpenOptions,
        permission: u32,
    ) -> Result<fs::File, WorkDirError> {
        set_mode(&mut options, permission);
        Ok(options.open(self.join_absolute(&[relative]))?)
    }

    /// Creates a single directory. `permission` is filtered by the umask,
    /// as with `mkdir(2)`.
    pub fn make_directory(&self, name: &str, permission: u32) -> Result<(), WorkDirError> {
        let target = self.join_absolute(&[name]);
        let mut builder = DirBuilder::new();
        dir_mode(&mut builder, permission);
        builder
            .create(&target)
            .map_err(|source| WorkDirError::CreateDir {
                path: target,
                source,
            })
    }

    /// Walks the directory in pre-order, handing each entry (or the error
    /// produced while reading it) to `visit`. The first `Err` from `visit`
    /// stops the walk.
    pub fn walk<F, E>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&Path, Option<&DirEntry>, Option<walkdir::Error>) -> Result<(), E>,
    {
        let root = Path::new(&self.abs);
        for item in WalkDir::new(root) {
            match item {
                Ok(entry) => visit(entry.path(), Some(&entry), None)?,
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    visit(&path, None, Some(err))?
                }
            }
        }
        Ok(())
    }
}

/// Lexically cleans a slash separated path.
///
/// Repeated separators collapse, `.` segments vanish and `..` eats the
/// segment before it. On Windows backslashes count as separators too;
/// elsewhere they are ordinary name characters. An empty result is returned
/// as `"."`.
pub fn clean_path(path: &str) -> String {
    let path = host_slashes(path);
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Converts a host path into a slash separated UTF-8 string.
pub fn to_slash(path: &Path) -> Result<String, WorkDirError> {
    let utf8 = Utf8Path::from_path(path).ok_or_else(|| WorkDirError::NonUtf8(path.into()))?;
    Ok(host_slashes(utf8.as_str()))
}

#[cfg(windows)]
fn host_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(not(windows))]
fn host_slashes(path: &str) -> String {
    path.to_string()
}

fn absolute(path: &str) -> Result<String, WorkDirError> {
    let candidate = Utf8PathBuf::from(host_slashes(path));
    if candidate.is_absolute() || candidate.as_str().starts_with('/') {
        return Ok(clean_path(candidate.as_str()));
    }
    let cwd = env::current_dir().map_err(|source| WorkDirError::Resolve {
        path: path.to_string(),
        source,
    })?;
    let cwd = to_slash(&cwd)?;
    Ok(clean_path(&format!("{cwd}/{candidate}")))
}

#[cfg(unix)]
fn set_mode(options: &mut fs::OpenOptions, permission: u32) {
    use fs_err::os::unix::fs::OpenOptionsExt;
    options.mode(permission);
}

#[cfg(not(unix))]
fn set_mode(_options: &mut fs::OpenOptions, _permission: u32) {}

#[cfg(unix)]
fn dir_mode(builder: &mut DirBuilder, permission: u32) {
    use std::os::unix::fs::DirBuilderExt;
    builder.mode(permission);
}

#[cfg(not(unix))]
fn dir_mode(_builder: &mut DirBuilder, _permission: u32) {}
