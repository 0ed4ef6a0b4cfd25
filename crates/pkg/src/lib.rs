//! Mirrors a directory tree into an archive under a new path prefix.
//!
//! [`PathWalker`] walks a source root in pre-order and creates one archive
//! entry per file and directory it finds. Entries can be filtered per path
//! with a [`DenyPredicate`]. File reads go through a swappable
//! [`FileAccess`] strategy.

use std::io;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use gitzip_workdir::WorkDirError;
use thiserror::Error;

mod access;
mod deny;
mod sink;
mod walker;

pub use access::{FileAccess, FnFileAccess, LocalFiles, Opened};
pub use deny::{deny_git_dir, DenyPredicate, DenyPrefixes, Verdict, Visit};
pub use sink::{ArchiveError, ArchiveSink, EntryKind, ZipSink, DIR_PERMISSION};
pub use walker::{archive_name, PathWalker, WalkStats};

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("source root: {0}")]
    Root(#[from] WorkDirError),
    #[error("walking {path}: {source}")]
    Traversal {
        path: Utf8PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("opening {path}: {source}")]
    Open {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("creating archive entry {name}: {source}")]
    CreateEntry {
        name: String,
        #[source]
        source: ArchiveError,
    },
    #[error("copying {path}: {source}")]
    Copy {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("closing {path}: {source}")]
    Close {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} denied: {reason}")]
    Denied { path: Utf8PathBuf, reason: String },
    #[error("path {0:?} is not valid UTF-8")]
    NonUtf8(PathBuf),
}
