use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use gitzip_workdir::{clean_path, to_slash, WorkDir};
use tracing::debug;
use walkdir::DirEntry;

use crate::access::{FileAccess, LocalFiles, Opened};
use crate::deny::{DenyPredicate, Verdict, Visit};
use crate::sink::{ArchiveSink, EntryKind, DIR_PERMISSION};
use crate::WalkError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    pub files: u64,
    pub directories: u64,
    pub denied: u64,
    pub skipped: u64,
    pub bytes: u64,
}

/// Copies the tree under `source_root` into an archive, renaming the root
/// to `destination_prefix`.
///
/// The sink is borrowed for the lifetime of the walker; closing it is up to
/// the caller. If [`PathWalker::walk`] fails the archive may already hold
/// some entries and should be thrown away.
pub struct PathWalker<'a, A = LocalFiles> {
    source_root: String,
    destination_prefix: String,
    permission: u32,
    sink: &'a mut dyn ArchiveSink,
    access: A,
}

impl<'a> PathWalker<'a> {
    pub fn new(
        source_root: impl Into<String>,
        destination_prefix: impl Into<String>,
        sink: &'a mut dyn ArchiveSink,
        permission: u32,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            destination_prefix: destination_prefix.into(),
            permission,
            sink,
            access: LocalFiles,
        }
    }
}

impl<'a, A: FileAccess> PathWalker<'a, A> {
    pub fn with_file_access<B: FileAccess>(self, access: B) -> PathWalker<'a, B> {
        PathWalker {
            source_root: self.source_root,
            destination_prefix: self.destination_prefix,
            permission: self.permission,
            sink: self.sink,
            access,
        }
    }

    /// Walks the source root in pre-order and stops at the first error.
    ///
    /// A directory becomes a `name/` marker entry and a file becomes an
    /// entry holding its bytes. When the root maps to an empty name (empty
    /// or `/` prefix) no root marker is written.
    pub fn walk(mut self, mut deny: Option<&mut dyn DenyPredicate>) -> Result<WalkStats, WalkError> {
        let root = WorkDir::new(&self.source_root)?;
        let mut stats = WalkStats::default();
        debug!(
            "walking {} into prefix {:?}",
            root.absolute(),
            self.destination_prefix
        );
        root.walk(|path, entry, error| {
            self.visit(
                root.absolute(),
                path,
                entry,
                error,
                deny.as_deref_mut(),
                &mut stats,
            )
        })?;
        debug!(
            "walked {}: {} files, {} directories, {} denied",
            root.absolute(),
            stats.files,
            stats.directories,
            stats.denied
        );
        Ok(stats)
    }

    fn visit(
        &mut self,
        root: &str,
        path: &Path,
        entry: Option<&DirEntry>,
        error: Option<walkdir::Error>,
        deny: Option<&mut (dyn DenyPredicate + '_)>,
        stats: &mut WalkStats,
    ) -> Result<(), WalkError> {
        // `host` is what gets opened; `path` is its slash form for naming.
        let host =
            Utf8Path::from_path(path).ok_or_else(|| WalkError::NonUtf8(path.to_path_buf()))?;
        let path = to_slash(path)
            .map(Utf8PathBuf::from)
            .map_err(|_| WalkError::NonUtf8(path.to_path_buf()))?;
        let is_dir = entry.is_some_and(|e| e.file_type().is_dir());
        let relative = relative_path(root, path.as_str());

        if let Some(deny) = deny {
            let visit = Visit {
                path: &path,
                relative: &relative,
                is_dir,
                error: error.as_ref(),
            };
            if deny.check(&visit)? == Verdict::Deny {
                debug!("denied {path}");
                stats.denied += 1;
                return Ok(());
            }
        }
        if let Some(source) = error {
            return Err(WalkError::Traversal { path, source });
        }

        let name = archive_name(&self.destination_prefix, &relative, is_dir);
        if is_dir {
            let Some(name) = name else {
                return Ok(());
            };
            self.sink
                .create_entry(&name, EntryKind::Directory, DIR_PERMISSION)
                .map_err(|source| WalkError::CreateEntry {
                    name: name.clone(),
                    source,
                })?;
            stats.directories += 1;
            debug!("added {name}");
            return Ok(());
        }

        // a file root under an empty prefix keeps its own name
        let name = match name {
            Some(name) => name,
            None => path.file_name().unwrap_or(path.as_str()).to_string(),
        };

        let opened = self
            .access
            .open(host, self.permission)
            .map_err(|source| WalkError::Open {
                path: path.clone(),
                source,
            })?;
        let mut reader = match opened {
            Opened::Stream(reader) => reader,
            Opened::Skipped => {
                self.access
                    .close(Opened::Skipped)
                    .map_err(|source| WalkError::Close {
                        path: path.clone(),
                        source,
                    })?;
                debug!("nothing to read from {path}, skipped");
                stats.skipped += 1;
                return Ok(());
            }
        };

        let copied = match self
            .sink
            .create_entry(&name, EntryKind::File, self.permission)
        {
            Ok(out) => self
                .access
                .copy(&mut reader, out)
                .map_err(|source| WalkError::Copy {
                    path: path.clone(),
                    source,
                }),
            Err(source) => Err(WalkError::CreateEntry {
                name: name.clone(),
                source,
            }),
        };
        let closed = self
            .access
            .close(Opened::Stream(reader))
            .map_err(|source| WalkError::Close {
                path: path.clone(),
                source,
            });
        let bytes = copied?;
        closed?;

        stats.files += 1;
        stats.bytes += bytes;
        debug!("added {name} ({bytes} bytes)");
        Ok(())
    }
}

/// Maps a path relative to the walk root onto its archive name.
///
/// Returns `None` when the result would be empty, which only happens for
/// the root itself under an empty or `/` prefix.
pub fn archive_name(prefix: &str, relative: &str, is_dir: bool) -> Option<String> {
    let joined = clean_path(&format!("{}/{}", clean_path(prefix), relative));
    let name = joined.trim_start_matches('/');
    if name.is_empty() || name == "." {
        return None;
    }
    Some(if is_dir {
        format!("{name}/")
    } else {
        name.to_string()
    })
}

fn relative_path(root: &str, path: &str) -> String {
    let rest = path.strip_prefix(root).unwrap_or(path);
    let cleaned = clean_path(rest);
    match cleaned.trim_start_matches('/') {
        "." => String::new(),
        other => other.to_string(),
    }
}
