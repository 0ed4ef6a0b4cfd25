use std::collections::HashSet;
use std::io::{self, Seek, Write};

use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Mode recorded for directory markers.
pub const DIR_PERMISSION: u32 = 0o755;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive already contains {0}")]
    Duplicate(String),
    #[error("archive writer is closed")]
    Closed,
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Write side of an archive: named entries in creation order.
pub trait ArchiveSink {
    /// Starts a new entry and returns the stream its bytes go to. Directory
    /// names end with `/` and never receive content.
    fn create_entry(
        &mut self,
        name: &str,
        kind: EntryKind,
        permission: u32,
    ) -> Result<&mut dyn Write, ArchiveError>;

    fn close(&mut self) -> Result<(), ArchiveError>;
}

pub struct ZipSink<W: Write + Seek> {
    zip: ZipWriter<W>,
    names: Vec<String>,
    seen: HashSet<String>,
    finished: Option<W>,
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            zip: ZipWriter::new(inner),
            names: Vec::new(),
            seen: HashSet::new(),
            finished: None,
        }
    }

    /// Names written so far, in creation order.
    pub fn entries(&self) -> &[String] {
        &self.names
    }

    pub fn is_closed(&self) -> bool {
        self.finished.is_some()
    }

    /// Closes the archive if needed and returns the underlying writer.
    pub fn finish(mut self) -> Result<W, ArchiveError> {
        match self.finished.take() {
            Some(inner) => Ok(inner),
            None => Ok(self.zip.finish()?),
        }
    }
}

impl<W: Write + Seek> ArchiveSink for ZipSink<W> {
    fn create_entry(
        &mut self,
        name: &str,
        kind: EntryKind,
        permission: u32,
    ) -> Result<&mut dyn Write, ArchiveError> {
        if self.is_closed() {
            return Err(ArchiveError::Closed);
        }
        if !self.seen.insert(name.to_string()) {
            return Err(ArchiveError::Duplicate(name.to_string()));
        }
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(permission);
        match kind {
            EntryKind::Directory => self.zip.add_directory(name, options)?,
            EntryKind::File => self.zip.start_file(name, options)?,
        }
        self.names.push(name.to_string());
        Ok(&mut self.zip)
    }

    fn close(&mut self) -> Result<(), ArchiveError> {
        if self.is_closed() {
            return Err(ArchiveError::Closed);
        }
        self.finished = Some(self.zip.finish()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn writes_files_and_directory_markers() {
        let mut sink = ZipSink::new(Cursor::new(Vec::new()));
        sink.create_entry("dest/", EntryKind::Directory, DIR_PERMISSION)
            .unwrap();
        sink.create_entry("dest/a.txt", EntryKind::File, 0o644)
            .unwrap()
            .write_all(b"alpha")
            .unwrap();
        assert_eq!(sink.entries(), ["dest/", "dest/a.txt"]);

        let bytes = sink.finish().unwrap().into_inner();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        {
            let dir = archive.by_name("dest/").unwrap();
            assert!(dir.is_dir());
            assert_eq!(dir.size(), 0);
        }
        let mut file = archive.by_name("dest/a.txt").unwrap();
        assert_eq!(file.unix_mode().map(|m| m & 0o777), Some(0o644));
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "alpha");
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut sink = ZipSink::new(Cursor::new(Vec::new()));
        sink.create_entry("x", EntryKind::File, 0o644).unwrap();
        assert!(matches!(
            sink.create_entry("x", EntryKind::File, 0o644),
            Err(ArchiveError::Duplicate(name)) if name == "x"
        ));
        assert_eq!(sink.entries(), ["x"]);
    }

    #[test]
    fn refuses_work_after_close() {
        let mut sink = ZipSink::new(Cursor::new(Vec::new()));
        sink.close().unwrap();
        assert!(sink.is_closed());
        assert!(matches!(
            sink.create_entry("late", EntryKind::File, 0o644),
            Err(ArchiveError::Closed)
        ));
        assert!(matches!(sink.close(), Err(ArchiveError::Closed)));

        let bytes = sink.finish().unwrap().into_inner();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
