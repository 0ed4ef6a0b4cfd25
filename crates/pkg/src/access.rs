use std::io::{self, Read, Write};
use std::marker::PhantomData;

use camino::Utf8Path;
use fs_err as fs;

/// Result of opening a source file.
///
/// `Skipped` means there is nothing to archive for the path; the walker
/// drops the entry without treating it as an error.
#[derive(Debug)]
pub enum Opened<R> {
    Stream(R),
    Skipped,
}

/// How the walker reads source files: open, copy into an archive entry,
/// then close. `close` receives every value `open` produced, including
/// `Opened::Skipped`.
pub trait FileAccess {
    type Reader: Read;

    fn open(&mut self, path: &Utf8Path, permission: u32) -> io::Result<Opened<Self::Reader>>;

    fn copy(&mut self, reader: &mut Self::Reader, out: &mut dyn Write) -> io::Result<u64>;

    fn close(&mut self, opened: Opened<Self::Reader>) -> io::Result<()>;
}

/// Reads straight from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFiles;

impl FileAccess for LocalFiles {
    type Reader = fs::File;

    fn open(&mut self, path: &Utf8Path, permission: u32) -> io::Result<Opened<fs::File>> {
        let mut options = fs::OpenOptions::new();
        options.read(true);
        #[cfg(unix)]
        {
            use fs_err::os::unix::fs::OpenOptionsExt;
            options.mode(permission);
        }
        #[cfg(not(unix))]
        let _ = permission;
        options.open(path.as_std_path()).map(Opened::Stream)
    }

    fn copy(&mut self, reader: &mut fs::File, out: &mut dyn Write) -> io::Result<u64> {
        io::copy(reader, out)
    }

    fn close(&mut self, opened: Opened<fs::File>) -> io::Result<()> {
        if let Opened::Stream(file) = opened {
            drop(file);
        }
        Ok(())
    }
}

/// A [`FileAccess`] assembled from three independent closures.
pub struct FnFileAccess<R, O, C, K> {
    open: O,
    copy: C,
    close: K,
    _reader: PhantomData<fn() -> R>,
}

impl<R, O, C, K> FnFileAccess<R, O, C, K>
where
    R: Read,
    O: FnMut(&Utf8Path, u32) -> io::Result<Opened<R>>,
    C: FnMut(&mut R, &mut dyn Write) -> io::Result<u64>,
    K: FnMut(Opened<R>) -> io::Result<()>,
{
    pub fn new(open: O, copy: C, close: K) -> Self {
        Self {
            open,
            copy,
            close,
            _reader: PhantomData,
        }
    }
}

impl<R, O, C, K> FileAccess for FnFileAccess<R, O, C, K>
where
    R: Read,
    O: FnMut(&Utf8Path, u32) -> io::Result<Opened<R>>,
    C: FnMut(&mut R, &mut dyn Write) -> io::Result<u64>,
    K: FnMut(Opened<R>) -> io::Result<()>,
{
    type Reader = R;

    fn open(&mut self, path: &Utf8Path, permission: u32) -> io::Result<Opened<R>> {
        (self.open)(path, permission)
    }

    fn copy(&mut self, reader: &mut R, out: &mut dyn Write) -> io::Result<u64> {
        (self.copy)(reader, out)
    }

    fn close(&mut self, opened: Opened<R>) -> io::Result<()> {
        (self.close)(opened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn local_files_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(tmp.path().join("f.bin")).unwrap();
        std::fs::write(&path, [0u8, 1, 2, 255]).unwrap();

        let mut access = LocalFiles;
        let opened = access.open(&path, 0o644).unwrap();
        let Opened::Stream(mut file) = opened else {
            panic!("local files never skip");
        };
        let mut out = Vec::new();
        assert_eq!(access.copy(&mut file, &mut out).unwrap(), 4);
        assert_eq!(out, [0u8, 1, 2, 255]);
        access.close(Opened::Stream(file)).unwrap();
        access.close(Opened::Skipped).unwrap();
    }

    #[test]
    fn local_files_reports_missing_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(tmp.path().join("missing")).unwrap();
        let err = LocalFiles.open(&path, 0o644).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
