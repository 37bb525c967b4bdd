use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// How a local file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only, positioned at offset 0.
    Read,
    /// Write-only, created or truncated.
    Create,
    /// Write-only, created if missing, positioned at the current end.
    Append,
}

/// Local file access used by the engine.
///
/// Every call is expected to complete promptly; the engine performs at most
/// one bounded read or write per pump.
pub trait FileStore {
    type Handle;

    fn open(&mut self, path: &Path, mode: OpenMode) -> io::Result<Self::Handle>;

    /// Reads up to `max_bytes`. An empty result means end of file.
    fn read(&mut self, handle: &mut Self::Handle, max_bytes: usize) -> io::Result<Vec<u8>>;

    fn write(&mut self, handle: &mut Self::Handle, data: &[u8]) -> io::Result<usize>;

    fn seek(&mut self, handle: &mut Self::Handle, offset: u64) -> io::Result<()>;

    /// Size of the file at `path`, or `None` if it does not exist.
    fn size(&self, path: &Path) -> io::Result<Option<u64>>;

    /// Modification time in seconds since the Unix epoch (0 if unknown).
    fn modified(&self, path: &Path) -> io::Result<u32>;

    fn close(&mut self, handle: Self::Handle) -> io::Result<()>;
}

/// [`FileStore`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        Self
    }
}

impl FileStore for FsStore {
    type Handle = File;

    fn open(&mut self, path: &Path, mode: OpenMode) -> io::Result<File> {
        match mode {
            OpenMode::Read => File::open(path),
            OpenMode::Create => File::create(path),
            OpenMode::Append => OpenOptions::new().create(true).append(true).open(path),
        }
    }

    fn read(&mut self, file: &mut File, max_bytes: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max_bytes];
        let n = file.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn write(&mut self, file: &mut File, data: &[u8]) -> io::Result<usize> {
        file.write_all(data)?;
        Ok(data.len())
    }

    fn seek(&mut self, file: &mut File, offset: u64) -> io::Result<()> {
        file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn size(&self, path: &Path) -> io::Result<Option<u64>> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn modified(&self, path: &Path) -> io::Result<u32> {
        let mtime = std::fs::metadata(path)?.modified()?;
        Ok(mtime
            .duration_since(UNIX_EPOCH)
            .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
            .unwrap_or(0))
    }

    fn close(&mut self, file: File) -> io::Result<()> {
        file.sync_all()
    }
}
