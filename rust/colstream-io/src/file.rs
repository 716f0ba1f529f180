use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::SealingWrite;

pub(crate) const READ_BUFFER_SIZE: usize = 256 * 1024;
const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Buffered file sink.
///
/// Files created from a path are synced to storage on [`seal`](SealingWrite::seal);
/// descriptors adopted through [`FileWriter::from_fd`] may refer to pipes or sockets
/// and are only flushed.
pub struct FileWriter {
    file: Option<BufWriter<File>>,
    sync_on_seal: bool,
}

impl FileWriter {
    pub fn new(file: File) -> FileWriter {
        FileWriter {
            file: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
            sync_on_seal: true,
        }
    }

    /// Creates (or truncates) the file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<FileWriter> {
        Ok(FileWriter::new(File::create(path)?))
    }

    #[cfg(unix)]
    pub fn from_fd(fd: std::os::fd::OwnedFd) -> FileWriter {
        FileWriter {
            file: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, File::from(fd))),
            sync_on_seal: false,
        }
    }

    fn sealed() -> std::io::Error {
        std::io::Error::other("file writer is sealed")
    }
}

impl SealingWrite for FileWriter {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.file.as_mut().ok_or_else(Self::sealed)?.write_all(buf)
    }

    fn seal(&mut self) -> std::io::Result<()> {
        let mut file = self.file.take().ok_or_else(Self::sealed)?;
        file.flush()?;
        if self.sync_on_seal {
            file.get_ref().sync_all()?;
        }
        Ok(())
    }
}
