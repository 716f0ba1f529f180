//! Stream adapters:
//! - `ByteSource`: sequential pull source over a path, file descriptor, memory buffer,
//!   read callback or any `std::io::Read`.
//! - `SealingWrite`: sequential writer with a `seal()` operation, committing the write activity.
//!
//! Frame iteration and encoding depend only on these two abstractions, never on the
//! concrete kind of source or sink.

use std::io::Read;

pub mod callback;
pub mod file;
pub mod memory;
pub mod utils;

pub use callback::{CallbackReader, CallbackWriter};
pub use file::FileWriter;
pub use utils::{CountingWrite, WriteAdapter};

/// A sequential byte source with position tracking.
///
/// The lifetime parameter allows borrowing sources such as in-memory slices; sources
/// built from paths, files or owned buffers are `ByteSource<'static>`.
pub struct ByteSource<'a> {
    inner: Box<dyn Read + Send + 'a>,
    position: u64,
    description: String,
}

impl<'a> ByteSource<'a> {
    /// Wraps an arbitrary reader. `description` is used as error context.
    pub fn from_reader<R>(reader: R, description: impl Into<String>) -> ByteSource<'a>
    where
        R: Read + Send + 'a,
    {
        ByteSource {
            inner: Box::new(reader),
            position: 0,
            description: description.into(),
        }
    }

    /// Creates a source over an in-memory buffer; the slice length bounds the stream.
    pub fn from_slice(buf: &'a [u8]) -> ByteSource<'a> {
        let description = format!("memory buffer ({} bytes)", buf.len());
        Self::from_reader(std::io::Cursor::new(buf), description)
    }

    /// Creates a source driven by a pull callback.
    ///
    /// The callback fills the provided buffer and returns the number of bytes
    /// produced, `0` at the end of the stream, or a negative code on failure.
    /// Negative codes reach the caller unchanged as
    /// [`ErrorKind::Callback`](colstream_common::ErrorKind::Callback).
    pub fn from_callback<F>(pull: F) -> ByteSource<'a>
    where
        F: FnMut(&mut [u8]) -> i64 + Send + 'a,
    {
        Self::from_reader(CallbackReader::new(pull), "read callback")
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Reads until `buf` is full or the end of the stream is reached, returning the
    /// number of bytes read.
    pub fn read_fully(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = utils::read_fully(&mut self.inner, buf)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Fills `buf` completely.
    ///
    /// Returns `Ok(false)` when the stream is already exhausted (zero bytes available),
    /// which marks a clean end of stream. A partially filled buffer is a short read and
    /// fails with `UnexpectedEof`.
    pub fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> std::io::Result<bool> {
        let n = self.read_fully(buf)?;
        if n == buf.len() {
            Ok(true)
        } else if n == 0 {
            Ok(false)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("short read: {n} of {} bytes", buf.len()),
            ))
        }
    }
}

impl ByteSource<'static> {
    /// Opens the file at `path` for buffered sequential reading.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<ByteSource<'static>> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        log::debug!("opened byte source {}", path.display());
        Ok(Self::from_reader(
            std::io::BufReader::with_capacity(file::READ_BUFFER_SIZE, file),
            path.display().to_string(),
        ))
    }

    pub fn from_file(file: std::fs::File) -> ByteSource<'static> {
        Self::from_reader(
            std::io::BufReader::with_capacity(file::READ_BUFFER_SIZE, file),
            "file",
        )
    }

    /// Takes ownership of an open file descriptor.
    #[cfg(unix)]
    pub fn from_fd(fd: std::os::fd::OwnedFd) -> ByteSource<'static> {
        Self::from_file(std::fs::File::from(fd))
    }

    pub fn from_vec(buf: Vec<u8>) -> ByteSource<'static> {
        let description = format!("memory buffer ({} bytes)", buf.len());
        Self::from_reader(std::io::Cursor::new(buf), description)
    }
}

impl Read for ByteSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

/// A trait for sequential writing with explicit sealing semantics.
///
/// Unlike [`std::io::Write`], a `SealingWrite` requires an explicit [`seal`](SealingWrite::seal)
/// to flush and commit the written data.
pub trait SealingWrite: Send {
    /// Writes the entire buffer, appending it to previously written data.
    ///
    /// Either all bytes are written or an error is returned. A sink that accepts
    /// fewer bytes than offered reports a short write as an error.
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Flushes buffered data and commits it to the underlying medium.
    ///
    /// Calling [`write_all`](SealingWrite::write_all) after sealing may fail.
    fn seal(&mut self) -> std::io::Result<()>;
}

impl<T> SealingWrite for Box<T>
where
    T: SealingWrite + ?Sized,
{
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.as_mut().write_all(buf)
    }

    fn seal(&mut self) -> std::io::Result<()> {
        self.as_mut().seal()
    }
}

impl<T> SealingWrite for &mut T
where
    T: SealingWrite + ?Sized,
{
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        (**self).write_all(buf)
    }

    fn seal(&mut self) -> std::io::Result<()> {
        (**self).seal()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::ByteSource;

    #[test]
    fn test_read_exact_or_eof() {
        let data = b"abcdefgh".to_vec();
        let mut src = ByteSource::from_slice(&data);
        let mut buf = [0u8; 4];
        assert!(src.read_exact_or_eof(&mut buf).unwrap());
        assert_eq!(&buf, b"abcd");
        assert!(src.read_exact_or_eof(&mut buf).unwrap());
        assert_eq!(&buf, b"efgh");
        assert!(!src.read_exact_or_eof(&mut buf).unwrap());
        assert_eq!(src.position(), 8);
    }

    #[test]
    fn test_short_read_is_error() {
        let mut src = ByteSource::from_vec(b"abcdef".to_vec());
        let mut buf = [0u8; 4];
        assert!(src.read_exact_or_eof(&mut buf).unwrap());
        let err = src.read_exact_or_eof(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_trait_tracks_position() {
        let mut src = ByteSource::from_vec(vec![7u8; 100]);
        let mut out = Vec::new();
        src.read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), 100);
        assert_eq!(src.position(), 100);
    }
}
