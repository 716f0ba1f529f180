use std::io::Write;

use crate::SealingWrite;

/// Reads until `buffer` is full or the reader reports end of stream.
pub fn read_fully<R: std::io::Read + ?Sized>(read: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut pos: usize = 0;
    while pos < buffer.len() {
        match read.read(&mut buffer[pos..]) {
            Ok(0) => return Ok(pos),
            Ok(bytes) => pos += bytes,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(pos)
}

/// Adapts any `std::io::Write` (stdout, sockets, compressors) into a [`SealingWrite`].
/// Sealing flushes the writer.
pub struct WriteAdapter<W> {
    inner: W,
}

impl<W: Write + Send> WriteAdapter<W> {
    pub fn new(inner: W) -> WriteAdapter<W> {
        WriteAdapter { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> SealingWrite for WriteAdapter<W> {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(buf)
    }

    fn seal(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Counts the bytes passed through to the wrapped sink.
pub struct CountingWrite<W> {
    inner: W,
    written: u64,
}

impl<W: SealingWrite> CountingWrite<W> {
    pub fn new(inner: W) -> CountingWrite<W> {
        CountingWrite { inner, written: 0 }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: SealingWrite> SealingWrite for CountingWrite<W> {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }

    fn seal(&mut self) -> std::io::Result<()> {
        self.inner.seal()
    }
}
