//! Pull and push callback adapters.
//!
//! Callbacks follow the `(buffer) -> bytes_transferred` shape: a read callback
//! returns `0` at the end of the stream, and any negative return is a failure whose
//! code is carried through [`CallbackError`].

use std::io::Read;

use colstream_common::CallbackError;

use crate::SealingWrite;

pub struct CallbackReader<F> {
    pull: F,
    finished: bool,
}

impl<F> CallbackReader<F>
where
    F: FnMut(&mut [u8]) -> i64,
{
    pub fn new(pull: F) -> CallbackReader<F> {
        CallbackReader {
            pull,
            finished: false,
        }
    }
}

impl<F> Read for CallbackReader<F>
where
    F: FnMut(&mut [u8]) -> i64,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }
        let n = (self.pull)(buf);
        if n < 0 {
            return Err(CallbackError { code: n }.into_io());
        }
        if n == 0 {
            self.finished = true;
            return Ok(0);
        }
        let n = n as usize;
        if n > buf.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("read callback reported {n} bytes for a {} byte buffer", buf.len()),
            ));
        }
        Ok(n)
    }
}

pub struct CallbackWriter<F> {
    push: F,
}

impl<F> CallbackWriter<F>
where
    F: FnMut(&[u8]) -> i64 + Send,
{
    pub fn new(push: F) -> CallbackWriter<F> {
        CallbackWriter { push }
    }
}

impl<F> SealingWrite for CallbackWriter<F>
where
    F: FnMut(&[u8]) -> i64 + Send,
{
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let n = (self.push)(buf);
        if n < 0 {
            return Err(CallbackError { code: n }.into_io());
        }
        if n as usize != buf.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short write: {n} of {} bytes", buf.len()),
            ));
        }
        Ok(())
    }

    fn seal(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
