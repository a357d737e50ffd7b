//! Byte sources a [`BlockBufferedReader`](crate::BlockBufferedReader) can wrap

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Readable, seekable byte stream with a sticky error state
///
/// Reads report how many bytes landed in the buffer. A short count is either EOF
/// or a failure; [`is_failed`](ByteSource::is_failed) tells them apart.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes, returning the number read (`0` at EOF)
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Seek and return the resulting absolute position
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Current absolute position
    fn position(&mut self) -> Result<u64>;

    /// Whether a previous operation left the source failed
    fn is_failed(&self) -> bool;

    /// Clear the failed state
    fn clear_error(&mut self);
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_bytes(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        (**self).seek(pos)
    }

    fn position(&mut self) -> Result<u64> {
        (**self).position()
    }

    fn is_failed(&self) -> bool {
        (**self).is_failed()
    }

    fn clear_error(&mut self) {
        (**self).clear_error()
    }
}

/// [`ByteSource`] over any std `Read + Seek` stream (a `File`, a `Cursor`)
#[derive(Debug)]
pub struct IoSource<T> {
    inner: T,
    failed: bool,
}

impl<T: Read + Seek> IoSource<T> {
    /// Wrap a stream
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            failed: false,
        }
    }

    /// Borrow the wrapped stream
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Unwrap the stream
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Seek> ByteSource for IoSource<T> {
    /// Fills `buf` as far as the stream allows.
    ///
    /// An I/O error marks the source failed. Bytes read before the error are still
    /// returned; the error itself is only returned when nothing was read.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.failed {
            return Err(Error::SourceFailed);
        }

        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.failed = true;
                    if filled == 0 {
                        return Err(e.into());
                    }
                    break;
                }
            }
        }
        Ok(filled)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.inner.seek(pos).map_err(|e| {
            self.failed = true;
            Error::from(e)
        })
    }

    fn position(&mut self) -> Result<u64> {
        if self.failed {
            return Err(Error::SourceFailed);
        }
        Ok(self.inner.stream_position()?)
    }

    fn is_failed(&self) -> bool {
        self.failed
    }

    fn clear_error(&mut self) {
        self.failed = false;
    }
}
