//! Block-windowed reader over a borrowed byte source
//!
//! The reader keeps exactly one block resident. Reads inside the valid window
//! are served from memory; anything else loads the block containing the
//! current position with a single source read.

use std::io::{self, BufRead, Read, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};

use tracing::trace;

use crate::error::{Error, Result};
use crate::source::ByteSource;
use crate::window::BlockWindow;

/// Block size used by [`BlockBufferedReader::with_default_block_size`] (32 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

/// Storage behind the resident block
enum BlockBuffer<'a> {
    Owned(Vec<u8>),
    Installed(&'a mut [u8]),
}

impl Deref for BlockBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            BlockBuffer::Owned(buf) => &buf[..],
            BlockBuffer::Installed(buf) => &buf[..],
        }
    }
}

impl DerefMut for BlockBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            BlockBuffer::Owned(buf) => &mut buf[..],
            BlockBuffer::Installed(buf) => &mut buf[..],
        }
    }
}

/// Buffered reader that fetches its source one fixed-size block at a time
///
/// The source is borrowed, never owned or closed, and must outlive the reader.
/// A reader is single-threaded state; give each consumer its own instance.
///
/// Read failures and EOF both show up as short reads. Only seeks report errors,
/// and those come from the source.
///
/// A block size of 0 turns buffering off: reads and seeks go straight to the source.
pub struct BlockBufferedReader<'a, S: ByteSource + ?Sized> {
    source: &'a mut S,
    buffer: BlockBuffer<'a>,
    window: BlockWindow,
    /// Absolute stream offset of the next byte to read
    current_position: u64,
}

impl<'a, S: ByteSource + ?Sized> BlockBufferedReader<'a, S> {
    /// Wrap `source` with an internally allocated block buffer of `block_size` bytes
    ///
    /// The reader starts at the source's current position (0 if it cannot be queried).
    pub fn new(source: &'a mut S, block_size: usize) -> Self {
        let current_position = source.position().unwrap_or(0);
        Self {
            source,
            buffer: BlockBuffer::Owned(vec![0u8; block_size]),
            window: BlockWindow::new(block_size),
            current_position,
        }
    }

    /// Wrap `source` with [`DEFAULT_BLOCK_SIZE`] blocks
    pub fn with_default_block_size(source: &'a mut S) -> Self {
        Self::new(source, DEFAULT_BLOCK_SIZE)
    }

    /// Replace the block buffer with a caller-owned one
    ///
    /// The block size becomes `buffer.len()`. The resident block is dropped; the
    /// stream position is kept.
    pub fn install_buffer(&mut self, buffer: &'a mut [u8]) {
        self.resync_position();
        self.window = BlockWindow::new(buffer.len());
        self.buffer = BlockBuffer::Installed(buffer);
    }

    /// Size of one block (0 in passthrough mode)
    pub fn block_size(&self) -> usize {
        self.window.block_size
    }

    /// The resident block, for diagnostics
    pub fn window(&self) -> &BlockWindow {
        &self.window
    }

    /// The wrapped source
    pub fn source(&self) -> &S {
        &*self.source
    }

    /// Mutable access to the wrapped source
    ///
    /// The caller may move the source, so the resident block is dropped. The
    /// reader keeps its position and repositions the source on the next read.
    pub fn source_mut(&mut self) -> &mut S {
        self.resync_position();
        self.window.invalidate();
        &mut *self.source
    }

    /// Absolute position of the next byte to read
    pub fn position(&mut self) -> u64 {
        self.resync_position();
        self.current_position
    }

    fn passthrough(&self) -> bool {
        self.window.block_size == 0
    }

    /// Recompute the position from the exposed cursor
    ///
    /// [`BufRead::consume`] moves the cursor inside the window without going
    /// through the reader's own bookkeeping; this folds it back in.
    pub fn resync_position(&mut self) {
        if self.window.loaded {
            self.current_position = self.window.start_byte + self.window.cursor as u64;
        }
    }

    /// Seek relative to the start, the current position, or the end of the stream
    ///
    /// The reader does not know the stream length, so `SeekFrom::End` is always
    /// forwarded to the source.
    ///
    /// # Returns
    /// * `Result<u64>` - Resulting absolute position
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match pos {
            SeekFrom::Start(target) => self.seek_absolute(target),
            SeekFrom::Current(offset) => {
                self.resync_position();
                let target = offset_position(self.current_position, offset)?;
                self.seek_absolute(target)
            }
            SeekFrom::End(offset) => {
                self.resync_position();
                let reported = self.source.seek(SeekFrom::End(offset))?;
                self.window.invalidate();
                self.current_position = reported;
                Ok(reported)
            }
        }
    }

    /// Seek to an absolute position
    ///
    /// Targets inside the valid window only move the cursor. Everything else
    /// is forwarded to the source and the block is reloaded on the next read.
    pub fn seek_absolute(&mut self, pos: u64) -> Result<u64> {
        self.resync_position();
        if pos == self.current_position {
            return Ok(pos);
        }

        if self.window.contains_valid(pos) {
            self.current_position = pos;
            self.window.cursor = (pos - self.window.start_byte) as usize;
            return Ok(pos);
        }

        if self.window.contains_loaded(pos) {
            // Past the valid bytes of a partial block: the next load repositions the source anyway.
            self.window.invalidate();
            self.current_position = pos;
            return Ok(pos);
        }

        self.window.invalidate();
        let reported = self.source.seek(SeekFrom::Start(pos))?;
        self.current_position = reported;
        Ok(reported)
    }

    /// Read up to `dest.len()` bytes, crossing block boundaries as needed
    ///
    /// # Returns
    /// * `usize` - Bytes copied. Fewer than requested means EOF or a source failure.
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        self.resync_position();
        if self.passthrough() {
            let n = self.read_direct(dest);
            self.current_position += n as u64;
            return n;
        }

        let mut copied = 0;
        while copied < dest.len() {
            if !self.window.contains_valid(self.current_position) && !self.load_block() {
                break;
            }

            let offset = (self.current_position - self.window.start_byte) as usize;
            let n = (self.window.valid_size - offset).min(dest.len() - copied);
            dest[copied..copied + n].copy_from_slice(&self.buffer[offset..offset + n]);

            copied += n;
            self.current_position += n as u64;
            self.window.cursor = offset + n;
        }
        copied
    }

    /// Read the byte at the current position and advance past it
    pub fn read_one(&mut self) -> Option<u8> {
        let byte = self.peek_one()?;
        self.current_position += 1;
        if self.window.loaded {
            self.window.cursor += 1;
        }
        Some(byte)
    }

    /// Return the byte at the current position without consuming it
    pub fn peek_one(&mut self) -> Option<u8> {
        self.resync_position();
        if self.passthrough() {
            let mut byte = [0u8; 1];
            return (self.read_direct(&mut byte) == 1).then_some(byte[0]);
        }

        if !self.window.contains_valid(self.current_position) && !self.load_block() {
            return None;
        }
        let offset = (self.current_position - self.window.start_byte) as usize;
        self.window.cursor = offset;
        Some(self.buffer[offset])
    }

    /// Load the block containing the current position
    ///
    /// Returns whether the window now covers the current position.
    fn load_block(&mut self) -> bool {
        self.window.invalidate();

        let start = self.window.block_start_for(self.current_position);
        self.window.start_byte = start;

        self.source.clear_error();
        if self.source.position().ok() != Some(start) {
            if let Err(err) = self.source.seek(SeekFrom::Start(start)) {
                trace!(start, error = %err, "block seek failed");
                return false;
            }
        }

        let block_size = self.window.block_size;
        match self.source.read_bytes(&mut self.buffer[..block_size]) {
            Ok(n) if n > 0 && !self.source.is_failed() => {
                self.window.loaded = true;
                self.window.valid_size = n;
                if self.window.contains_valid(self.current_position) {
                    self.window.cursor = (self.current_position - start) as usize;
                } else {
                    self.window.invalidate();
                }
            }
            Ok(_) => {}
            Err(err) => trace!(start, error = %err, "block read failed"),
        }

        trace!(
            start,
            valid = self.window.valid_size,
            loaded = self.window.loaded,
            "block load"
        );
        self.window.loaded
    }

    /// Passthrough read at the current position. Does not advance the position.
    fn read_direct(&mut self, dest: &mut [u8]) -> usize {
        self.source.clear_error();
        if self.source.position().ok() != Some(self.current_position)
            && self
                .source
                .seek(SeekFrom::Start(self.current_position))
                .is_err()
        {
            return 0;
        }

        match self.source.read_bytes(dest) {
            Ok(n) => n,
            Err(err) => {
                trace!(position = self.current_position, error = %err, "direct read failed");
                0
            }
        }
    }
}

/// Apply a signed offset to a stream position
fn offset_position(base: u64, offset: i64) -> Result<u64> {
    if offset >= 0 {
        base.checked_add(offset as u64).ok_or(Error::PositionOverflow)
    } else {
        base.checked_sub(offset.unsigned_abs())
            .ok_or(Error::NegativePosition { base, offset })
    }
}

impl<S: ByteSource + ?Sized> Read for BlockBufferedReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(BlockBufferedReader::read(self, buf))
    }
}

impl<S: ByteSource + ?Sized> Seek for BlockBufferedReader<'_, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(BlockBufferedReader::seek(self, pos)?)
    }
}

impl<S: ByteSource + ?Sized> BufRead for BlockBufferedReader<'_, S> {
    /// Exposes the unread part of the valid window, loading a block if needed.
    ///
    /// Not available with a block size of 0.
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.passthrough() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "block buffering is disabled",
            ));
        }

        self.resync_position();
        if !self.window.contains_valid(self.current_position) {
            self.load_block();
        }
        let range = self.window.exposed();
        Ok(&self.buffer[range])
    }

    fn consume(&mut self, amt: usize) {
        if self.window.loaded {
            self.window.cursor = (self.window.cursor + amt).min(self.window.valid_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IoSource;
    use std::io::Cursor;

    /// Test double that counts the calls reaching the underlying stream
    struct CountingSource {
        inner: IoSource<Cursor<Vec<u8>>>,
        reads: usize,
        seeks: usize,
    }

    impl CountingSource {
        fn new(data: &[u8]) -> Self {
            Self {
                inner: IoSource::new(Cursor::new(data.to_vec())),
                reads: 0,
                seeks: 0,
            }
        }
    }

    impl ByteSource for CountingSource {
        fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.reads += 1;
            self.inner.read_bytes(buf)
        }

        fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
            self.seeks += 1;
            self.inner.seek(pos)
        }

        fn position(&mut self) -> Result<u64> {
            self.inner.position()
        }

        fn is_failed(&self) -> bool {
            self.inner.is_failed()
        }

        fn clear_error(&mut self) {
            self.inner.clear_error()
        }
    }

    /// Serves `good` bytes, then every read fails
    struct BrokenAfter {
        data: Vec<u8>,
        pos: u64,
        good: u64,
        failed: bool,
    }

    impl ByteSource for BrokenAfter {
        fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.pos >= self.good {
                self.failed = true;
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "remote closed",
                )));
            }
            let end = (self.pos as usize + buf.len())
                .min(self.good as usize)
                .min(self.data.len());
            let n = end - self.pos as usize;
            buf[..n].copy_from_slice(&self.data[self.pos as usize..end]);
            self.pos += n as u64;
            if n < buf.len() && end < self.data.len() {
                self.failed = true;
            }
            Ok(n)
        }

        fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
            if let SeekFrom::Start(p) = pos {
                self.pos = p;
            }
            Ok(self.pos)
        }

        fn position(&mut self) -> Result<u64> {
            Ok(self.pos)
        }

        fn is_failed(&self) -> bool {
            self.failed
        }

        fn clear_error(&mut self) {
            self.failed = false;
        }
    }

    const ALPHA: &[u8] = b"ABCDEFGHIJ";

    fn read_n<S>(reader: &mut BlockBufferedReader<'_, S>, n: usize) -> Vec<u8>
    where
        S: ByteSource + ?Sized,
    {
        let mut buf = vec![0u8; n];
        let got = reader.read(&mut buf);
        buf.truncate(got);
        buf
    }

    #[test]
    fn test_block_scenario() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 4);

        assert_eq!(read_n(&mut reader, 3), b"ABC");
        assert_eq!(reader.window().start_byte, 0);
        assert_eq!(reader.window().valid_size, 4);
        assert_eq!(reader.source().reads, 1);

        assert_eq!(reader.seek_absolute(2).unwrap(), 2);
        assert_eq!(read_n(&mut reader, 2), b"CD");
        assert_eq!(reader.source().reads, 1);
        assert_eq!(reader.source().seeks, 0);

        assert_eq!(reader.seek_absolute(5).unwrap(), 5);
        assert_eq!(read_n(&mut reader, 3), b"FGH");
        assert_eq!(reader.window().start_byte, 4);
        assert_eq!(reader.window().valid_size, 4);
        assert_eq!(reader.source().reads, 2);

        assert_eq!(read_n(&mut reader, 3), b"IJ");
        assert_eq!(reader.position(), 10);
    }

    #[test]
    fn test_read_crosses_block_boundary() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 4);

        reader.seek_absolute(3).unwrap();
        assert_eq!(read_n(&mut reader, 6), b"DEFGHI");
        assert_eq!(reader.window().start_byte, 8);
        assert_eq!(reader.position(), 9);
    }

    #[test]
    fn test_round_trip_any_block_size() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        for block_size in [1, 3, 7, 64, 100, 999, 1000, 1001, 4096] {
            let mut source = CountingSource::new(&data);
            let mut reader = BlockBufferedReader::new(&mut source, block_size);

            assert_eq!(read_n(&mut reader, data.len()), data, "block size {block_size}");
            assert_eq!(read_n(&mut reader, 1), b"", "block size {block_size}");
        }
    }

    #[test]
    fn test_fast_path_seek_does_no_io() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 8);
        read_n(&mut reader, 1);
        let (reads, seeks) = (reader.source().reads, reader.source().seeks);

        for pos in [7, 0, 4, 4, 2] {
            assert_eq!(reader.seek_absolute(pos).unwrap(), pos);
            assert_eq!(reader.peek_one(), Some(ALPHA[pos as usize]));
        }
        reader.seek(SeekFrom::Current(-1)).unwrap();
        assert_eq!(reader.position(), 1);

        assert_eq!(reader.source().reads, reads);
        assert_eq!(reader.source().seeks, seeks);
    }

    #[test]
    fn test_slow_path_seek_one_seek_then_one_read() {
        let data = vec![7u8; 64];
        let mut source = CountingSource::new(&data);
        let mut reader = BlockBufferedReader::new(&mut source, 8);
        read_n(&mut reader, 2);
        let reads = reader.source().reads;
        let seeks = reader.source().seeks;

        reader.seek_absolute(40).unwrap();
        assert_eq!(reader.source().seeks, seeks + 1);
        assert_eq!(reader.source().reads, reads);

        read_n(&mut reader, 4);
        assert_eq!(reader.source().reads, reads + 1);
    }

    #[test]
    fn test_seek_end_delegates() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 4);
        read_n(&mut reader, 2);

        assert_eq!(reader.seek(SeekFrom::End(-3)).unwrap(), 7);
        assert!(!reader.window().loaded);
        assert_eq!(read_n(&mut reader, 5), b"HIJ");
    }

    #[test]
    fn test_seek_errors() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 4);
        read_n(&mut reader, 2);

        assert!(matches!(
            reader.seek(SeekFrom::Current(-3)),
            Err(Error::NegativePosition { base: 2, offset: -3 })
        ));
        assert_eq!(reader.position(), 2);
        assert!(reader.seek(SeekFrom::End(-20)).is_err());
        assert_eq!(reader.seek_absolute(0).unwrap(), 0);
        assert_eq!(read_n(&mut reader, 2), b"AB");
    }

    #[test]
    fn test_failed_end_seek_keeps_consumed_position() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 4);

        assert_eq!(reader.fill_buf().unwrap(), b"ABCD");
        reader.consume(3);
        assert!(reader.seek(SeekFrom::End(-20)).is_err());

        assert_eq!(reader.position(), 3);
        assert_eq!(read_n(&mut reader, 2), b"DE");
    }

    #[test]
    fn test_source_mut_drops_window_keeps_position() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 4);
        assert_eq!(read_n(&mut reader, 2), b"AB");

        let moved = reader.source_mut();
        moved.seek(SeekFrom::Start(8)).unwrap();
        moved.clear_error();
        assert!(!reader.window().loaded);
        assert_eq!(reader.position(), 2);

        assert_eq!(read_n(&mut reader, 3), b"CDE");
        assert_eq!(reader.window().start_byte, 4);
    }

    #[test]
    fn test_partial_terminal_block() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 4);

        reader.seek_absolute(9).unwrap();
        assert_eq!(read_n(&mut reader, 1), b"J");
        assert_eq!(reader.window().start_byte, 8);
        assert_eq!(reader.window().valid_size, 2);
        assert!(reader.window().contains_loaded(11));

        // Inside the physical block but past the valid bytes: no source seek needed.
        let seeks = reader.source().seeks;
        assert_eq!(reader.seek_absolute(11).unwrap(), 11);
        assert_eq!(reader.source().seeks, seeks);
        assert_eq!(read_n(&mut reader, 1), b"");

        reader.seek_absolute(8).unwrap();
        assert_eq!(read_n(&mut reader, 4), b"IJ");
        assert_eq!(read_n(&mut reader, 4), b"");
    }

    #[test]
    fn test_read_past_eof_is_short_read() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 4);

        reader.seek_absolute(50).unwrap();
        assert_eq!(read_n(&mut reader, 4), b"");
        assert_eq!(reader.read_one(), None);
        assert!(!reader.window().loaded);
    }

    #[test]
    fn test_source_failure_degrades_to_short_read() {
        let mut source = BrokenAfter {
            data: ALPHA.to_vec(),
            pos: 0,
            good: 6,
            failed: false,
        };
        let mut reader = BlockBufferedReader::new(&mut source, 4);

        assert_eq!(read_n(&mut reader, 10), b"ABCD");
        assert!(!reader.window().loaded);
        assert_eq!(reader.read_one(), None);

        reader.seek_absolute(1).unwrap();
        assert_eq!(read_n(&mut reader, 2), b"BC");
    }

    #[test]
    fn test_read_one_and_peek_one() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 3);

        assert_eq!(reader.peek_one(), Some(b'A'));
        assert_eq!(reader.peek_one(), Some(b'A'));
        let bytes: Vec<u8> = std::iter::from_fn(|| reader.read_one()).collect();
        assert_eq!(bytes, ALPHA);
        assert_eq!(reader.position(), 10);
    }

    #[test]
    fn test_consume_then_resync() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 4);

        assert_eq!(reader.fill_buf().unwrap(), b"ABCD");
        reader.consume(3);
        assert_eq!(reader.fill_buf().unwrap(), b"D");
        assert_eq!(reader.position(), 3);

        reader.consume(1);
        assert_eq!(read_n(&mut reader, 2), b"EF");

        reader.seek_absolute(5).unwrap();
        assert_eq!(reader.fill_buf().unwrap(), b"FGH");
    }

    #[test]
    fn test_install_buffer() {
        let mut source = CountingSource::new(ALPHA);
        let mut external = [0u8; 3];
        let mut reader = BlockBufferedReader::new(&mut source, 8);
        read_n(&mut reader, 4);

        reader.install_buffer(&mut external);
        assert_eq!(reader.block_size(), 3);
        assert!(!reader.window().loaded);
        assert_eq!(reader.position(), 4);

        assert_eq!(read_n(&mut reader, 3), b"EFG");
        assert_eq!(reader.window().start_byte, 6);
        assert_eq!(read_n(&mut reader, 10), b"HIJ");
        drop(reader);
        // Last load was the one-byte terminal block over the previous "GHI".
        assert_eq!(&external, b"JHI");
    }

    #[test]
    fn test_passthrough_mode() {
        let mut source = CountingSource::new(ALPHA);
        let mut reader = BlockBufferedReader::new(&mut source, 0);

        assert_eq!(read_n(&mut reader, 3), b"ABC");
        assert_eq!(reader.peek_one(), Some(b'D'));
        assert_eq!(reader.read_one(), Some(b'D'));
        reader.seek_absolute(8).unwrap();
        assert_eq!(read_n(&mut reader, 5), b"IJ");
        assert_eq!(reader.source().reads, 4);
        assert!(reader.fill_buf().is_err());
    }

    #[test]
    fn test_starts_at_source_position() {
        let mut source = CountingSource::new(ALPHA);
        source.seek(SeekFrom::Start(6)).unwrap();
        let mut reader = BlockBufferedReader::new(&mut source, 4);

        assert_eq!(reader.position(), 6);
        assert_eq!(read_n(&mut reader, 4), b"GHIJ");
    }

    #[test]
    fn test_std_io_traits() {
        let text = b"first line\nsecond line\nthird\n";
        let mut source = IoSource::new(Cursor::new(text.to_vec()));
        let mut reader = BlockBufferedReader::new(&mut source, 5);

        let lines: Vec<String> = (&mut reader).lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["first line", "second line", "third"]);

        Seek::seek(&mut reader, SeekFrom::Start(6)).unwrap();
        let mut rest = String::new();
        Read::read_to_string(&mut reader, &mut rest).unwrap();
        assert_eq!(rest, "line\nsecond line\nthird\n");
        assert_eq!(reader.stream_position().unwrap(), text.len() as u64);
    }

    #[test]
    fn test_offset_position() {
        assert_eq!(offset_position(5, 3).unwrap(), 8);
        assert_eq!(offset_position(5, -5).unwrap(), 0);
        assert!(matches!(offset_position(5, -6), Err(Error::NegativePosition { .. })));
        assert!(matches!(offset_position(u64::MAX, 1), Err(Error::PositionOverflow)));
        assert!(offset_position(0, i64::MIN).is_err());
    }
}
