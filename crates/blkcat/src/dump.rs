//! Copying byte ranges out of a block reader

use std::io::{self, Write};

use blockstream::{BlockBufferedReader, ByteSource};

const COPY_CHUNK: usize = 8192;
const HEX_WIDTH: usize = 16;

/// Copy up to `length` bytes (or everything up to EOF) from the reader's position into `out`
///
/// # Returns
/// * `io::Result<u64>` - Number of bytes copied
pub fn copy_range<S, W>(
    reader: &mut BlockBufferedReader<'_, S>,
    length: Option<u64>,
    out: &mut W,
) -> io::Result<u64>
where
    S: ByteSource + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut copied = 0u64;

    loop {
        let want = match length {
            Some(limit) => (limit - copied).min(COPY_CHUNK as u64) as usize,
            None => COPY_CHUNK,
        };
        if want == 0 {
            break;
        }

        let n = reader.read(&mut buf[..want]);
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        copied += n as u64;
    }
    Ok(copied)
}

/// `Write` adapter producing a classic offset / hex / ASCII dump
pub struct HexWriter<W: Write> {
    inner: W,
    offset: u64,
    pending: Vec<u8>,
}

impl<W: Write> HexWriter<W> {
    /// Dump bytes to `inner`, labelling the first one with `offset`
    pub fn new(inner: W, offset: u64) -> Self {
        Self {
            inner,
            offset,
            pending: Vec::with_capacity(HEX_WIDTH),
        }
    }

    fn emit_line(&mut self, len: usize) -> io::Result<()> {
        let line = &self.pending[..len];
        let mut hex = String::with_capacity(HEX_WIDTH * 3);
        for (i, byte) in line.iter().enumerate() {
            if i > 0 {
                hex.push(' ');
            }
            hex.push_str(&format!("{:02x}", byte));
        }
        let ascii: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();

        writeln!(
            self.inner,
            "{:08x}  {:<width$}  |{}|",
            self.offset,
            hex,
            ascii,
            width = HEX_WIDTH * 3 - 1
        )?;
        self.offset += len as u64;
        self.pending.drain(..len);
        Ok(())
    }

    /// Write out a trailing partial line and return the inner writer
    pub fn finish(mut self) -> io::Result<W> {
        if !self.pending.is_empty() {
            let len = self.pending.len();
            self.emit_line(len)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for HexWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while self.pending.len() >= HEX_WIDTH {
            self.emit_line(HEX_WIDTH)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
