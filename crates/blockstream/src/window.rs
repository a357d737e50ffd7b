//! The single resident block of a buffered reader

/// Byte range of the stream currently held in the block buffer
///
/// `[start_byte, start_byte + valid_size)` is the valid window, the bytes that were
/// actually read. `[start_byte, start_byte + block_size)` is the physical block,
/// which is larger for the partial block at the end of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
    /// Absolute offset of the first byte in the buffer
    pub start_byte: u64,
    /// Capacity of the block buffer
    pub block_size: usize,
    /// Number of genuine bytes in the buffer
    pub valid_size: usize,
    /// Whether the buffer holds data for `start_byte`
    pub loaded: bool,
    /// Offset of the exposed read cursor inside the buffer
    pub cursor: usize,
}

impl BlockWindow {
    pub(crate) fn new(block_size: usize) -> Self {
        Self {
            start_byte: 0,
            block_size,
            valid_size: 0,
            loaded: false,
            cursor: 0,
        }
    }

    /// Whether `pos` falls inside the valid window of a loaded block
    pub fn contains_valid(&self, pos: u64) -> bool {
        self.loaded && pos >= self.start_byte && pos - self.start_byte < self.valid_size as u64
    }

    /// Whether `pos` falls inside the physical block range
    pub fn contains_loaded(&self, pos: u64) -> bool {
        self.loaded && pos >= self.start_byte && pos - self.start_byte < self.block_size as u64
    }

    /// Start of the block that holds `pos`
    pub fn block_start_for(&self, pos: u64) -> u64 {
        let block_size = self.block_size as u64;
        (pos / block_size) * block_size
    }

    /// End of the valid window (exclusive)
    pub fn valid_end(&self) -> u64 {
        self.start_byte + self.valid_size as u64
    }

    /// Mark the buffer as not holding anything. The allocation is kept.
    pub(crate) fn invalidate(&mut self) {
        self.loaded = false;
        self.valid_size = 0;
        self.cursor = 0;
    }

    /// Unread bytes exposed past the cursor
    pub(crate) fn exposed(&self) -> std::ops::Range<usize> {
        if self.loaded {
            self.cursor.min(self.valid_size)..self.valid_size
        } else {
            0..0
        }
    }
}
