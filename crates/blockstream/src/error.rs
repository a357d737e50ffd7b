//! Error types for blockstream

use std::fmt;
use std::io;

/// Result type alias for blockstream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by byte sources and reader seeks
#[derive(Debug)]
pub enum Error {
    /// I/O error from the underlying stream
    Io(io::Error),

    /// Relative seek would land before the start of the stream
    NegativePosition {
        /// Position the offset was applied to
        base: u64,
        /// Requested offset
        offset: i64,
    },

    /// Relative seek would overflow the position range
    PositionOverflow,

    /// Source is in a failed state until its error is cleared
    SourceFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::NegativePosition { base, offset } => {
                write!(f, "Seek to negative position: {} + ({})", base, offset)
            }
            Error::PositionOverflow => write!(f, "Seek position overflows u64"),
            Error::SourceFailed => write!(f, "Byte source is in a failed state"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::NegativePosition { .. } | Error::PositionOverflow => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            Error::SourceFailed => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}
