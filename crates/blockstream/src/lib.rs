//! # blockstream
//!
//! Block-granularity buffered reads over seekable byte sources, for local files
//! and higher-latency remote streams alike.
//!
//! ## Architecture
//! - **ByteSource**: read / seek / position / error-state contract of the wrapped stream
//! - **BlockWindow**: the one resident block and its valid sub-range
//! - **BlockBufferedReader**: seek translation and multi-block reads on top of both
//!
//! ```
//! use std::io::Cursor;
//! use blockstream::{BlockBufferedReader, IoSource};
//!
//! let mut source = IoSource::new(Cursor::new(b"ABCDEFGHIJ".to_vec()));
//! let mut reader = BlockBufferedReader::new(&mut source, 4);
//!
//! let mut buf = [0u8; 3];
//! assert_eq!(reader.read(&mut buf), 3);
//! assert_eq!(&buf, b"ABC");
//!
//! reader.seek_absolute(5).unwrap();
//! assert_eq!(reader.read(&mut buf), 3);
//! assert_eq!(&buf, b"FGH");
//! ```

#![warn(missing_docs)]

mod error;
mod reader;
mod source;
mod window;

pub use error::{Error, Result};
pub use reader::{BlockBufferedReader, DEFAULT_BLOCK_SIZE};
pub use source::{ByteSource, IoSource};
pub use window::BlockWindow;
