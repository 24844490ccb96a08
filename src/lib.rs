//! # pltx — async, chunked, compressed timeseries container format
//!
//! Format guarantees, frozen at version 2:
//! - All integers little-endian; all floats IEEE-754 binary64 little-endian
//! - Every chunk is self-describing: magic, signal id, record count, raw
//!   and compressed lengths, and the chunk's `[min_ts, max_ts]` range
//! - The whole file is compressed with exactly one codec, declared once
//!   in the header and never negotiated per chunk
//! - The index is a single block near the end of the file; the footer's
//!   fixed 12-byte trailer is the only thing a reader needs to locate it
//! - Writing is async and incremental: [`writer::PltxWriter`] buffers,
//!   flushes, and finalizes without ever holding the whole recording in
//!   memory; reading is synchronous and parses the header/footer/index
//!   once at construction, then iterates chunks lazily

pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod reader;
pub mod registry;
pub mod unified;
pub mod writer;

pub use codec::CodecId;
pub use config::PltxConfig;
pub use error::{PltxError, Result};
pub use reader::{Chunk, Header, PltxReader};
pub use registry::ReaderManager;
pub use unified::{SignalInfo, UnifiedHeader, UnifiedReader};
pub use writer::{PltxWriter, SignalRef, WriterConfig};
