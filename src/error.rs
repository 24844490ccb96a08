//! Crate-wide error taxonomy.
//!
//! One variant family per component: corruption,
//! unknown signals, unsupported formats, and the bounded finalize-retry
//! failure. Library code returns `PltxError`; the CLI wraps it in `anyhow`
//! at the boundary.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PltxError {
    #[error("not a PLTX file: bad magic at offset 0")]
    BadMagic,

    #[error("unsupported PLTX version {0} (this build reads version 2)")]
    UnsupportedVersion(u8),

    #[error("corrupt PLTX file: {0}")]
    Corrupt(String),

    #[error("unknown signal: {0}")]
    UnknownSignal(String),

    #[error("signal not registered with the reader registry: {0}")]
    SignalNotRegistered(String),

    #[error("unsupported file format for {path}")]
    UnsupportedFormat { path: String },

    #[error("finalize failed after {attempts} attempt(s): {source}")]
    FinalizeFailed {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PltxError>;
