//! Codec layer (C1): compress/decompress byte blobs with a selectable
//! algorithm. Four codes are frozen on disk — `NONE`, `DEFLATE`, `LZ4`,
//! `ZSTD` — and persisted once in the file header; every chunk in a file
//! is compressed with that one codec.
//!
//! Selecting a codec from a CLI/config string tag: `"none"` maps to
//! `NONE`; `"zstd"`/`"lz4"` map to their codec if available, else fall
//! back to `DEFLATE`; any other tag also falls back to `DEFLATE`.
//! Both `zstd` and `lz4_flex` are unconditional dependencies of this crate,
//! so the fallback path is only reachable with the `force-deflate-fallback`
//! feature, which exists to keep that branch exercised by tests rather
//! than to model a real runtime limitation.

use std::io::{Read, Write};

use crate::error::{PltxError, Result};

/// On-disk compression code, persisted once in the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CodecId {
    None = 0,
    Deflate = 1,
    Lz4 = 2,
    Zstd = 3,
}

impl CodecId {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(CodecId::None),
            1 => Ok(CodecId::Deflate),
            2 => Ok(CodecId::Lz4),
            3 => Ok(CodecId::Zstd),
            other => Err(PltxError::Corrupt(format!(
                "unknown compression code {other} in header"
            ))),
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Select a codec from a CLI/config tag, falling back to deflate for
    /// anything unrecognized or unavailable.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "none" => CodecId::None,
            "zstd" => {
                if cfg!(feature = "force-deflate-fallback") {
                    CodecId::Deflate
                } else {
                    CodecId::Zstd
                }
            }
            "lz4" => {
                if cfg!(feature = "force-deflate-fallback") {
                    CodecId::Deflate
                } else {
                    CodecId::Lz4
                }
            }
            _ => CodecId::Deflate,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::Deflate => "deflate",
            CodecId::Lz4 => "lz4",
            CodecId::Zstd => "zstd",
        }
    }
}

/// Compress `data` under `algo` at `level` (ignored by codecs without a
/// level knob).
pub fn compress(data: &[u8], algo: CodecId, level: i32) -> Result<Vec<u8>> {
    match algo {
        CodecId::None => Ok(data.to_vec()),
        CodecId::Deflate => {
            let mut enc = flate2::write::DeflateEncoder::new(
                Vec::new(),
                flate2::Compression::new(level.clamp(0, 9) as u32),
            );
            enc.write_all(data)
                .map_err(|e| PltxError::Codec(e.to_string()))?;
            enc.finish().map_err(|e| PltxError::Codec(e.to_string()))
        }
        CodecId::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        CodecId::Zstd => {
            zstd::encode_all(data, level).map_err(|e| PltxError::Codec(e.to_string()))
        }
    }
}

/// Decompress `data` under `algo`, then verify the decoded length matches
/// `expected_raw_len` — mandatory regardless of codec.
pub fn decompress(data: &[u8], algo: CodecId, expected_raw_len: usize) -> Result<Vec<u8>> {
    let out = match algo {
        CodecId::None => data.to_vec(),
        CodecId::Deflate => {
            let mut dec = flate2::read::DeflateDecoder::new(data);
            let mut buf = Vec::with_capacity(expected_raw_len);
            dec.read_to_end(&mut buf)
                .map_err(|e| PltxError::Codec(e.to_string()))?;
            buf
        }
        CodecId::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| PltxError::Codec(e.to_string()))?,
        CodecId::Zstd => zstd::decode_all(data).map_err(|e| PltxError::Codec(e.to_string()))?,
    };

    if out.len() != expected_raw_len {
        return Err(PltxError::Corrupt(format!(
            "decompressed length {} does not match chunk raw_len {}",
            out.len(),
            expected_raw_len
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"the quick brown fox jumps over the lazy dog, repeatedly, repeatedly, repeatedly";

    #[test]
    fn round_trips_every_codec() {
        for algo in [CodecId::None, CodecId::Deflate, CodecId::Lz4, CodecId::Zstd] {
            let compressed = compress(SAMPLE, algo, 3).unwrap();
            let out = decompress(&compressed, algo, SAMPLE.len()).unwrap();
            assert_eq!(out, SAMPLE, "round trip mismatch for {:?}", algo);
        }
    }

    #[test]
    fn decompress_rejects_wrong_expected_length() {
        let compressed = compress(SAMPLE, CodecId::Zstd, 3).unwrap();
        let err = decompress(&compressed, CodecId::Zstd, SAMPLE.len() + 1).unwrap_err();
        assert!(matches!(err, PltxError::Corrupt(_)));
    }

    #[test]
    fn from_tag_falls_back_to_deflate_for_unknown_tags() {
        assert_eq!(CodecId::from_tag("brotli"), CodecId::Deflate);
        assert_eq!(CodecId::from_tag("NONE"), CodecId::None);
    }

    #[test]
    fn code_round_trips_through_from_code() {
        for algo in [CodecId::None, CodecId::Deflate, CodecId::Lz4, CodecId::Zstd] {
            assert_eq!(CodecId::from_code(algo.code()).unwrap(), algo);
        }
        assert!(CodecId::from_code(99).is_err());
    }
}
