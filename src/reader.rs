//! Synchronous PLTX reader (C3): eager header/footer/index parse at
//! construction, lazy chunk iteration, and time-range pushdown against the
//! per-chunk `[min_ts, max_ts]` index.
//!
//! The header, footer, and index are parsed once in the constructor;
//! `iter_chunks`/`iter_time_range` lazily walk the chunk payloads that
//! follow.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::codec::{self, CodecId};
use crate::error::{PltxError, Result};
use crate::frame::{self, ChunkHeader, Footer, HeaderPrefix, IndexEntry, SignalMeta};

/// One decoded chunk of `(timestamp, value)` records for a single signal.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub sid: u32,
    pub min_ts: f64,
    pub max_ts: f64,
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
}

/// Everything read eagerly at construction: format version, codec,
/// creation time, and per-signal metadata.
#[derive(Debug, Clone)]
pub struct Header {
    pub version: u8,
    pub compression: CodecId,
    pub created: f64,
    pub signals: Vec<SignalMeta>,
}

pub struct PltxReader {
    path: PathBuf,
    file: BufReader<File>,
    header: Header,
    /// sid -> every index entry for that signal, in file (append) order.
    by_sid: HashMap<u32, Vec<IndexEntry>>,
    /// name -> sid, for `signal_by_name`.
    by_name: HashMap<String, u32>,
}

impl PltxReader {
    /// Open `path`, eagerly parsing the header, footer, and index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = BufReader::new(File::open(&path)?);

        let prefix = HeaderPrefix::read(&mut file)?;
        let mut signals = Vec::with_capacity(prefix.sig_count as usize);
        for _ in 0..prefix.sig_count {
            signals.push(SignalMeta::read(&mut file)?);
        }

        let footer_offset = file.seek(SeekFrom::End(-(frame::FOOTER_SIZE as i64)))?;
        let footer = Footer::read(&mut file)?;
        if footer.index_offset >= footer_offset {
            return Err(PltxError::Corrupt(
                "footer index_offset points past the footer itself".into(),
            ));
        }
        file.seek(SeekFrom::Start(footer.index_offset))?;
        let entries = frame::read_index_block(&mut file)?;

        let mut by_sid: HashMap<u32, Vec<IndexEntry>> = HashMap::new();
        for e in entries {
            by_sid.entry(e.sid).or_default().push(e);
        }
        for v in by_sid.values_mut() {
            v.sort_by(|a, b| a.offset.cmp(&b.offset));
        }

        let by_name = signals.iter().map(|s| (s.name.clone(), s.sid)).collect();

        let header = Header {
            version: prefix.version,
            compression: prefix.comp,
            created: prefix.created,
            signals,
        };

        Ok(Self {
            path,
            file,
            header,
            by_sid,
            by_name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn list_signals(&self) -> Vec<&SignalMeta> {
        self.header.signals.iter().collect()
    }

    pub fn signal_by_name(&self, name: &str) -> Option<&SignalMeta> {
        let sid = *self.by_name.get(name)?;
        self.header.signals.iter().find(|s| s.sid == sid)
    }

    fn read_chunk_at(&mut self, entry: &IndexEntry) -> Result<Chunk> {
        self.file.seek(SeekFrom::Start(entry.offset))?;
        let ch = ChunkHeader::read(&mut self.file)?;
        if ch.sid != entry.sid {
            return Err(PltxError::Corrupt(format!(
                "index entry sid {} does not match chunk frame sid {} at offset {}",
                entry.sid, ch.sid, entry.offset
            )));
        }
        let mut payload = vec![0u8; ch.comp_len as usize];
        self.file.read_exact(&mut payload)?;
        let raw = codec::decompress(&payload, self.header.compression, ch.raw_len as usize)?;
        let (timestamps, values) = frame::decode_records(&raw)?;
        Ok(Chunk {
            sid: ch.sid,
            min_ts: ch.min_ts,
            max_ts: ch.max_ts,
            timestamps,
            values,
        })
    }

    /// Every chunk for `sid`, in append order. Empty (not an error) if
    /// `sid` is unknown.
    pub fn iter_chunks(&mut self, sid: u32) -> Result<Vec<Chunk>> {
        let entries = match self.by_sid.get(&sid) {
            Some(e) => e.clone(),
            None => return Ok(Vec::new()),
        };
        entries.iter().map(|e| self.read_chunk_at(e)).collect()
    }

    /// Chunks for `sid` overlapping `[t_start, t_end]`, with chunk-level
    /// predicate pushdown against the index before any chunk is read or
    /// decompressed. Within each overlapping chunk, only records with
    /// `t_start <= ts <= t_end` survive; a chunk with no surviving
    /// records is not yielded.
    pub fn iter_time_range(&mut self, sid: u32, t_start: f64, t_end: f64) -> Result<Vec<Chunk>> {
        let entries: Vec<IndexEntry> = match self.by_sid.get(&sid) {
            Some(e) => e
                .iter()
                .filter(|e| e.max_ts >= t_start && e.min_ts <= t_end)
                .cloned()
                .collect(),
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::with_capacity(entries.len());
        for e in &entries {
            let chunk = self.read_chunk_at(e)?;
            let mut timestamps = Vec::new();
            let mut values = Vec::new();
            for (t, v) in chunk.timestamps.iter().zip(chunk.values.iter()) {
                if *t >= t_start && *t <= t_end {
                    timestamps.push(*t);
                    values.push(*v);
                }
            }
            if timestamps.is_empty() {
                continue;
            }
            out.push(Chunk {
                sid: chunk.sid,
                min_ts: chunk.min_ts,
                max_ts: chunk.max_ts,
                timestamps,
                values,
            });
        }
        Ok(out)
    }

    /// Every `(timestamp, value)` for `sid`, concatenated across chunks in
    /// append order.
    pub fn read_signal_all(&mut self, sid: u32) -> Result<(Vec<f64>, Vec<f64>)> {
        let chunks = self.iter_chunks(sid)?;
        let total: usize = chunks.iter().map(|c| c.timestamps.len()).sum();
        let mut timestamps = Vec::with_capacity(total);
        let mut values = Vec::with_capacity(total);
        for c in chunks {
            timestamps.extend(c.timestamps);
            values.extend(c.values);
        }
        Ok((timestamps, values))
    }
}
