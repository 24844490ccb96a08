//! Unified multi-format reader façade (C5): one `get_header` /
//! `iter_chunks` / `read_signal_all` / `close` contract over PLTX, CSV,
//! Excel, HDF5, and Parquet, dispatched by file extension.
//!
//! A signal literally named `"Time"` (case-insensitive) is always
//! rejected, since every engine reserves that column/field as the time
//! axis.

mod csv_engine;
mod excel_engine;
mod hdf5_engine;
mod parquet_engine;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{PltxError, Result};
use crate::reader::PltxReader;

/// A single entry of `UnifiedHeader::signals`: just the name, per the
/// `{sid -> {name}}` contract.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SignalInfo {
    pub name: String,
}

/// Header information common to every engine. PLTX populates every
/// field; tabular/columnar formats have no intrinsic version, codec, or
/// creation time, so those are `None`.
///
/// `signals` keys PLTX files by their real `sid`; non-PLTX engines have
/// no `sid` concept, so they are keyed by 1-based position, matching
/// the original's `_standard_header`'s `str(i + 1)` keys.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UnifiedHeader {
    pub version: Option<u8>,
    pub compression: Option<String>,
    pub created: Option<f64>,
    pub signals: BTreeMap<String, SignalInfo>,
    pub signal_names: Vec<String>,
}

/// Build the `{1-based position -> {name}}` map tabular/columnar
/// engines use in place of a real `sid`.
fn positional_signals(names: &[String]) -> BTreeMap<String, SignalInfo> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            (
                (i + 1).to_string(),
                SignalInfo { name: name.clone() },
            )
        })
        .collect()
}

enum Engine {
    Pltx(PltxReader),
    Csv,
    Excel,
    Hdf5,
    Parquet,
}

fn engine_tag_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    Some(match ext.as_str() {
        "pltx" => "pltx",
        "csv" => "csv",
        "xlsx" | "xls" => "excel",
        "h5" => "hdf5",
        "parquet" => "parquet",
        _ => return None,
    })
}

/// A file opened through the façade. Tabular/columnar engines hold no
/// persistent file handle between calls — each operation reopens the
/// file, matching those formats' cheap-to-reopen nature; PLTX keeps its
/// `PltxReader` (and its parsed header/index) open for the reader's
/// lifetime.
pub struct UnifiedReader {
    path: PathBuf,
    engine: Engine,
    header_cache: Option<UnifiedHeader>,
}

impl UnifiedReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tag = engine_tag_for(&path).ok_or_else(|| PltxError::UnsupportedFormat {
            path: path.display().to_string(),
        })?;

        let engine = match tag {
            "pltx" => Engine::Pltx(PltxReader::open(&path)?),
            "csv" => Engine::Csv,
            "excel" => Engine::Excel,
            "hdf5" => Engine::Hdf5,
            "parquet" => Engine::Parquet,
            _ => unreachable!(),
        };

        Ok(Self {
            path,
            engine,
            header_cache: None,
        })
    }

    pub fn engine_tag(&self) -> &'static str {
        match self.engine {
            Engine::Pltx(_) => "pltx",
            Engine::Csv => "csv",
            Engine::Excel => "excel",
            Engine::Hdf5 => "hdf5",
            Engine::Parquet => "parquet",
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached after first call; subsequent calls return the same header
    /// without re-reading the file.
    pub fn get_header(&mut self) -> Result<&UnifiedHeader> {
        if self.header_cache.is_none() {
            let header = self.compute_header()?;
            self.header_cache = Some(header);
        }
        Ok(self.header_cache.as_ref().expect("just populated"))
    }

    fn compute_header(&mut self) -> Result<UnifiedHeader> {
        match &self.engine {
            Engine::Pltx(reader) => {
                let signal_names: Vec<String> =
                    reader.list_signals().into_iter().map(|s| s.name.clone()).collect();
                let signals = reader
                    .list_signals()
                    .into_iter()
                    .map(|s| (s.sid.to_string(), SignalInfo { name: s.name.clone() }))
                    .collect();
                Ok(UnifiedHeader {
                    version: Some(reader.header().version),
                    compression: Some(reader.header().compression.name().to_string()),
                    created: Some(reader.header().created),
                    signals,
                    signal_names,
                })
            }
            Engine::Csv => csv_engine::header(&self.path),
            Engine::Excel => excel_engine::header(&self.path),
            Engine::Hdf5 => hdf5_engine::header(&self.path),
            Engine::Parquet => parquet_engine::header(&self.path),
        }
    }

    fn reject_time(signal_name: &str) -> Result<()> {
        if signal_name.eq_ignore_ascii_case("time") {
            return Err(PltxError::UnknownSignal("Time".to_string()));
        }
        Ok(())
    }

    /// Read `signal_name` in batches of `chunk_size` records, returning
    /// the `(timestamps, values)` pairs already materialized (the PLTX
    /// engine has no streaming cost worth deferring further; tabular
    /// engines stream internally and only the chunked output escapes).
    pub fn iter_chunks(&mut self, signal_name: &str, chunk_size: usize) -> Result<Vec<(Vec<f64>, Vec<f64>)>> {
        Self::reject_time(signal_name)?;
        match &mut self.engine {
            Engine::Pltx(reader) => {
                let sid = reader
                    .signal_by_name(signal_name)
                    .map(|s| s.sid)
                    .ok_or_else(|| PltxError::UnknownSignal(signal_name.to_string()))?;
                let chunks = reader.iter_chunks(sid)?;
                Ok(chunks.into_iter().map(|c| (c.timestamps, c.values)).collect())
            }
            Engine::Csv => csv_engine::iter_chunks(&self.path, signal_name, chunk_size),
            Engine::Excel => excel_engine::iter_chunks(&self.path, signal_name, chunk_size),
            Engine::Hdf5 => hdf5_engine::iter_chunks(&self.path, signal_name, chunk_size),
            Engine::Parquet => parquet_engine::iter_chunks(&self.path, signal_name, chunk_size),
        }
    }

    pub fn read_signal_all(&mut self, signal_name: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        Self::reject_time(signal_name)?;
        match &mut self.engine {
            Engine::Pltx(reader) => {
                let sid = reader
                    .signal_by_name(signal_name)
                    .map(|s| s.sid)
                    .ok_or_else(|| PltxError::UnknownSignal(signal_name.to_string()))?;
                reader.read_signal_all(sid)
            }
            Engine::Csv => csv_engine::read_signal_all(&self.path, signal_name),
            Engine::Excel => excel_engine::read_signal_all(&self.path, signal_name),
            Engine::Hdf5 => hdf5_engine::read_signal_all(&self.path, signal_name),
            Engine::Parquet => parquet_engine::read_signal_all(&self.path, signal_name),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        // PLTX's file handle (and every tabular engine's implicit one) is
        // dropped with `self`; nothing else to release explicitly.
        Ok(())
    }
}
