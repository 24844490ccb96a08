//! Parquet engine for the unified façade, via the `parquet` + `arrow`
//! crates. Expects a `Time` column alongside the signal columns in a
//! single row group set.

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, Float64Array};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use crate::error::{PltxError, Result};

use super::UnifiedHeader;

fn pq_err<E: std::fmt::Display>(e: E) -> PltxError {
    PltxError::Corrupt(format!("parquet: {e}"))
}

fn open_builder(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
    let file = File::open(path)?;
    ParquetRecordBatchReaderBuilder::try_new(file).map_err(pq_err)
}

fn downcast_f64(arr: &dyn Array) -> Result<Vec<f64>> {
    arr.as_any()
        .downcast_ref::<Float64Array>()
        .map(|a| a.values().to_vec())
        .ok_or_else(|| PltxError::Corrupt("expected a float64 column in parquet file".to_string()))
}

fn find_time_column<'a>(batch: &'a arrow::record_batch::RecordBatch) -> Option<&'a std::sync::Arc<dyn Array>> {
    batch
        .column_by_name("Time")
        .or_else(|| batch.column_by_name("time"))
}

pub fn header(path: &Path) -> Result<UnifiedHeader> {
    let builder = open_builder(path)?;
    let signal_names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .filter(|n| !n.eq_ignore_ascii_case("time"))
        .collect();
    Ok(UnifiedHeader {
        version: None,
        compression: None,
        created: None,
        signals: super::positional_signals(&signal_names),
        signal_names,
    })
}

fn build_reader(path: &Path, batch_size: usize) -> Result<ParquetRecordBatchReader> {
    open_builder(path)?.with_batch_size(batch_size.max(1)).build().map_err(pq_err)
}

pub fn iter_chunks(path: &Path, signal_name: &str, chunk_size: usize) -> Result<Vec<(Vec<f64>, Vec<f64>)>> {
    let reader = build_reader(path, chunk_size)?;
    let mut chunks = Vec::new();
    for batch in reader {
        let batch = batch.map_err(pq_err)?;
        let time_col = find_time_column(&batch)
            .ok_or_else(|| PltxError::Corrupt("parquet file has no Time column".to_string()))?;
        let sig_col = batch
            .column_by_name(signal_name)
            .ok_or_else(|| PltxError::UnknownSignal(signal_name.to_string()))?;
        chunks.push((downcast_f64(time_col.as_ref())?, downcast_f64(sig_col.as_ref())?));
    }
    Ok(chunks)
}

pub fn read_signal_all(path: &Path, signal_name: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    // Batch size large enough to act as "read everything" for any file
    // this format is realistically used for, without the unchecked
    // `usize::MAX` pre-allocation a literal "read all" would invite.
    const READ_ALL_BATCH: usize = 1_000_000;
    let reader = build_reader(path, READ_ALL_BATCH)?;
    let mut ts = Vec::new();
    let mut vals = Vec::new();
    for batch in reader {
        let batch = batch.map_err(pq_err)?;
        let time_col = find_time_column(&batch)
            .ok_or_else(|| PltxError::Corrupt("parquet file has no Time column".to_string()))?;
        let sig_col = batch
            .column_by_name(signal_name)
            .ok_or_else(|| PltxError::UnknownSignal(signal_name.to_string()))?;
        ts.extend(downcast_f64(time_col.as_ref())?);
        vals.extend(downcast_f64(sig_col.as_ref())?);
    }
    Ok((ts, vals))
}
