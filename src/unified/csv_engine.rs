//! CSV engine for the unified façade. Columns are `Time, Signal1, ...`;
//! each row is one timestamped sample.

use std::path::Path;

use crate::error::{PltxError, Result};

use super::UnifiedHeader;

fn csv_err(e: csv::Error) -> PltxError {
    PltxError::Corrupt(format!("csv: {e}"))
}

fn find_time_col(headers: &csv::StringRecord) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("time"))
        .ok_or_else(|| PltxError::Corrupt("csv file has no Time column".to_string()))
}

fn find_signal_col(headers: &csv::StringRecord, signal_name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(signal_name))
        .ok_or_else(|| PltxError::UnknownSignal(signal_name.to_string()))
}

pub fn header(path: &Path) -> Result<UnifiedHeader> {
    let mut rdr = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers = rdr.headers().map_err(csv_err)?;
    let signal_names: Vec<String> = headers
        .iter()
        .filter(|h| !h.eq_ignore_ascii_case("time"))
        .map(|h| h.to_string())
        .collect();
    Ok(UnifiedHeader {
        version: None,
        compression: None,
        created: None,
        signals: super::positional_signals(&signal_names),
        signal_names,
    })
}

pub fn iter_chunks(path: &Path, signal_name: &str, chunk_size: usize) -> Result<Vec<(Vec<f64>, Vec<f64>)>> {
    let chunk_size = chunk_size.max(1);
    let mut rdr = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers = rdr.headers().map_err(csv_err)?.clone();
    let time_idx = find_time_col(&headers)?;
    let sig_idx = find_signal_col(&headers, signal_name)?;

    let mut chunks = Vec::new();
    let mut ts_buf = Vec::with_capacity(chunk_size);
    let mut val_buf = Vec::with_capacity(chunk_size);
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        let t: f64 = record
            .get(time_idx)
            .unwrap_or("")
            .parse()
            .map_err(|_| PltxError::Corrupt("non-numeric Time value in csv row".to_string()))?;
        let v: f64 = record
            .get(sig_idx)
            .unwrap_or("")
            .parse()
            .map_err(|_| PltxError::Corrupt(format!("non-numeric value for '{signal_name}' in csv row")))?;
        ts_buf.push(t);
        val_buf.push(v);
        if ts_buf.len() >= chunk_size {
            chunks.push((std::mem::take(&mut ts_buf), std::mem::take(&mut val_buf)));
        }
    }
    if !ts_buf.is_empty() {
        chunks.push((ts_buf, val_buf));
    }
    Ok(chunks)
}

pub fn read_signal_all(path: &Path, signal_name: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    let chunks = iter_chunks(path, signal_name, usize::MAX)?;
    let total: usize = chunks.iter().map(|(t, _)| t.len()).sum();
    let mut ts = Vec::with_capacity(total);
    let mut vals = Vec::with_capacity(total);
    for (t, v) in chunks {
        ts.extend(t);
        vals.extend(v);
    }
    Ok((ts, vals))
}
