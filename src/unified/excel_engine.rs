//! Excel (`.xlsx`/`.xls`) engine for the unified façade, via `calamine`.
//! Reads the first worksheet; row 0 is the header, columns are
//! `Time, Signal1, ...`.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{PltxError, Result};

use super::UnifiedHeader;

fn xl_err<E: std::fmt::Display>(e: E) -> PltxError {
    PltxError::Corrupt(format!("excel: {e}"))
}

fn first_sheet_range(path: &Path) -> Result<calamine::Range<Data>> {
    let mut workbook = open_workbook_auto(path).map_err(xl_err)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| PltxError::Corrupt("workbook has no sheets".to_string()))?;
    workbook.worksheet_range(&sheet_name).map_err(xl_err)
}

fn header_row_names(range: &calamine::Range<Data>) -> Result<Vec<String>> {
    let row = range
        .rows()
        .next()
        .ok_or_else(|| PltxError::Corrupt("worksheet is empty".to_string()))?;
    Ok(row.iter().filter_map(|c| c.get_string().map(str::to_string)).collect())
}

pub fn header(path: &Path) -> Result<UnifiedHeader> {
    let range = first_sheet_range(path)?;
    let names = header_row_names(&range)?;
    let signal_names: Vec<String> =
        names.into_iter().filter(|h| !h.eq_ignore_ascii_case("time")).collect();
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
    let range = first_sheet_range(path)?;
    let names = header_row_names(&range)?;
    let time_idx = names
        .iter()
        .position(|h| h.eq_ignore_ascii_case("time"))
        .ok_or_else(|| PltxError::Corrupt("worksheet has no Time column".to_string()))?;
    let sig_idx = names
        .iter()
        .position(|h| h.eq_ignore_ascii_case(signal_name))
        .ok_or_else(|| PltxError::UnknownSignal(signal_name.to_string()))?;

    let mut chunks = Vec::new();
    let mut ts_buf = Vec::with_capacity(chunk_size);
    let mut val_buf = Vec::with_capacity(chunk_size);
    for row in range.rows().skip(1) {
        let t = row
            .get(time_idx)
            .and_then(|c| c.get_float())
            .ok_or_else(|| PltxError::Corrupt("non-numeric Time value in worksheet row".to_string()))?;
        let v = row
            .get(sig_idx)
            .and_then(|c| c.get_float())
            .ok_or_else(|| PltxError::Corrupt(format!("non-numeric value for '{signal_name}' in worksheet row")))?;
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
