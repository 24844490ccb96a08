//! HDF5 engine for the unified façade, via `hdf5-metno`.
//!
//! Rust's HDF5 bindings make compound-dtype field access (the numpy
//! structured-array model) considerably more involved than plain 1-D
//! datasets, so this engine's on-disk layout is a group containing one
//! 1-D dataset per column — a `Time` dataset plus one dataset per
//! signal, siblings under the same group. A depth-first search locates
//! the first such group in the file.

use std::path::Path;

use hdf5_metno::Group;

use crate::error::{PltxError, Result};

use super::UnifiedHeader;

fn h5_err<E: std::fmt::Display>(e: E) -> PltxError {
    PltxError::Corrupt(format!("hdf5: {e}"))
}

fn leaf_name(full: &str) -> String {
    full.rsplit('/').next().unwrap_or(full).to_string()
}

fn dataset_names(group: &Group) -> Result<Vec<String>> {
    Ok(group
        .datasets()
        .map_err(h5_err)?
        .into_iter()
        .map(|d| leaf_name(&d.name()))
        .collect())
}

/// Depth-first search for the first group containing a `Time` dataset.
fn find_signal_group(group: &Group) -> Result<Group> {
    let names = dataset_names(group)?;
    if names.iter().any(|n| n.eq_ignore_ascii_case("time")) {
        return Ok(group.clone());
    }
    for child in group.groups().map_err(h5_err)? {
        if let Ok(found) = find_signal_group(&child) {
            return Ok(found);
        }
    }
    Err(PltxError::Corrupt(
        "no group with a Time dataset found in hdf5 file".to_string(),
    ))
}

fn read_column(group: &Group, name: &str) -> Result<Vec<f64>> {
    let dataset = group.dataset(name).map_err(h5_err)?;
    let arr = dataset.read_1d::<f64>().map_err(h5_err)?;
    Ok(arr.to_vec())
}

pub fn header(path: &Path) -> Result<UnifiedHeader> {
    let file = hdf5_metno::File::open(path).map_err(h5_err)?;
    let group = find_signal_group(&file)?;
    let names = dataset_names(&group)?;
    let signal_names: Vec<String> =
        names.into_iter().filter(|n| !n.eq_ignore_ascii_case("time")).collect();
    Ok(UnifiedHeader {
        version: None,
        compression: None,
        created: None,
        signals: super::positional_signals(&signal_names),
        signal_names,
    })
}

fn resolve_columns(group: &Group, signal_name: &str) -> Result<(String, String)> {
    let names = dataset_names(group)?;
    let time_name = names
        .iter()
        .find(|n| n.eq_ignore_ascii_case("time"))
        .cloned()
        .ok_or_else(|| PltxError::Corrupt("no Time dataset found in hdf5 group".to_string()))?;
    let signal_col = names
        .iter()
        .find(|n| n.eq_ignore_ascii_case(signal_name))
        .cloned()
        .ok_or_else(|| PltxError::UnknownSignal(signal_name.to_string()))?;
    Ok((time_name, signal_col))
}

pub fn iter_chunks(path: &Path, signal_name: &str, chunk_size: usize) -> Result<Vec<(Vec<f64>, Vec<f64>)>> {
    let chunk_size = chunk_size.max(1);
    let file = hdf5_metno::File::open(path).map_err(h5_err)?;
    let group = find_signal_group(&file)?;
    let (time_name, signal_col) = resolve_columns(&group, signal_name)?;

    let timestamps = read_column(&group, &time_name)?;
    let values = read_column(&group, &signal_col)?;

    Ok(timestamps
        .chunks(chunk_size)
        .zip(values.chunks(chunk_size))
        .map(|(t, v)| (t.to_vec(), v.to_vec()))
        .collect())
}

pub fn read_signal_all(path: &Path, signal_name: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    let file = hdf5_metno::File::open(path).map_err(h5_err)?;
    let group = find_signal_group(&file)?;
    let (time_name, signal_col) = resolve_columns(&group, signal_name)?;

    let timestamps = read_column(&group, &time_name)?;
    let values = read_column(&group, &signal_col)?;
    Ok((timestamps, values))
}
