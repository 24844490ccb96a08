//! Signal registry / `ReaderManager` (C6): assigns a process-wide public
//! name to every signal exposed across every file opened through the
//! unified façade, and resolves a public name back to its reader.
//!
//! Collision counting is deliberately against the *assigned* names
//! already registered that happen to equal the bare signal name, not
//! against how many times that signal name itself has been seen. A
//! signal named `"Temp"` registered a third time collides with the
//! second registration's `"Temp[2]"` again, rather than producing
//! `"Temp[3]"` — this behavior is preserved as-is rather than fixed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::unified::UnifiedReader;

const AVAILABLE_FORMATS: &[&str] = &["pltx", "csv", "xlsx", "xls", "h5", "parquet"];

#[derive(Debug, Clone)]
struct SignalMapEntry {
    orig: String,
    path: PathBuf,
}

/// Registry of opened files and the public signal names assigned to them.
#[derive(Default)]
pub struct ReaderManager {
    readers: HashMap<PathBuf, UnifiedReader>,
    signal_map: HashMap<String, SignalMapEntry>,
    readers_signals: HashMap<PathBuf, Vec<String>>,
}

impl ReaderManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_supported_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| AVAILABLE_FORMATS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Counts keys of `signal_map` (assigned names) equal to the bare
    /// signal name, not occurrences of the signal name itself.
    fn get_signal_name(&self, signal: &str) -> String {
        let count = self.signal_map.keys().filter(|k| k.as_str() == signal).count();
        if count > 0 {
            format!("{signal}[{}]", count + 1)
        } else {
            signal.to_string()
        }
    }

    /// Open (or reuse) the file at `path`, assign public names to every
    /// signal it exposes, and return those assigned names. Returns `None`
    /// for an unsupported extension.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<Option<Vec<String>>> {
        let path = path.as_ref().to_path_buf();
        if !Self::is_supported_extension(&path) {
            return Ok(None);
        }

        if !self.readers.contains_key(&path) {
            let reader = UnifiedReader::open(&path)?;
            self.readers.insert(path.clone(), reader);
        }

        let signal_names = self
            .readers
            .get_mut(&path)
            .expect("just inserted")
            .get_header()?
            .signal_names
            .clone();

        let mut assigned_list = Vec::with_capacity(signal_names.len());
        for signal in signal_names {
            let assigned = self.get_signal_name(&signal);
            self.signal_map.insert(
                assigned.clone(),
                SignalMapEntry {
                    orig: signal.clone(),
                    path: path.clone(),
                },
            );
            assigned_list.push(assigned);
        }

        self.readers_signals.insert(path, assigned_list.clone());
        Ok(Some(assigned_list))
    }

    /// Look up the reader and original signal name behind a public name.
    pub fn resolve(&mut self, public_name: &str) -> Option<(&mut UnifiedReader, String)> {
        let entry = self.signal_map.get(public_name)?.clone();
        let reader = self.readers.get_mut(&entry.path)?;
        Some((reader, entry.orig))
    }

    pub fn assigned_signals_for(&self, path: impl AsRef<Path>) -> Option<&[String]> {
        self.readers_signals.get(path.as_ref()).map(|v| v.as_slice())
    }

    pub fn close(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(reader) = self.readers.get_mut(path.as_ref()) {
            reader.close()?;
        }
        Ok(())
    }
}
