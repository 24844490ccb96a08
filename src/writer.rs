//! Async PLTX writer (C4): per-signal in-memory buffers, periodic and
//! threshold-triggered flush of chunks to a temp file, and a two-phase
//! finalize (header + copied chunks + index + footer) via `.part` +
//! atomic rename.
//!
//! The temp-chunks file is the one shared mutable resource (guarded by
//! a single mutex held for one chunk's append); per-signal buffers are
//! snapshotted-then-cleared before the compress/write handoff so the
//! event loop never holds a buffer lock across an awaited I/O call.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::codec::{self, CodecId};
use crate::error::{PltxError, Result};
use crate::frame::{self, ChunkHeader, Footer, HeaderPrefix, IndexEntry, SignalMeta};

/// Construction parameters for [`PltxWriter::new`].
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub final_path: PathBuf,
    pub temp_dir: Option<PathBuf>,
    /// `"none" | "zstd" | "lz4"` or anything else (falls back to deflate).
    pub compression: String,
    pub level: i32,
    pub chunk_records: usize,
    pub flush_interval_sec: f64,
    pub fsync_every_n_chunks: u32,
}

impl WriterConfig {
    pub fn new(final_path: impl Into<PathBuf>) -> Self {
        Self {
            final_path: final_path.into(),
            temp_dir: None,
            compression: "zstd".to_string(),
            level: 3,
            chunk_records: 2048,
            flush_interval_sec: 0.5,
            fsync_every_n_chunks: 8,
        }
    }
}

/// Either a signal name (registered implicitly if unknown) or an already
/// resolved `sid`.
#[derive(Debug, Clone)]
pub enum SignalRef {
    Name(String),
    Sid(u32),
}

impl From<&str> for SignalRef {
    fn from(s: &str) -> Self {
        SignalRef::Name(s.to_string())
    }
}
impl From<String> for SignalRef {
    fn from(s: String) -> Self {
        SignalRef::Name(s)
    }
}
impl From<u32> for SignalRef {
    fn from(v: u32) -> Self {
        SignalRef::Sid(v)
    }
}

#[derive(Debug, Clone, Default)]
struct SignalBuffer {
    ts: Vec<f64>,
    val: Vec<f64>,
}

#[derive(Debug, Clone)]
struct SignalEntry {
    name: String,
    unit: String,
    description: String,
    source: String,
}

#[derive(Default)]
struct SignalTable {
    by_name: HashMap<String, u32>,
    by_sid: std::collections::BTreeMap<u32, SignalEntry>,
    next_sid: u32,
}

impl SignalTable {
    fn new() -> Self {
        Self {
            next_sid: 1,
            ..Default::default()
        }
    }

    /// Idempotent on `name` — first registration wins.
    fn add(&mut self, name: &str, unit: &str, description: &str, source: &str) -> u32 {
        if let Some(&sid) = self.by_name.get(name) {
            return sid;
        }
        let sid = self.next_sid;
        self.next_sid += 1;
        self.by_name.insert(name.to_string(), sid);
        self.by_sid.insert(
            sid,
            SignalEntry {
                name: name.to_string(),
                unit: unit.to_string(),
                description: description.to_string(),
                source: source.to_string(),
            },
        );
        sid
    }

    fn resolve_name(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    fn sorted_metas(&self) -> Vec<SignalMeta> {
        self.by_sid
            .iter()
            .map(|(sid, e)| SignalMeta {
                sid: *sid,
                name: e.name.clone(),
                unit: e.unit.clone(),
                description: e.description.clone(),
                source: e.source.clone(),
            })
            .collect()
    }

    fn list(&self) -> Vec<(u32, String)> {
        self.by_sid.iter().map(|(sid, e)| (*sid, e.name.clone())).collect()
    }
}

struct Inner {
    final_path: PathBuf,
    temp_path: PathBuf,
    comp: CodecId,
    created: f64,
    chunk_records: usize,
    flush_interval: Duration,
    fsync_every: u64,
    level: i32,

    signals: Mutex<SignalTable>,
    buffers: Mutex<HashMap<u32, SignalBuffer>>,
    tmp_file: Mutex<tokio::fs::File>,
    chunks_written: Mutex<u64>,

    flush_task: Mutex<Option<JoinHandle<()>>>,
    stop_notify: Notify,
    running: Mutex<bool>,
}

/// Async, multi-producer PLTX writer. Cheap to clone (wraps an `Arc`);
/// clones share the same temp file, buffers, and signal table.
#[derive(Clone)]
pub struct PltxWriter {
    inner: Arc<Inner>,
}

impl PltxWriter {
    pub async fn new(config: WriterConfig) -> Result<Self> {
        let temp_dir = config.temp_dir.clone().unwrap_or_else(|| {
            config
                .final_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        tokio::fs::create_dir_all(&temp_dir).await?;

        let basename = config
            .final_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("output.pltx")
            .to_string();
        let temp_path = temp_dir.join(format!(".{basename}.pltx.tmpchunks"));

        let tmp_file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .await?;

        let created = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        let comp = CodecId::from_tag(&config.compression);

        Ok(Self {
            inner: Arc::new(Inner {
                final_path: config.final_path,
                temp_path,
                comp,
                created,
                chunk_records: config.chunk_records.max(1),
                flush_interval: Duration::from_secs_f64(config.flush_interval_sec.max(0.0)),
                fsync_every: config.fsync_every_n_chunks as u64,
                level: config.level,
                signals: Mutex::new(SignalTable::new()),
                buffers: Mutex::new(HashMap::new()),
                tmp_file: Mutex::new(tmp_file),
                chunks_written: Mutex::new(0),
                flush_task: Mutex::new(None),
                stop_notify: Notify::new(),
                running: Mutex::new(false),
            }),
        })
    }

    // ── Signal registration ──────────────────────────────────────────────

    /// Register (or fetch) a signal by name. Idempotent on `name`: a
    /// repeated call returns the existing `sid` regardless of whether
    /// `unit`/`description`/`source` match — first registration wins.
    pub async fn add_signal_meta(&self, name: &str, unit: &str, description: &str, source: &str) -> u32 {
        let sid = {
            let mut signals = self.inner.signals.lock().await;
            signals.add(name, unit, description, source)
        };
        self.inner
            .buffers
            .lock()
            .await
            .entry(sid)
            .or_insert_with(SignalBuffer::default);
        sid
    }

    pub async fn list_registered_signals(&self) -> Vec<(u32, String)> {
        self.inner.signals.lock().await.list()
    }

    async fn resolve_or_register(&self, sig: SignalRef) -> u32 {
        match sig {
            SignalRef::Sid(sid) => sid,
            SignalRef::Name(name) => self.add_signal_meta(&name, "", "", "").await,
        }
    }

    // ── Recording ─────────────────────────────────────────────────────────

    pub async fn record_point(&self, sig: impl Into<SignalRef>, ts: f64, val: f64) -> Result<()> {
        let sid = self.resolve_or_register(sig.into()).await;
        let should_flush = {
            let mut buffers = self.inner.buffers.lock().await;
            let buf = buffers.entry(sid).or_insert_with(SignalBuffer::default);
            buf.ts.push(ts);
            buf.val.push(val);
            buf.ts.len() >= self.inner.chunk_records
        };
        if should_flush {
            self.flush_signal(sid).await?;
        }
        Ok(())
    }

    pub async fn record_batch(
        &self,
        sig: impl Into<SignalRef>,
        timestamps: impl IntoIterator<Item = f64>,
        values: impl IntoIterator<Item = f64>,
    ) -> Result<()> {
        let sid = self.resolve_or_register(sig.into()).await;
        let should_flush = {
            let mut buffers = self.inner.buffers.lock().await;
            let buf = buffers.entry(sid).or_insert_with(SignalBuffer::default);
            for (t, v) in timestamps.into_iter().zip(values.into_iter()) {
                buf.ts.push(t);
                buf.val.push(v);
            }
            buf.ts.len() >= self.inner.chunk_records
        };
        if should_flush {
            self.flush_signal(sid).await?;
        }
        Ok(())
    }

    // ── Flushing ──────────────────────────────────────────────────────────

    async fn flush_signal(&self, sid: u32) -> Result<()> {
        let snapshot = {
            let mut buffers = self.inner.buffers.lock().await;
            let buf = match buffers.get_mut(&sid) {
                Some(b) if !b.ts.is_empty() => b,
                _ => return Ok(()),
            };
            (std::mem::take(&mut buf.ts), std::mem::take(&mut buf.val))
        };
        let (ts, val) = snapshot;
        if ts.is_empty() {
            return Ok(());
        }

        let n = ts.len() as u32;
        let min_ts = ts.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_ts = ts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let comp = self.inner.comp;
        let level = self.inner.level;
        let (raw_len, payload) = tokio::task::spawn_blocking(move || -> Result<(usize, Vec<u8>)> {
            let raw = frame::encode_records(&ts, &val);
            let raw_len = raw.len();
            let payload = codec::compress(&raw, comp, level)?;
            Ok((raw_len, payload))
        })
        .await
        .map_err(|e| PltxError::Codec(e.to_string()))??;

        let header = ChunkHeader {
            sid,
            n,
            raw_len: raw_len as u32,
            comp_len: payload.len() as u32,
            min_ts,
            max_ts,
        };

        let mut frame_bytes = Vec::with_capacity(frame::CHUNK_HEADER_SIZE + payload.len());
        header.write(&mut frame_bytes)?;
        frame_bytes.extend_from_slice(&payload);

        {
            let mut f = self.inner.tmp_file.lock().await;
            f.write_all(&frame_bytes).await?;
            let mut count = self.inner.chunks_written.lock().await;
            *count += 1;
            if self.inner.fsync_every > 0 && *count % self.inner.fsync_every == 0 {
                f.flush().await?;
                f.sync_all().await?;
            }
        }
        Ok(())
    }

    async fn flush_all(&self) -> Result<()> {
        let sids: Vec<u32> = {
            let buffers = self.inner.buffers.lock().await;
            buffers
                .iter()
                .filter(|(_, b)| !b.ts.is_empty())
                .map(|(sid, _)| *sid)
                .collect()
        };
        let mut handles = Vec::with_capacity(sids.len());
        for sid in sids {
            let this = self.clone();
            handles.push(tokio::spawn(async move { this.flush_signal(sid).await }));
        }
        for h in handles {
            h.await.map_err(|e| PltxError::Codec(e.to_string()))??;
        }
        Ok(())
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Spawn the periodic flusher. Idempotent — a second call is a no-op
    /// while already running.
    pub async fn start(&self) {
        let mut running = self.inner.running.lock().await;
        if *running {
            return;
        }
        *running = true;
        let this = self.clone();
        let interval = self.inner.flush_interval;
        let handle = tokio::spawn(async move { this.run_periodic_flush(interval).await });
        *self.inner.flush_task.lock().await = Some(handle);
    }

    async fn run_periodic_flush(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.flush_all().await {
                        tracing::warn!(error = %e, "periodic flush failed");
                    }
                }
                _ = self.inner.stop_notify.notified() => break,
            }
        }
    }

    /// Stop the periodic flusher, drain every buffer, and seal the final
    /// file via a temp-chunks scan + `.part` write + atomic rename.
    ///
    /// Finalize is retried up to 3 times with a 1-second backoff rather
    /// than unboundedly; on exhaustion the temp-chunks file is left in
    /// place and `PltxError::FinalizeFailed` is returned.
    pub async fn stop_and_save(&self) -> Result<()> {
        {
            let mut running = self.inner.running.lock().await;
            if *running {
                *running = false;
                self.inner.stop_notify.notify_waiters();
            }
        }
        if let Some(handle) = self.inner.flush_task.lock().await.take() {
            let _ = handle.await;
        }

        self.flush_all().await?;

        {
            let mut f = self.inner.tmp_file.lock().await;
            f.flush().await?;
            f.sync_all().await?;
        }

        let signals_snapshot = self.inner.signals.lock().await.sorted_metas();
        let header_prefix = HeaderPrefix {
            version: frame::FORMAT_VERSION,
            comp: self.inner.comp,
            created: self.inner.created,
            sig_count: signals_snapshot.len() as u16,
        };

        const MAX_ATTEMPTS: u32 = 3;
        let mut last_err: Option<io::Error> = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let temp_path = self.inner.temp_path.clone();
            let final_path = self.inner.final_path.clone();
            let sigs = signals_snapshot.clone();
            let hp = header_prefix.clone_for_finalize();
            let result = tokio::task::spawn_blocking(move || finalize_blocking(&temp_path, &final_path, &hp, &sigs))
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
                .and_then(|r| r);

            match result {
                Ok(()) => {
                    last_err = None;
                    break;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "finalize attempt failed");
                    last_err = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        if let Some(e) = last_err {
            return Err(PltxError::FinalizeFailed {
                attempts: MAX_ATTEMPTS,
                source: e,
            });
        }

        let _ = tokio::fs::remove_file(&self.inner.temp_path).await;
        Ok(())
    }
}

impl HeaderPrefix {
    fn clone_for_finalize(&self) -> HeaderPrefix {
        HeaderPrefix {
            version: self.version,
            comp: self.comp,
            created: self.created,
            sig_count: self.sig_count,
        }
    }
}

/// Scan the temp-chunks file for `(sid, total_size, min_ts, max_ts)` per
/// chunk, in write order. Corruption aborts the scan (and thus finalize).
fn scan_temp_chunks(path: &Path) -> io::Result<Vec<(u32, u64, f64, f64)>> {
    let mut f = std::fs::File::open(path)?;
    let mut entries = Vec::new();
    loop {
        let header = match ChunkHeader::read(&mut f) {
            Ok(h) => h,
            Err(PltxError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string())),
        };
        f.seek(SeekFrom::Current(header.comp_len as i64))?;
        entries.push((header.sid, header.total_size(), header.min_ts, header.max_ts));
    }
    Ok(entries)
}

/// Synchronous finalize body, run inside `spawn_blocking`: write the final
/// header, stream-copy every temp chunk while rebuilding the index with
/// offsets relative to the final file, then the index block, footer, and
/// atomic rename over `final_path`.
fn finalize_blocking(
    temp_path: &Path,
    final_path: &Path,
    header_prefix: &HeaderPrefix,
    signals: &[SignalMeta],
) -> io::Result<()> {
    let entries = scan_temp_chunks(temp_path)?;

    if let Some(parent) = final_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut part_name = final_path.file_name().unwrap_or_default().to_os_string();
    part_name.push(".part");
    let part_path = final_path.with_file_name(part_name);

    {
        let mut out = std::fs::File::create(&part_path)?;
        header_prefix.write(&mut out)?;
        for meta in signals {
            meta.write(&mut out)?;
        }

        let mut src = std::fs::File::open(temp_path)?;
        let mut index_entries = Vec::with_capacity(entries.len());
        for (sid, total_size, min_ts, max_ts) in entries {
            let offset = out.stream_position()?;
            let mut buf = vec![0u8; total_size as usize];
            src.read_exact(&mut buf)?;
            out.write_all(&buf)?;
            index_entries.push(IndexEntry {
                sid,
                offset,
                min_ts,
                max_ts,
            });
        }

        let index_offset = out.stream_position()?;
        frame::write_index_block(&mut out, &index_entries)?;
        let footer = Footer { index_offset };
        footer.write(&mut out)?;
        out.flush()?;
        out.sync_all()?;
    }

    std::fs::rename(&part_path, final_path)?;
    Ok(())
}
