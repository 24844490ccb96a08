use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pltx::{PltxConfig, PltxReader, PltxWriter, UnifiedReader, WriterConfig};

#[derive(Parser)]
#[command(name = "pltx", version, about = "PLTX timeseries container CLI")]
struct Cli {
    /// Optional TOML config file, layered under PLTX_* environment overrides.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a CSV file's columns into a new .pltx file
    Record {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// "none" | "zstd" | "lz4"; anything else falls back to deflate
        #[arg(long)]
        compression: Option<String>,
        #[arg(long)]
        chunk_records: Option<usize>,
        #[arg(long)]
        flush_interval_sec: Option<f64>,
    },
    /// Print a file's header: version, compression, signals
    Inspect {
        path: PathBuf,
        /// Print the header as JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Dump one signal from a .pltx file as CSV, with optional time-range pushdown
    Dump {
        path: PathBuf,
        signal: String,
        #[arg(long)]
        start: Option<f64>,
        #[arg(long)]
        end: Option<f64>,
    },
    /// Print one signal from any supported format (pltx/csv/xlsx/xls/h5/parquet) as CSV
    Cat {
        path: PathBuf,
        signal: String,
        #[arg(long, default_value = "1000")]
        chunk_size: usize,
    },
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PltxConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Record {
            input,
            output,
            compression,
            chunk_records,
            flush_interval_sec,
        } => record(&input, &output, &config, compression, chunk_records, flush_interval_sec).await?,
        Commands::Inspect { path, json } => inspect(&path, json)?,
        Commands::Dump { path, signal, start, end } => dump(&path, &signal, start, end)?,
        Commands::Cat { path, signal, chunk_size } => cat(&path, &signal, chunk_size)?,
    }

    Ok(())
}

async fn record(
    input: &Path,
    output: &Path,
    config: &PltxConfig,
    compression: Option<String>,
    chunk_records: Option<usize>,
    flush_interval_sec: Option<f64>,
) -> Result<()> {
    let mut writer_config = WriterConfig::new(output);
    writer_config.compression = compression.unwrap_or_else(|| config.compression.clone());
    writer_config.level = config.level;
    writer_config.chunk_records = chunk_records.unwrap_or(config.chunk_records);
    writer_config.flush_interval_sec = flush_interval_sec.unwrap_or(config.flush_interval_sec);
    writer_config.fsync_every_n_chunks = config.fsync_every_n_chunks;

    let writer = PltxWriter::new(writer_config).await.context("creating pltx writer")?;
    writer.start().await;

    let mut rdr = csv::Reader::from_path(input).with_context(|| format!("opening {}", input.display()))?;
    let headers = rdr.headers()?.clone();
    let time_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("time"))
        .context("input csv has no Time column")?;
    let signal_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != time_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let source = input.to_string_lossy().into_owned();
    for (_, name) in &signal_cols {
        writer.add_signal_meta(name, "", "", &source).await;
    }

    let mut rows = 0u64;
    for result in rdr.records() {
        let record = result?;
        let t: f64 = record
            .get(time_idx)
            .unwrap_or("")
            .parse()
            .context("non-numeric Time value in input csv")?;
        for (idx, name) in &signal_cols {
            let v: f64 = record
                .get(*idx)
                .unwrap_or("")
                .parse()
                .with_context(|| format!("non-numeric value for '{name}' in input csv"))?;
            writer.record_point(name.as_str(), t, v).await?;
        }
        rows += 1;
    }

    writer.stop_and_save().await.context("finalizing pltx file")?;
    println!(
        "Recorded {rows} row(s), {} signal(s) -> {}",
        signal_cols.len(),
        output.display()
    );
    Ok(())
}

fn inspect(path: &Path, json: bool) -> Result<()> {
    let mut reader = UnifiedReader::open(path)?;
    let header = reader.get_header()?;

    if json {
        println!("{}", serde_json::to_string_pretty(header)?);
        reader.close()?;
        return Ok(());
    }

    println!("File:        {}", path.display());
    println!("Engine:      {}", reader.engine_tag());
    if let Some(v) = header.version {
        println!("Version:     {v}");
    }
    if let Some(c) = &header.compression {
        println!("Compression: {c}");
    }
    if let Some(t) = header.created {
        let datetime = chrono::DateTime::from_timestamp(t as i64, 0);
        match datetime {
            Some(dt) => println!("Created:     {t} ({})", dt.to_rfc3339()),
            None => println!("Created:     {t}"),
        }
    }
    println!("Signals ({}):", header.signal_names.len());
    for name in &header.signal_names {
        println!("  {name}");
    }

    if reader.engine_tag() == "pltx" {
        let preview = std::fs::read(path)?;
        let preview_len = preview.len().min(16);
        println!("Header bytes: {}", hex::encode(&preview[..preview_len]));
    }

    reader.close()?;
    Ok(())
}

fn dump(path: &Path, signal: &str, start: Option<f64>, end: Option<f64>) -> Result<()> {
    let mut reader = PltxReader::open(path)?;
    let sid = reader
        .signal_by_name(signal)
        .map(|s| s.sid)
        .with_context(|| format!("unknown signal '{signal}'"))?;
    let chunks = match (start, end) {
        (Some(s), Some(e)) => reader.iter_time_range(sid, s, e)?,
        _ => reader.iter_chunks(sid)?,
    };
    println!("timestamp,value");
    for chunk in chunks {
        for (t, v) in chunk.timestamps.iter().zip(chunk.values.iter()) {
            println!("{t},{v}");
        }
    }
    Ok(())
}

fn cat(path: &Path, signal: &str, chunk_size: usize) -> Result<()> {
    let mut reader = UnifiedReader::open(path)?;
    println!("timestamp,value");
    for (timestamps, values) in reader.iter_chunks(signal, chunk_size)? {
        for (t, v) in timestamps.iter().zip(values.iter()) {
            println!("{t},{v}");
        }
    }
    reader.close()?;
    Ok(())
}
