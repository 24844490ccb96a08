//! Frame layer (C2): fixed binary layouts for every structure on disk.
//!
//! All integers little-endian; all floats IEEE-754 binary64 little-endian.
//! Layouts are frozen at format version 2 and must not gain, lose, or
//! reorder fields: the header prefix, chunk header, index entry, and
//! footer each have one canonical on-disk encoding.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::CodecId;
use crate::error::{PltxError, Result};

pub const MAGIC: &[u8; 4] = b"PLTX";
pub const CHUNK_MAGIC: &[u8; 4] = b"CHNK";
pub const INDEX_MAGIC: &[u8; 4] = b"IDXT";
pub const FOOTER_MAGIC: &[u8; 4] = b"FTER";

pub const FORMAT_VERSION: u8 = 2;

/// `magic(4) + version(1) + comp(1) + created(8) + sig_count(2)`.
pub const HEADER_PREFIX_SIZE: usize = 16;
/// `magic(4) + sid(4) + n(4) + raw_len(4) + comp_len(4) + min_ts(8) + max_ts(8)`.
pub const CHUNK_HEADER_SIZE: usize = 36;
/// `magic(4) + index_offset(8)`.
pub const FOOTER_SIZE: usize = 12;
/// `sid(4) + offset(8) + min_ts(8) + max_ts(8)`.
pub const INDEX_ENTRY_SIZE: usize = 28;
/// Bytes per `(timestamp, value)` record: two little-endian f64s.
pub const RECORD_SIZE: usize = 16;

fn read_magic<R: Read>(r: &mut R) -> io::Result<[u8; 4]> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn check_magic(got: [u8; 4], want: &[u8; 4], what: &str) -> Result<()> {
    if &got != want {
        return Err(PltxError::Corrupt(format!(
            "bad {what} magic: expected {want:?}, got {got:?}"
        )));
    }
    Ok(())
}

fn read_lenstr<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u16::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| PltxError::Corrupt(format!("invalid utf-8 string: {e}")))
}

fn write_lenstr<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    w.write_u16::<LittleEndian>(bytes.len() as u16)?;
    w.write_all(bytes)
}

// ── Header prefix ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HeaderPrefix {
    pub version: u8,
    pub comp: CodecId,
    pub created: f64,
    pub sig_count: u16,
}

impl HeaderPrefix {
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_u8(self.version)?;
        w.write_u8(self.comp.code())?;
        w.write_f64::<LittleEndian>(self.created)?;
        w.write_u16::<LittleEndian>(self.sig_count)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let magic = read_magic(r)?;
        check_magic(magic, MAGIC, "file")?;
        let version = r.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(PltxError::UnsupportedVersion(version));
        }
        let comp = CodecId::from_code(r.read_u8()?)?;
        let created = r.read_f64::<LittleEndian>()?;
        let sig_count = r.read_u16::<LittleEndian>()?;
        Ok(Self {
            version,
            comp,
            created,
            sig_count,
        })
    }
}

// ── Per-signal metadata record ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SignalMeta {
    pub sid: u32,
    pub name: String,
    pub unit: String,
    pub description: String,
    pub source: String,
}

impl SignalMeta {
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.sid)?;
        write_lenstr(w, &self.name)?;
        write_lenstr(w, &self.unit)?;
        write_lenstr(w, &self.description)?;
        write_lenstr(w, &self.source)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let sid = r.read_u32::<LittleEndian>()?;
        let name = read_lenstr(r)?;
        let unit = read_lenstr(r)?;
        let description = read_lenstr(r)?;
        let source = read_lenstr(r)?;
        Ok(Self {
            sid,
            name,
            unit,
            description,
            source,
        })
    }
}

// ── Chunk frame ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChunkHeader {
    pub sid: u32,
    pub n: u32,
    pub raw_len: u32,
    pub comp_len: u32,
    pub min_ts: f64,
    pub max_ts: f64,
}

impl ChunkHeader {
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(CHUNK_MAGIC)?;
        w.write_u32::<LittleEndian>(self.sid)?;
        w.write_u32::<LittleEndian>(self.n)?;
        w.write_u32::<LittleEndian>(self.raw_len)?;
        w.write_u32::<LittleEndian>(self.comp_len)?;
        w.write_f64::<LittleEndian>(self.min_ts)?;
        w.write_f64::<LittleEndian>(self.max_ts)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let magic = read_magic(r)?;
        check_magic(magic, CHUNK_MAGIC, "chunk")?;
        let sid = r.read_u32::<LittleEndian>()?;
        let n = r.read_u32::<LittleEndian>()?;
        let raw_len = r.read_u32::<LittleEndian>()?;
        let comp_len = r.read_u32::<LittleEndian>()?;
        let min_ts = r.read_f64::<LittleEndian>()?;
        let max_ts = r.read_f64::<LittleEndian>()?;
        Ok(Self {
            sid,
            n,
            raw_len,
            comp_len,
            min_ts,
            max_ts,
        })
    }

    /// Total on-disk size of this frame, magic through payload.
    pub fn total_size(&self) -> u64 {
        CHUNK_HEADER_SIZE as u64 + self.comp_len as u64
    }
}

// ── Index block ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    pub sid: u32,
    pub offset: u64,
    pub min_ts: f64,
    pub max_ts: f64,
}

impl IndexEntry {
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.sid)?;
        w.write_u64::<LittleEndian>(self.offset)?;
        w.write_f64::<LittleEndian>(self.min_ts)?;
        w.write_f64::<LittleEndian>(self.max_ts)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let sid = r.read_u32::<LittleEndian>()?;
        let offset = r.read_u64::<LittleEndian>()?;
        let min_ts = r.read_f64::<LittleEndian>()?;
        let max_ts = r.read_f64::<LittleEndian>()?;
        Ok(Self {
            sid,
            offset,
            min_ts,
            max_ts,
        })
    }
}

pub fn write_index_block<W: Write>(w: &mut W, entries: &[IndexEntry]) -> io::Result<()> {
    w.write_all(INDEX_MAGIC)?;
    w.write_u32::<LittleEndian>(entries.len() as u32)?;
    for e in entries {
        e.write(w)?;
    }
    Ok(())
}

pub fn read_index_block<R: Read>(r: &mut R) -> Result<Vec<IndexEntry>> {
    let magic = read_magic(r)?;
    check_magic(magic, INDEX_MAGIC, "index")?;
    let count = r.read_u32::<LittleEndian>()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        entries.push(IndexEntry::read(r)?);
    }
    Ok(entries)
}

// ── Footer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Footer {
    pub index_offset: u64,
}

impl Footer {
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(FOOTER_MAGIC)?;
        w.write_u64::<LittleEndian>(self.index_offset)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let magic = read_magic(r)?;
        check_magic(magic, FOOTER_MAGIC, "footer")?;
        let index_offset = r.read_u64::<LittleEndian>()?;
        Ok(Self { index_offset })
    }
}

// ── Record encoding ───────────────────────────────────────────────────────

/// Serialize `(ts, val)` pairs into the raw `n * 16`-byte record buffer.
pub fn encode_records(timestamps: &[f64], values: &[f64]) -> Vec<u8> {
    debug_assert_eq!(timestamps.len(), values.len());
    let mut buf = Vec::with_capacity(timestamps.len() * RECORD_SIZE);
    for (t, v) in timestamps.iter().zip(values.iter()) {
        buf.extend_from_slice(&t.to_le_bytes());
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

/// Parse a raw record buffer (must be a multiple of 16 bytes) into
/// `(timestamps, values)`.
pub fn decode_records(raw: &[u8]) -> Result<(Vec<f64>, Vec<f64>)> {
    if raw.len() % RECORD_SIZE != 0 {
        return Err(PltxError::Corrupt(format!(
            "record buffer length {} is not a multiple of {RECORD_SIZE}",
            raw.len()
        )));
    }
    let n = raw.len() / RECORD_SIZE;
    let mut timestamps = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        let off = i * RECORD_SIZE;
        let ts = f64::from_le_bytes(raw[off..off + 8].try_into().unwrap());
        let val = f64::from_le_bytes(raw[off + 8..off + 16].try_into().unwrap());
        timestamps.push(ts);
        values.push(val);
    }
    Ok((timestamps, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_prefix_round_trips() {
        let hp = HeaderPrefix {
            version: FORMAT_VERSION,
            comp: CodecId::Zstd,
            created: 1_700_000_000.5,
            sig_count: 3,
        };
        let mut buf = Vec::new();
        hp.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_PREFIX_SIZE);
        let back = HeaderPrefix::read(&mut &buf[..]).unwrap();
        assert_eq!(back.version, hp.version);
        assert_eq!(back.comp, hp.comp);
        assert_eq!(back.created, hp.created);
        assert_eq!(back.sig_count, hp.sig_count);
    }

    #[test]
    fn header_prefix_rejects_bad_magic() {
        let mut buf = vec![0u8; HEADER_PREFIX_SIZE];
        buf[0..4].copy_from_slice(b"NOPE");
        assert!(HeaderPrefix::read(&mut &buf[..]).is_err());
    }

    #[test]
    fn signal_meta_round_trips_with_unicode() {
        let meta = SignalMeta {
            sid: 7,
            name: "Température".to_string(),
            unit: "°C".to_string(),
            description: "".to_string(),
            source: "bench".to_string(),
        };
        let mut buf = Vec::new();
        meta.write(&mut buf).unwrap();
        let back = SignalMeta::read(&mut &buf[..]).unwrap();
        assert_eq!(back.sid, meta.sid);
        assert_eq!(back.name, meta.name);
        assert_eq!(back.unit, meta.unit);
    }

    #[test]
    fn chunk_header_total_size_matches_written_bytes() {
        let ch = ChunkHeader {
            sid: 1,
            n: 100,
            raw_len: 1600,
            comp_len: 900,
            min_ts: 0.0,
            max_ts: 1.0,
        };
        let mut buf = Vec::new();
        ch.write(&mut buf).unwrap();
        buf.extend(vec![0u8; ch.comp_len as usize]);
        assert_eq!(ch.total_size(), buf.len() as u64);
    }

    #[test]
    fn index_block_round_trips() {
        let entries = vec![
            IndexEntry { sid: 1, offset: 16, min_ts: 0.0, max_ts: 1.0 },
            IndexEntry { sid: 2, offset: 200, min_ts: 0.5, max_ts: 2.0 },
        ];
        let mut buf = Vec::new();
        write_index_block(&mut buf, &entries).unwrap();
        let back = read_index_block(&mut &buf[..]).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].sid, 1);
        assert_eq!(back[1].offset, 200);
    }

    #[test]
    fn encode_decode_records_round_trip() {
        let ts = vec![0.0, 0.1, 0.2];
        let vals = vec![10.0, 11.5, -3.0];
        let raw = encode_records(&ts, &vals);
        assert_eq!(raw.len(), ts.len() * RECORD_SIZE);
        let (back_ts, back_vals) = decode_records(&raw).unwrap();
        assert_eq!(back_ts, ts);
        assert_eq!(back_vals, vals);
    }

    #[test]
    fn decode_records_rejects_misaligned_buffer() {
        let raw = vec![0u8; RECORD_SIZE + 3];
        assert!(decode_records(&raw).is_err());
    }
}
