//! links.bin format - both logical link tables in one checksummed file.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic(4) version(2) reserved(2) n_links(8) n_routes(8)
//! n_links   x (key_len(4) key_bytes val_len(4) val_bytes)
//! n_routes  x (key_len(4) key_bytes val_len(4) val_bytes)
//! crc64(8)           CRC-64-ISO over everything before the trailer
//! ```
//!
//! Keys and values are plain UTF-8 strings; their composition (feed-scoped
//! stop-pair keys, comma-joined values) is the interoperability contract and
//! lives in [`crate::mapper::LinkTables`]. The file is written once by the
//! offline batch job and opened read-only by the serving process.

use crc::{Crc, CRC_64_GO_ISO};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

use crate::mapper::LinkTables;

const MAGIC: u32 = 0x4B4E_4C47; // "GLNK"
const VERSION: u16 = 1;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

#[derive(Debug, Error)]
pub enum LinkTableError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("bad magic {found:#010x}, not a link table file")]
    BadMagic { found: u32 },

    #[error("unsupported link table version {0}")]
    UnsupportedVersion(u16),

    #[error("link table file is truncated")]
    Truncated,

    #[error("link table checksum mismatch: stored {stored:#018x}, computed {computed:#018x}")]
    ChecksumMismatch { stored: u64, computed: u64 },

    #[error("link table contains a non-UTF-8 string")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub struct LinkTableFile;

impl LinkTableFile {
    /// Write both tables to `path`, replacing any previous file.
    pub fn write(path: &Path, tables: &LinkTables) -> Result<(), LinkTableError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let mut digest = CRC64.digest();

        let mut emit = |writer: &mut BufWriter<File>, bytes: &[u8]| -> Result<(), LinkTableError> {
            writer.write_all(bytes)?;
            digest.update(bytes);
            Ok(())
        };

        emit(&mut writer, &MAGIC.to_le_bytes())?;
        emit(&mut writer, &VERSION.to_le_bytes())?;
        emit(&mut writer, &0u16.to_le_bytes())?; // reserved
        emit(&mut writer, &(tables.links.len() as u64).to_le_bytes())?;
        emit(&mut writer, &(tables.route_info.len() as u64).to_le_bytes())?;

        for table in [&tables.links, &tables.route_info] {
            for (key, value) in table {
                for s in [key, value] {
                    emit(&mut writer, &(s.len() as u32).to_le_bytes())?;
                    emit(&mut writer, s.as_bytes())?;
                }
            }
        }

        let checksum = digest.finalize();
        writer.write_all(&checksum.to_le_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Read a file written by [`write`](Self::write), verifying its checksum.
    pub fn read(path: &Path) -> Result<LinkTables, LinkTableError> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        // Trailer first: everything before it is covered by the checksum.
        if bytes.len() < 24 + 8 {
            return Err(LinkTableError::Truncated);
        }
        let (body, trailer) = bytes.split_at(bytes.len() - 8);
        let stored = u64::from_le_bytes(trailer.try_into().expect("8-byte trailer"));
        let computed = CRC64.checksum(body);
        if stored != computed {
            return Err(LinkTableError::ChecksumMismatch { stored, computed });
        }

        let mut cursor = Cursor { body, pos: 0 };
        let magic = u32::from_le_bytes(cursor.take::<4>()?);
        if magic != MAGIC {
            return Err(LinkTableError::BadMagic { found: magic });
        }
        let version = u16::from_le_bytes(cursor.take::<2>()?);
        if version != VERSION {
            return Err(LinkTableError::UnsupportedVersion(version));
        }
        cursor.take::<2>()?; // reserved
        let n_links = u64::from_le_bytes(cursor.take::<8>()?);
        let n_routes = u64::from_le_bytes(cursor.take::<8>()?);

        let mut tables = LinkTables::default();
        read_entries(&mut cursor, n_links, &mut tables.links)?;
        read_entries(&mut cursor, n_routes, &mut tables.route_info)?;
        Ok(tables)
    }
}

fn read_entries(
    cursor: &mut Cursor<'_>,
    count: u64,
    into: &mut BTreeMap<String, String>,
) -> Result<(), LinkTableError> {
    for _ in 0..count {
        let key = cursor.take_string()?;
        let value = cursor.take_string()?;
        into.insert(key, value);
    }
    Ok(())
}

struct Cursor<'a> {
    body: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], LinkTableError> {
        let slice = self
            .body
            .get(self.pos..self.pos + N)
            .ok_or(LinkTableError::Truncated)?;
        self.pos += N;
        Ok(slice.try_into().expect("slice length checked"))
    }

    fn take_string(&mut self) -> Result<String, LinkTableError> {
        let len = u32::from_le_bytes(self.take::<4>()?) as usize;
        let slice = self
            .body
            .get(self.pos..self.pos + len)
            .ok_or(LinkTableError::Truncated)?;
        self.pos += len;
        Ok(String::from_utf8(slice.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_tables() -> LinkTables {
        let mut tables = LinkTables::default();
        tables.links.insert("kc:a,b".to_string(), "11,12".to_string());
        tables.links.insert("kc:b,c".to_string(), "12,13".to_string());
        tables
            .route_info
            .insert("kc:bus-1".to_string(), "Metro Transit,39,39th Street,3".to_string());
        tables
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.bin");
        let tables = sample_tables();

        LinkTableFile::write(&path, &tables).unwrap();
        let read = LinkTableFile::read(&path).unwrap();
        assert_eq!(read, tables);
    }

    #[test]
    fn empty_tables_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.bin");
        LinkTableFile::write(&path, &LinkTables::default()).unwrap();
        let read = LinkTableFile::read(&path).unwrap();
        assert!(read.links.is_empty() && read.route_info.is_empty());
    }

    #[test]
    fn corruption_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.bin");
        LinkTableFile::write(&path, &sample_tables()).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            LinkTableFile::read(&path),
            Err(LinkTableError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.bin");
        LinkTableFile::write(&path, &sample_tables()).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..10]).unwrap();
        assert!(matches!(
            LinkTableFile::read(&path),
            Err(LinkTableError::Truncated)
        ));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.bin");

        // A file with valid framing but the wrong magic.
        let mut body = Vec::new();
        body.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        body.extend_from_slice(&VERSION.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&0u64.to_le_bytes());
        body.extend_from_slice(&0u64.to_le_bytes());
        let checksum = CRC64.checksum(&body);
        body.extend_from_slice(&checksum.to_le_bytes());
        fs::write(&path, &body).unwrap();

        assert!(matches!(
            LinkTableFile::read(&path),
            Err(LinkTableError::BadMagic { found: 0xDEAD_BEEF })
        ));
    }
}
