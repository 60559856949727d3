//! Pack archive parsing.
//!
//! Layout (little endian):
//!
//! ```text
//! header:    "PACK" | dir_offset: i32 | dir_size: i32
//! directory: dir_size / 64 records of
//!            name: [u8; 56] (NUL padded) | offset: u32 | len: u32
//! ```

use std::io::{self, Read, SeekFrom};
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use thiserror::Error;

use super::reader::{shared, BoundedReader, ReadSeek, SharedStream};

/// Archive magic bytes.
pub const PACK_MAGIC: &[u8; 4] = b"PACK";

/// Size of one directory record.
pub const PACK_ENTRY_SIZE: usize = 64;

/// Size of the name field of a directory record.
pub const PACK_NAME_LEN: usize = 56;

/// Hard cap on the number of entries in one archive.
pub const MAX_FILES_IN_PACK: usize = 2048;

/// Entry count of the stock `pak0.pak`.
pub const PAK0_FILE_COUNT: usize = 339;

/// Directory CRCs of the stock `pak0.pak` releases (1.00, 1.01, 1.06).
pub const PAK0_CRCS: [u16; 3] = [13900, 62751, 32981];

/// Errors that make an archive untrustworthy.
#[derive(Debug, Error)]
pub enum PackError {
    /// The archive could not be read.
    #[error("I/O error reading {path}: {error}")]
    Io {
        /// Archive path.
        path: PathBuf,
        /// The underlying I/O error.
        error: io::Error,
    },

    /// The header magic is wrong or the header is truncated.
    #[error("{0} is not a packfile")]
    NotAPack(PathBuf),

    /// The directory offset or size is negative.
    #[error("invalid packfile {path} (dir_size: {size}, dir_offset: {offset})")]
    BadGeometry {
        /// Archive path.
        path: PathBuf,
        /// Directory offset from the header.
        offset: i32,
        /// Directory size from the header.
        size: i32,
    },

    /// The directory holds more entries than [`MAX_FILES_IN_PACK`].
    #[error("{path} has {count} files")]
    TooManyFiles {
        /// Archive path.
        path: PathBuf,
        /// Entry count from the header.
        count: usize,
    },
}

/// CRC-16/CCITT (init 0xFFFF, polynomial 0x1021, no final xor).
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0xFFFF, |mut crc: u16, &b| {
        crc ^= u16::from(b) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
        }
        crc
    })
}

/// One file stored in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    name: String,
    offset: u32,
    len: u32,
}

impl PackEntry {
    /// Entry name, e.g. `gfx/pop.lmp`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offset of the data inside the archive.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Data length in bytes.
    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Check if the entry holds no data.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn parse(record: &[u8]) -> Self {
        let raw = &record[..PACK_NAME_LEN];
        let name_end = raw.iter().position(|&b| b == 0).unwrap_or(PACK_NAME_LEN);
        let word = |at: usize| u32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]]);

        Self {
            name: String::from_utf8_lossy(&raw[..name_end]).into_owned(),
            offset: word(PACK_NAME_LEN),
            len: word(PACK_NAME_LEN + 4),
        }
    }
}

/// A parsed archive and its open stream.
pub struct Pack {
    path: PathBuf,
    stream: SharedStream,
    entries: Vec<PackEntry>,
    stock: bool,
}

impl Pack {
    /// Parse the archive in `stream`.
    ///
    /// Returns `Ok(None)` (with a warning) for an archive with no entries.
    pub fn load(path: impl Into<PathBuf>, mut stream: impl ReadSeek + 'static) -> Result<Option<Self>, PackError> {
        let path = path.into();
        let io_err = |error| PackError::Io {
            path: path.clone(),
            error,
        };

        let mut header = [0u8; 12];
        if stream.read_exact(&mut header).is_err() || &header[..4] != PACK_MAGIC {
            return Err(PackError::NotAPack(path));
        }

        let offset = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let size = i32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        if offset < 0 || size < 0 {
            return Err(PackError::BadGeometry { path, offset, size });
        }

        let count = size as usize / PACK_ENTRY_SIZE;
        if count < 1 {
            warn!("{} has no files, ignored", path.display());
            return Ok(None);
        }
        if count > MAX_FILES_IN_PACK {
            return Err(PackError::TooManyFiles { path, count });
        }

        let mut directory = vec![0u8; size as usize];
        stream.seek(SeekFrom::Start(offset as u64)).map_err(io_err)?;
        stream.read_exact(&mut directory).map_err(io_err)?;

        let stock = count == PAK0_FILE_COUNT && PAK0_CRCS.contains(&crc16(&directory));
        let entries = directory
            .chunks_exact(PACK_ENTRY_SIZE)
            .map(PackEntry::parse)
            .collect();

        Ok(Some(Self {
            path,
            stream: shared(stream),
            entries,
            stock,
        }))
    }

    /// Open and parse an archive on disk.
    ///
    /// `Ok(None)` if the archive has no entries. A missing file is an I/O
    /// error; callers probing for optional archives should check first.
    pub fn open_path(path: &Path) -> Result<Option<Self>, PackError> {
        let file = std::fs::File::open(path).map_err(|error| PackError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::load(path, file)
    }

    /// Where the archive came from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory entries in file order.
    #[inline]
    pub fn entries(&self) -> &[PackEntry] {
        &self.entries
    }

    /// Get the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the archive has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the directory matches a stock `pak0.pak` by count and CRC.
    #[inline]
    pub fn is_stock(&self) -> bool {
        self.stock
    }

    /// Find an entry by exact name.
    pub fn find(&self, name: &str) -> Option<&PackEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Read an entry through the shared stream.
    pub fn open(&self, entry: &PackEntry) -> io::Result<BoundedReader> {
        BoundedReader::new(self.stream.clone(), entry.offset.into(), entry.len.into())
    }
}

impl std::fmt::Debug for Pack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pack")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("stock", &self.stock)
            .finish_non_exhaustive()
    }
}

/// Build an archive image holding `files`, data first, directory last.
#[cfg(test)]
pub(crate) fn build_pack(files: &[(&str, &[u8])]) -> Vec<u8> {
    let data_len: usize = files.iter().map(|(_, d)| d.len()).sum();
    let dir_offset = 12 + data_len;
    let dir_size = files.len() * PACK_ENTRY_SIZE;

    let mut out = Vec::with_capacity(dir_offset + dir_size);
    out.extend_from_slice(PACK_MAGIC);
    out.extend_from_slice(&(dir_offset as i32).to_le_bytes());
    out.extend_from_slice(&(dir_size as i32).to_le_bytes());

    let mut offsets = Vec::new();
    for (_, data) in files {
        offsets.push(out.len() as u32);
        out.extend_from_slice(data);
    }

    for ((name, data), offset) in files.iter().zip(offsets) {
        let mut record = [0u8; PACK_ENTRY_SIZE];
        record[..name.len()].copy_from_slice(name.as_bytes());
        record[56..60].copy_from_slice(&offset.to_le_bytes());
        record[60..64].copy_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&record);
    }

    out
}
