//! Append-only mutation log.
//!
//! Frame layout (little endian):
//! `magic "HLG\0" | version u8 | length u32 | MessagePack payload | crc32 u32`.
//! The checksum covers the payload.

use super::table::Mutation;
use crate::error::{Result, StoreError};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for log frames.
const LOG_MAGIC: &[u8; 4] = b"HLG\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

/// Fixed bytes before the payload: magic + version + length.
const FRAME_HEADER_SIZE: usize = 4 + 1 + 4;

/// Trailing checksum size.
const FRAME_TRAILER_SIZE: usize = 4;

struct LogWriter {
    file: File,
    size: u64,
    writes_since_sync: u64,
}

/// Append-only log of applied mutations.
pub struct MutationLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    /// Sync every N writes (0 and 1 both mean every write).
    sync_every: u64,
}

/// Result of scanning a log file.
struct Scan {
    mutations: Vec<Mutation>,
    /// Bytes covered by complete frames.
    valid_len: u64,
}

impl MutationLog {
    /// Open or create a log, returning it together with every mutation it
    /// already holds. A torn final frame is cut off.
    pub fn open(path: impl AsRef<Path>, sync_every: u64) -> Result<(Self, Vec<Mutation>)> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut bytes)?;

        let scan = Self::scan(&bytes)?;
        if scan.valid_len < bytes.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                discarded = bytes.len() as u64 - scan.valid_len,
                "truncating incomplete frame at end of log"
            );
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        let log = Self {
            path,
            writer: Mutex::new(LogWriter {
                file,
                size: scan.valid_len,
                writes_since_sync: 0,
            }),
            sync_every: sync_every.max(1),
        };

        Ok((log, scan.mutations))
    }

    /// Append a mutation. Returns the offset of its frame.
    pub fn append(&self, mutation: &Mutation) -> Result<u64> {
        let payload = rmp_serde::to_vec_named(mutation)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("mutation too large for log frame".into()))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + FRAME_TRAILER_SIZE);
        frame.extend_from_slice(LOG_MAGIC);
        frame.push(LOG_VERSION);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());

        let mut writer = self.writer.lock();
        let offset = writer.size;
        if let Err(e) = self.write_frame(&mut writer, offset, &frame) {
            // A frame that failed to land must not come back on replay.
            if let Err(cut) = writer.file.set_len(offset) {
                tracing::error!(
                    path = %self.path.display(),
                    offset,
                    error = %cut,
                    "failed to truncate log after write error"
                );
            }
            writer.size = offset;
            return Err(e);
        }
        writer.size = offset + frame.len() as u64;

        Ok(offset)
    }

    fn write_frame(&self, writer: &mut LogWriter, offset: u64, frame: &[u8]) -> Result<()> {
        writer.file.seek(SeekFrom::Start(offset))?;
        writer.file.write_all(frame)?;

        writer.writes_since_sync += 1;
        if writer.writes_since_sync >= self.sync_every {
            writer.file.sync_data()?;
            writer.writes_since_sync = 0;
        }
        Ok(())
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file.sync_all()?;
        writer.writes_since_sync = 0;
        Ok(())
    }

    /// Current log size in bytes.
    pub fn size(&self) -> u64 {
        self.writer.lock().size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scan(bytes: &[u8]) -> Result<Scan> {
        let mut mutations = Vec::new();
        let mut offset = 0usize;

        while offset < bytes.len() {
            let rest = &bytes[offset..];
            if rest.len() < FRAME_HEADER_SIZE {
                break;
            }
            if &rest[..4] != LOG_MAGIC {
                return Err(StoreError::InvalidFormat(format!(
                    "invalid frame magic at offset {offset}"
                )));
            }
            if rest[4] != LOG_VERSION {
                return Err(StoreError::InvalidFormat(format!(
                    "unsupported log version: {}",
                    rest[4]
                )));
            }

            let len = u32::from_le_bytes([rest[5], rest[6], rest[7], rest[8]]) as usize;
            let frame_len = FRAME_HEADER_SIZE + len + FRAME_TRAILER_SIZE;
            if rest.len() < frame_len {
                break;
            }

            let payload = &rest[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + len];
            let trailer = &rest[FRAME_HEADER_SIZE + len..frame_len];
            let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
            let computed = crc32fast::hash(payload);
            if stored != computed {
                return Err(StoreError::ChecksumMismatch {
                    expected: stored,
                    got: computed,
                });
            }

            mutations.push(rmp_serde::from_slice(payload)?);
            offset += frame_len;
        }

        Ok(Scan {
            mutations,
            valid_len: offset as u64,
        })
    }
}
