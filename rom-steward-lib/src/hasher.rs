//! Streaming multi-digest hasher.
//!
//! Computes CRC32, MD5, and SHA-1 in a single pass over 64 KiB chunks.
//! The whole file is never held in memory; cancellation and progress both
//! happen at chunk boundaries. `skip_bytes` positions past an optional
//! copier header — by seeking when the source allows it, by discarding
//! the prefix otherwise.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha1::Digest;
use tokio_util::sync::CancellationToken;

use rom_steward_core::Fingerprint;

use crate::buffer::BufferPool;
use crate::error::HashError;

pub const CHUNK_SIZE: usize = 64 * 1024;

/// Combined Read + Seek trait object bound.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Result of one hash computation.
#[derive(Debug, Clone)]
pub struct HashOutput {
    pub fingerprint: Fingerprint,
    /// Bytes actually hashed (file size minus any skipped header).
    pub data_size: u64,
}

/// Progress callback: `(bytes_processed, total_bytes)` at chunk
/// boundaries. `total_bytes` is 0 when the source size is unknown.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Hash a non-seekable byte source.
///
/// `skip_bytes` of prefix are read and discarded first; hitting EOF
/// inside the prefix fails with `short_input`.
pub fn hash_reader(
    reader: &mut dyn Read,
    skip_bytes: u64,
    total_bytes: u64,
    pool: &BufferPool,
    progress: Option<ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<HashOutput, HashError> {
    let mut buf = pool.acquire();
    let result = hash_reader_buf(reader, skip_bytes, total_bytes, &mut buf, progress, cancel);
    pool.release(buf);
    result
}

fn hash_reader_buf(
    reader: &mut dyn Read,
    skip_bytes: u64,
    total_bytes: u64,
    buf: &mut [u8],
    progress: Option<ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<HashOutput, HashError> {
    // Discard the header prefix
    let mut remaining_skip = skip_bytes;
    while remaining_skip > 0 {
        if cancel.is_cancelled() {
            return Err(HashError::Cancelled);
        }
        let want = remaining_skip.min(buf.len() as u64) as usize;
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            return Err(HashError::ShortInput {
                needed: skip_bytes,
                got: skip_bytes - remaining_skip,
            });
        }
        remaining_skip -= n as u64;
    }

    let mut crc = crc32fast::Hasher::new();
    let mut sha = sha1::Sha1::new();
    let mut md5_ctx = md5::Context::new();
    let mut processed: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(HashError::Cancelled);
        }
        let n = reader.read(buf)?;
        if n == 0 {
            break;
        }
        crc.update(&buf[..n]);
        sha.update(&buf[..n]);
        md5_ctx.consume(&buf[..n]);
        processed += n as u64;
        if let Some(cb) = progress {
            cb(processed, total_bytes);
        }
    }

    let sha_bytes: [u8; 20] = sha.finalize().into();
    Ok(HashOutput {
        fingerprint: Fingerprint::from_digests(crc.finalize(), md5_ctx.compute().0, sha_bytes),
        data_size: processed,
    })
}

/// Hash a seekable source, skipping `skip_bytes` by seeking.
pub fn hash_seekable(
    reader: &mut dyn ReadSeek,
    skip_bytes: u64,
    pool: &BufferPool,
    progress: Option<ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<HashOutput, HashError> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    if skip_bytes > file_size {
        return Err(HashError::ShortInput {
            needed: skip_bytes,
            got: file_size,
        });
    }
    reader.seek(SeekFrom::Start(skip_bytes))?;

    let data_size = file_size - skip_bytes;
    let mut buf = pool.acquire();
    let result = hash_reader_buf(reader, 0, data_size, &mut buf, progress, cancel);
    pool.release(buf);

    result.map(|out| HashOutput {
        data_size,
        ..out
    })
}

/// Hash a file on disk.
pub fn hash_file(
    path: &Path,
    skip_bytes: u64,
    pool: &BufferPool,
    progress: Option<ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<HashOutput, HashError> {
    let mut file = std::fs::File::open(path).map_err(|e| HashError::from_io_at(e, path))?;
    hash_seekable(&mut file, skip_bytes, pool, progress, cancel)
}

#[cfg(test)]
#[path = "tests/hasher_tests.rs"]
mod tests;
