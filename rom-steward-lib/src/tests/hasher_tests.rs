use std::io::Cursor;

use tokio_util::sync::CancellationToken;

use super::*;

fn pool() -> BufferPool {
    BufferPool::default()
}

// Reference vectors for "abc" and the fox pangram are the published
// test vectors for each algorithm.

#[test]
fn test_known_vector_abc() {
    let mut cursor = Cursor::new(b"abc".to_vec());
    let out = hash_seekable(&mut cursor, 0, &pool(), None, &CancellationToken::new()).unwrap();
    assert_eq!(out.data_size, 3);
    assert_eq!(out.fingerprint.crc32(), Some("352441c2"));
    assert_eq!(
        out.fingerprint.md5(),
        Some("900150983cd24fb0d6963f7d28e17f72")
    );
    assert_eq!(
        out.fingerprint.sha1(),
        Some("a9993e364706816aba3e25717850c26c9cd0d89d")
    );
}

#[test]
fn test_known_vector_pangram() {
    let data = b"The quick brown fox jumps over the lazy dog".to_vec();
    let mut cursor = Cursor::new(data);
    let out = hash_seekable(&mut cursor, 0, &pool(), None, &CancellationToken::new()).unwrap();
    assert_eq!(out.fingerprint.crc32(), Some("414fa339"));
    assert_eq!(
        out.fingerprint.md5(),
        Some("9e107d9d372bb6826bd81d3542a419d6")
    );
    assert_eq!(
        out.fingerprint.sha1(),
        Some("2fd4e1c67a2d28fced849ee1bb76e7391b93eb12")
    );
}

#[test]
fn test_empty_input() {
    let mut cursor = Cursor::new(Vec::new());
    let out = hash_seekable(&mut cursor, 0, &pool(), None, &CancellationToken::new()).unwrap();
    assert_eq!(out.data_size, 0);
    assert_eq!(out.fingerprint.crc32(), Some("00000000"));
    assert_eq!(
        out.fingerprint.md5(),
        Some("d41d8cd98f00b204e9800998ecf8427e")
    );
    assert_eq!(
        out.fingerprint.sha1(),
        Some("da39a3ee5e6b4b0d3255bfef95601890afd80709")
    );
}

#[test]
fn test_two_runs_agree() {
    // Multi-chunk input (3 chunks + remainder)
    let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 1234))
        .map(|i| (i * 31 % 251) as u8)
        .collect();
    let a = hash_seekable(
        &mut Cursor::new(data.clone()),
        0,
        &pool(),
        None,
        &CancellationToken::new(),
    )
    .unwrap();
    let b = hash_seekable(
        &mut Cursor::new(data),
        0,
        &pool(),
        None,
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(a.fingerprint, b.fingerprint);
}

#[test]
fn test_skip_bytes_matches_sliced_input() {
    // A corrupted 16-byte prefix must not affect the fingerprint when
    // skipped; the result equals hashing the tail directly.
    let mut data = vec![0xEEu8; 16];
    let body: Vec<u8> = (0..10_000).map(|i| (i % 256) as u8).collect();
    data.extend_from_slice(&body);

    let skipped = hash_seekable(
        &mut Cursor::new(data),
        16,
        &pool(),
        None,
        &CancellationToken::new(),
    )
    .unwrap();
    let direct = hash_seekable(
        &mut Cursor::new(body),
        0,
        &pool(),
        None,
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(skipped.fingerprint, direct.fingerprint);
    assert_eq!(skipped.data_size, 10_000);
}

#[test]
fn test_nonseekable_skip_discards_prefix() {
    let mut data = vec![0xAA; 8];
    data.extend_from_slice(b"abc");
    let mut reader: &[u8] = &data;
    let out = hash_reader(&mut reader, 8, 3, &pool(), None, &CancellationToken::new()).unwrap();
    assert_eq!(out.fingerprint.crc32(), Some("352441c2"));
}

#[test]
fn test_short_input_on_truncated_prefix() {
    let mut reader: &[u8] = &[1, 2, 3];
    let err = hash_reader(&mut reader, 8, 0, &pool(), None, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, HashError::ShortInput { needed: 8, got: 3 }));
}

#[test]
fn test_skip_beyond_seekable_length() {
    let mut cursor = Cursor::new(vec![0u8; 4]);
    let err =
        hash_seekable(&mut cursor, 100, &pool(), None, &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, HashError::ShortInput { .. }));
}

#[test]
fn test_progress_reaches_total() {
    let data = vec![7u8; CHUNK_SIZE + 100];
    let total = data.len() as u64;
    let seen = std::sync::Mutex::new((0u64, 0u64));
    let cb = |done: u64, of: u64| {
        let mut guard = seen.lock().unwrap();
        *guard = (done, of);
    };
    hash_seekable(
        &mut Cursor::new(data),
        0,
        &pool(),
        Some(&cb),
        &CancellationToken::new(),
    )
    .unwrap();
    let (done, of) = *seen.lock().unwrap();
    assert_eq!(done, total);
    assert_eq!(of, total);
}

#[test]
fn test_cancellation_before_work() {
    let token = CancellationToken::new();
    token.cancel();
    let err = hash_seekable(
        &mut Cursor::new(vec![0u8; 1024]),
        0,
        &pool(),
        None,
        &token,
    )
    .unwrap_err();
    assert!(matches!(err, HashError::Cancelled));
}

#[test]
fn test_hash_file_not_found() {
    let err = hash_file(
        std::path::Path::new("/no/such/file.bin"),
        0,
        &pool(),
        None,
        &CancellationToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, HashError::NotFound(_)));
}
