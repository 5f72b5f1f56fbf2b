//! Multi-hash fingerprint of a ROM's content.
//!
//! A fingerprint is the (CRC32, MD5, SHA-1) triple as lowercase hex.
//! Legacy DATs may omit individual hashes, so every component is optional,
//! but a useful fingerprint carries at least one. Two fingerprints match
//! when any corresponding component is present on both sides and equal;
//! SHA-1 outranks MD5 outranks CRC32 when reporting how a match was made.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Invalid {algo} hash '{value}': expected {expected} lowercase hex characters")]
    InvalidHash {
        algo: &'static str,
        value: String,
        expected: usize,
    },
    #[error("Fingerprint has no hash components")]
    Empty,
}

impl FingerprintError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ParseError
    }
}

/// Which hash algorithm produced a match, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchTier {
    Sha1,
    Md5,
    Crc32,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Sha1 => "sha1",
            MatchTier::Md5 => "md5",
            MatchTier::Crc32 => "crc32",
        }
    }
}

/// An immutable, validated hash triple.
///
/// Components are stored as lowercase hex strings of fixed length
/// (8 / 32 / 40). Construction rejects anything else; uppercase input
/// is normalized rather than rejected, since DAT files disagree on case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    crc32: Option<String>,
    md5: Option<String>,
    sha1: Option<String>,
}

const CRC32_LEN: usize = 8;
const MD5_LEN: usize = 32;
const SHA1_LEN: usize = 40;

fn normalize(
    algo: &'static str,
    expected: usize,
    value: Option<&str>,
) -> Result<Option<String>, FingerprintError> {
    let value = match value {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(None),
    };
    if value.len() != expected || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FingerprintError::InvalidHash {
            algo,
            value: value.to_string(),
            expected,
        });
    }
    Ok(Some(value.to_ascii_lowercase()))
}

impl Fingerprint {
    /// Build a fingerprint from optional hex strings. Empty strings count
    /// as absent (DAT exports frequently emit `crc=""`).
    pub fn new(
        crc32: Option<&str>,
        md5: Option<&str>,
        sha1: Option<&str>,
    ) -> Result<Self, FingerprintError> {
        Ok(Self {
            crc32: normalize("crc32", CRC32_LEN, crc32)?,
            md5: normalize("md5", MD5_LEN, md5)?,
            sha1: normalize("sha1", SHA1_LEN, sha1)?,
        })
    }

    /// Like [`new`](Self::new), but rejects the all-absent fingerprint.
    /// Catalog entries must carry at least one hash.
    pub fn new_required(
        crc32: Option<&str>,
        md5: Option<&str>,
        sha1: Option<&str>,
    ) -> Result<Self, FingerprintError> {
        let fp = Self::new(crc32, md5, sha1)?;
        if fp.is_empty() {
            return Err(FingerprintError::Empty);
        }
        Ok(fp)
    }

    /// Build a complete fingerprint from raw digest output.
    pub fn from_digests(crc32: u32, md5: [u8; 16], sha1: [u8; 20]) -> Self {
        Self {
            crc32: Some(format!("{crc32:08x}")),
            md5: Some(hex_string(&md5)),
            sha1: Some(hex_string(&sha1)),
        }
    }

    pub fn crc32(&self) -> Option<&str> {
        self.crc32.as_deref()
    }

    pub fn md5(&self) -> Option<&str> {
        self.md5.as_deref()
    }

    pub fn sha1(&self) -> Option<&str> {
        self.sha1.as_deref()
    }

    /// True when no component is present.
    pub fn is_empty(&self) -> bool {
        self.crc32.is_none() && self.md5.is_none() && self.sha1.is_none()
    }

    /// True when all three components are present.
    pub fn is_complete(&self) -> bool {
        self.crc32.is_some() && self.md5.is_some() && self.sha1.is_some()
    }

    /// The strongest tier on which `self` and `other` agree, or `None`
    /// when no component is present on both sides and equal.
    pub fn match_tier(&self, other: &Fingerprint) -> Option<MatchTier> {
        fn eq(a: &Option<String>, b: &Option<String>) -> bool {
            matches!((a, b), (Some(x), Some(y)) if x == y)
        }
        if eq(&self.sha1, &other.sha1) {
            Some(MatchTier::Sha1)
        } else if eq(&self.md5, &other.md5) {
            Some(MatchTier::Md5)
        } else if eq(&self.crc32, &other.crc32) {
            Some(MatchTier::Crc32)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "crc32={} md5={} sha1={}",
            self.crc32.as_deref().unwrap_or("-"),
            self.md5.as_deref().unwrap_or("-"),
            self.sha1.as_deref().unwrap_or("-"),
        )
    }
}

fn hex_string(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}
