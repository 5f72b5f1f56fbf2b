//! DAT format detection and the top-level parse entry point.

use std::io::{BufRead, Read};
use std::path::Path;

use crate::clrmamepro::parse_clrmamepro;
use crate::error::DatError;
use crate::logiqx::parse_logiqx;
use crate::model::{DatFile, ProgressFn};

/// Maximum bytes the content probe examines.
const PROBE_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatFormat {
    Logiqx,
    ClrMamePro,
}

/// Decide the format of a DAT file.
///
/// Extension wins when unambiguous (`.xml` is Logiqx, `.cmp`/`.txt` is
/// ClrMamePro); `.dat` and anything else fall through to a content probe
/// of the first bytes.
pub fn detect_format(path: &Path) -> Result<DatFormat, DatError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xml" => Ok(DatFormat::Logiqx),
        "cmp" | "txt" => Ok(DatFormat::ClrMamePro),
        _ => {
            let file = std::fs::File::open(path)?;
            let mut reader = std::io::BufReader::new(file);
            probe_content(&mut reader).ok_or_else(|| DatError::unsupported(path))
        }
    }
}

/// Probe the first [`PROBE_LIMIT`] non-whitespace bytes of a reader.
///
/// Leading `<` means Logiqx XML; an identifier followed by `(` means
/// ClrMamePro; anything else is unrecognized.
pub fn probe_content<R: Read>(reader: &mut R) -> Option<DatFormat> {
    let mut buf = [0u8; PROBE_LIMIT];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => return None,
        }
    }

    let mut bytes = buf[..filled].iter().copied().filter(|b| !b.is_ascii_whitespace());

    match bytes.next() {
        Some(b'<') => Some(DatFormat::Logiqx),
        Some(b) if b.is_ascii_alphanumeric() || b == b'_' => {
            // Consume the rest of the identifier, then expect '('
            for b in bytes {
                if b == b'(' {
                    return Some(DatFormat::ClrMamePro);
                }
                if !(b.is_ascii_alphanumeric() || b == b'_') {
                    return None;
                }
            }
            None
        }
        _ => None,
    }
}

/// Parse a DAT file from disk, auto-detecting its format.
pub fn parse_dat_file(path: &Path, progress: Option<&ProgressFn<'_>>) -> Result<DatFile, DatError> {
    let format = detect_format(path)?;
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    parse_dat(reader, format, progress)
}

/// Parse from any buffered reader with a known format.
pub fn parse_dat<R: BufRead>(
    reader: R,
    format: DatFormat,
    progress: Option<&ProgressFn<'_>>,
) -> Result<DatFile, DatError> {
    match format {
        DatFormat::Logiqx => parse_logiqx(reader, progress),
        DatFormat::ClrMamePro => parse_clrmamepro(reader, progress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_xml() {
        let mut input = &b"  \n <?xml version=\"1.0\"?><datafile>"[..];
        assert_eq!(probe_content(&mut input), Some(DatFormat::Logiqx));
    }

    #[test]
    fn test_probe_clrmamepro() {
        let mut input = &b"\nclrmamepro (\n\tname \"X\"\n)"[..];
        assert_eq!(probe_content(&mut input), Some(DatFormat::ClrMamePro));
    }

    #[test]
    fn test_probe_clrmamepro_tight() {
        let mut input = &b"game(name \"X\")"[..];
        assert_eq!(probe_content(&mut input), Some(DatFormat::ClrMamePro));
    }

    #[test]
    fn test_probe_garbage() {
        let mut input = &b"\x7fELF binary junk"[..];
        assert_eq!(probe_content(&mut input), None);
        let mut input = &b"just some words with no block"[..];
        assert_eq!(probe_content(&mut input), None);
    }

    #[test]
    fn test_probe_empty() {
        let mut input = &b""[..];
        assert_eq!(probe_content(&mut input), None);
    }

    #[test]
    fn test_detect_by_extension() {
        // .xml and .cmp never need the probe, so a nonexistent path is fine
        assert_eq!(
            detect_format(Path::new("no-such-dir/set.xml")).unwrap(),
            DatFormat::Logiqx
        );
        assert_eq!(
            detect_format(Path::new("no-such-dir/set.cmp")).unwrap(),
            DatFormat::ClrMamePro
        );
    }
}
