//! Data and log directory resolution.
//!
//! Priority chain: explicit override → environment variable → platform
//! default. These are the only environment variables the system reads.

use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "ROM_STEWARD_DATA_DIR";
pub const LOG_DIR_ENV: &str = "ROM_STEWARD_LOG_DIR";

/// Resolve the data directory (database, hash cache, checkpoints).
pub fn data_dir(cli_override: Option<&Path>) -> PathBuf {
    if let Some(p) = cli_override {
        return p.to_path_buf();
    }
    if let Some(p) = std::env::var_os(DATA_DIR_ENV) {
        if !p.is_empty() {
            return PathBuf::from(p);
        }
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rom-steward")
}

/// Resolve the log directory.
pub fn log_dir(cli_override: Option<&Path>) -> PathBuf {
    if let Some(p) = cli_override {
        return p.to_path_buf();
    }
    if let Some(p) = std::env::var_os(LOG_DIR_ENV) {
        if !p.is_empty() {
            return PathBuf::from(p);
        }
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rom-steward")
        .join("logs")
}

/// Where scan checkpoints live under the data directory.
pub fn checkpoint_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("checkpoints")
}

/// The hash cache file under the data directory.
pub fn hash_cache_path(data_dir: &Path) -> PathBuf {
    data_dir.join("hash_cache.json")
}

/// The SQLite database file under the data directory.
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("rom-steward.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let dir = data_dir(Some(Path::new("/tmp/custom")));
        assert_eq!(dir, PathBuf::from("/tmp/custom"));
    }

    #[test]
    fn test_derived_paths() {
        let base = Path::new("/data/rs");
        assert_eq!(checkpoint_dir(base), PathBuf::from("/data/rs/checkpoints"));
        assert_eq!(
            hash_cache_path(base),
            PathBuf::from("/data/rs/hash_cache.json")
        );
        assert_eq!(database_path(base), PathBuf::from("/data/rs/rom-steward.db"));
    }
}
