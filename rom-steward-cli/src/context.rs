//! Shared command context: resolved directories, the database
//! connection, the hash cache, and the memory monitor.

use std::path::{Path, PathBuf};

use rom_steward_db::Connection;
use rom_steward_lib::{settings, HashCache, MemoryMonitor};

pub(crate) struct AppContext {
    pub data_dir: PathBuf,
    pub conn: Connection,
    pub cache: HashCache,
    pub memory: MemoryMonitor,
}

impl AppContext {
    pub fn open(data_dir_override: Option<&Path>) -> Result<Self, String> {
        let data_dir = settings::data_dir(data_dir_override);
        std::fs::create_dir_all(&data_dir)
            .map_err(|e| format!("Cannot create data dir {}: {e}", data_dir.display()))?;

        let db_path = settings::database_path(&data_dir);
        let conn = rom_steward_db::open_database(&db_path)
            .map_err(|e| format!("Cannot open database {}: {e}", db_path.display()))?;

        let cache = HashCache::load(settings::hash_cache_path(&data_dir));
        let memory = MemoryMonitor::start();

        // Re-poll registered volumes: roots that vanished go offline,
        // returned ones come back. Records are never deleted here.
        if let Ok(volumes) = rom_steward_db::list_volumes(&conn) {
            for volume in volumes {
                let online = Path::new(&volume.root_path).is_dir();
                if online != volume.is_online {
                    let _ = rom_steward_db::set_volume_online(
                        &conn,
                        &volume.id,
                        online,
                        chrono::Utc::now(),
                    );
                }
            }
        }

        Ok(Self {
            data_dir,
            conn,
            cache,
            memory,
        })
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        settings::checkpoint_dir(&self.data_dir)
    }

    /// Save the hash cache, logging rather than failing on error.
    pub fn save_cache(&self) {
        if let Err(e) = self.cache.save() {
            log::warn!("Failed to save hash cache: {e}");
        }
    }
}
