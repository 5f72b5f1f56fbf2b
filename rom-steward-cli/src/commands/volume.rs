//! The `volume` command.

use std::path::Path;

use owo_colors::OwoColorize;

use rom_steward_core::{Volume, VolumeKind};

use crate::context::AppContext;
use crate::{EXIT_OK, EXIT_RUNTIME};

pub(crate) fn run_add(
    ctx: &AppContext,
    path: &Path,
    label: Option<&str>,
    auto_scan: bool,
) -> i32 {
    let root = match path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            log::error!("Cannot access {}: {e}", path.display());
            return EXIT_RUNTIME;
        }
    };

    let label = label
        .map(|s| s.to_string())
        .or_else(|| {
            root.file_name()
                .and_then(|n| n.to_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| root.to_string_lossy().to_string());

    let volume = Volume {
        id: uuid::Uuid::new_v4().to_string(),
        label,
        root_path: root.to_string_lossy().to_string(),
        kind: VolumeKind::Fixed,
        is_online: true,
        last_seen_at: chrono::Utc::now(),
        total_size: None,
        free_space: None,
        auto_scan,
    };

    match rom_steward_db::upsert_volume(&ctx.conn, &volume) {
        Ok(()) => {
            log::info!("Registered volume '{}' at {}", volume.label, volume.root_path);
            EXIT_OK
        }
        Err(e) => {
            log::error!("Volume registration failed: {e}");
            EXIT_RUNTIME
        }
    }
}

pub(crate) fn run_list(ctx: &AppContext) -> i32 {
    let volumes = match rom_steward_db::list_volumes(&ctx.conn) {
        Ok(v) => v,
        Err(e) => {
            log::error!("Volume query failed: {e}");
            return EXIT_RUNTIME;
        }
    };

    if volumes.is_empty() {
        log::info!("No volumes registered");
        return EXIT_OK;
    }

    for volume in &volumes {
        let status = if volume.is_online {
            "online".green().to_string()
        } else {
            "offline".red().to_string()
        };
        log::info!(
            "{}  {}  [{}]  {}  ({})",
            volume.id,
            volume.label.bold().to_string(),
            volume.kind.as_str(),
            status,
            volume.root_path
        );
    }
    EXIT_OK
}
