//! The `onegame` command: a 1G1R report over one catalog.
//!
//! Builds candidates from the catalog's games (regions, revisions, and
//! verification flags recovered from their names; parent links from the
//! clone index) and prints the preferred variant per logical game.

use owo_colors::OwoColorize;

use rom_steward_catalog::{
    group_and_select, name_parser, ParentCloneIndex, RomCandidate, SelectionOptions,
};
use rom_steward_core::GameEntry;

use crate::context::AppContext;
use crate::{EXIT_OK, EXIT_RUNTIME};

pub(crate) fn run(
    ctx: &AppContext,
    catalog_id: &str,
    regions: &[String],
    exclude_unlicensed: bool,
    limit: usize,
) -> i32 {
    let Ok(Some(catalog)) = rom_steward_db::get_catalog(&ctx.conn, catalog_id) else {
        log::error!("No catalog with id {catalog_id}");
        return EXIT_RUNTIME;
    };
    let games = match rom_steward_db::games_for_catalog(&ctx.conn, catalog_id) {
        Ok(g) => g,
        Err(e) => {
            log::error!("Game query failed: {e}");
            return EXIT_RUNTIME;
        }
    };

    let index = ParentCloneIndex::build(catalog_id, &games);
    let candidates: Vec<RomCandidate> = games
        .iter()
        .map(|game| candidate_from_game(game, &index))
        .collect();

    let options = SelectionOptions {
        region_priority: regions.to_vec(),
        exclude_unlicensed,
        ..SelectionOptions::default()
    };
    let selections = group_and_select(candidates, &options);

    log::info!(
        "{} '{}': {} logical games from {} entries ({} clone links)",
        "1G1R".bold().to_string(),
        catalog.display_name,
        selections.len(),
        games.len(),
        index.clone_count()
    );

    for selection in selections.iter().take(limit) {
        log::info!(
            "  {}  [{}]",
            selection.selected.name,
            selection.selection_reason
        );
        for alt in &selection.alternatives {
            log::info!("      also: {}", alt.name);
        }
    }
    if selections.len() > limit {
        log::info!("  ... {} more groups (raise --limit to see them)", selections.len() - limit);
    }

    EXIT_OK
}

fn candidate_from_game(game: &GameEntry, index: &ParentCloneIndex) -> RomCandidate {
    let parsed = name_parser::parse_name(&game.name);

    // Parents group under their own clean name; clones carry the
    // parent's clean name so the whole family shares one key.
    let parent = index
        .parent_of(&game.name)
        .map(name_parser::clean_name)
        .unwrap_or_default();

    let region = game
        .region
        .as_ref()
        .and_then(|r| r.split(',').next())
        .map(|r| r.trim().to_string())
        .or_else(|| parsed.regions.first().cloned());

    RomCandidate {
        file_path: String::new(),
        name: game.name.clone(),
        clean_name: name_parser::clean_name(&game.name),
        region,
        languages: game.languages.clone().or_else(|| parsed.languages_string()),
        parent: if parent.is_empty() { None } else { Some(parent) },
        is_verified: parsed.is_verified(),
        revision: parsed.revision_rank,
        categories: game.category.clone().into_iter().collect(),
        size: 0,
        crc: None,
    }
}
