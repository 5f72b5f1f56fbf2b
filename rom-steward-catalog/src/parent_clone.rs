//! Parent/clone index for a catalog.
//!
//! DAT games reference their parent by name (`cloneof`), resolved lazily.
//! This index snapshots those references into two maps with
//! case-insensitive keys: clone → parent and parent → clones. Clones whose
//! parent name never appears in the catalog are still indexed; callers can
//! ask for orphans explicitly.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use rom_steward_core::GameEntry;

#[derive(Debug, Clone)]
pub struct ParentCloneIndex {
    catalog_id: String,
    built_at: DateTime<Utc>,
    /// Lowercased clone name → parent name as written in the DAT.
    clone_to_parent: BTreeMap<String, String>,
    /// Lowercased parent name → clone names as written, sorted.
    parent_to_clones: BTreeMap<String, BTreeSet<String>>,
    /// Lowercased names of all games present in the catalog.
    known_names: BTreeSet<String>,
}

impl ParentCloneIndex {
    /// Build the index from a catalog's games.
    pub fn build(catalog_id: &str, games: &[GameEntry]) -> Self {
        let mut index = Self {
            catalog_id: catalog_id.to_string(),
            built_at: Utc::now(),
            clone_to_parent: BTreeMap::new(),
            parent_to_clones: BTreeMap::new(),
            known_names: BTreeSet::new(),
        };

        for game in games {
            index.known_names.insert(game.name.to_lowercase());
        }

        for game in games {
            let parent = match game.clone_of.as_deref() {
                Some(p) if !p.is_empty() => p,
                _ => continue,
            };
            index
                .clone_to_parent
                .insert(game.name.to_lowercase(), parent.to_string());
            index
                .parent_to_clones
                .entry(parent.to_lowercase())
                .or_default()
                .insert(game.name.clone());
        }

        index
    }

    pub fn catalog_id(&self) -> &str {
        &self.catalog_id
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// The parent name for a clone, or `None` for parents and unknowns.
    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.clone_to_parent
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    /// The clone names of a parent, sorted; empty for childless games.
    pub fn clones_of(&self, name: &str) -> Vec<&str> {
        self.parent_to_clones
            .get(&name.to_lowercase())
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// A game is a parent when nothing names it as a clone of something.
    pub fn is_parent(&self, name: &str) -> bool {
        !self.clone_to_parent.contains_key(&name.to_lowercase())
    }

    /// Clones whose declared parent does not exist in the catalog.
    pub fn orphan_clones(&self) -> Vec<(&str, &str)> {
        self.clone_to_parent
            .iter()
            .filter(|(_, parent)| !self.known_names.contains(&parent.to_lowercase()))
            .map(|(clone, parent)| (clone.as_str(), parent.as_str()))
            .collect()
    }

    /// Number of clone → parent links.
    pub fn clone_count(&self) -> usize {
        self.clone_to_parent.len()
    }
}
