//! The 1G1R selector.
//!
//! Groups ROM candidates that represent the same logical game, scores each
//! candidate against the user's preferences, and picks one per group. The
//! output is fully deterministic: the same candidates and options always
//! produce the same selections and the same alternatives ordering, no
//! matter the input order.

use serde::{Deserialize, Serialize};

/// One ROM file competing in a 1G1R group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomCandidate {
    pub file_path: String,
    /// Full name including tags.
    pub name: String,
    /// Title with markers stripped (see [`crate::name_parser::clean_name`]).
    pub clean_name: String,
    pub region: Option<String>,
    /// Canonical comma-joined language list (e.g. "En,Fr,De").
    pub languages: Option<String>,
    /// Parent game name; empty/absent when this candidate is itself the parent.
    pub parent: Option<String>,
    pub is_verified: bool,
    /// Normalized revision rank; 0 when no revision tag.
    pub revision: i32,
    /// Release categories ("Unlicensed", "Prototype", "Beta", …).
    pub categories: Vec<String>,
    pub size: u64,
    pub crc: Option<String>,
}

/// Preferences controlling scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionOptions {
    /// Regions in preference order, best first.
    pub region_priority: Vec<String>,
    /// Exact language strings in preference order, best first.
    pub language_priority: Vec<String>,
    pub prefer_verified: bool,
    pub prefer_parent: bool,
    pub prefer_latest_revision: bool,
    /// Candidates with any of these categories are effectively rejected.
    pub exclude_categories: Vec<String>,
    pub exclude_unlicensed: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            region_priority: vec![
                "USA".to_string(),
                "World".to_string(),
                "Europe".to_string(),
                "Japan".to_string(),
            ],
            language_priority: vec!["En".to_string()],
            prefer_verified: true,
            prefer_parent: true,
            prefer_latest_revision: true,
            exclude_categories: Vec::new(),
            exclude_unlicensed: false,
        }
    }
}

/// The outcome for one group: the selected candidate, the also-rans in
/// score order, and a human-readable summary of why the winner won.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSelection {
    pub group_key: String,
    pub selected: RomCandidate,
    pub alternatives: Vec<RomCandidate>,
    pub score: i64,
    pub selection_reason: String,
}

const EXCLUDED_CATEGORY_PENALTY: i64 = -1000;
const REGION_WEIGHT: i64 = 10;
const LANGUAGE_WEIGHT: i64 = 5;
const VERIFIED_BONUS: i64 = 25;
const PARENT_BONUS: i64 = 15;
const REVISION_WEIGHT: i64 = 2;
const UNLICENSED_PENALTY: i64 = -50;

/// Score one candidate. Returns the total and the contributing factors.
fn score_candidate(
    candidate: &RomCandidate,
    options: &SelectionOptions,
) -> (i64, Vec<String>) {
    let mut score = 0i64;
    let mut reasons = Vec::new();

    if candidate
        .categories
        .iter()
        .any(|c| options.exclude_categories.iter().any(|e| e.eq_ignore_ascii_case(c)))
    {
        score += EXCLUDED_CATEGORY_PENALTY;
        reasons.push("excluded-category".to_string());
    }

    if let Some(ref region) = candidate.region {
        if let Some(index) = options
            .region_priority
            .iter()
            .position(|r| r.eq_ignore_ascii_case(region))
        {
            let bonus = (options.region_priority.len() as i64 - index as i64) * REGION_WEIGHT;
            score += bonus;
            reasons.push(format!("region:{region}(+{bonus})"));
        }
    }

    if let Some(ref languages) = candidate.languages {
        if let Some(index) = options
            .language_priority
            .iter()
            .position(|l| l.eq_ignore_ascii_case(languages))
        {
            let bonus = (options.language_priority.len() as i64 - index as i64) * LANGUAGE_WEIGHT;
            score += bonus;
            reasons.push(format!("language:{languages}(+{bonus})"));
        }
    }

    if options.prefer_verified && candidate.is_verified {
        score += VERIFIED_BONUS;
        reasons.push(format!("verified(+{VERIFIED_BONUS})"));
    }

    if options.prefer_parent && candidate.parent.as_deref().unwrap_or("").is_empty() {
        score += PARENT_BONUS;
        reasons.push(format!("parent(+{PARENT_BONUS})"));
    }

    if options.prefer_latest_revision && candidate.revision != 0 {
        let bonus = candidate.revision as i64 * REVISION_WEIGHT;
        score += bonus;
        reasons.push(format!("revision(+{bonus})"));
    }

    if options.exclude_unlicensed
        && candidate
            .categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case("Unlicensed"))
    {
        score += UNLICENSED_PENALTY;
        reasons.push(format!("unlicensed({UNLICENSED_PENALTY})"));
    }

    (score, reasons)
}

/// Score a single candidate against the options. Exposed for reporting.
pub fn score(candidate: &RomCandidate, options: &SelectionOptions) -> i64 {
    score_candidate(candidate, options).0
}

/// Group candidates by logical game and pick one per group.
///
/// The grouping key is the candidate's parent name when present, else its
/// clean name, compared case-insensitively. Groups come back sorted by
/// key; within a group the selected candidate is first by score with a
/// deterministic tie-break chain (parent first when preferred, then
/// highest revision, then longest name, then name order).
pub fn group_and_select(
    candidates: Vec<RomCandidate>,
    options: &SelectionOptions,
) -> Vec<GroupSelection> {
    use std::collections::BTreeMap;

    let mut groups: BTreeMap<String, Vec<RomCandidate>> = BTreeMap::new();
    for candidate in candidates {
        let key = group_key(&candidate);
        groups.entry(key).or_default().push(candidate);
    }

    let mut selections = Vec::with_capacity(groups.len());
    for (key, mut members) in groups {
        // Deterministic base order before scoring so equal-score sorting
        // is stable regardless of input permutation.
        members.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });

        let mut scored: Vec<(i64, RomCandidate)> = members
            .into_iter()
            .map(|c| (score_candidate(&c, options).0, c))
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .cmp(score_a)
                .then_with(|| {
                    if options.prefer_parent {
                        let a_is_parent = a.parent.as_deref().unwrap_or("").is_empty();
                        let b_is_parent = b.parent.as_deref().unwrap_or("").is_empty();
                        b_is_parent.cmp(&a_is_parent)
                    } else {
                        std::cmp::Ordering::Equal
                    }
                })
                .then_with(|| b.revision.cmp(&a.revision))
                .then_with(|| b.name.len().cmp(&a.name.len()))
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.file_path.cmp(&b.file_path))
        });

        let (top_score, selected) = scored.remove(0);
        let (_, reasons) = score_candidate(&selected, options);
        let selection_reason = if reasons.is_empty() {
            "only candidate".to_string()
        } else {
            reasons.join(", ")
        };

        selections.push(GroupSelection {
            group_key: key,
            selected,
            alternatives: scored.into_iter().map(|(_, c)| c).collect(),
            score: top_score,
            selection_reason,
        });
    }

    selections
}

fn group_key(candidate: &RomCandidate) -> String {
    let base = match candidate.parent.as_deref() {
        Some(parent) if !parent.is_empty() => parent,
        _ => candidate.clean_name.as_str(),
    };
    base.to_lowercase()
}
