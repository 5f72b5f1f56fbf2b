//! Parser for ROM naming conventions.
//!
//! DAT entries and collection filenames encode metadata in parenthesized
//! and bracketed tags:
//! ```text
//! Game Name (Region1, Region2) (Rev A) (En,Fr,De) [!] [b2]
//! ```
//!
//! Parenthesized tags carry regions, revisions, languages, and release
//! flags; bracketed tags are the GoodTools dump-status markers. The parser
//! extracts all of them plus a `clean_name` with every marker stripped,
//! which is what the 1G1R selector groups on.

/// Dump-status and release flags extracted from a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpFlag {
    /// `[!]`
    Verified,
    /// `[b]`, `[b1]`, `[b2]`, …
    BadDump,
    /// `[a]`, `[a1]`, …
    Alternate,
    /// `[o]`, `[o1]`, …
    Overdump,
    /// `[h…]`
    Hack,
    /// `[p]`, `[p1]`, …
    Pirate,
    /// `[t]`, `[t1]`, …
    Trainer,
    /// `[f]`, `[f1]`, …
    Fixed,
    /// `[T…]` (uppercase T: translations, e.g. `[T+Eng]`)
    Translation,
    /// `[c]`
    Cracked,
    /// `[x]`
    BadChecksum,
    /// `(Unl)`
    Unlicensed,
    /// `(Proto)`
    Prototype,
    /// `(Beta)`
    Beta,
    /// `(Sample)`
    Sample,
    /// `(Demo)`
    Demo,
    /// `(PD)`
    PublicDomain,
}

impl DumpFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            DumpFlag::Verified => "verified",
            DumpFlag::BadDump => "baddump",
            DumpFlag::Alternate => "alternate",
            DumpFlag::Overdump => "overdump",
            DumpFlag::Hack => "hack",
            DumpFlag::Pirate => "pirate",
            DumpFlag::Trainer => "trainer",
            DumpFlag::Fixed => "fixed",
            DumpFlag::Translation => "translation",
            DumpFlag::Cracked => "cracked",
            DumpFlag::BadChecksum => "bad-checksum",
            DumpFlag::Unlicensed => "unlicensed",
            DumpFlag::Prototype => "prototype",
            DumpFlag::Beta => "beta",
            DumpFlag::Sample => "sample",
            DumpFlag::Demo => "demo",
            DumpFlag::PublicDomain => "public-domain",
        }
    }

    /// True for flags that mark the dump itself as bad.
    pub fn is_bad_dump_marker(&self) -> bool {
        matches!(self, DumpFlag::BadDump | DumpFlag::BadChecksum)
    }
}

/// Parsed components of a ROM filename or DAT entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Base title without any parenthetical or bracketed tags.
    pub title: String,
    /// Region strings as they appear (e.g. "USA", "Japan").
    pub regions: Vec<String>,
    /// Revision string if present (e.g. "Rev A", "Rev 1.1", "v1.2").
    pub revision: Option<String>,
    /// Revision normalized to an integer rank; 0 when absent.
    pub revision_rank: i32,
    /// Language codes if present (e.g. "En", "Fr").
    pub languages: Vec<String>,
    /// Dump-status and release flags.
    pub flags: Vec<DumpFlag>,
    /// Parenthesized tags that matched nothing known (compilation labels etc.).
    pub other_tags: Vec<String>,
}

impl ParsedName {
    /// True when any flag marks this as a bad dump. `[b]` wins over `[!]`
    /// when both are present.
    pub fn is_bad_dump(&self) -> bool {
        self.flags.iter().any(DumpFlag::is_bad_dump_marker)
    }

    /// True when `[!]` is present and no bad-dump marker overrides it.
    pub fn is_verified(&self) -> bool {
        !self.is_bad_dump() && self.flags.contains(&DumpFlag::Verified)
    }

    /// The languages joined back to their canonical comma form.
    pub fn languages_string(&self) -> Option<String> {
        if self.languages.is_empty() {
            None
        } else {
            Some(self.languages.join(","))
        }
    }
}

/// Parse a name into its components.
pub fn parse_name(name: &str) -> ParsedName {
    let mut result = ParsedName {
        title: String::new(),
        regions: Vec::new(),
        revision: None,
        revision_rank: 0,
        languages: Vec::new(),
        flags: Vec::new(),
        other_tags: Vec::new(),
    };

    let (title, tags) = extract_title_and_tags(name);
    result.title = title;

    for tag in &tags {
        match tag {
            Tag::Paren(content) => classify_paren_tag(content, &mut result),
            Tag::Bracket(content) => classify_bracket_tag(content, &mut result),
        }
    }

    result
}

/// The grouping key for a file: the title with all markers stripped,
/// lowercased, whitespace collapsed.
pub fn clean_name(name: &str) -> String {
    let parsed = parse_name(name);
    let mut out = String::with_capacity(parsed.title.len());
    let mut last_space = true;
    for c in parsed.title.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(c.to_ascii_lowercase());
            last_space = false;
        }
    }
    out.trim_end().to_string()
}

// ── Internal parsing ────────────────────────────────────────────────────────

#[derive(Debug)]
enum Tag {
    Paren(String),
    Bracket(String),
}

/// Split a name into the base title and its (parenthesized)/[bracketed] tags.
fn extract_title_and_tags(name: &str) -> (String, Vec<Tag>) {
    let mut tags = Vec::new();
    let mut title_end = None;
    let mut chars = name.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        let (open, close, make_tag): (char, char, fn(String) -> Tag) = match ch {
            '(' => ('(', ')', Tag::Paren),
            '[' => ('[', ']', Tag::Bracket),
            _ => continue,
        };

        if title_end.is_none() {
            title_end = Some(i);
        }

        let mut depth = 1u32;
        let start = i + open.len_utf8();
        let mut end = start;

        for (j, c) in chars.by_ref() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    end = j;
                    break;
                }
            }
        }

        let content = name[start..end].to_string();
        if !content.is_empty() {
            tags.push(make_tag(content));
        }
    }

    // The title may carry the file extension when parsing raw filenames;
    // strip it only if it looks like one (short alphanumeric suffix).
    let raw_title = match title_end {
        Some(pos) => name[..pos].trim_end().to_string(),
        None => strip_extension(name.trim()).to_string(),
    };

    (raw_title, tags)
}

fn strip_extension(name: &str) -> &str {
    if let Some(dot) = name.rfind('.') {
        let ext = &name[dot + 1..];
        if (1..=4).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return &name[..dot];
        }
    }
    name
}

/// Known region strings in No-Intro/Redump naming.
const KNOWN_REGIONS: &[&str] = &[
    "USA",
    "Japan",
    "Europe",
    "World",
    "Australia",
    "Korea",
    "China",
    "Taiwan",
    "Brazil",
    "France",
    "Germany",
    "Spain",
    "Italy",
    "Netherlands",
    "Sweden",
    "Norway",
    "Denmark",
    "Finland",
    "Portugal",
    "Russia",
    "Hong Kong",
    "Asia",
    "Canada",
    "Mexico",
    "Argentina",
    "India",
    "South Africa",
    "United Kingdom",
    "New Zealand",
    "Poland",
    "Greece",
    "Turkey",
    "Israel",
    "Scandinavia",
    "Latin America",
    "Unknown",
];

fn is_region_string(s: &str) -> bool {
    s.split(',').all(|part| {
        let trimmed = part.trim();
        KNOWN_REGIONS
            .iter()
            .any(|r| r.eq_ignore_ascii_case(trimmed))
    })
}

/// Classify a parenthesized tag.
fn classify_paren_tag(content: &str, result: &mut ParsedName) {
    let trimmed = content.trim();

    if is_region_string(trimmed) {
        for part in trimmed.split(',') {
            let region = part.trim().to_string();
            if !result.regions.contains(&region) {
                result.regions.push(region);
            }
        }
        return;
    }

    // Revision: "Rev A", "Rev 1", "Rev 1.1"
    if let Some(rev) = strip_prefix_ci(trimmed, "Rev ") {
        result.revision = Some(format!("Rev {rev}"));
        result.revision_rank = revision_rank(rev);
        return;
    }

    // Version: "v1.0", "V1.2"
    if (trimmed.starts_with('v') || trimmed.starts_with('V'))
        && trimmed.len() > 1
        && trimmed.as_bytes()[1].is_ascii_digit()
    {
        result.revision = Some(trimmed.to_string());
        result.revision_rank = revision_rank(&trimmed[1..]);
        return;
    }

    // Language list: "En,Fr,De"
    if looks_like_language_list(trimmed) {
        for lang in trimmed.split(',') {
            result.languages.push(lang.trim().to_string());
        }
        return;
    }

    match trimmed.to_lowercase().as_str() {
        "unl" | "unlicensed" => result.flags.push(DumpFlag::Unlicensed),
        "proto" | "prototype" => result.flags.push(DumpFlag::Prototype),
        "beta" => result.flags.push(DumpFlag::Beta),
        "sample" => result.flags.push(DumpFlag::Sample),
        "demo" => result.flags.push(DumpFlag::Demo),
        "pd" => result.flags.push(DumpFlag::PublicDomain),
        _ => result.other_tags.push(trimmed.to_string()),
    }
}

/// Classify a bracketed (GoodTools) tag.
///
/// Note the case split on `t`: lowercase with optional digits is a
/// trainer, uppercase `T` is a translation (`[T+Eng]`).
fn classify_bracket_tag(content: &str, result: &mut ParsedName) {
    let trimmed = content.trim();
    let mut chars = trimmed.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return,
    };
    let rest: String = chars.collect();
    let rest_is_digits = rest.chars().all(|c| c.is_ascii_digit());

    let flag = match first {
        '!' if rest.is_empty() => Some(DumpFlag::Verified),
        'b' | 'B' if rest_is_digits => Some(DumpFlag::BadDump),
        'a' | 'A' if rest_is_digits => Some(DumpFlag::Alternate),
        'o' | 'O' if rest_is_digits => Some(DumpFlag::Overdump),
        'h' | 'H' => Some(DumpFlag::Hack),
        'p' | 'P' if rest_is_digits => Some(DumpFlag::Pirate),
        't' if rest_is_digits => Some(DumpFlag::Trainer),
        'T' => Some(DumpFlag::Translation),
        'f' | 'F' if rest_is_digits => Some(DumpFlag::Fixed),
        'c' | 'C' if rest.is_empty() => Some(DumpFlag::Cracked),
        'x' | 'X' if rest.is_empty() => Some(DumpFlag::BadChecksum),
        _ => None,
    };

    match flag {
        Some(f) => result.flags.push(f),
        None => result.other_tags.push(format!("[{trimmed}]")),
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Normalize a revision suffix ("A", "1", "1.1") to an integer rank so
/// revisions order correctly on one scale: "Rev A" == "Rev 1" == 10,
/// "Rev 1.1" == 11, "Rev B" == "Rev 2" == 20.
fn revision_rank(rev: &str) -> i32 {
    let trimmed = rev.trim();
    if trimmed.is_empty() {
        return 0;
    }

    // Single letter: A=10, B=20, …
    if trimmed.len() == 1 {
        let c = trimmed.chars().next().unwrap_or(' ');
        if c.is_ascii_alphabetic() {
            return ((c.to_ascii_uppercase() as i32) - ('A' as i32) + 1) * 10;
        }
    }

    let mut parts = trimmed.splitn(2, '.');
    let major: i32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    let minor: i32 = parts
        .next()
        .map(|p| {
            p.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    major * 10 + minor
}

/// Check if a string looks like a language list (comma-separated 2-3
/// letter codes, at least two of them — single codes are ambiguous).
fn looks_like_language_list(s: &str) -> bool {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() < 2 {
        return false;
    }
    parts.iter().all(|p| {
        let t = p.trim();
        (2..=3).contains(&t.len())
            && t.chars().next().is_some_and(|c| c.is_ascii_uppercase())
            && t.chars().skip(1).all(|c| c.is_ascii_lowercase())
    })
}
