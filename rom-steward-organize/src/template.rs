//! The organization template language.
//!
//! A template is a string with `{placeholder}` and
//! `{placeholder:modifier}` tokens over a closed placeholder set:
//! `name, extension, system, system_short, region, region_short,
//! languages, clean_name, category`. Modifiers are `upper`, `lower`,
//! and `safe` (replaces path-illegal characters with `_`). Parsing is
//! strict — an unmatched `{` or unknown modifier is a parse error —
//! but unknown placeholders parse, render empty, and warn at plan time.

use std::path::Path;

use rom_steward_catalog::name_parser;

use crate::error::OrganizeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Name,
    Extension,
    System,
    SystemShort,
    Region,
    RegionShort,
    Languages,
    CleanName,
    Category,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Placeholder::Name),
            "extension" => Some(Placeholder::Extension),
            "system" => Some(Placeholder::System),
            "system_short" => Some(Placeholder::SystemShort),
            "region" => Some(Placeholder::Region),
            "region_short" => Some(Placeholder::RegionShort),
            "languages" => Some(Placeholder::Languages),
            "clean_name" => Some(Placeholder::CleanName),
            "category" => Some(Placeholder::Category),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Upper,
    Lower,
    Safe,
}

impl Modifier {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "upper" => Some(Modifier::Upper),
            "lower" => Some(Modifier::Lower),
            "safe" => Some(Modifier::Safe),
            _ => None,
        }
    }

    fn apply(&self, value: &str) -> String {
        match self {
            Modifier::Upper => value.to_uppercase(),
            Modifier::Lower => value.to_lowercase(),
            Modifier::Safe => value
                .chars()
                .map(|c| {
                    if matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                        '_'
                    } else {
                        c
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Token {
        placeholder: Option<Placeholder>,
        /// Original name, kept for unknown-placeholder warnings.
        raw: String,
        modifier: Option<Modifier>,
    },
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(input: &str) -> Result<Self, OrganizeError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = input.chars();

        while let Some(c) = chars.next() {
            if c != '{' {
                literal.push(c);
                continue;
            }

            let mut token = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                token.push(c);
            }
            if !closed {
                return Err(OrganizeError::template_parse(format!(
                    "Unmatched '{{' in template '{input}'"
                )));
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let (name, modifier) = match token.split_once(':') {
                Some((name, modifier_name)) => {
                    let modifier = Modifier::parse(modifier_name).ok_or_else(|| {
                        OrganizeError::template_parse(format!(
                            "Unknown modifier '{modifier_name}' in template '{input}'"
                        ))
                    })?;
                    (name, Some(modifier))
                }
                None => (token.as_str(), None),
            };

            segments.push(Segment::Token {
                placeholder: Placeholder::parse(name),
                raw: name.to_string(),
                modifier,
            });
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: input.to_string(),
            segments,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Placeholder names that are not part of the closed set.
    pub fn unknown_placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Token {
                    placeholder: None,
                    raw,
                    ..
                } => Some(raw.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Render against a context. Unknown placeholders become empty.
    pub fn render(&self, ctx: &TemplateContext) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token {
                    placeholder,
                    modifier,
                    ..
                } => {
                    let value = match placeholder {
                        Some(p) => ctx.value(*p),
                        None => "",
                    };
                    match modifier {
                        Some(m) => out.push_str(&m.apply(value)),
                        None => out.push_str(value),
                    }
                }
            }
        }
        out
    }
}

/// The folder/filename template pair a plan renders with.
#[derive(Debug, Clone)]
pub struct OrganizeTemplate {
    pub name: String,
    pub folder: Template,
    pub filename: Template,
}

impl OrganizeTemplate {
    pub fn new(name: &str, folder: &str, filename: &str) -> Result<Self, OrganizeError> {
        Ok(Self {
            name: name.to_string(),
            folder: Template::parse(folder)?,
            filename: Template::parse(filename)?,
        })
    }

    /// Built-in templates selectable by name from the CLI.
    pub fn builtin(name: &str) -> Option<Self> {
        let (folder, filename) = match name {
            "by-system" => ("{system}", "{name:safe}.{extension}"),
            "by-system-region" => ("{system}/{region}", "{name:safe}.{extension}"),
            "by-region" => ("{region}", "{name:safe}.{extension}"),
            "flat" => ("", "{name:safe}.{extension}"),
            "by-letter" => ("{system_short}", "{name:safe}.{extension}"),
            _ => return None,
        };
        Self::new(name, folder, filename).ok()
    }
}

/// Values a template draws from, built per file.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub name: String,
    pub extension: String,
    pub system: String,
    pub system_short: String,
    pub region: String,
    pub region_short: String,
    pub languages: String,
    pub clean_name: String,
    pub category: String,
}

impl TemplateContext {
    fn value(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::Name => &self.name,
            Placeholder::Extension => &self.extension,
            Placeholder::System => &self.system,
            Placeholder::SystemShort => &self.system_short,
            Placeholder::Region => &self.region,
            Placeholder::RegionShort => &self.region_short,
            Placeholder::Languages => &self.languages,
            Placeholder::CleanName => &self.clean_name,
            Placeholder::Category => &self.category,
        }
    }

    /// Populate from a filename: tags are parsed out of the stem and the
    /// system inferred from the extension.
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let parsed = name_parser::parse_name(stem);
        let (system, system_short) = system_for_extension(&extension);
        let region = parsed.regions.first().cloned().unwrap_or_default();

        Self {
            name: stem.to_string(),
            extension,
            system: system.to_string(),
            system_short: system_short.to_string(),
            region_short: region_short(&region).to_string(),
            region,
            languages: parsed.languages_string().unwrap_or_default(),
            clean_name: name_parser::clean_name(stem),
            category: release_category(&parsed).unwrap_or_default(),
        }
    }
}

/// Infer a system from a ROM file extension.
fn system_for_extension(ext: &str) -> (&'static str, &'static str) {
    match ext {
        "nes" | "fds" | "unf" => ("Nintendo Entertainment System", "NES"),
        "sfc" | "smc" | "swc" | "fig" => ("Super Nintendo Entertainment System", "SNES"),
        "gb" => ("Game Boy", "GB"),
        "gbc" => ("Game Boy Color", "GBC"),
        "gba" => ("Game Boy Advance", "GBA"),
        "n64" | "z64" | "v64" => ("Nintendo 64", "N64"),
        "nds" => ("Nintendo DS", "NDS"),
        "gen" | "md" | "smd" => ("Sega Genesis", "Genesis"),
        "sms" => ("Sega Master System", "SMS"),
        "gg" => ("Sega Game Gear", "GG"),
        "32x" => ("Sega 32X", "32X"),
        "pce" => ("PC Engine", "PCE"),
        "a26" => ("Atari 2600", "A2600"),
        "a78" => ("Atari 7800", "A7800"),
        "lnx" => ("Atari Lynx", "Lynx"),
        "ws" | "wsc" => ("WonderSwan", "WS"),
        _ => ("", ""),
    }
}

/// The release category for folder grouping; dump-quality flags like
/// `[!]` or `[b]` are not categories.
fn release_category(parsed: &name_parser::ParsedName) -> Option<String> {
    use rom_steward_catalog::DumpFlag;
    parsed.flags.iter().find_map(|f| match f {
        DumpFlag::Unlicensed => Some("Unlicensed".to_string()),
        DumpFlag::Prototype => Some("Prototype".to_string()),
        DumpFlag::Beta => Some("Beta".to_string()),
        DumpFlag::Sample => Some("Sample".to_string()),
        DumpFlag::Demo => Some("Demo".to_string()),
        DumpFlag::PublicDomain => Some("Public Domain".to_string()),
        _ => None,
    })
}

/// Compact region code for folder names.
fn region_short(region: &str) -> &'static str {
    match region.to_lowercase().as_str() {
        "usa" => "US",
        "japan" => "JP",
        "europe" => "EU",
        "world" => "W",
        "korea" => "KR",
        "china" => "CN",
        "brazil" => "BR",
        "australia" => "AU",
        "france" => "FR",
        "germany" => "DE",
        "spain" => "ES",
        "italy" => "IT",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TemplateContext {
        TemplateContext::from_path(Path::new("Super Mario Bros. (USA) (Rev 1).nes"))
    }

    #[test]
    fn test_context_from_path() {
        let ctx = ctx();
        assert_eq!(ctx.name, "Super Mario Bros. (USA) (Rev 1)");
        assert_eq!(ctx.extension, "nes");
        assert_eq!(ctx.system, "Nintendo Entertainment System");
        assert_eq!(ctx.system_short, "NES");
        assert_eq!(ctx.region, "USA");
        assert_eq!(ctx.region_short, "US");
        assert_eq!(ctx.clean_name, "super mario bros.");
    }

    #[test]
    fn test_basic_render() {
        let t = Template::parse("{system_short}/{region}").unwrap();
        assert_eq!(t.render(&ctx()), "NES/USA");
    }

    #[test]
    fn test_modifiers() {
        let t = Template::parse("{system_short:lower}-{region:upper}").unwrap();
        assert_eq!(t.render(&ctx()), "nes-USA");
    }

    #[test]
    fn test_safe_modifier() {
        let mut c = ctx();
        c.name = "Hack/Slash: The \"Game\"?".to_string();
        let t = Template::parse("{name:safe}").unwrap();
        assert_eq!(t.render(&c), "Hack_Slash_ The _Game__");
    }

    #[test]
    fn test_unknown_placeholder_renders_empty() {
        let t = Template::parse("{system_short}/{nonsense}/{region}").unwrap();
        assert_eq!(t.unknown_placeholders(), vec!["nonsense"]);
        assert_eq!(t.render(&ctx()), "NES//USA");
    }

    #[test]
    fn test_unmatched_brace_fails() {
        let err = Template::parse("{system_short/{region}").unwrap_err();
        assert!(matches!(err, OrganizeError::TemplateParse(_)));
        assert!(Template::parse("prefix {name").is_err());
    }

    #[test]
    fn test_unknown_modifier_fails() {
        assert!(Template::parse("{name:reverse}").is_err());
    }

    #[test]
    fn test_literal_close_brace_is_literal() {
        let t = Template::parse("a}b").unwrap();
        assert_eq!(t.render(&ctx()), "a}b");
    }

    #[test]
    fn test_builtin_templates_parse() {
        for name in ["by-system", "by-system-region", "by-region", "flat"] {
            assert!(OrganizeTemplate::builtin(name).is_some(), "{name}");
        }
        assert!(OrganizeTemplate::builtin("nope").is_none());
    }
}
