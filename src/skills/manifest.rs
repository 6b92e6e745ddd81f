//! Manifest parsing.
//!
//! A `SKILL.md` manifest is text optionally prefixed by a `---`-delimited
//! metadata block. The block parses as YAML; recognized keys populate the
//! skill's identity and requirements, unrecognized keys are ignored. The
//! body is then mined for an action vocabulary with a rule-ordered set of
//! best-effort pattern matches (explicit markers > declarations > verb
//! headings); the behavior is pinned by literal fixtures below rather
//! than re-derived.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::error::SkillError;
use super::skill::SkillRequirements;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Raw metadata block of a manifest. All fields optional at parse time;
/// name and description are enforced when the skill is built.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SkillManifest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub emoji: Option<String>,
    /// Skill-specific environment variables forwarded to invocations.
    pub env: std::collections::HashMap<String, String>,
    #[serde(flatten)]
    pub requirements: SkillRequirements,
}

/// A parsed manifest: metadata (possibly empty) plus documentation body.
#[derive(Debug, Clone)]
pub struct ParsedManifest {
    pub meta: SkillManifest,
    pub body: String,
}

/// Parse manifest text into metadata and body.
///
/// No opening delimiter means "no metadata — the whole document is
/// body". An opening delimiter with no closing one is a malformed-
/// metadata error, never silently treated as body-only.
pub fn parse_manifest(content: &str, path: &str) -> Result<ParsedManifest, SkillError> {
    let Some(rest) = strip_opening_delimiter(content) else {
        return Ok(ParsedManifest {
            meta: SkillManifest::default(),
            body: content.to_string(),
        });
    };

    let Some((block, body)) = split_at_closing_delimiter(rest) else {
        return Err(SkillError::MalformedMetadata {
            path: path.to_string(),
            message: "metadata block opened with '---' but never closed".to_string(),
        });
    };

    let meta: SkillManifest =
        serde_yaml::from_str(block).map_err(|source| SkillError::InvalidMetadata {
            path: path.to_string(),
            source,
        })?;

    Ok(ParsedManifest {
        meta,
        body: body.trim_start_matches(['\r', '\n']).to_string(),
    })
}

/// The delimiter must be the literal first line of the document.
fn strip_opening_delimiter(content: &str) -> Option<&str> {
    content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
}

/// Find the closing `---` line; returns (metadata block, remaining body).
fn split_at_closing_delimiter(rest: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']).trim() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

// ---------------------------------------------------------------------------
// Action vocabulary mining
// ---------------------------------------------------------------------------

/// Verb stems that mark a sub-heading as naming an action.
pub const ACTION_VERB_STEMS: &[&str] = &[
    "search", "read", "send", "list", "get", "fetch", "check", "run", "create", "update",
    "delete", "status", "current", "forecast", "help", "show", "start", "stop", "sync",
    "post", "convert", "play",
];

lazy_static! {
    /// Explicit `action:` / `command:` / `do:` / `execute:` markers.
    static ref EXPLICIT_MARKER: Regex =
        Regex::new(r"(?mi)^\s*(?:action|command|do|execute):\s*`?([A-Za-z][A-Za-z0-9 _-]*?)`?\s*$")
            .expect("explicit marker regex");
    /// Backticked function/command-like declarations: `name(...)`.
    static ref DECLARATION: Regex =
        Regex::new(r"`([A-Za-z_][A-Za-z0-9_-]*)\s*\(").expect("declaration regex");
    /// Markdown sub-headings.
    static ref SUB_HEADING: Regex = Regex::new(r"(?m)^#{2,6}\s+(.+)$").expect("heading regex");
}

/// Mine the manifest body for the skill's action vocabulary.
///
/// Rule order is the precedence order: explicit markers first, then
/// declarations, then verb-bearing sub-headings. Identifiers are
/// case-folded, whitespace-normalized, and de-duplicated preserving
/// first appearance.
pub fn extract_actions(body: &str) -> Vec<String> {
    let mut actions: Vec<String> = Vec::new();

    for cap in EXPLICIT_MARKER.captures_iter(body) {
        push_unique(&mut actions, normalize_action(&cap[1]));
    }

    for cap in DECLARATION.captures_iter(body) {
        push_unique(&mut actions, normalize_action(&cap[1]));
    }

    for cap in SUB_HEADING.captures_iter(body) {
        for word in cap[1].split_whitespace() {
            let word = normalize_action(word.trim_matches(|c: char| !c.is_alphanumeric()));
            if ACTION_VERB_STEMS.contains(&word.as_str()) {
                push_unique(&mut actions, word);
            }
        }
    }

    actions
}

/// Case-fold and collapse internal whitespace runs to underscores.
fn normalize_action(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn push_unique(actions: &mut Vec<String>, action: String) {
    if !action.is_empty() && !actions.iter().any(|a| *a == action) {
        actions.push(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_delimiter_is_body_only() {
        let parsed = parse_manifest("Just documentation.\nNo metadata.", "SKILL.md").unwrap();
        assert!(parsed.meta.name.is_none());
        assert_eq!(parsed.body, "Just documentation.\nNo metadata.");
    }

    #[test]
    fn test_metadata_block_parses_recognized_keys() {
        let text = "---\nname: weather\ndescription: get forecasts\nemoji: \"🌤\"\nallBins: [curl]\nunknownKey: ignored\n---\nBody text.\n";
        let parsed = parse_manifest(text, "SKILL.md").unwrap();
        assert_eq!(parsed.meta.name.as_deref(), Some("weather"));
        assert_eq!(parsed.meta.description.as_deref(), Some("get forecasts"));
        assert_eq!(parsed.meta.emoji.as_deref(), Some("🌤"));
        assert_eq!(parsed.meta.requirements.all_bins, vec!["curl"]);
        assert_eq!(parsed.body, "Body text.\n");
    }

    #[test]
    fn test_unterminated_block_is_malformed() {
        let err = parse_manifest("---\nname: broken\nno closing line", "SKILL.md").unwrap_err();
        assert!(matches!(err, SkillError::MalformedMetadata { .. }));
    }

    #[test]
    fn test_delimiter_not_at_start_is_body() {
        let text = "intro\n---\nname: x\n---\n";
        let parsed = parse_manifest(text, "SKILL.md").unwrap();
        assert!(parsed.meta.name.is_none());
        assert_eq!(parsed.body, text);
    }

    #[test]
    fn test_closing_delimiter_at_eof_without_newline() {
        let parsed = parse_manifest("---\nname: x\ndescription: y\n---", "SKILL.md").unwrap();
        assert_eq!(parsed.meta.name.as_deref(), Some("x"));
        assert!(parsed.body.is_empty());
    }

    // -- action mining fixtures, pinned literally ---------------------------

    #[test]
    fn test_explicit_markers_take_precedence() {
        let body = "## Search the web\n\naction: lookup\ncommand: send message\n";
        let actions = extract_actions(body);
        assert_eq!(actions, vec!["lookup", "send_message", "search"]);
    }

    #[test]
    fn test_declarations_extracted_from_backticks() {
        let body = "Call `forecast(location)` or `get_status()` to begin.\n";
        let actions = extract_actions(body);
        assert_eq!(actions, vec!["forecast", "get_status"]);
    }

    #[test]
    fn test_verb_headings_extracted() {
        let body = "## Current\nnow\n\n### Checking Things\n\n## Unrelated Heading\n";
        let actions = extract_actions(body);
        assert_eq!(actions, vec!["current"]);
    }

    #[test]
    fn test_actions_deduplicated_case_folded() {
        let body = "action: Search\n\n## Search\n\n`search(query)`\n";
        assert_eq!(extract_actions(body), vec!["search"]);
    }

    #[test]
    fn test_empty_body_yields_no_actions() {
        assert!(extract_actions("").is_empty());
    }
}
