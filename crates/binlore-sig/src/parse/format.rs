//! Tag-marker extraction from a rule-line's format string:
//! `{tag}` and `{tag:template}` are pulled out of the format
//! before it is used as a `printf`-style template.

use std::sync::OnceLock;

use regex::Regex;

fn tag_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)(?::([^}]*))?\}").unwrap())
}

/// Returns the format string with all `{tag}`/`{tag:value}` markers
/// removed, plus the extracted `(name, template)` pairs in source order.
/// A bare `{tag}` yields an empty template string.
pub fn extract_tags(format: &str) -> (String, Vec<(String, String)>) {
    let mut tags = Vec::new();
    let cleaned = tag_marker_re()
        .replace_all(format, |caps: &regex::Captures<'_>| {
            let name = caps[1].to_string();
            let template = caps.get(2).map_or_else(String::new, |m| m.as_str().to_string());
            tags.push((name, template));
            ""
        })
        .into_owned();
    (cleaned, tags)
}
