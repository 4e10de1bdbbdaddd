//! `extract.conf` rule file parsing (ported from
//! `extractor.py`'s `parse_extract_config`).
//!
//! Line format: `regex:extension[:cmd[:codes[:recurse]]]`. `#` starts a
//! comment; blank lines are skipped.

use binlore_common::Error;
use regex::Regex;

const RULE_DELIM: char = ':';
const COMMENT_DELIM: char = '#';

/// One parsed `extract.conf` line.
#[derive(Debug, Clone)]
pub struct ExtractRule {
    pub regex: Regex,
    pub extension: String,
    pub cmd: Option<String>,
    /// Exit codes that mark `cmd` successful. `None` means "any code
    /// succeeds", the rule file's default of `{0, any}`.
    pub codes: Option<Vec<i32>>,
    pub recurse: bool,
}

fn parse_codes(field: &str) -> Result<Option<Vec<i32>>, Error> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    let mut codes = Vec::new();
    for part in field.split(',') {
        let part = part.trim();
        if part.eq_ignore_ascii_case("any") {
            return Ok(None);
        }
        let value = if let Some(hex) = part.strip_prefix("0x").or_else(|| part.strip_prefix("0X")) {
            i32::from_str_radix(hex, 16)
        } else {
            part.parse::<i32>()
        }
        .map_err(|_| Error::Module(format!("bad extract.conf exit code `{part}`")))?;
        codes.push(value);
    }
    Ok(Some(codes))
}

fn parse_line(line: &str) -> Result<Option<ExtractRule>, Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(COMMENT_DELIM) {
        return Ok(None);
    }
    // Mirrors `rule.strip().split(RULE_DELIM, 4)`: at most 4 splits, so a
    // `cmd` field containing `:` only keeps it intact if there's no
    // trailing `codes`/`recurse` field to compete with for delimiters.
    let fields: Vec<&str> = line.splitn(5, RULE_DELIM).collect();
    if fields.len() < 2 {
        return Err(Error::Module(format!(
            "extract.conf line needs at least `regex{RULE_DELIM}extension`: `{line}`"
        )));
    }
    let regex = Regex::new(fields[0])
        .map_err(|e| Error::Module(format!("extract.conf regex `{}`: {e}", fields[0])))?;
    let extension = fields[1].to_string();
    let cmd = fields.get(2).filter(|s| !s.is_empty()).map(|s| s.to_string());
    let codes = match fields.get(3) {
        Some(field) => parse_codes(field)?,
        None => None,
    };
    let recurse = fields
        .get(4)
        .is_some_and(|s| s.eq_ignore_ascii_case("true"));

    Ok(Some(ExtractRule {
        regex,
        extension,
        cmd,
        codes,
        recurse,
    }))
}

/// Parse an `extract.conf` file's full text into its rule set, in file order
/// (earlier rules are tried first when several match a description).
pub fn parse_rules(text: &str) -> Result<Vec<ExtractRule>, Error> {
    let mut rules = Vec::new();
    for line in text.lines() {
        if let Some(rule) = parse_line(line)? {
            rules.push(rule);
        }
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_regex_and_extension_only() {
        let rules = parse_rules("^LZMA compressed:lzma\n").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].extension, "lzma");
        assert!(rules[0].cmd.is_none());
        assert!(rules[0].codes.is_none());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let rules = parse_rules("# a comment\n\n^Zip archive:zip\n").unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn parses_cmd_with_codes_and_recurse() {
        let rules =
            parse_rules("^Squashfs filesystem:squashfs:unsquashfs -f -d %%squashfs-root%% %e:0,1:true\n")
                .unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0].recurse);
    }

    #[test]
    fn rejects_bad_exit_code() {
        assert!(parse_codes("0,nope").is_err());
    }

    #[test]
    fn accepts_hex_exit_code() {
        assert_eq!(parse_codes("0x00,0x01").unwrap(), Some(vec![0, 1]));
    }

    #[test]
    fn any_keyword_means_no_code_filter() {
        assert_eq!(parse_codes("any").unwrap(), None);
    }
}
