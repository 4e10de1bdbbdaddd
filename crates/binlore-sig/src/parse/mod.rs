//! Rule parser: compiles textual signature files into
//! an in-memory rule set, rejecting malformed rules deterministically.

mod escape;
mod format;
mod number;
#[cfg(test)]
mod tests;

use binlore_common::ParserError;
use regex::bytes::Regex as BytesRegex;

use crate::model::{Condition, DataType, Endian, IntWidth, Line, MagicPattern, Operator, Signature, Value};
use number::{int_or_expr, parse_int_literal};

const OPERATOR_CHARS: &[(&str, Operator)] = &[
    ("**", Operator::Pow),
    ("<<", Operator::Shl),
    (">>", Operator::Shr),
    ("&", Operator::And),
    ("|", Operator::Or),
    ("*", Operator::Mul),
    ("+", Operator::Add),
    ("-", Operator::Sub),
    ("/", Operator::Div),
    ("~", Operator::Not),
    ("^", Operator::Xor),
];

const CONDITION_CHARS: &[(char, Condition)] = &[
    ('=', Condition::Eq),
    ('!', Condition::Ne),
    ('>', Condition::Gt),
    ('<', Condition::Lt),
    ('&', Condition::BitAnd),
    ('|', Condition::BitOr),
    ('^', Condition::BitXor),
    ('~', Condition::BitNot),
];

struct RawLine<'a> {
    level: u32,
    offset_tok: &'a str,
    type_tok: &'a str,
    cond_value_tok: &'a str,
    format_tok: &'a str,
}

fn split_line(line: &str) -> Option<RawLine<'_>> {
    let trimmed = line.trim_start();
    let level = trimmed.bytes().take_while(|&b| b == b'>').count() as u32;
    let rest = &trimmed[level as usize..];
    let mut parts = rest.splitn(4, char::is_whitespace);
    let offset_tok = parts.next()?;
    let type_tok = parts.next()?;
    let cond_value_tok = parts.next()?;
    let format_tok = parts.next().unwrap_or("").trim_start();
    Some(RawLine {
        level,
        offset_tok,
        type_tok,
        cond_value_tok,
        format_tok,
    })
}

fn split_operator(type_tok: &str) -> (&str, Option<(Operator, &str)>) {
    // Longest operator tokens first so `**`/`<<`/`>>` aren't mistaken for
    // their single-character prefixes.
    for (sym, op) in OPERATOR_CHARS {
        if let Some(idx) = type_tok.find(sym) {
            if idx == 0 {
                continue; // the type name itself can't be empty
            }
            let (ty, rest) = type_tok.split_at(idx);
            return (ty, Some((*op, &rest[sym.len()..])));
        }
    }
    (type_tok, None)
}

fn parse_data_type(raw: &str, line_no: usize, line: &str) -> Result<DataType, ParserError> {
    let (unsigned, raw) = raw
        .strip_prefix('u')
        .map_or((false, raw), |rest| (true, rest));
    let (endian, raw) = if let Some(rest) = raw.strip_prefix("be") {
        (Endian::Big, rest)
    } else if let Some(rest) = raw.strip_prefix("le") {
        (Endian::Little, rest)
    } else {
        (Endian::Big, raw)
    };
    let width = match raw {
        "byte" | "b" => Some(IntWidth::Byte),
        "short" | "s" => Some(IntWidth::Short),
        "long" | "l" => Some(IntWidth::Long),
        "quad" | "q" => Some(IntWidth::Quad),
        _ => None,
    };
    if let Some(width) = width {
        return Ok(DataType::Int {
            width,
            signed: !unsigned,
            endian,
        });
    }
    match raw {
        "string" => Ok(DataType::Str),
        "regex" => Ok(DataType::Regex),
        "date" => Ok(DataType::Date { endian }),
        other => Err(ParserError {
            line_no,
            line: line.to_string(),
            message: format!("unknown type `{other}`"),
        }),
    }
}

fn parse_value(
    raw: &str,
    data_type: DataType,
    line_no: usize,
    line: &str,
) -> Result<Value, ParserError> {
    if raw == "x" {
        return Ok(Value::Wildcard);
    }
    match data_type {
        DataType::Str => Ok(Value::Bytes(escape::decode_string_value(raw, line_no, line)?)),
        DataType::Regex => BytesRegex::new(raw)
            .map(Value::Regex)
            .map_err(|e| ParserError {
                line_no,
                line: line.to_string(),
                message: format!("invalid regex `{raw}`: {e}"),
            }),
        DataType::Int { .. } | DataType::Date { .. } => {
            parse_int_literal(raw).map(Value::Int).ok_or_else(|| ParserError {
                line_no,
                line: line.to_string(),
                message: format!("invalid integer value `{raw}`"),
            })
        }
    }
}

fn value_size(value: &Value, data_type: DataType) -> usize {
    match data_type {
        DataType::Int { width, .. } => width.bytes(),
        DataType::Date { .. } => 4,
        DataType::Str => match value {
            Value::Bytes(b) => b.len(),
            _ => 128,
        },
        DataType::Regex => 128,
    }
}

/// Compile one textual rule-line. `saw_level0` tracks whether a level-0
/// line has already been seen in this signature run, to reject an orphan
/// sub-line.
fn compile_line(raw: &str, line_no: usize, saw_level0: bool) -> Result<Option<Line>, ParserError> {
    let trimmed = raw.trim_end();
    if trimmed.trim().is_empty() || trimmed.trim_start().starts_with('#') {
        return Ok(None);
    }
    if trimmed.trim_start().starts_with('!') {
        // `!`-directives are unsupported; rejected silently per line.
        return Ok(None);
    }
    let protected = escape::protect_escaped_spaces(trimmed);
    let raw_line = split_line(&protected).ok_or_else(|| ParserError {
        line_no,
        line: raw.to_string(),
        message: "expected `<offset> <type> <condition><value> [format]`".to_string(),
    })?;

    if raw_line.level > 0 && !saw_level0 {
        return Err(ParserError {
            line_no,
            line: raw.to_string(),
            message: "sub-line with no preceding level-0 line".to_string(),
        });
    }

    let offset = int_or_expr(raw_line.offset_tok);

    let (type_part, op_part) = split_operator(raw_line.type_tok);
    let data_type = parse_data_type(type_part, line_no, raw)?;
    let operator = op_part
        .map(|(op, opval)| -> Result<_, ParserError> { Ok((op, int_or_expr(opval))) })
        .transpose()?;

    let mut chars = raw_line.cond_value_tok.chars();
    let (condition, value_tok) = match chars.next() {
        Some(c) if CONDITION_CHARS.iter().any(|(ch, _)| *ch == c) => {
            let cond = CONDITION_CHARS.iter().find(|(ch, _)| *ch == c).unwrap().1;
            (cond, chars.as_str())
        }
        _ => (Condition::Eq, raw_line.cond_value_tok),
    };
    let value = parse_value(value_tok, data_type, line_no, raw)?;
    if raw_line.level == 0 && matches!(value, Value::Wildcard) {
        return Err(ParserError {
            line_no,
            line: raw.to_string(),
            message: "level-0 line must not be a wildcard".to_string(),
        });
    }

    let size = data_type
        .fixed_size()
        .unwrap_or_else(|| value_size(&value, data_type));

    let (format, tags) = format::extract_tags(raw_line.format_tok);
    let use_strlen = tags.iter().any(|(name, _)| name == "string");

    Ok(Some(Line {
        level: raw_line.level,
        offset,
        data_type,
        operator,
        condition,
        value,
        size,
        format,
        tags,
        use_strlen,
    }))
}

/// Proper-prefix-is-also-suffix self-overlap check.
fn is_self_overlapping(pattern: &[u8]) -> bool {
    let len = pattern.len();
    (1..len).any(|i| pattern[i..] == pattern[..len - i])
}

fn line0_magic_pattern(line: &Line, line_no: usize, raw: &str) -> Result<MagicPattern, ParserError> {
    match &line.value {
        Value::Regex(r) => Ok(MagicPattern::Regex(r.clone())),
        Value::Bytes(b) => Ok(MagicPattern::Literal(b.clone())),
        Value::Int(n) => {
            let DataType::Int { width, endian, .. } = line.data_type else {
                return Err(ParserError {
                    line_no,
                    line: raw.to_string(),
                    message: "date-typed level-0 line needs an explicit magic pattern".to_string(),
                });
            };
            let bytes = match endian {
                Endian::Big => n.to_be_bytes(),
                Endian::Little => n.to_le_bytes(),
            };
            let start = bytes.len() - width.bytes();
            Ok(MagicPattern::Literal(bytes[start..].to_vec()))
        }
        Value::Wildcard => unreachable!("level-0 wildcard rejected earlier"),
    }
}

/// Compile every signature in one signature-file's text. Each level-0 line
/// begins a new signature — the sole signature delimiter. `id_start` lets
/// a multi-file loader keep ids dense across files.
pub fn parse_signatures(text: &str, id_start: u32) -> Result<Vec<Signature>, ParserError> {
    let mut signatures = Vec::new();
    let mut current: Option<Vec<Line>> = None;
    let mut next_id = id_start;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let saw_level0 = current.is_some();
        let Some(line) = compile_line(raw_line, line_no, saw_level0)? else {
            continue;
        };
        if line.level == 0 {
            if let Some(lines) = current.take() {
                signatures.push(finish_signature(lines, next_id, line_no, raw_line)?);
                next_id += 1;
            }
            current = Some(vec![line]);
        } else {
            current
                .as_mut()
                .expect("sub-line without level-0 rejected above")
                .push(line);
        }
    }
    if let Some(lines) = current.take() {
        signatures.push(finish_signature(lines, next_id, text.lines().count(), "")?);
    }

    signatures.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    Ok(signatures)
}

fn finish_signature(
    lines: Vec<Line>,
    id: u32,
    line_no: usize,
    raw: &str,
) -> Result<Signature, ParserError> {
    let root = &lines[0];
    let pattern = line0_magic_pattern(root, line_no, raw)?;

    let mut confidence = root.size as i64;
    let mut overlap_allowed = false;
    for (name, template) in &root.tags {
        match name.as_str() {
            "confidence" => {
                if let Some(n) = parse_int_literal(template) {
                    confidence = n;
                }
            }
            "overlap" => overlap_allowed = true,
            _ => {}
        }
    }
    if !overlap_allowed {
        if let MagicPattern::Literal(b) = &pattern {
            if is_self_overlapping(b) {
                tracing::warn!(
                    pattern = ?String::from_utf8_lossy(b),
                    "self-overlapping magic pattern without {{overlap}} tag",
                );
            }
        }
    }

    let offset = root.offset.clone();
    let title = root.format.clone();
    Ok(Signature {
        id,
        lines,
        pattern,
        title,
        confidence,
        offset,
        overlap_allowed,
    })
}

/// Drop signatures whose title matches an exclude filter; if include
/// filters are present, keep only signatures matching at least one of them.
pub fn apply_title_filters(
    signatures: Vec<Signature>,
    include: &[BytesRegex],
    exclude: &[BytesRegex],
) -> Vec<Signature> {
    signatures
        .into_iter()
        .filter(|s| !exclude.iter().any(|re| re.is_match(s.title.as_bytes())))
        .filter(|s| include.is_empty() || include.iter().any(|re| re.is_match(s.title.as_bytes())))
        .collect()
}
