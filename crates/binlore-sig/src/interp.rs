//! Rule interpreter: walks a signature's hierarchy at one
//! candidate start, producing a formatted description and tag map.

use std::path::Path;
use std::sync::OnceLock;

use binlore_common::{ScanResult, Tags};
use regex::Regex;

use crate::expr::{eval, parse, DerefType, EvalCtx};
use crate::model::{Condition, DataType, Endian, ExprOrInt, IntWidth, Line, Operator, Signature, Value};
use crate::printf::{self, Datum};

fn backspace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r".\x08").unwrap())
}

/// Unpack `width` bytes at absolute position `abs` in `buf`; out-of-range
/// reads yield 0 rather than an error, the same way a dereference past the
/// peek window does.
fn read_int(buf: &[u8], abs: i64, width: usize, signed: bool, endian: Endian) -> i64 {
    if abs < 0 {
        return 0;
    }
    let start = abs as usize;
    let Some(end) = start.checked_add(width) else {
        return 0;
    };
    if end > buf.len() {
        return 0;
    }
    let mut bytes = [0u8; 8];
    match endian {
        Endian::Big => bytes[8 - width..].copy_from_slice(&buf[start..end]),
        Endian::Little => bytes[..width].copy_from_slice(&buf[start..end]),
    }
    let raw = match endian {
        Endian::Big => u64::from_be_bytes(bytes),
        Endian::Little => u64::from_le_bytes(bytes),
    };
    if signed && width < 8 {
        let shift = 64 - width * 8;
        (((raw << shift) as i64) >> shift) as i64
    } else {
        raw as i64
    }
}

fn deref_params(ty: DerefType) -> (usize, bool, Endian) {
    match ty {
        DerefType::Byte => (1, true, Endian::Big),
        DerefType::UByte => (1, false, Endian::Big),
        DerefType::ShortLe => (2, false, Endian::Little),
        DerefType::ShortBe => (2, false, Endian::Big),
        DerefType::LongLe => (4, false, Endian::Little),
        DerefType::LongBe => (4, false, Endian::Big),
    }
}

/// Resolve an offset/operand expression relative to the candidate start `s`
/// (`(E.t)` dereferences relative to the current match start,
/// `&` is the previous sibling line's consumed end).
fn resolve(e: &ExprOrInt, prev_line_end: i64, buf: &[u8], s: i64) -> i64 {
    match e {
        ExprOrInt::Int(n) => *n,
        ExprOrInt::Expr(src) => parse(src)
            .map(|expr| {
                eval(
                    &expr,
                    &EvalCtx {
                        prev_end: prev_line_end,
                        deref: &|off, ty| {
                            let (width, signed, endian) = deref_params(ty);
                            read_int(buf, s + off, width, signed, endian)
                        },
                    },
                )
            })
            .unwrap_or(0),
    }
}

fn read_wildcard_bytes(buf: &[u8], abs: i64, limit: usize) -> Vec<u8> {
    if abs < 0 {
        return Vec::new();
    }
    let start = abs as usize;
    if start >= buf.len() {
        return Vec::new();
    }
    let end = start.saturating_add(limit).min(buf.len());
    let mut out = Vec::new();
    for &b in &buf[start..end] {
        if b == 0 || b == b'\r' || b == b'\n' {
            break;
        }
        out.push(b);
    }
    out
}

fn read_fixed_bytes(buf: &[u8], abs: i64, size: usize) -> Vec<u8> {
    if abs < 0 {
        return Vec::new();
    }
    let start = abs as usize;
    if start >= buf.len() {
        return Vec::new();
    }
    let end = start.saturating_add(size).min(buf.len());
    buf[start..end].to_vec()
}

fn apply_operator(value: i64, op: Operator, opval: i64) -> i64 {
    match op {
        Operator::Pow => value.wrapping_pow((opval.clamp(0, 63)) as u32),
        Operator::Shl => value.wrapping_shl((opval & 63) as u32),
        Operator::Shr => value.wrapping_shr((opval & 63) as u32),
        Operator::And => value & opval,
        Operator::Or => value | opval,
        Operator::Mul => value.wrapping_mul(opval),
        Operator::Add => value.wrapping_add(opval),
        Operator::Sub => value.wrapping_sub(opval),
        Operator::Div => {
            if opval == 0 {
                0
            } else {
                value.wrapping_div(opval)
            }
        }
        // Unary override, preserved from source: `~` assigns `~opvalue`.
        Operator::Not => !opval,
        Operator::Xor => value ^ opval,
    }
}

fn compare_int(cond: Condition, lhs: i64, rhs: i64) -> bool {
    match cond {
        Condition::Eq => lhs == rhs,
        Condition::Ne => lhs != rhs,
        Condition::Gt => lhs > rhs,
        Condition::Lt => lhs < rhs,
        Condition::BitAnd => (lhs & rhs) != 0,
        Condition::BitOr => (lhs | rhs) != 0,
        Condition::BitXor => (lhs ^ rhs) != 0,
        Condition::BitNot => lhs == !rhs,
    }
}

fn compare_bytes(cond: Condition, lhs: &[u8], rhs: &[u8]) -> bool {
    match cond {
        Condition::Ne => lhs != rhs,
        _ => lhs == rhs,
    }
}

fn render_date(seconds: i64) -> String {
    chrono::DateTime::from_timestamp(seconds, 0).map_or_else(
        || "invalid timestamp".to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

/// Outcome of reading+testing one line against the buffer.
enum LineOutcome {
    /// Condition held; carries the formatting datum and bytes consumed.
    Matched { datum: Datum, consumed: usize },
    NoMatch,
}

fn evaluate_line(line: &Line, buf: &[u8], start: i64) -> LineOutcome {
    match line.data_type {
        DataType::Int { width, signed, endian } => {
            let mut value = read_int(buf, start, width.bytes(), signed, endian);
            if let Some((op, opval_expr)) = &line.operator {
                let opval = resolve(opval_expr, 0, buf, start);
                value = apply_operator(value, *op, opval);
            }
            let expected = match &line.value {
                Value::Int(n) => *n,
                Value::Wildcard => return LineOutcome::Matched { datum: Datum::Int(value), consumed: width.bytes() },
                _ => return LineOutcome::NoMatch,
            };
            if compare_int(line.condition, value, expected) {
                LineOutcome::Matched {
                    datum: Datum::Int(value),
                    consumed: width.bytes(),
                }
            } else {
                LineOutcome::NoMatch
            }
        }
        DataType::Date { endian } => {
            let width = IntWidth::Long.bytes();
            let mut value = read_int(buf, start, width, false, endian);
            if let Some((op, opval_expr)) = &line.operator {
                let opval = resolve(opval_expr, 0, buf, start);
                value = apply_operator(value, *op, opval);
            }
            let holds = match &line.value {
                Value::Wildcard => true,
                Value::Int(n) => compare_int(line.condition, value, *n),
                _ => false,
            };
            if holds {
                LineOutcome::Matched {
                    datum: Datum::Str(render_date(value)),
                    consumed: width,
                }
            } else {
                LineOutcome::NoMatch
            }
        }
        DataType::Str => {
            let read = if matches!(line.value, Value::Wildcard) {
                read_wildcard_bytes(buf, start, line.size)
            } else {
                read_fixed_bytes(buf, start, line.size)
            };
            let holds = match &line.value {
                Value::Wildcard => true,
                Value::Bytes(expected) => compare_bytes(line.condition, &read, expected),
                _ => false,
            };
            if holds {
                let consumed = read.len();
                LineOutcome::Matched {
                    datum: Datum::Str(String::from_utf8_lossy(&read).into_owned()),
                    consumed,
                }
            } else {
                LineOutcome::NoMatch
            }
        }
        DataType::Regex => {
            let Value::Regex(re) = &line.value else {
                return LineOutcome::NoMatch;
            };
            let slice = read_fixed_bytes(buf, start, line.size.max(128));
            match re.find(&slice) {
                Some(m) if m.start() == 0 => LineOutcome::Matched {
                    datum: Datum::Str(String::from_utf8_lossy(m.as_bytes()).into_owned()),
                    consumed: line.size,
                },
                _ => LineOutcome::NoMatch,
            }
        }
    }
}

/// Walk `sig` against `buf` starting at candidate offset `s`.
/// `show_invalid` controls whether a line marking the result invalid aborts
/// the candidate immediately.
pub fn interpret(
    sig: &Signature,
    buf: &[u8],
    s: usize,
    file: &Path,
    module: &str,
    show_invalid: bool,
) -> Option<ScanResult> {
    let s_i64 = s as i64;
    let mut tags = Tags::new(sig.id, s_i64);
    let mut max_level = 0u32;
    let mut prev_line_end: i64 = 0;
    let mut description_parts: Vec<String> = Vec::new();
    let mut strlen: Option<i64> = None;
    let mut result_size = sig.root().size as i64;

    for (idx, line) in sig.lines.iter().enumerate() {
        if line.level > max_level {
            continue;
        }
        let line_offset = resolve(&line.offset, prev_line_end, buf, s_i64);
        let start = s_i64 + line_offset;

        let owned_override;
        let line: &Line = if line.use_strlen && strlen.is_some() {
            owned_override = apply_strlen_override(line, strlen);
            &owned_override
        } else {
            line
        };

        let outcome = evaluate_line(line, buf, start);
        match outcome {
            LineOutcome::NoMatch => {
                if line.level == 0 {
                    return None;
                }
                max_level = line.level;
                continue;
            }
            LineOutcome::Matched { datum, consumed } => {
                if !line.format.is_empty() {
                    let rendered = printf::render(&line.format, &datum);
                    if !rendered.is_empty() {
                        description_parts.push(rendered);
                    }
                }
                for (name, template) in &line.tags {
                    let formatted = if template.contains('%') {
                        printf::render(template, &datum)
                    } else {
                        template.clone()
                    };
                    tags.set(name, formatted);
                }
                if let Some(n) = tags.strlen {
                    strlen = Some(n);
                }
                if tags.invalid && !show_invalid {
                    return None;
                }

                let has_children = sig
                    .lines
                    .get(idx + 1)
                    .is_some_and(|next| next.level > line.level);
                if has_children {
                    let consumed = match line.data_type {
                        DataType::Str => consumed,
                        _ => line.size,
                    };
                    prev_line_end = line_offset + consumed as i64;
                }
                max_level = line.level + 1;
            }
        }
    }

    let mut description = description_parts.join("");
    description = backspace_re().replace_all(&description, "").into_owned();
    if let Some(d) = &tags.description {
        description = d.clone();
    }

    let mut invalid = tags.invalid;
    let mut display = tags.display.unwrap_or(true);
    if description.is_empty() {
        display = false;
        invalid = true;
    }
    if description.bytes().any(|b| !(0x20..=0x7E).contains(&b)) {
        invalid = true;
    }
    let valid = tags.valid.unwrap_or(!invalid);

    if let Some(n) = tags.size {
        result_size = n;
    }

    Some(ScanResult {
        offset: tags.offset.max(0) as u64,
        size: result_size.max(0) as u64,
        description,
        id: sig.id,
        jump: tags.jump.unwrap_or(0),
        valid,
        display,
        extract: tags.extract.unwrap_or(false),
        plot: tags.plot.unwrap_or(false),
        overlap: sig.overlap_allowed,
        once: tags.once,
        many: tags.many,
        end: tags.end,
        adjust: tags.adjust.unwrap_or(0),
        strlen: tags.strlen.map(|n| n.max(0) as u64),
        file: file.to_path_buf(),
        module: module.to_string(),
    })
}

/// A wildcard string line honoring a previously-set `strlen` reads exactly
/// that many bytes instead of stopping at the first NUL/CR/LF. Since
/// `Line::size` already bounds the read, the override is just a capped
/// clone with the cap pinned to `strlen`.
fn apply_strlen_override(line: &Line, strlen: Option<i64>) -> Line {
    let mut cloned = line.clone();
    if let Some(n) = strlen {
        cloned.size = n.max(0) as usize;
    }
    cloned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_signatures;
    use std::path::PathBuf;

    fn file() -> PathBuf {
        PathBuf::from("firmware.bin")
    }

    #[test]
    fn simple_literal_signature_reports_description() {
        let sigs = parse_signatures("0 string LZMA LZMA compressed data\n", 0).unwrap();
        let buf = b"LZMA....";
        let result = interpret(&sigs[0], buf, 0, &file(), "sig", false).unwrap();
        assert_eq!(result.description, "LZMA compressed data");
        assert_eq!(result.offset, 0);
        assert!(result.valid);
        assert!(result.display);
    }

    #[test]
    fn child_line_appends_to_description_using_deref() {
        let text = "0 string LZMA LZMA compressed data\n\
                     >5 byte x , properties: 0x%.2x\n";
        let sigs = parse_signatures(text, 0).unwrap();
        let mut buf = b"LZMA".to_vec();
        buf.extend_from_slice(&[0, 0x5D]);
        let result = interpret(&sigs[0], &buf, 0, &file(), "sig", false).unwrap();
        assert_eq!(result.description, "LZMA compressed data, properties: 0x5d");
    }

    #[test]
    fn failing_level0_condition_yields_no_result() {
        let sigs = parse_signatures("0 string LZMA LZMA compressed data\n", 0).unwrap();
        let buf = b"NOPE....";
        assert!(interpret(&sigs[0], buf, 0, &file(), "sig", false).is_none());
    }

    #[test]
    fn failing_sublevel_condition_keeps_level0_result() {
        let text = "0 string LZMA LZMA compressed data\n\
                     >5 byte =9 never matches, extra\n";
        let sigs = parse_signatures(text, 0).unwrap();
        let mut buf = b"LZMA".to_vec();
        buf.extend_from_slice(&[0, 0, 0, 0, 0, 1]);
        let result = interpret(&sigs[0], &buf, 0, &file(), "sig", false).unwrap();
        assert_eq!(result.description, "LZMA compressed data");
    }

    #[test]
    fn invalid_tag_suppresses_result_by_default() {
        let text = "0 string LZMA LZMA compressed data{invalid:1}\n";
        let sigs = parse_signatures(text, 0).unwrap();
        let buf = b"LZMA....";
        assert!(interpret(&sigs[0], buf, 0, &file(), "sig", false).is_none());
        let shown = interpret(&sigs[0], buf, 0, &file(), "sig", true).unwrap();
        assert!(!shown.valid);
    }

    #[test]
    fn jump_tag_surfaces_on_result() {
        let text = "0 string LZMA LZMA compressed data{jump:13}\n";
        let sigs = parse_signatures(text, 0).unwrap();
        let buf = b"LZMA....";
        let result = interpret(&sigs[0], buf, 0, &file(), "sig", false).unwrap();
        assert_eq!(result.jump, 13);
    }

    #[test]
    fn empty_description_marks_invalid_and_hidden() {
        let text = "0 string LZMA \n";
        let sigs = parse_signatures(text, 0).unwrap();
        let buf = b"LZMA....";
        let result = interpret(&sigs[0], buf, 0, &file(), "sig", true).unwrap();
        assert!(!result.display);
        assert!(!result.valid);
    }

    #[test]
    fn backspace_sequences_are_stripped_from_description() {
        // A single `<char><backspace>` pair is erased (`.\b` -> ""); the
        // regex pass is not recursive, so only immediately-adjacent pairs
        // collapse.
        let text = "0 string AB AB\x08CD\n";
        let sigs = parse_signatures(text, 0).unwrap();
        let buf = b"AB......";
        let result = interpret(&sigs[0], buf, 0, &file(), "sig", false).unwrap();
        assert_eq!(result.description, "ACD");
    }
}
