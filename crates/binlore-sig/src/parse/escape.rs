//! String-value escape decoding and the `pattern*N` expansion form.

use binlore_common::ParserError;

/// Decode `\xHH`, `\\`, `\n`, `\r`, `\t`, `\0`, `\NNN` (octal), `\"` and then
/// apply a trailing `*N` repeat count if present (e.g. `"AB*3"` -> `ABABAB`).
pub fn decode_string_value(raw: &str, line_no: usize, line: &str) -> Result<Vec<u8>, ParserError> {
    let (body, repeat) = split_repeat_suffix(raw);
    let decoded = decode_escapes(body, line_no, line)?;
    if repeat <= 1 {
        return Ok(decoded);
    }
    let mut out = Vec::with_capacity(decoded.len() * repeat);
    for _ in 0..repeat {
        out.extend_from_slice(&decoded);
    }
    Ok(out)
}

fn split_repeat_suffix(raw: &str) -> (&str, usize) {
    if let Some(star) = raw.rfind('*') {
        if let Ok(n) = raw[star + 1..].parse::<usize>() {
            return (&raw[..star], n);
        }
    }
    (raw, 1)
}

fn decode_escapes(s: &str, line_no: usize, line: &str) -> Result<Vec<u8>, ParserError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        i += 1;
        let Some(&c) = bytes.get(i) else {
            return Err(ParserError {
                line_no,
                line: line.to_string(),
                message: "dangling escape at end of string value".to_string(),
            });
        };
        match c {
            b'x' => {
                let hex = bytes.get(i + 1..i + 3).ok_or_else(|| ParserError {
                    line_no,
                    line: line.to_string(),
                    message: "truncated \\xHH escape".to_string(),
                })?;
                let hex_str = std::str::from_utf8(hex).map_err(|_| ParserError {
                    line_no,
                    line: line.to_string(),
                    message: "non-ASCII \\xHH escape".to_string(),
                })?;
                let byte = u8::from_str_radix(hex_str, 16).map_err(|_| ParserError {
                    line_no,
                    line: line.to_string(),
                    message: format!("invalid hex escape \\x{hex_str}"),
                })?;
                out.push(byte);
                i += 3;
            }
            b'\\' => {
                out.push(b'\\');
                i += 1;
            }
            b'n' => {
                out.push(b'\n');
                i += 1;
            }
            b'r' => {
                out.push(b'\r');
                i += 1;
            }
            b't' => {
                out.push(b'\t');
                i += 1;
            }
            b'0' => {
                out.push(0);
                i += 1;
            }
            b'"' => {
                out.push(b'"');
                i += 1;
            }
            b' ' => {
                out.push(b' ');
                i += 1;
            }
            b'0'..=b'7' => {
                let mut j = i;
                let mut val: u32 = 0;
                while j < bytes.len() && j < i + 3 && (b'0'..=b'7').contains(&bytes[j]) {
                    val = val * 8 + u32::from(bytes[j] - b'0');
                    j += 1;
                }
                out.push((val & 0xFF) as u8);
                i = j;
            }
            other => {
                return Err(ParserError {
                    line_no,
                    line: line.to_string(),
                    message: format!("unsupported escape \\{}", other as char),
                });
            }
        }
    }
    Ok(out)
}

/// Pre-pass from escape a literal space (`\ `) to
/// `\x20` before whitespace-splitting, so an escaped space inside a value
/// token does not get treated as a field separator.
pub fn protect_escaped_spaces(line: &str) -> String {
    line.replace("\\ ", "\\x20")
}
