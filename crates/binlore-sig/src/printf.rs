//! A restricted `printf`-style renderer for rule-line format strings and
//! tag templates. Supports the conversions the signature corpus actually
//! uses: `%d %i %u %x %X %o %c %s`, with `0`/`-`/`+`/`#` flags, a width,
//! and a `.precision` on `%s`. Length modifiers (`l`, `ll`, `h`) are
//! accepted and ignored.

/// The single matched value substituted into every `%` conversion in a
/// template (a rule-line format has at most one datum to report).
#[derive(Debug, Clone)]
pub enum Datum {
    Int(i64),
    Str(String),
}

impl Datum {
    fn as_int(&self) -> i64 {
        match self {
            Self::Int(n) => *n,
            Self::Str(s) => s.parse().unwrap_or(0),
        }
    }

    fn as_str(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(n) => n.to_string(),
        }
    }
}

fn pad(s: String, width: usize, zero_pad: bool, left_align: bool) -> String {
    if s.len() >= width {
        return s;
    }
    let fill = width - s.len();
    if left_align {
        format!("{s}{}", " ".repeat(fill))
    } else if zero_pad {
        let (sign, rest) = if let Some(stripped) = s.strip_prefix('-') {
            ("-", stripped)
        } else {
            ("", s.as_str())
        };
        format!("{sign}{}{rest}", "0".repeat(fill))
    } else {
        format!("{}{s}", " ".repeat(fill))
    }
}

pub fn render(template: &str, datum: &Datum) -> String {
    let mut chars = template.chars().peekable();
    let mut out = String::new();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut zero_pad = false;
        let mut left_align = false;
        let mut plus = false;
        let mut alt = false;
        loop {
            match chars.peek() {
                Some('0') => {
                    zero_pad = true;
                    chars.next();
                }
                Some('-') => {
                    left_align = true;
                    chars.next();
                }
                Some('+') => {
                    plus = true;
                    chars.next();
                }
                Some('#') => {
                    alt = true;
                    chars.next();
                }
                _ => break,
            }
        }

        let mut width_str = String::new();
        while let Some(d) = chars.peek() {
            if d.is_ascii_digit() {
                width_str.push(*d);
                chars.next();
            } else {
                break;
            }
        }
        let width: usize = width_str.parse().unwrap_or(0);

        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = String::new();
            while let Some(d) = chars.peek() {
                if d.is_ascii_digit() {
                    p.push(*d);
                    chars.next();
                } else {
                    break;
                }
            }
            precision = Some(p.parse().unwrap_or(0));
        }

        while matches!(chars.peek(), Some('l') | Some('h') | Some('z')) {
            chars.next();
        }

        let Some(conv) = chars.next() else {
            break;
        };

        let piece = match conv {
            'd' | 'i' => {
                let n = datum.as_int();
                let mut s = n.to_string();
                if plus && n >= 0 {
                    s = format!("+{s}");
                }
                pad(s, width, zero_pad, left_align)
            }
            'u' => pad((datum.as_int() as u64).to_string(), width, zero_pad, left_align),
            'x' => {
                let n = datum.as_int() as u64;
                let s = if alt { format!("0x{n:x}") } else { format!("{n:x}") };
                pad(s, width, zero_pad, left_align)
            }
            'X' => {
                let n = datum.as_int() as u64;
                let s = if alt { format!("0X{n:X}") } else { format!("{n:X}") };
                pad(s, width, zero_pad, left_align)
            }
            'o' => pad(format!("{:o}", datum.as_int() as u64), width, zero_pad, left_align),
            'c' => char::from_u32(datum.as_int() as u32).map(String::from).unwrap_or_default(),
            's' => {
                let mut s = datum.as_str();
                if let Some(p) = precision {
                    s.truncate(p);
                }
                pad(s, width, false, left_align)
            }
            _ => String::new(),
        };
        out.push_str(&piece);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_with_width_and_zero_pad() {
        assert_eq!(render("0x%.2x", &Datum::Int(0x5D)), "0x5d");
        assert_eq!(render("%08X", &Datum::Int(0xFF)), "000000FF");
    }

    #[test]
    fn string_with_precision() {
        assert_eq!(render("name: %.3s", &Datum::Str("hello".to_string())), "name: hel");
    }

    #[test]
    fn literal_percent_is_preserved() {
        assert_eq!(render("100%% done", &Datum::Int(0)), "100% done");
    }

    #[test]
    fn decimal_with_plus_flag() {
        assert_eq!(render("%+d", &Datum::Int(5)), "+5");
    }
}
