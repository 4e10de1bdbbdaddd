//! Integer literal parsing accepting hex (`0x`), octal (leading `0`) and
//! decimal bases.

pub fn parse_int_literal(s: &str) -> Option<i64> {
    let s = s.trim();
    let (neg, s) = s
        .strip_prefix('-')
        .map_or((false, s), |rest| (true, rest));
    let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if s.len() > 1 && s.starts_with('0') && s.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        i64::from_str_radix(&s[1..], 8).ok()?
    } else {
        s.parse::<i64>().ok()?
    };
    Some(if neg { -value } else { value })
}

/// Try an integer parse; if it fails, the caller should keep the token as
/// an unevaluated expression string.
pub fn int_or_expr(s: &str) -> crate::model::ExprOrInt {
    match parse_int_literal(s) {
        Some(n) => crate::model::ExprOrInt::Int(n),
        None => crate::model::ExprOrInt::Expr(s.to_string()),
    }
}
