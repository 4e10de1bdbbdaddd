//! Match kernel: finds candidate start offsets for one
//! signature's level-0 magic pattern in a block.

use crate::expr::{eval, parse, EvalCtx};
use crate::model::{ExprOrInt, MagicPattern, Signature};

fn find_literal(buf: &[u8], pattern: &[u8], overlap: bool) -> Vec<usize> {
    if pattern.is_empty() {
        return Vec::new();
    }
    let mut positions = Vec::new();
    let mut i = 0;
    while i + pattern.len() <= buf.len() {
        if &buf[i..i + pattern.len()] == pattern {
            positions.push(i);
            i += if overlap { 1 } else { pattern.len() };
        } else {
            i += 1;
        }
    }
    positions
}

fn find_regex(buf: &[u8], re: &regex::bytes::Regex, overlap: bool) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut start = 0;
    while start <= buf.len() {
        let Some(m) = re.find_at(buf, start) else {
            break;
        };
        positions.push(m.start());
        start = if overlap {
            m.start() + 1
        } else {
            m.end().max(m.start() + 1)
        };
    }
    positions
}

/// The level-0 `offset` field resolved to a concrete integer. In the rare
/// case it's an expression (rather than a literal), it's evaluated with no
/// previous sibling and out-of-buffer dereferences (consistent with
/// "out-of-buffer reads yield 0" — there is no buffer yet
/// to dereference against at this stage).
fn nominal_offset_field(sig: &Signature) -> i64 {
    match &sig.offset {
        ExprOrInt::Int(n) => *n,
        ExprOrInt::Expr(s) => parse(s)
            .map(|expr| {
                eval(
                    &expr,
                    &EvalCtx {
                        prev_end: 0,
                        deref: &|_off, _ty| 0,
                    },
                )
            })
            .unwrap_or(0),
    }
}

/// Find every candidate nominal start `S` for `sig` in `buf`, keeping only
/// candidates whose start falls within the block's consumed body — a match
/// straddling a block boundary is reported exactly once, by the block that
/// owns its start.
pub fn find_candidates(sig: &Signature, buf: &[u8], body_len: usize) -> Vec<usize> {
    let offset_field = nominal_offset_field(sig);
    let raw_positions = match &sig.pattern {
        MagicPattern::Literal(pat) => find_literal(buf, pat, sig.overlap_allowed),
        MagicPattern::Regex(re) => find_regex(buf, re, sig.overlap_allowed),
    };
    raw_positions
        .into_iter()
        .filter_map(|p| {
            let s = p as i64 - offset_field;
            if s >= 0 && (s as usize) < body_len {
                Some(s as usize)
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_signatures;

    #[test]
    fn literal_candidates_within_body() {
        let sigs = parse_signatures("0 string LZMA lzma data\n", 0).unwrap();
        let buf = b"xxLZMAyyyy";
        let candidates = find_candidates(&sigs[0], buf, buf.len());
        assert_eq!(candidates, vec![2]);
    }

    #[test]
    fn candidate_straddling_boundary_is_excluded() {
        let sigs = parse_signatures("0 string LZMA lzma data\n", 0).unwrap();
        let buf = b"xxxLZMA"; // "LZMA" starts at 3, body_len 5 -> start within peek only
        let candidates = find_candidates(&sigs[0], buf, 5);
        assert!(candidates.is_empty());
    }

    #[test]
    fn non_overlapping_by_default() {
        let sigs = parse_signatures("0 string AA repeat\n", 0).unwrap();
        let buf = b"AAAA";
        let candidates = find_candidates(&sigs[0], buf, buf.len());
        assert_eq!(candidates, vec![0, 2]);
    }

    #[test]
    fn overlap_tag_finds_overlapping_matches() {
        let sigs = parse_signatures("0 string AA repeated pattern{overlap}\n", 0).unwrap();
        let buf = b"AAAA";
        let candidates = find_candidates(&sigs[0], buf, buf.len());
        assert_eq!(candidates, vec![0, 1, 2]);
    }

    #[test]
    fn non_zero_offset_field_shifts_nominal_start() {
        // A magic byte at data+4 reports nominal start 4 earlier than the match.
        let mut sigs = parse_signatures("0 string AB matches at zero\n", 0).unwrap();
        sigs[0].offset = ExprOrInt::Int(4);
        let buf = b"\x00\x00\x00\x00AB";
        let candidates = find_candidates(&sigs[0], buf, buf.len());
        assert_eq!(candidates, vec![0]);
    }
}
