//! Compiled rule-line and signature records.

use regex::bytes::Regex;

/// Read width for an integer-typed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    Byte = 1,
    Short = 2,
    Long = 4,
    Quad = 8,
}

impl IntWidth {
    #[must_use]
    pub fn bytes(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// `data_type`: integer variants carry width/sign/endianness;
/// `string`/`regex`/`date` are their own variants rather than attribute
/// probes on a single generic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int {
        width: IntWidth,
        signed: bool,
        endian: Endian,
    },
    Str,
    Regex,
    Date {
        endian: Endian,
    },
}

impl DataType {
    /// Size for types whose width doesn't depend on the parsed value
    /// (string/regex size are computed separately by the parser).
    #[must_use]
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Int { width, .. } => Some(width.bytes()),
            Self::Date { .. } => Some(4),
            Self::Str | Self::Regex => None,
        }
    }
}

/// One of `** << >> & | * + - / ~ ^` applied to the read value before
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Pow,
    Shl,
    Shr,
    And,
    Or,
    Mul,
    Add,
    Sub,
    Div,
    Not,
    Xor,
}

/// The comparison applied to the read value; default is `Eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Gt,
    Lt,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
}

impl Default for Condition {
    fn default() -> Self {
        Self::Eq
    }
}

/// An offset or operand, either resolved at parse time or left as an
/// expression to evaluate per-candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprOrInt {
    Int(i64),
    Expr(String),
}

/// The parsed `value` token. `Wildcard` always matches.
#[derive(Debug, Clone)]
pub enum Value {
    Wildcard,
    Int(i64),
    Bytes(Vec<u8>),
    Regex(Regex),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Wildcard, Self::Wildcard) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Regex(a), Self::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

/// A compiled rule-line.
#[derive(Debug, Clone)]
pub struct Line {
    pub level: u32,
    pub offset: ExprOrInt,
    pub data_type: DataType,
    pub operator: Option<(Operator, ExprOrInt)>,
    pub condition: Condition,
    pub value: Value,
    pub size: usize,
    pub format: String,
    /// Raw `{tag}` / `{tag:template}` markers in source order, template
    /// text not yet formatted against a matched datum.
    pub tags: Vec<(String, String)>,
    /// Set when the format string carries a bare `{string}` tag: this
    /// line's wildcard string read should honor the scanner's current
    /// `strlen` rather than stopping at the first NUL/CR/LF.
    pub use_strlen: bool,
}

/// Either a literal byte pattern or a compiled regex, used by the match
/// kernel to search a block for candidate offsets.
#[derive(Debug, Clone)]
pub enum MagicPattern {
    Literal(Vec<u8>),
    Regex(Regex),
}

/// A compiled signature: an ordered list of rule-lines plus the metadata
/// derived from its level-0 line.
#[derive(Debug, Clone)]
pub struct Signature {
    pub id: u32,
    pub lines: Vec<Line>,
    pub pattern: MagicPattern,
    pub title: String,
    pub confidence: i64,
    pub offset: ExprOrInt,
    pub overlap_allowed: bool,
}

impl Signature {
    #[must_use]
    pub fn root(&self) -> &Line {
        &self.lines[0]
    }
}
