//! Expression evaluator: offset/operand expressions that
//! may dereference previously read bytes with explicit endianness/width.
//!
//! ```text
//! expr   ::= term (('+'|'-'|'*'|'/'|'^') term)*
//! term   ::= INT | '(' expr '.' type ')' | '&' | '&+' INT | '(' expr ')'
//! type   ::= b | B | s | S | l | L
//! ```

use binlore_common::ParserError;

use crate::parse_support::parse_int_prefix;

/// One of the six dereference type letters. Width and endianness are fixed
/// by the letter; only `b`/`B` differ in signedness explicitly, so
/// `s/S/l/L` are read as unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerefType {
    Byte,
    UByte,
    ShortLe,
    ShortBe,
    LongLe,
    LongBe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Xor,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Int(i64),
    PrevEnd,
    Deref(Box<Expr>, DerefType),
    Paren(Box<Expr>),
    BinOp(Box<Expr>, BinOp, Box<Expr>),
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn parse_error(message: impl Into<String>) -> ParserError {
    ParserError {
        line_no: 0,
        line: String::new(),
        message: message.into(),
    }
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, c: u8) -> Result<(), ParserError> {
        if self.bump() == Some(c) {
            Ok(())
        } else {
            Err(parse_error(format!("expected `{}` in expression", c as char)))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParserError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(b'+') => BinOp::Add,
                Some(b'-') => BinOp::Sub,
                Some(b'*') => BinOp::Mul,
                Some(b'/') => BinOp::Div,
                Some(b'^') => BinOp::Xor,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_term()?;
            lhs = Expr::BinOp(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ParserError> {
        match self.peek() {
            Some(b'&') => {
                self.bump();
                Ok(Expr::PrevEnd)
            }
            Some(b'(') => {
                self.bump();
                let inner = self.parse_expr()?;
                match self.peek() {
                    Some(b'.') => {
                        self.bump();
                        let ty = self.parse_deref_type()?;
                        self.expect(b')')?;
                        Ok(Expr::Deref(Box::new(inner), ty))
                    }
                    _ => {
                        self.expect(b')')?;
                        Ok(Expr::Paren(Box::new(inner)))
                    }
                }
            }
            Some(c) if c == b'-' || c.is_ascii_digit() => {
                let rest = std::str::from_utf8(&self.bytes[self.pos..])
                    .map_err(|_| parse_error("non-ASCII expression"))?;
                let (n, consumed) = parse_int_prefix(rest)
                    .ok_or_else(|| parse_error("expected integer in expression"))?;
                self.pos += consumed;
                Ok(Expr::Int(n))
            }
            _ => Err(parse_error("unexpected character in expression")),
        }
    }

    fn parse_deref_type(&mut self) -> Result<DerefType, ParserError> {
        match self.bump() {
            Some(b'b') => Ok(DerefType::Byte),
            Some(b'B') => Ok(DerefType::UByte),
            Some(b's') => Ok(DerefType::ShortLe),
            Some(b'S') => Ok(DerefType::ShortBe),
            Some(b'l') => Ok(DerefType::LongLe),
            Some(b'L') => Ok(DerefType::LongBe),
            _ => Err(parse_error("expected one of b/B/s/S/l/L")),
        }
    }
}

/// Parse an expression string (grammar) into an AST.
pub fn parse(source: &str) -> Result<Expr, ParserError> {
    let mut parser = Parser {
        bytes: source.as_bytes(),
        pos: 0,
    };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.bytes.len() {
        return Err(parse_error(format!("trailing input in expression `{source}`")));
    }
    Ok(expr)
}

/// Evaluation context: `prev_end` is the previous sibling line's consumed
/// end offset (what `&` resolves to); `deref` reads a width/endian-typed
/// value at an already-absolute buffer position, returning 0 for
/// out-of-range reads rather than failing the whole expression.
pub struct EvalCtx<'a> {
    pub prev_end: i64,
    pub deref: &'a dyn Fn(i64, DerefType) -> i64,
}

/// Evaluate an AST with 64-bit two's-complement arithmetic; division
/// truncates toward zero.
pub fn eval(expr: &Expr, ctx: &EvalCtx<'_>) -> i64 {
    match expr {
        Expr::Int(n) => *n,
        Expr::PrevEnd => ctx.prev_end,
        Expr::Paren(inner) => eval(inner, ctx),
        Expr::Deref(inner, ty) => {
            let offset = eval(inner, ctx);
            (ctx.deref)(offset, *ty)
        }
        Expr::BinOp(lhs, op, rhs) => {
            let a = eval(lhs, ctx);
            let b = eval(rhs, ctx);
            match op {
                BinOp::Add => a.wrapping_add(b),
                BinOp::Sub => a.wrapping_sub(b),
                BinOp::Mul => a.wrapping_mul(b),
                BinOp::Div => {
                    if b == 0 {
                        0
                    } else {
                        a.wrapping_div(b)
                    }
                }
                BinOp::Xor => a ^ b,
            }
        }
    }
}

/// Parse then evaluate in one step; used by callers that don't cache the AST.
pub fn parse_and_eval(source: &str, ctx: &EvalCtx<'_>) -> Result<i64, ParserError> {
    let expr = parse(source)?;
    Ok(eval(&expr, ctx))
}
