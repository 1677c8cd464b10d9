//! Lexer and Pratt parser for the computed-column expression language.
//!
//! The parser only ever sees *resolved* formula text: quoted column references have already been
//! rewritten into bare placeholder identifiers (see [`crate::resolver`]). A stray `"` is therefore
//! reported as an unresolved column reference.
use formula_table::Scalar;

/// Words the grammar claims for itself. Generated placeholders must never collide with these.
pub const RESERVED_WORDS: &[&str] = &["true", "false", "null", "none", "and", "or", "not"];

/// Deepest nesting the parser accepts. Parentheses, unary operators, call arguments and each
/// chained binary operator count as one level.
pub const MAX_NESTING_DEPTH: usize = 128;

pub fn is_reserved_word(ident: &str) -> bool {
    RESERVED_WORDS
        .iter()
        .any(|word| word.eq_ignore_ascii_case(ident))
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Scalar),
    Identifier(String),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Visit every identifier referenced by the expression, in source order.
    pub fn for_each_identifier<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Expr::Literal(_) => {}
            Expr::Identifier(name) => f(name),
            Expr::Call { args, .. } => args.iter().for_each(|a| a.for_each_identifier(f)),
            Expr::UnaryOp { expr, .. } => expr.for_each_identifier(f),
            Expr::BinaryOp { left, right, .. } => {
                left.for_each_identifier(f);
                right.for_each_identifier(f);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at offset {offset})")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Identifier(String),
    Int(i64),
    Float(f64),
    String(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Comma,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Equals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    Eof,
}

struct Lexer<'a> {
    chars: std::str::Chars<'a>,
    peeked: Option<char>,
    offset: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        let mut chars = input.chars();
        let peeked = chars.next();
        Self {
            chars,
            peeked,
            offset: 0,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let current = self.peeked.take();
        if let Some(c) = current {
            self.offset += c.len_utf8();
        }
        self.peeked = self.chars.next();
        current
    }

    fn peek(&self) -> Option<char> {
        self.peeked
    }

    fn consume_while<F>(&mut self, mut predicate: F) -> String
    where
        F: FnMut(char) -> bool,
    {
        let mut buf = String::new();
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            buf.push(ch);
            self.bump();
        }
        buf
    }

    /// Consume `expected` if it is next; used for two-character operators.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Returns the next token and the byte offset it started at.
    fn next_token(&mut self) -> ParseResult<(Token, usize)> {
        self.consume_while(char::is_whitespace);
        let start = self.offset;
        let Some(ch) = self.peek() else {
            return Ok((Token::Eof, start));
        };

        let token = match ch {
            '(' | ')' | ',' | '+' | '-' | '*' | '/' | '%' | '^' => {
                self.bump();
                match ch {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    _ => Token::Caret,
                }
            }
            '=' => {
                self.bump();
                self.eat('=');
                Token::Equals
            }
            '!' => {
                self.bump();
                if self.eat('=') {
                    Token::NotEquals
                } else {
                    Token::Not
                }
            }
            '<' => {
                self.bump();
                if self.eat('=') {
                    Token::LessEquals
                } else if self.eat('>') {
                    Token::NotEquals
                } else {
                    Token::Less
                }
            }
            '>' => {
                self.bump();
                if self.eat('=') {
                    Token::GreaterEquals
                } else {
                    Token::Greater
                }
            }
            '&' => {
                self.bump();
                if !self.eat('&') {
                    return Err(ParseError::new("expected `&&`", start));
                }
                Token::And
            }
            '|' => {
                self.bump();
                if !self.eat('|') {
                    return Err(ParseError::new("expected `||`", start));
                }
                Token::Or
            }
            '\'' => {
                self.bump();
                let mut out = String::new();
                loop {
                    match self.bump() {
                        None => return Err(ParseError::new("unterminated string literal", start)),
                        Some('\'') => {
                            // `''` is an escaped quote inside the literal.
                            if self.eat('\'') {
                                out.push('\'');
                                continue;
                            }
                            break;
                        }
                        Some(c) => out.push(c),
                    }
                }
                Token::String(out)
            }
            '"' => {
                return Err(ParseError::new(
                    "unresolved column reference; column names must be resolved before compiling",
                    start,
                ))
            }
            c if c.is_ascii_digit() || c == '.' => self.lex_number(start)?,
            c if is_ident_start(c) => {
                let ident = self.consume_while(is_ident_part);
                match ident.to_ascii_lowercase().as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" | "none" => Token::Null,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Identifier(ident),
                }
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected character {other:?}"),
                    start,
                ))
            }
        };
        Ok((token, start))
    }

    fn lex_number(&mut self, start: usize) -> ParseResult<Token> {
        let mut num_str = self.consume_while(|c| c.is_ascii_digit() || c == '.');
        let mut is_float = num_str.contains('.');
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            num_str.push('e');
            self.bump();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                num_str.push(sign);
                self.bump();
            }
            let exp_digits = self.consume_while(|c| c.is_ascii_digit());
            if exp_digits.is_empty() {
                return Err(ParseError::new(
                    format!("invalid number {num_str:?} (expected exponent digits)"),
                    start,
                ));
            }
            num_str.push_str(&exp_digits);
        }

        if is_float {
            num_str
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| ParseError::new(format!("invalid number {num_str:?}"), start))
        } else {
            num_str
                .parse::<i64>()
                .map(Token::Int)
                .map_err(|_| ParseError::new(format!("integer literal {num_str} out of range"), start))
        }
    }
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub(crate) fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
    lookahead_offset: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(input);
        let (lookahead, lookahead_offset) = lexer.next_token()?;
        Ok(Self {
            lexer,
            lookahead,
            lookahead_offset,
            depth: 0,
        })
    }

    fn bump(&mut self) -> ParseResult<Token> {
        let (next, offset) = self.lexer.next_token()?;
        self.lookahead_offset = offset;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.lookahead_offset)
    }

    fn expect(&mut self, token: Token) -> ParseResult<()> {
        if self.lookahead == token {
            self.bump()?;
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {token:?}, found {:?}",
                self.lookahead
            )))
        }
    }

    fn parse(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_expr(0)?;
        if self.lookahead != Token::Eof {
            return Err(self.error(format!("unexpected token {:?}", self.lookahead)));
        }
        Ok(expr)
    }

    fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(format!(
                "expression nesting exceeds the {MAX_NESTING_DEPTH}-level limit"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_expr(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let entered = self.depth;
        let result = self.parse_operators(min_prec);
        self.depth = entered;
        result
    }

    fn parse_operators(&mut self, min_prec: u8) -> ParseResult<Expr> {
        self.descend()?;
        let mut left = self.parse_prefix()?;
        while let Some((op, prec, right_assoc)) = self.infix_binding_power() {
            if prec < min_prec {
                break;
            }
            // The tree built so far becomes the left child, one level deeper.
            self.descend()?;
            self.bump()?;
            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.parse_expr(next_min)?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let literal = match &self.lookahead {
            Token::Int(n) => Some(Scalar::Int(*n)),
            Token::Float(n) => Some(Scalar::Float(*n)),
            Token::String(s) => Some(Scalar::from(s.as_str())),
            Token::True => Some(Scalar::Bool(true)),
            Token::False => Some(Scalar::Bool(false)),
            Token::Null => Some(Scalar::NONE),
            _ => None,
        };
        if let Some(value) = literal {
            self.bump()?;
            return Ok(Expr::Literal(value));
        }

        match &self.lookahead {
            Token::Minus => {
                self.bump()?;
                let expr = self.parse_expr(7)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOp::Negate,
                    expr: Box::new(expr),
                })
            }
            Token::Plus => {
                self.bump()?;
                self.parse_expr(7)
            }
            Token::Not => {
                self.bump()?;
                // `not a == b` negates the comparison, but stops before `and`/`or`.
                let expr = self.parse_expr(3)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                })
            }
            Token::Identifier(_) => self.parse_ident_like(),
            Token::LParen => {
                self.bump()?;
                let inner = self.parse_expr(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(self.error(format!("unexpected token in expression: {other:?}"))),
        }
    }

    fn parse_ident_like(&mut self) -> ParseResult<Expr> {
        let ident = match self.bump()? {
            Token::Identifier(ident) => ident,
            other => {
                debug_assert!(false, "parse_ident_like called with lookahead={other:?}");
                return Err(self.error("expected identifier"));
            }
        };

        if self.lookahead != Token::LParen {
            return Ok(Expr::Identifier(ident));
        }

        self.bump()?;
        let mut args = Vec::new();
        if self.lookahead != Token::RParen {
            loop {
                args.push(self.parse_expr(0)?);
                if self.lookahead == Token::Comma {
                    self.bump()?;
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(Expr::Call { name: ident, args })
    }

    /// `(op, precedence, right_associative)`; higher precedence binds tighter:
    ///   `^`  >  unary  >  `* / %`  >  `+ -`  >  comparisons  >  `and`  >  `or`
    fn infix_binding_power(&self) -> Option<(BinaryOp, u8, bool)> {
        let binding = match self.lookahead {
            Token::Or => (BinaryOp::Or, 1, false),
            Token::And => (BinaryOp::And, 2, false),
            Token::Equals => (BinaryOp::Equals, 3, false),
            Token::NotEquals => (BinaryOp::NotEquals, 3, false),
            Token::Less => (BinaryOp::Less, 3, false),
            Token::LessEquals => (BinaryOp::LessEquals, 3, false),
            Token::Greater => (BinaryOp::Greater, 3, false),
            Token::GreaterEquals => (BinaryOp::GreaterEquals, 3, false),
            Token::Plus => (BinaryOp::Add, 5, false),
            Token::Minus => (BinaryOp::Subtract, 5, false),
            Token::Star => (BinaryOp::Multiply, 6, false),
            Token::Slash => (BinaryOp::Divide, 6, false),
            Token::Percent => (BinaryOp::Modulo, 6, false),
            Token::Caret => (BinaryOp::Power, 8, true),
            _ => return None,
        };
        Some(binding)
    }
}

pub fn parse(input: &str) -> ParseResult<Expr> {
    Parser::new(input)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Identifier(name.into()))
    }

    fn binary(op: BinaryOp, left: Box<Expr>, right: Box<Expr>) -> Box<Expr> {
        Box::new(Expr::BinaryOp { op, left, right })
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("COLUMN0 + COLUMN1 * 2").unwrap();
        assert_eq!(
            expr,
            *binary(
                BinaryOp::Add,
                ident("COLUMN0"),
                binary(
                    BinaryOp::Multiply,
                    ident("COLUMN1"),
                    Box::new(Expr::Literal(Scalar::Int(2)))
                )
            )
        );
    }

    #[test]
    fn power_is_right_associative_and_beats_negation() {
        let expr = parse("-2 ^ 3 ^ 2").unwrap();
        let two = || Box::new(Expr::Literal(Scalar::Int(2)));
        let three = Box::new(Expr::Literal(Scalar::Int(3)));
        assert_eq!(
            expr,
            Expr::UnaryOp {
                op: UnaryOp::Negate,
                expr: binary(BinaryOp::Power, two(), binary(BinaryOp::Power, three, two())),
            }
        );
    }

    #[test]
    fn not_wraps_comparison_but_not_conjunction() {
        let expr = parse("not x == 1 and y").unwrap();
        let Expr::BinaryOp {
            op: BinaryOp::And,
            left,
            ..
        } = expr
        else {
            panic!("expected `and` at the root");
        };
        assert!(matches!(*left, Expr::UnaryOp { op: UnaryOp::Not, .. }));
    }

    #[test]
    fn literals_and_keywords_are_case_insensitive() {
        assert_eq!(parse("TRUE").unwrap(), Expr::Literal(Scalar::Bool(true)));
        assert_eq!(parse("None").unwrap(), Expr::Literal(Scalar::NONE));
        assert_eq!(parse("1.5e1").unwrap(), Expr::Literal(Scalar::Float(15.0)));
        assert_eq!(parse("42").unwrap(), Expr::Literal(Scalar::Int(42)));
        assert_eq!(
            parse("'it''s'").unwrap(),
            Expr::Literal(Scalar::from("it's"))
        );
    }

    #[test]
    fn function_calls_collect_arguments() {
        let expr = parse("max(a, b, 3)").unwrap();
        let Expr::Call { name, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(name, "max");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn errors_carry_offsets() {
        let err = parse("1 + \"a\"").unwrap_err();
        assert_eq!(err.offset, 4);
        assert!(err.message.contains("unresolved column reference"));

        let err = parse("(1 + 2").unwrap_err();
        assert!(err.message.contains("expected RParen"), "{err}");

        assert!(parse("'open").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("1e").is_err());
        assert!(parse("99999999999999999999").is_err());
        assert!(parse("a | b").is_err());
    }

    #[test]
    fn nesting_is_limited() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse(&nested(100)).unwrap(), Expr::Literal(Scalar::Int(1)));

        let err = parse(&nested(200_000)).unwrap_err();
        assert!(err.message.contains("nesting exceeds"), "{err}");
        assert!(parse(&"-".repeat(200_000)).is_err());
        assert!(parse(&format!("{}1{}", "abs(".repeat(1_000), ")".repeat(1_000))).is_err());

        let chain = |terms: usize| vec!["1"; terms].join(" + ");
        assert!(parse(&chain(100)).is_ok());
        let err = parse(&chain(50_000)).unwrap_err();
        assert!(err.message.contains("nesting exceeds"), "{err}");
    }

    #[test]
    fn identifiers_are_collected_in_source_order() {
        let expr = parse("if(COLUMN1 > 0, COLUMN0, COLUMN1)").unwrap();
        let mut seen = Vec::new();
        expr.for_each_identifier(&mut |name| seen.push(name));
        assert_eq!(seen, vec!["COLUMN1", "COLUMN0", "COLUMN1"]);
    }

    #[test]
    fn reserved_words_match_any_case() {
        assert!(is_reserved_word("NULL"));
        assert!(is_reserved_word("And"));
        assert!(!is_reserved_word("COLUMN0"));
    }
}
