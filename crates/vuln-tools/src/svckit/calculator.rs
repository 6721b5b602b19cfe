//! Math Tool
//!
//! Arithmetic over numbers only: `+ - * / // % ^ **`, parentheses, unary
//! sign, and the functions `abs`, `round`, `min`, `max`, `sum`. Lists in
//! square brackets are accepted as function arguments (`sum([1, 2, 3])`).
//! Nothing outside this grammar is evaluated.

use agent_core::{ParamType, ParameterSchema, ToolSchema, ToolSpec};

use crate::error::{Result, ToolkitError};

const MAX_EXPRESSION_LEN: usize = 256;
const MAX_DEPTH: usize = 64;

pub fn calculate_math_tool() -> ToolSpec {
    let schema = ToolSchema::new("calculate_math", "Safely evaluate a mathematical expression").param(
        ParameterSchema::required(
            "expression",
            ParamType::String,
            "Mathematical expression to evaluate (e.g., '2 + 3 * 4')",
        ),
    );

    ToolSpec::from_fn(schema, |args| evaluate(args.str("expression")?).map_err(Into::into))
}

/// Evaluate `expression` and format the result, integers without a
/// fractional part.
pub fn evaluate(expression: &str) -> Result<String> {
    if expression.len() > MAX_EXPRESSION_LEN {
        return Err(invalid(format!("longer than {MAX_EXPRESSION_LEN} characters")));
    }

    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(invalid("empty expression"));
    }

    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(invalid(format!("unexpected {token}")));
    }

    format_number(value)
}

fn invalid(reason: impl Into<String>) -> ToolkitError {
    ToolkitError::InvalidExpression(reason.into())
}

fn format_number(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(invalid("result is not a finite number"));
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Ok(format!("{}", value as i64))
    } else {
        Ok(format!("{value}"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token<'a> {
    Num(f64),
    Ident(&'a str),
    Plus,
    Minus,
    Star,
    Slash,
    FloorDiv,
    Percent,
    Pow,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "number {n}"),
            Token::Ident(name) => write!(f, "name '{name}'"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::FloorDiv => f.write_str("'//'"),
            Token::Percent => f.write_str("'%'"),
            Token::Pow => f.write_str("'**'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token<'_>>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let (token, len) = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'0'..=b'9' | b'.' => {
                let len = number_len(&bytes[i..]);
                let text = &input[i..i + len];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| invalid(format!("malformed number '{text}'")))?;
                (Token::Num(value), len)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let len = bytes[i..]
                    .iter()
                    .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
                    .count();
                (Token::Ident(&input[i..i + len]), len)
            }
            b'*' if bytes.get(i + 1) == Some(&b'*') => (Token::Pow, 2),
            b'/' if bytes.get(i + 1) == Some(&b'/') => (Token::FloorDiv, 2),
            b'+' => (Token::Plus, 1),
            b'-' => (Token::Minus, 1),
            b'*' => (Token::Star, 1),
            b'/' => (Token::Slash, 1),
            b'%' => (Token::Percent, 1),
            b'^' => (Token::Pow, 1),
            b'(' => (Token::LParen, 1),
            b')' => (Token::RParen, 1),
            b'[' => (Token::LBracket, 1),
            b']' => (Token::RBracket, 1),
            b',' => (Token::Comma, 1),
            _ => {
                let ch = input[i..].chars().next().unwrap_or('?');
                return Err(invalid(format!("unsupported character '{ch}'")));
            }
        };
        tokens.push(token);
        i += len;
    }

    Ok(tokens)
}

/// Digits, one optional fraction and an optional exponent
fn number_len(bytes: &[u8]) -> usize {
    let mut len = bytes.iter().take_while(|b| b.is_ascii_digit() || **b == b'.').count();
    if matches!(bytes.get(len), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(len + 1), Some(b'+' | b'-')));
        let digits = bytes[len + 1 + sign..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > 0 {
            len += 1 + sign + digits;
        }
    }
    len
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: Token<'a>) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token<'a>) -> Result<()> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(invalid(format!("expected {expected}, found {token}"))),
            None => Err(invalid(format!("expected {expected} at end of expression"))),
        }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(invalid("expression is nested too deeply"));
        }
        Ok(())
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            if self.eat(Token::Plus) {
                value += self.term()?;
            } else if self.eat(Token::Minus) {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    // term := unary (('*' | '/' | '//' | '%') unary)*
    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(op @ (Token::Star | Token::Slash | Token::FloorDiv | Token::Percent)) => op,
                _ => return Ok(value),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                Token::Star => value * rhs,
                _ if rhs == 0.0 => return Err(invalid("division by zero")),
                Token::Slash => value / rhs,
                Token::FloorDiv => (value / rhs).floor(),
                // sign follows the divisor
                _ => value - rhs * (value / rhs).floor(),
            };
        }
    }

    // unary := ('-' | '+') unary | power
    fn unary(&mut self) -> Result<f64> {
        self.descend()?;
        let value = if self.eat(Token::Minus) {
            -self.unary()?
        } else if self.eat(Token::Plus) {
            self.unary()?
        } else {
            self.power()?
        };
        self.depth -= 1;
        Ok(value)
    }

    // power := atom ('**' unary)?
    fn power(&mut self) -> Result<f64> {
        let base = self.atom()?;
        if self.eat(Token::Pow) {
            let exponent = self.unary()?;
            if base == 0.0 && exponent < 0.0 {
                return Err(invalid("division by zero"));
            }
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                self.descend()?;
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                self.depth -= 1;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                self.expect(Token::LParen)?;
                let args = self.arguments()?;
                apply(name, &args)
            }
            Some(token) => Err(invalid(format!("unexpected {token}"))),
            None => Err(invalid("unexpected end of expression")),
        }
    }

    /// Comma-separated arguments up to the closing parenthesis; bracketed
    /// lists are flattened into the argument list.
    fn arguments(&mut self) -> Result<Vec<f64>> {
        let mut args = Vec::new();
        if self.eat(Token::RParen) {
            return Ok(args);
        }
        loop {
            if self.eat(Token::LBracket) {
                if !self.eat(Token::RBracket) {
                    loop {
                        args.push(self.expr()?);
                        if !self.eat(Token::Comma) {
                            break;
                        }
                    }
                    self.expect(Token::RBracket)?;
                }
            } else {
                args.push(self.expr()?);
            }
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }
}

fn apply(name: &str, args: &[f64]) -> Result<f64> {
    match (name, args) {
        ("abs", [x]) => Ok(x.abs()),
        ("round", [x]) => Ok(x.round_ties_even()),
        ("round", [x, digits]) if digits.fract() == 0.0 && digits.abs() <= 15.0 => {
            let scale = 10f64.powf(*digits);
            Ok((x * scale).round_ties_even() / scale)
        }
        ("min", [first, rest @ ..]) => Ok(rest.iter().copied().fold(*first, f64::min)),
        ("max", [first, rest @ ..]) => Ok(rest.iter().copied().fold(*first, f64::max)),
        ("sum", values) => Ok(values.iter().sum()),
        ("abs" | "round" | "min" | "max", _) => {
            Err(invalid(format!("{name}() got {} argument(s)", args.len())))
        }
        _ => Err(invalid(format!("unknown function '{name}'"))),
    }
}
