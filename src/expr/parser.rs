//! Recursive-descent parser producing an unresolved syntax tree.
//!
//! Precedence follows the usual scientific-Python reading of formulas:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | power
//! power   := primary ('**' unary)?
//! primary := number | name | name '(' args ')' | '(' expr ')'
//! name    := ident ('.' ident)*
//! ```
//!
//! so `-x**2 == -(x**2)` and `2**3**2 == 2**9`.

use crate::error::GridError;
use crate::expr::lexer::{Spanned, Token, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }
}

/// Syntax tree with names still as written (dotted paths joined by `.`).
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Number(f64),
    Name(String),
    Neg(Box<Ast>),
    Binary(BinOp, Box<Ast>, Box<Ast>),
    Call(String, Vec<Ast>),
}

/// Parse a complete formula.
pub fn parse(src: &str) -> Result<Ast, GridError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let ast = parser.expr()?;
    match parser.peek() {
        Token::End => Ok(ast),
        other => Err(parser.error(format!("unexpected {} after end of expression", describe(other)))),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with `End`, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: String) -> GridError {
        let offset = self.tokens[self.pos.min(self.tokens.len() - 1)].offset;
        GridError::Parse { offset, message }
    }

    fn expect(&mut self, want: Token) -> Result<(), GridError> {
        if *self.peek() == want {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", describe(&want), describe(self.peek()))))
        }
    }

    fn expr(&mut self) -> Result<Ast, GridError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Ast, GridError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Ast, GridError> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(Ast::Neg(Box::new(self.unary()?)))
            }
            Token::Plus => {
                self.advance();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Ast, GridError> {
        let base = self.primary()?;
        if *self.peek() == Token::Power {
            self.advance();
            let exponent = self.unary()?;
            return Ok(Ast::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Ast, GridError> {
        match self.advance() {
            Token::Number(v) => Ok(Ast::Number(v)),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(first) => {
                let mut name = first;
                while *self.peek() == Token::Dot {
                    self.advance();
                    match self.advance() {
                        Token::Ident(part) => {
                            name.push('.');
                            name.push_str(&part);
                        }
                        other => return Err(self.error(format!("expected a name after '.', found {}", describe(&other)))),
                    }
                }
                if *self.peek() == Token::LParen {
                    self.advance();
                    let args = self.args()?;
                    return Ok(Ast::Call(name, args));
                }
                Ok(Ast::Name(name))
            }
            other => Err(self.error(format!("expected a value, found {}", describe(&other)))),
        }
    }

    fn args(&mut self) -> Result<Vec<Ast>, GridError> {
        let mut args = Vec::new();
        if *self.peek() == Token::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.advance() {
                Token::Comma => continue,
                Token::RParen => return Ok(args),
                other => return Err(self.error(format!("expected ',' or ')', found {}", describe(&other)))),
            }
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(v) => format!("number {v}"),
        Token::Ident(s) => format!("name \"{s}\""),
        Token::Plus => "'+'".into(),
        Token::Minus => "'-'".into(),
        Token::Star => "'*'".into(),
        Token::Slash => "'/'".into(),
        Token::Power => "'**'".into(),
        Token::LParen => "'('".into(),
        Token::RParen => "')'".into(),
        Token::Comma => "','".into(),
        Token::Dot => "'.'".into(),
        Token::End => "end of formula".into(),
    }
}
