// src/expression.rs
use std::rc::Rc;

use crate::errors::Result;
use crate::parser::Parser;
use crate::value::{Closure, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Lte => "<=",
            BinOp::Gt => ">",
            BinOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `receiver.name(args)`, dispatched as `name(receiver, args..)`.
    Method { receiver: Box<Expr>, name: String, args: Vec<Expr> },
    Index(Box<Expr>, Box<Expr>),
    Slice { target: Box<Expr>, start: Option<Box<Expr>>, end: Option<Box<Expr>> },
    Field(Box<Expr>, String),
    Closure(Rc<Closure>),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Assign { name: String, op: Option<BinOp>, value: Expr },
    AssignIndex { name: String, index: Expr, value: Expr },
    If { cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt> },
    For { var: String, iter: Expr, body: Vec<Stmt> },
}

/// A parsed fragment.
#[derive(Debug, Clone)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

const RESERVED: &[&str] = &["true", "false", "null", "if", "else", "for", "in"];

/// Deepest nesting of sub-expressions, operator chains and blocks.
const MAX_DEPTH: usize = 100;

pub fn parse_program(input: &str) -> Result<Program> {
    let mut p = EParser::new(input);
    let stmts = p.parse_stmts()?;
    p.parser.skip_ws();
    if !p.parser.eof() {
        return Err(p.parser.error("unexpected input"));
    }
    Ok(Program { stmts })
}

#[cfg(test)]
pub fn parse_expr(input: &str) -> Result<Expr> {
    let mut p = EParser::new(input);
    let expr = p.parse_expr()?;
    p.parser.skip_ws();
    if !p.parser.eof() {
        return Err(p.parser.error("trailing input"));
    }
    Ok(expr)
}

struct EParser<'a> {
    parser: Parser<'a>,
    depth: usize,
}

impl<'a> EParser<'a> {
    fn new(s: &'a str) -> Self {
        Self { parser: Parser::new(s), depth: 0 }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.parser.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.descend()?;
        let out = f(self);
        self.depth -= 1;
        out
    }

    /// Statements up to end of input or a closing brace.
    fn parse_stmts(&mut self) -> Result<Vec<Stmt>> {
        let mut out = Vec::new();
        loop {
            self.parser.skip_ws();
            while self.parser.consume_char(';') {
                self.parser.skip_ws();
            }
            if self.parser.eof() || self.parser.peek_char() == Some('}') {
                return Ok(out);
            }
            let stmt = self.parse_stmt()?;
            let is_block = matches!(stmt, Stmt::If { .. } | Stmt::For { .. });
            out.push(stmt);
            self.parser.skip_ws();
            if self.parser.consume_char(';') || is_block {
                continue;
            }
            if self.parser.eof() || self.parser.peek_char() == Some('}') {
                return Ok(out);
            }
            return Err(self.parser.error("expected ';' between statements"));
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.parser.expect('{')?;
        let stmts = self.nested(Self::parse_stmts)?;
        self.parser.expect('}')?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        if self.parser.consume_keyword("if") {
            return self.parse_if();
        }
        if self.parser.consume_keyword("for") {
            self.parser.skip_ws();
            let var = self.parse_name()?;
            self.parser.skip_ws();
            if !self.parser.consume_keyword("in") {
                return Err(self.parser.error("expected 'in'"));
            }
            let iter = self.parse_expr()?;
            let body = self.parse_block()?;
            return Ok(Stmt::For { var, iter, body });
        }

        let target = self.parse_expr()?;
        self.parser.skip_ws();
        let op = if self.parser.consume_op("=", '=') {
            None
        } else if self.parser.consume_str("+=") {
            Some(BinOp::Add)
        } else if self.parser.consume_str("-=") {
            Some(BinOp::Sub)
        } else if self.parser.consume_str("*=") {
            Some(BinOp::Mul)
        } else if self.parser.consume_str("/=") {
            Some(BinOp::Div)
        } else {
            return Ok(Stmt::Expr(target));
        };
        let value = self.parse_expr()?;
        match (target, op) {
            (Expr::Name(name), op) => Ok(Stmt::Assign { name, op, value }),
            (Expr::Index(base, index), None) => match *base {
                Expr::Name(name) => Ok(Stmt::AssignIndex { name, index: *index, value }),
                _ => Err(self.parser.error("cannot assign to nested index")),
            },
            _ => Err(self.parser.error("cannot assign to expression")),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let cond = self.parse_expr()?;
        let then = self.parse_block()?;
        self.parser.skip_ws();
        let otherwise = if self.parser.consume_keyword("else") {
            self.parser.skip_ws();
            if self.parser.consume_keyword("if") {
                vec![self.nested(Self::parse_if)?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If { cond, then, otherwise })
    }

    fn parse_name(&mut self) -> Result<String> {
        let name = self.parser.parse_identifier()?;
        if RESERVED.contains(&name.as_str()) {
            return Err(self.parser.error(format!("'{name}' is a reserved word")));
        }
        Ok(name)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.nested(Self::parse_or)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        let base = self.depth;
        loop {
            self.parser.skip_ws();
            if self.parser.consume_str("||") {
                self.descend()?;
                let right = self.parse_and()?;
                left = Expr::Or(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_compare()?;
        let base = self.depth;
        loop {
            self.parser.skip_ws();
            if self.parser.consume_str("&&") {
                self.descend()?;
                let right = self.parse_compare()?;
                left = Expr::And(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_compare(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;
        self.parser.skip_ws();
        let op = if self.parser.consume_str("==") {
            BinOp::Eq
        } else if self.parser.consume_str("!=") {
            BinOp::Ne
        } else if self.parser.consume_str("<=") {
            BinOp::Lte
        } else if self.parser.consume_str(">=") {
            BinOp::Gte
        } else if self.parser.consume_char('<') {
            BinOp::Lt
        } else if self.parser.consume_char('>') {
            BinOp::Gt
        } else {
            return Ok(left);
        };
        let right = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        let base = self.depth;
        loop {
            self.parser.skip_ws();
            let op = if self.parser.consume_op("+", '=') {
                BinOp::Add
            } else if self.parser.consume_op("-", '=') {
                BinOp::Sub
            } else {
                break;
            };
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        let base = self.depth;
        loop {
            self.parser.skip_ws();
            let op = if self.parser.consume_str("//") {
                BinOp::FloorDiv
            } else if self.parser.consume_op("/", '=') {
                BinOp::Div
            } else if self.parser.consume_op("*", '=') {
                BinOp::Mul
            } else if self.parser.consume_char('%') {
                BinOp::Mod
            } else {
                break;
            };
            self.descend()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        self.parser.skip_ws();
        if self.parser.consume_char('-') {
            let inner = self.nested(Self::parse_unary)?;
            return Ok(match inner {
                Expr::Literal(Value::Int(i)) => Expr::Literal(Value::Int(-i)),
                Expr::Literal(Value::Float(f)) => Expr::Literal(Value::Float(-f)),
                other => Expr::Unary(UnaryOp::Neg, Box::new(other)),
            });
        }
        if self.parser.consume_op("!", '=') {
            let inner = self.nested(Self::parse_unary)?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        let base = self.depth;
        loop {
            self.parser.skip_ws();
            if matches!(self.parser.peek_char(), Some('(' | '[' | '.')) {
                self.descend()?;
            }
            if self.parser.consume_char('(') {
                let args = self.parse_args(')')?;
                expr = Expr::Call { callee: Box::new(expr), args };
            } else if self.parser.consume_char('[') {
                expr = self.parse_subscript(expr)?;
            } else if self.parser.consume_char('.') {
                self.parser.skip_ws();
                let name = self.parser.parse_identifier()?;
                self.parser.skip_ws();
                if self.parser.consume_char('(') {
                    let args = self.parse_args(')')?;
                    expr = Expr::Method { receiver: Box::new(expr), name, args };
                } else {
                    expr = Expr::Field(Box::new(expr), name);
                }
            } else {
                break;
            }
        }
        self.depth = base;
        Ok(expr)
    }

    fn parse_subscript(&mut self, target: Expr) -> Result<Expr> {
        self.parser.skip_ws();
        let start = if self.parser.peek_char() == Some(':') {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        self.parser.skip_ws();
        if self.parser.consume_char(':') {
            self.parser.skip_ws();
            let end = if self.parser.peek_char() == Some(']') {
                None
            } else {
                Some(Box::new(self.parse_expr()?))
            };
            self.parser.expect(']')?;
            return Ok(Expr::Slice { target: Box::new(target), start, end });
        }
        self.parser.expect(']')?;
        match start {
            Some(index) => Ok(Expr::Index(Box::new(target), index)),
            None => Err(self.parser.error("index expected")),
        }
    }

    fn parse_args(&mut self, close: char) -> Result<Vec<Expr>> {
        let mut out = Vec::new();
        self.parser.skip_ws();
        if self.parser.consume_char(close) {
            return Ok(out);
        }
        loop {
            out.push(self.parse_expr()?);
            self.parser.skip_ws();
            if self.parser.consume_char(',') {
                self.parser.skip_ws();
                // trailing comma
                if self.parser.consume_char(close) {
                    return Ok(out);
                }
                continue;
            }
            self.parser.expect(close)?;
            return Ok(out);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        self.parser.skip_ws();
        let Some(c) = self.parser.peek_char() else {
            return Err(self.parser.error("unexpected end of input"));
        };
        match c {
            '"' | '\'' => Ok(Expr::Literal(Value::Str(self.parser.parse_quoted_string()?))),
            '0'..='9' => Ok(Expr::Literal(self.parser.parse_number_literal()?)),
            '(' => {
                self.parser.consume_char('(');
                let inner = self.parse_expr()?;
                self.parser.expect(')')?;
                Ok(inner)
            }
            '[' => {
                self.parser.consume_char('[');
                Ok(Expr::List(self.parse_args(']')?))
            }
            '{' => {
                self.parser.consume_char('{');
                self.parse_map()
            }
            '|' => self.parse_closure(),
            _ if self.parser.peek_identifier() => {
                if self.parser.consume_keyword("true") {
                    return Ok(Expr::Literal(Value::Bool(true)));
                }
                if self.parser.consume_keyword("false") {
                    return Ok(Expr::Literal(Value::Bool(false)));
                }
                if self.parser.consume_keyword("null") {
                    return Ok(Expr::Literal(Value::Null));
                }
                Ok(Expr::Name(self.parse_name()?))
            }
            other => Err(self.parser.error(format!("unexpected '{other}'"))),
        }
    }

    fn parse_map(&mut self) -> Result<Expr> {
        let mut entries = Vec::new();
        loop {
            self.parser.skip_ws();
            if self.parser.consume_char('}') {
                return Ok(Expr::Map(entries));
            }
            let key = self.parse_map_key()?;
            self.parser.expect(':')?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            self.parser.skip_ws();
            if !self.parser.consume_char(',') {
                self.parser.expect('}')?;
                return Ok(Expr::Map(entries));
            }
        }
    }

    /// Bare identifiers used as keys are string literals.
    fn parse_map_key(&mut self) -> Result<Expr> {
        if self.parser.peek_identifier() {
            let save = self.parser.pos();
            let name = self.parser.parse_identifier()?;
            self.parser.skip_ws();
            if self.parser.peek_char() == Some(':') {
                return Ok(Expr::Literal(Value::Str(name)));
            }
            self.parser.reset(save);
        }
        self.parse_expr()
    }

    fn parse_closure(&mut self) -> Result<Expr> {
        let mut params = Vec::new();
        if !self.parser.consume_str("||") {
            self.parser.expect('|')?;
            loop {
                self.parser.skip_ws();
                if self.parser.consume_char('|') {
                    break;
                }
                params.push(self.parse_name()?);
                self.parser.skip_ws();
                if !self.parser.consume_char(',') {
                    self.parser.expect('|')?;
                    break;
                }
            }
        }
        let body = self.parse_expr()?;
        Ok(Expr::Closure(Rc::new(Closure { params, body })))
    }
}
