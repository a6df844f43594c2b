//! Recursive-descent parser for the grammar in spec §4.I.
//!
//! Mirrors the teacher's `parse.rs` structure (one method per grammar
//! production, a single current-token lookahead) but returns `Status`
//! instead of panicking on a malformed statement.

use super::ast::*;
use super::lexer::{Lexer, Spanned, Token};
use crate::status::{KdbResult, Status};

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    pub fn parse(src: &str) -> KdbResult<Statement> {
        let tokens = Lexer::new(src).tokenize()?;
        let mut p = Parser { tokens, pos: 0 };
        let stmt = p.statement()?;
        p.skip_semicolons();
        p.expect_eof()?;
        Ok(stmt)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Keyword(k) if k == word)
    }

    fn expect_keyword(&mut self, word: &str) -> KdbResult<()> {
        if self.is_keyword(word) {
            self.advance();
            Ok(())
        } else {
            Err(Status::invalid_argument(format!(
                "expected keyword {} at line {} col {}",
                word, self.tokens[self.pos].line, self.tokens[self.pos].col
            )))
        }
    }

    fn expect_ident(&mut self) -> KdbResult<String> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            other => Err(Status::invalid_argument(format!("expected identifier, got {:?}", other))),
        }
    }

    fn expect(&mut self, tok: Token) -> KdbResult<()> {
        if *self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(Status::invalid_argument(format!(
                "expected {:?} at line {} col {}, got {:?}",
                tok, self.tokens[self.pos].line, self.tokens[self.pos].col, self.peek()
            )))
        }
    }

    fn expect_eof(&mut self) -> KdbResult<()> {
        if *self.peek() == Token::Eof {
            Ok(())
        } else {
            Err(Status::invalid_argument(format!("unexpected trailing input: {:?}", self.peek())))
        }
    }

    fn skip_semicolons(&mut self) {
        while *self.peek() == Token::Semicolon {
            self.advance();
        }
    }

    fn statement(&mut self) -> KdbResult<Statement> {
        if self.is_keyword("SELECT") {
            Ok(Statement::Select(self.select()?))
        } else if self.is_keyword("INSERT") {
            Ok(Statement::Insert(self.insert()?))
        } else if self.is_keyword("UPDATE") {
            Ok(Statement::Update(self.update()?))
        } else if self.is_keyword("DELETE") {
            Ok(Statement::Delete(self.delete()?))
        } else {
            Err(Status::invalid_argument(format!("expected statement, got {:?}", self.peek())))
        }
    }

    fn select(&mut self) -> KdbResult<Select> {
        self.expect_keyword("SELECT")?;
        let projection = self.projection()?;
        self.expect_keyword("FROM")?;
        let from = self.expect_ident()?;
        let where_ = self.optional_where()?;
        Ok(Select { projection, from, where_ })
    }

    fn projection(&mut self) -> KdbResult<Projection> {
        if *self.peek() == Token::Star {
            self.advance();
            return Ok(Projection::Star);
        }
        let mut items = vec![self.projection_item()?];
        while *self.peek() == Token::Comma {
            self.advance();
            items.push(self.projection_item()?);
        }
        Ok(Projection::Items(items))
    }

    fn projection_item(&mut self) -> KdbResult<ProjectionItem> {
        let expr = self.expr()?;
        let alias = if self.is_keyword("AS") {
            self.advance();
            Some(self.expect_ident()?)
        } else {
            None
        };
        Ok(ProjectionItem { expr, alias })
    }

    fn optional_where(&mut self) -> KdbResult<Option<Expr>> {
        if self.is_keyword("WHERE") {
            self.advance();
            Ok(Some(self.expr()?))
        } else {
            Ok(None)
        }
    }

    fn insert(&mut self) -> KdbResult<Insert> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table = self.expect_ident()?;
        let columns = if *self.peek() == Token::LParen {
            self.advance();
            let mut cols = vec![self.expect_ident()?];
            while *self.peek() == Token::Comma {
                self.advance();
                cols.push(self.expect_ident()?);
            }
            self.expect(Token::RParen)?;
            Some(cols)
        } else {
            None
        };
        self.expect_keyword("VALUES")?;
        let mut rows = vec![self.tuple()?];
        while *self.peek() == Token::Comma {
            self.advance();
            rows.push(self.tuple()?);
        }
        Ok(Insert { table, columns, rows })
    }

    fn tuple(&mut self) -> KdbResult<Vec<Expr>> {
        self.expect(Token::LParen)?;
        let mut values = vec![self.expr()?];
        while *self.peek() == Token::Comma {
            self.advance();
            values.push(self.expr()?);
        }
        self.expect(Token::RParen)?;
        Ok(values)
    }

    fn update(&mut self) -> KdbResult<Update> {
        self.expect_keyword("UPDATE")?;
        let table = self.expect_ident()?;
        self.expect_keyword("SET")?;
        let mut assignments = vec![self.assign()?];
        while *self.peek() == Token::Comma {
            self.advance();
            assignments.push(self.assign()?);
        }
        let where_ = self.optional_where()?;
        Ok(Update { table, assignments, where_ })
    }

    fn assign(&mut self) -> KdbResult<Assign> {
        let column = self.expect_ident()?;
        self.expect(Token::Eq)?;
        let value = self.expr()?;
        Ok(Assign { column, value })
    }

    fn delete(&mut self) -> KdbResult<Delete> {
        self.expect_keyword("DELETE")?;
        self.expect_keyword("FROM")?;
        let table = self.expect_ident()?;
        let where_ = self.optional_where()?;
        Ok(Delete { table, where_ })
    }

    // expr := or
    fn expr(&mut self) -> KdbResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> KdbResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.is_keyword("OR") {
            self.advance();
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> KdbResult<Expr> {
        let mut lhs = self.not_expr()?;
        while self.is_keyword("AND") {
            self.advance();
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> KdbResult<Expr> {
        if self.is_keyword("NOT") {
            self.advance();
            let inner = self.not_expr()?;
            Ok(Expr::Not(Box::new(inner)))
        } else {
            self.cmp_expr()
        }
    }

    fn cmp_expr(&mut self) -> KdbResult<Expr> {
        let lhs = self.add_expr()?;
        let op = match self.peek() {
            Token::Eq => CmpOp::Eq,
            Token::Ne => CmpOp::Ne,
            Token::Lt => CmpOp::Lt,
            Token::Le => CmpOp::Le,
            Token::Gt => CmpOp::Gt,
            Token::Ge => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.add_expr()?;
        Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn add_expr(&mut self) -> KdbResult<Expr> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> KdbResult<Expr> {
        let mut lhs = self.primary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.primary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn primary(&mut self) -> KdbResult<Expr> {
        match self.advance() {
            Token::Integer(i) => Ok(Expr::Literal(Literal::Integer(i))),
            Token::Float(f) => Ok(Expr::Literal(Literal::Float(f))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Ident(name) => {
                if *self.peek() == Token::LParen {
                    self.advance();
                    let mut args = Vec::new();
                    if *self.peek() != Token::RParen {
                        args.push(self.expr()?);
                        while *self.peek() == Token::Comma {
                            self.advance();
                            args.push(self.expr()?);
                        }
                    }
                    self.expect(Token::RParen)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(Status::invalid_argument(format!("unexpected token in expression: {:?}", other))),
        }
    }
}
