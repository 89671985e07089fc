//! SMS recursive-descent parser.
//!
//! Single-token lookahead, no error recovery: the first error aborts.
//!
//! Expression precedence (lowest → highest):
//!   assign  →  or  →  and  →  equality  →  relational  →  additive  →
//!   multiplicative  →  unary  →  if-expr  →  when  →  postfix  →
//!   call/member/index chain  →  primary

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use super::ast::{
    Accessor, BinOp, DataClassDecl, EventHandlerDecl, Expr, ExprKind, FunctionDecl, PostfixOp,
    Program, Stmt, StmtKind, StringPart, UnaryOp, WhenBranch,
};
use super::error::{Result, ScriptError};
use super::lexer::{tokenize, Lexer};
use super::position::Position;
use super::token::{StringSegment, Token, TokenKind};
use super::{STACK_GROW_SIZE, STACK_RED_ZONE};

/// Deepest nesting of expressions, blocks and operator chains accepted.
pub const MAX_NESTING: usize = 256;

/// Lex and parse `src` into a [`Program`].
pub fn parse_program(src: &str) -> Result<Program> {
    let tokens = tokenize(src)?;
    Parser::new(tokens).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    handler_keys: HashSet<String>,
    /// Nesting depth of `{ }` blocks; event handlers are only legal at 0.
    depth: usize,
    /// Syntactic nesting, capped at [`MAX_NESTING`].
    nesting: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let pos = tokens.last().map(|t| t.pos).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", pos));
        }
        Parser {
            tokens,
            pos: 0,
            handler_keys: HashSet::new(),
            depth: 0,
            nesting: 0,
        }
    }

    pub fn parse(mut self) -> Result<Program> {
        let mut stmts = Vec::new();
        while !self.at_end() {
            if self.eat(&TokenKind::Newline) || self.eat(&TokenKind::Semicolon) {
                continue;
            }
            let stmt = self.statement()?;
            if let StmtKind::On(handler) = &stmt.kind {
                let key = handler.key();
                if !self.handler_keys.insert(key.clone()) {
                    return Err(ScriptError::parse(
                        format!("Duplicate event handler '{key}'"),
                        handler.pos,
                    ));
                }
            }
            stmts.push(stmt);
        }
        trace!(statements = stmts.len(), "parsed program");
        Ok(Program { stmts })
    }

    // ── Token cursor ──────────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        !self.at_end() && &self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.at_end() {
            self.pos += 1;
        }
        self.previous()
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<Token> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        let pos = if self.at_end() && self.pos > 0 {
            self.previous().pos
        } else {
            self.peek().pos
        };
        Err(ScriptError::parse(message, pos))
    }

    fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    /// Enter one more nesting level, or fail once [`MAX_NESTING`] is reached.
    fn descend(&mut self) -> Result<()> {
        if self.nesting >= MAX_NESTING {
            return Err(ScriptError::parse(
                "Expression nested too deeply",
                self.peek().pos,
            ));
        }
        self.nesting += 1;
        Ok(())
    }

    /// Run `f` one nesting level down.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.descend()?;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || f(self));
        self.nesting -= 1;
        result
    }

    /// Consume `else`, allowing newlines before it.  Restores the cursor when
    /// no `else` follows.
    fn eat_else(&mut self) -> bool {
        let checkpoint = self.pos;
        self.skip_newlines();
        if self.eat(&TokenKind::Else) {
            true
        } else {
            self.pos = checkpoint;
            false
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        let pos = self.peek().pos;
        match self.peek().kind {
            TokenKind::Var => {
                self.advance();
                self.var_decl(pos)
            }
            TokenKind::Fun => {
                self.advance();
                self.fun_decl(pos)
            }
            TokenKind::Data => {
                self.advance();
                self.data_class_decl(pos)
            }
            TokenKind::If => {
                self.advance();
                self.if_stmt(pos)
            }
            TokenKind::While => {
                self.advance();
                self.while_stmt(pos)
            }
            TokenKind::For => {
                self.advance();
                self.for_stmt(pos)
            }
            TokenKind::Break => {
                self.advance();
                self.skip_newlines();
                Ok(Stmt { kind: StmtKind::Break, pos })
            }
            TokenKind::Continue => {
                self.advance();
                self.skip_newlines();
                Ok(Stmt { kind: StmtKind::Continue, pos })
            }
            TokenKind::Return => {
                self.advance();
                self.return_stmt(pos)
            }
            TokenKind::On => {
                if self.depth > 0 {
                    return Err(ScriptError::parse(
                        "Event handlers must be declared at top level",
                        pos,
                    ));
                }
                self.advance();
                self.event_handler(pos)
            }
            _ => self.assignment_or_expression(),
        }
    }

    /// Try an assignment statement first; on failure rewind and reparse the
    /// same tokens as a bare expression statement.
    fn assignment_or_expression(&mut self) -> Result<Stmt> {
        let checkpoint = self.pos;
        match self.assignment_stmt() {
            Ok(stmt) => Ok(stmt),
            Err(_) => {
                self.pos = checkpoint;
                self.expression_stmt()
            }
        }
    }

    fn assignment_stmt(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;
        match expr.kind {
            ExprKind::Assign { target, value } => {
                self.skip_newlines();
                Ok(Stmt {
                    kind: StmtKind::Assign {
                        target: *target,
                        value: *value,
                    },
                    pos: expr.pos,
                })
            }
            _ => Err(ScriptError::parse("Expected assignment", expr.pos)),
        }
    }

    fn expression_stmt(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;
        self.skip_newlines();
        let pos = expr.pos;
        Ok(Stmt {
            kind: StmtKind::Expr(expr),
            pos,
        })
    }

    fn var_decl(&mut self, pos: Position) -> Result<Stmt> {
        let name = self
            .expect(&TokenKind::Identifier, "Expected variable name")?
            .text;
        self.expect(&TokenKind::Assign, "Expected '=' after variable name")?;
        let init = self.expression()?;
        self.skip_newlines();

        let mut getter: Option<Rc<Accessor>> = None;
        let mut setter: Option<Rc<Accessor>> = None;
        loop {
            if self.eat(&TokenKind::Get) {
                if getter.is_some() {
                    return Err(ScriptError::parse(
                        "Multiple getters defined for property",
                        self.previous().pos,
                    ));
                }
                getter = Some(Rc::new(self.accessor(true)?));
            } else if self.eat(&TokenKind::Set) {
                if setter.is_some() {
                    return Err(ScriptError::parse(
                        "Multiple setters defined for property",
                        self.previous().pos,
                    ));
                }
                setter = Some(Rc::new(self.accessor(false)?));
            } else {
                break;
            }
        }
        self.skip_newlines();

        Ok(Stmt {
            kind: StmtKind::Var {
                name,
                init,
                getter,
                setter,
            },
            pos,
        })
    }

    fn accessor(&mut self, is_getter: bool) -> Result<Accessor> {
        let pos = self.previous().pos;
        let word = if is_getter { "get" } else { "set" };
        self.expect(&TokenKind::LParen, &format!("Expected '(' after {word}"))?;
        let param = if is_getter {
            self.expect(&TokenKind::RParen, "Expected ')' after get")?;
            None
        } else {
            let p = self
                .expect(&TokenKind::Identifier, "Expected parameter name in setter")?
                .text;
            self.expect(&TokenKind::RParen, "Expected ')' after setter parameter")?;
            Some(p)
        };
        self.expect(
            &TokenKind::Assign,
            &format!("Expected '=' after {word} accessor"),
        )?;
        let body = self.expression()?;
        self.skip_newlines();
        Ok(Accessor { param, body, pos })
    }

    /// Comma-separated identifiers up to (and including) `)`.
    fn name_list(&mut self, what: &str, close_msg: &str) -> Result<Vec<Token>> {
        let mut names = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                names.push(self.expect(&TokenKind::Identifier, what)?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, close_msg)?;
        Ok(names)
    }

    fn fun_decl(&mut self, pos: Position) -> Result<Stmt> {
        let name = self
            .expect(&TokenKind::Identifier, "Expected function name")?
            .text;
        self.expect(&TokenKind::LParen, "Expected '(' after function name")?;
        let params = self
            .name_list("Expected parameter name", "Expected ')' after parameters")?
            .into_iter()
            .map(|t| t.text)
            .collect();
        self.expect(&TokenKind::LBrace, "Expected '{' before function body")?;
        let body = self.block()?;
        Ok(Stmt {
            kind: StmtKind::Fun(Rc::new(FunctionDecl {
                name,
                params,
                body,
                pos,
            })),
            pos,
        })
    }

    fn event_handler(&mut self, pos: Position) -> Result<Stmt> {
        let target = self.expect(&TokenKind::Identifier, "Expected target id after 'on'")?;
        ensure_lower_camel_case(&target, "target id")?;
        self.expect(&TokenKind::Dot, "Expected '.' after event target id")?;
        let event = self.expect(&TokenKind::Identifier, "Expected event name after '.'")?;
        ensure_lower_camel_case(&event, "event name")?;
        self.expect(&TokenKind::LParen, "Expected '(' after event name")?;

        let params = self.name_list(
            "Expected parameter name",
            "Expected ')' after event parameters",
        )?;
        for p in &params {
            ensure_lower_camel_case(p, "parameter")?;
        }
        self.expect(&TokenKind::LBrace, "Expected '{' before event handler body")?;
        let body = self.block()?;

        Ok(Stmt {
            kind: StmtKind::On(Rc::new(EventHandlerDecl {
                target: target.text,
                event: event.text,
                params: params.into_iter().map(|t| t.text).collect(),
                body,
                pos,
            })),
            pos,
        })
    }

    fn data_class_decl(&mut self, pos: Position) -> Result<Stmt> {
        self.expect(&TokenKind::Class, "Expected 'class' after 'data'")?;
        let name = self.expect(&TokenKind::Identifier, "Expected class name")?.text;
        self.expect(&TokenKind::LParen, "Expected '(' after class name")?;
        let fields = self
            .name_list("Expected field name", "Expected ')' after fields")?
            .into_iter()
            .map(|t| t.text)
            .collect();
        self.skip_newlines();
        Ok(Stmt {
            kind: StmtKind::DataClass(Rc::new(DataClassDecl { name, fields, pos })),
            pos,
        })
    }

    fn if_stmt(&mut self, pos: Position) -> Result<Stmt> {
        self.expect(&TokenKind::LParen, "Expected '(' after 'if'")?;
        let cond = self.expression()?;
        self.expect(&TokenKind::RParen, "Expected ')' after if condition")?;
        self.expect(&TokenKind::LBrace, "Expected '{' after if condition")?;
        let then_block = self.block()?;

        let else_block = if self.eat_else() {
            if self.check(&TokenKind::If) {
                let else_pos = self.advance().pos;
                Some(vec![self.nested(|p| p.if_stmt(else_pos))?])
            } else {
                self.expect(&TokenKind::LBrace, "Expected '{' after 'else'")?;
                Some(self.block()?)
            }
        } else {
            None
        };

        Ok(Stmt {
            kind: StmtKind::If {
                cond,
                then_block,
                else_block,
            },
            pos,
        })
    }

    fn while_stmt(&mut self, pos: Position) -> Result<Stmt> {
        self.expect(&TokenKind::LParen, "Expected '(' after 'while'")?;
        let cond = self.expression()?;
        self.expect(&TokenKind::RParen, "Expected ')' after while condition")?;
        self.expect(&TokenKind::LBrace, "Expected '{' after while condition")?;
        let body = self.block()?;
        Ok(Stmt {
            kind: StmtKind::While { cond, body },
            pos,
        })
    }

    fn for_stmt(&mut self, pos: Position) -> Result<Stmt> {
        self.expect(&TokenKind::LParen, "Expected '(' after 'for'")?;

        if self.check(&TokenKind::Identifier) {
            let checkpoint = self.pos;
            let var = self.advance().text.clone();
            if self.eat(&TokenKind::In) {
                let iterable = self.expression()?;
                self.expect(&TokenKind::RParen, "Expected ')' after for-in")?;
                self.expect(&TokenKind::LBrace, "Expected '{' after for-in")?;
                let body = self.block()?;
                return Ok(Stmt {
                    kind: StmtKind::ForIn {
                        var,
                        iterable,
                        body,
                    },
                    pos,
                });
            }
            self.pos = checkpoint;
        }

        let init = if self.eat(&TokenKind::Semicolon) {
            None
        } else {
            let init_pos = self.peek().pos;
            let stmt = if self.eat(&TokenKind::Var) {
                self.var_decl(init_pos)?
            } else {
                self.assignment_or_expression()?
            };
            self.expect(
                &TokenKind::Semicolon,
                "Expected ';' after for loop initializer",
            )?;
            Some(Box::new(stmt))
        };

        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon, "Expected ';' after for loop condition")?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.assignment_or_expression()?))
        };
        self.expect(&TokenKind::RParen, "Expected ')' after for clauses")?;
        self.expect(&TokenKind::LBrace, "Expected '{' after for")?;
        let body = self.block()?;

        Ok(Stmt {
            kind: StmtKind::For {
                init,
                cond,
                update,
                body,
            },
            pos,
        })
    }

    fn return_stmt(&mut self, pos: Position) -> Result<Stmt> {
        let bare = self.at_end()
            || self.check(&TokenKind::Newline)
            || self.check(&TokenKind::RBrace)
            || self.check(&TokenKind::Semicolon);
        let value = if bare { None } else { Some(self.expression()?) };
        self.skip_newlines();
        Ok(Stmt {
            kind: StmtKind::Return(value),
            pos,
        })
    }

    /// Statements up to the closing `}`; the opening `{` is already consumed.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        self.depth += 1;
        let result = self.nested(Self::block_inner);
        self.depth -= 1;
        result
    }

    fn block_inner(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        self.skip_newlines();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.eat(&TokenKind::Newline) || self.eat(&TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.statement()?);
        }
        self.expect(&TokenKind::RBrace, "Expected '}' after block")?;
        Ok(stmts)
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub fn expression(&mut self) -> Result<Expr> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;
        if self.eat(&TokenKind::Assign) {
            let value = self.nested(Self::assignment)?;
            let pos = expr.pos;
            if !expr.is_assignable() {
                return Err(ScriptError::parse("Invalid assignment target", pos));
            }
            return Ok(Expr::new(
                ExprKind::Assign {
                    target: Box::new(expr),
                    value: Box::new(value),
                },
                pos,
            ));
        }
        Ok(expr)
    }

    /// One left-associative binary precedence level.  Every operator in a
    /// chain deepens the tree, so each one counts as a nesting level.
    fn binary_level(
        &mut self,
        ops: &[(TokenKind, BinOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let outer = self.nesting;
        let result = self.binary_chain(ops, next);
        self.nesting = outer;
        result
    }

    fn binary_chain(
        &mut self,
        ops: &[(TokenKind, BinOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (kind, op) in ops {
                if self.eat(kind) {
                    self.descend()?;
                    let right = next(self)?;
                    let pos = left.pos;
                    left = Expr::new(ExprKind::Binary(*op, Box::new(left), Box::new(right)), pos);
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn or(&mut self) -> Result<Expr> {
        self.binary_level(&[(TokenKind::Or, BinOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr> {
        self.binary_level(&[(TokenKind::And, BinOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(
            &[(TokenKind::Eq, BinOp::Eq), (TokenKind::Ne, BinOp::Ne)],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenKind::Gt, BinOp::Gt),
                (TokenKind::Ge, BinOp::Ge),
                (TokenKind::Lt, BinOp::Lt),
                (TokenKind::Le, BinOp::Le),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary_level(
            &[(TokenKind::Minus, BinOp::Sub), (TokenKind::Plus, BinOp::Add)],
            Self::factor,
        )
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary_level(
            &[(TokenKind::Slash, BinOp::Div), (TokenKind::Star, BinOp::Mul)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.if_expr(),
        };
        let pos = self.advance().pos;
        let operand = self.nested(Self::unary)?;
        Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), pos))
    }

    fn if_expr(&mut self) -> Result<Expr> {
        if !self.check(&TokenKind::If) {
            return self.when_expr();
        }
        let start = self.advance().pos;
        self.expect(&TokenKind::LParen, "Expected '(' after 'if'")?;
        let cond = self.expression()?;
        self.expect(&TokenKind::RParen, "Expected ')' after if condition")?;
        self.skip_newlines();
        let then_expr = self.expression()?;
        if !self.eat_else() {
            return Err(ScriptError::parse(
                "If expression requires 'else' branch",
                start,
            ));
        }
        self.skip_newlines();
        let else_expr = self.expression()?;
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            start,
        ))
    }

    fn when_expr(&mut self) -> Result<Expr> {
        if !self.check(&TokenKind::When) {
            return self.postfix();
        }
        let start = self.advance().pos;

        let subject = if self.eat(&TokenKind::LParen) {
            let s = self.expression()?;
            self.expect(&TokenKind::RParen, "Expected ')' after when subject")?;
            Some(Box::new(s))
        } else {
            None
        };

        self.expect(&TokenKind::LBrace, "Expected '{' after when")?;
        self.skip_newlines();

        let mut branches = Vec::new();
        let mut else_seen = false;
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            let (cond, pos) = if self.check(&TokenKind::Else) {
                let pos = self.advance().pos;
                if else_seen {
                    return Err(ScriptError::parse("Multiple 'else' branches in when", pos));
                }
                else_seen = true;
                (None, pos)
            } else {
                let c = self.expression()?;
                let pos = c.pos;
                (Some(c), pos)
            };
            self.expect(&TokenKind::Arrow, "Expected '->' after when condition")?;
            let result = self.expression()?;
            branches.push(WhenBranch { cond, result, pos });
            self.skip_newlines();
        }
        self.expect(&TokenKind::RBrace, "Expected '}' after when branches")?;

        Ok(Expr::new(ExprKind::When { subject, branches }, start))
    }

    fn postfix(&mut self) -> Result<Expr> {
        let expr = self.call()?;
        let op = match self.peek().kind {
            TokenKind::Increment => PostfixOp::Increment,
            TokenKind::Decrement => PostfixOp::Decrement,
            _ => return Ok(expr),
        };
        self.advance();
        let pos = expr.pos;
        Ok(Expr::new(ExprKind::Postfix(op, Box::new(expr)), pos))
    }

    fn call(&mut self) -> Result<Expr> {
        let outer = self.nesting;
        let result = self.call_chain();
        self.nesting = outer;
        result
    }

    /// Calls, member access and indexing, each link one level deeper.
    fn call_chain(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if matches!(
                self.peek().kind,
                TokenKind::LParen | TokenKind::Dot | TokenKind::LBracket
            ) {
                self.descend()?;
            }
            if self.eat(&TokenKind::LParen) {
                let args = self.arguments()?;
                let pos = expr.pos;
                let ExprKind::Ident(name) = expr.kind else {
                    return Err(ScriptError::parse("Invalid function call", pos));
                };
                expr = Expr::new(ExprKind::Call { name, args }, pos);
            } else if self.eat(&TokenKind::Dot) {
                let name = self
                    .expect(&TokenKind::Identifier, "Expected property name after '.'")?
                    .text;
                let pos = expr.pos;
                let receiver = Box::new(expr);
                expr = if self.eat(&TokenKind::LParen) {
                    let args = self.arguments()?;
                    Expr::new(
                        ExprKind::MethodCall {
                            receiver,
                            method: name,
                            args,
                        },
                        pos,
                    )
                } else {
                    Expr::new(ExprKind::Member { receiver, name }, pos)
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket, "Expected ']' after array index")?;
                let pos = expr.pos;
                expr = Expr::new(
                    ExprKind::Index {
                        receiver: Box::new(expr),
                        index: Box::new(index),
                    },
                    pos,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "Expected ')' after arguments")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr> {
        let tok = self.peek().clone();
        let pos = tok.pos;
        let kind = match tok.kind {
            TokenKind::Boolean => ExprKind::Bool(tok.text == "true"),
            TokenKind::Null => ExprKind::Null,
            TokenKind::Number => {
                if tok.text.contains('.') {
                    return Err(ScriptError::parse(
                        "Double/float literals are not supported. Use integer values only.",
                        pos,
                    ));
                }
                let n: f64 = tok.text.parse().map_err(|e| {
                    ScriptError::parse(format!("Invalid number literal '{}'", tok.text), pos)
                        .with_source(e)
                })?;
                ExprKind::Number(n)
            }
            TokenKind::Str => ExprKind::Str(tok.text),
            TokenKind::InterpolatedStr(segments) => {
                self.advance();
                let parts = interpolate(segments, self.nesting)?;
                return Ok(Expr::new(ExprKind::Interpolated(parts), pos));
            }
            TokenKind::Identifier => ExprKind::Ident(tok.text),
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "Expected ')' after expression")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        elements.push(self.expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket, "Expected ']' after array elements")?;
                return Ok(Expr::new(ExprKind::Array(elements), pos));
            }
            other => {
                return Err(ScriptError::parse(
                    format!("Expected expression, found {}", other.name()),
                    pos,
                ));
            }
        };
        self.advance();
        Ok(Expr::new(kind, pos))
    }
}

/// Re-lex and re-parse each expression segment of an interpolated string,
/// continuing from the enclosing parser's nesting level.
fn interpolate(segments: Vec<StringSegment>, nesting: usize) -> Result<Vec<StringPart>> {
    let mut parts = Vec::with_capacity(segments.len());
    for seg in segments {
        match seg {
            StringSegment::Text(t) if t.is_empty() => {}
            StringSegment::Text(t) => parts.push(StringPart::Text(t)),
            StringSegment::Expr { source, pos } => {
                if source.trim().is_empty() {
                    continue;
                }
                let tokens = Lexer::with_origin(&source, pos).tokenize()?;
                let mut sub = Parser::new(tokens);
                sub.nesting = nesting;
                sub.skip_newlines();
                let expr = sub.expression()?;
                sub.skip_newlines();
                if !sub.at_end() {
                    let extra = sub.peek();
                    return Err(ScriptError::parse(
                        format!(
                            "Unexpected {} in string interpolation",
                            extra.kind.name()
                        ),
                        extra.pos,
                    ));
                }
                parts.push(StringPart::Expr(expr));
            }
        }
    }
    Ok(parts)
}

fn lower_camel_case() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\p{Ll}[\p{L}\p{Nd}]*$").expect("valid lowerCamelCase pattern"))
}

fn ensure_lower_camel_case(tok: &Token, role: &str) -> Result<()> {
    if lower_camel_case().is_match(&tok.text) {
        Ok(())
    } else {
        Err(ScriptError::parse(
            format!("Invalid {role} '{}'. Expected lowerCamelCase", tok.text),
            tok.pos,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::error::ErrorKind;

    fn parse(src: &str) -> Program {
        parse_program(src).unwrap_or_else(|e| panic!("parse failed for {src:?}: {e}"))
    }

    fn parse_err(src: &str) -> ScriptError {
        match parse_program(src) {
            Ok(p) => panic!("expected error for {src:?}, got {p:?}"),
            Err(e) => e,
        }
    }

    fn single_expr(src: &str) -> Expr {
        let mut prog = parse(src);
        assert_eq!(prog.stmts.len(), 1, "{src:?}");
        match prog.stmts.remove(0).kind {
            StmtKind::Expr(e) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn precedence_mul_over_add() {
        let e = single_expr("1 + 2 * 3");
        let ExprKind::Binary(BinOp::Add, _, rhs) = e.kind else {
            panic!("expected +, got {:?}", e.kind);
        };
        assert!(matches!(rhs.kind, ExprKind::Binary(BinOp::Mul, _, _)));
    }

    #[test]
    fn left_associative_subtraction() {
        let e = single_expr("10 - 4 - 3");
        let ExprKind::Binary(BinOp::Sub, lhs, _) = e.kind else {
            panic!("expected -");
        };
        assert!(matches!(lhs.kind, ExprKind::Binary(BinOp::Sub, _, _)));
    }

    #[test]
    fn assignment_statement_vs_expression() {
        let prog = parse("x = 1\nx + 1");
        assert!(matches!(prog.stmts[0].kind, StmtKind::Assign { .. }));
        assert!(matches!(prog.stmts[1].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn invalid_assignment_target() {
        let err = parse_err("1 = 2");
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.message(), "Invalid assignment target");
    }

    #[test]
    fn member_and_index_targets() {
        let prog = parse("p.x = 1\na[0] = 2");
        assert!(matches!(prog.stmts[0].kind, StmtKind::Assign { .. }));
        assert!(matches!(prog.stmts[1].kind, StmtKind::Assign { .. }));
    }

    #[test]
    fn float_literal_rejected() {
        let err = parse_err("var x = 1.5");
        assert_eq!(
            err.message(),
            "Double/float literals are not supported. Use integer values only."
        );
        assert_eq!(err.position(), Some(Position::new(1, 9)));
    }

    #[test]
    fn var_with_accessors() {
        let prog = parse("var x = 5 get() = field * 2 set(v) = field = v");
        let StmtKind::Var { getter, setter, .. } = &prog.stmts[0].kind else {
            panic!("expected var");
        };
        assert!(getter.as_ref().is_some_and(|g| g.param.is_none()));
        assert_eq!(setter.as_ref().and_then(|s| s.param.as_deref()), Some("v"));
    }

    #[test]
    fn duplicate_getter_rejected() {
        let err = parse_err("var x = 1 get() = 1 get() = 2");
        assert_eq!(err.message(), "Multiple getters defined for property");
    }

    #[test]
    fn for_in_and_classic_for() {
        let prog = parse("for (i in [1, 2]) { }\nfor (var i = 0; i < 3; i++) { }\nfor (;;) { break }");
        assert!(matches!(prog.stmts[0].kind, StmtKind::ForIn { .. }));
        assert!(matches!(
            &prog.stmts[1].kind,
            StmtKind::For { init: Some(_), cond: Some(_), update: Some(_), .. }
        ));
        assert!(matches!(
            &prog.stmts[2].kind,
            StmtKind::For { init: None, cond: None, update: None, .. }
        ));
    }

    #[test]
    fn classic_for_with_identifier_init() {
        let prog = parse("for (i = 0; i < 3; i = i + 1) { }");
        let StmtKind::For { init: Some(init), .. } = &prog.stmts[0].kind else {
            panic!("expected classic for");
        };
        assert!(matches!(init.kind, StmtKind::Assign { .. }));
    }

    #[test]
    fn else_on_next_line() {
        let prog = parse("if (a) {\n}\nelse {\n}");
        assert!(matches!(
            &prog.stmts[0].kind,
            StmtKind::If { else_block: Some(_), .. }
        ));
    }

    #[test]
    fn else_if_chain() {
        let prog = parse("if (a) { } else if (b) { } else { }");
        let StmtKind::If { else_block: Some(e), .. } = &prog.stmts[0].kind else {
            panic!("expected else");
        };
        assert!(matches!(e[0].kind, StmtKind::If { else_block: Some(_), .. }));
    }

    #[test]
    fn if_expression_requires_else() {
        let err = parse_err("var x = if (a) 1");
        assert_eq!(err.message(), "If expression requires 'else' branch");
    }

    #[test]
    fn when_branches() {
        let e = single_expr("when (x) {\n 1 -> \"one\"\n else -> \"many\"\n}");
        let ExprKind::When { subject, branches } = e.kind else {
            panic!("expected when");
        };
        assert!(subject.is_some());
        assert_eq!(branches.len(), 2);
        assert!(branches[1].cond.is_none());
    }

    #[test]
    fn when_multiple_else() {
        let err = parse_err("when {\n else -> 1\n else -> 2\n}");
        assert_eq!(err.message(), "Multiple 'else' branches in when");
    }

    #[test]
    fn return_forms() {
        let prog = parse("fun f() { return }\nfun g() { return 1 }\nfun h() { if (a) { return } }");
        for stmt in &prog.stmts {
            assert!(matches!(stmt.kind, StmtKind::Fun(_)));
        }
    }

    #[test]
    fn call_chain() {
        let e = single_expr("a.b(1)[2].c");
        let ExprKind::Member { receiver, name } = e.kind else {
            panic!("expected member");
        };
        assert_eq!(name, "c");
        assert!(matches!(receiver.kind, ExprKind::Index { .. }));
    }

    #[test]
    fn call_on_non_identifier() {
        let err = parse_err("a[0](1)");
        assert_eq!(err.message(), "Invalid function call");
    }

    #[test]
    fn expected_expression_message() {
        let err = parse_err("var x = )");
        assert_eq!(err.message(), "Expected expression, found RightParen");
    }

    #[test]
    fn interpolation_parsed() {
        let e = single_expr(r#""${1 + 1} apples""#);
        let ExprKind::Interpolated(parts) = e.kind else {
            panic!("expected interpolation");
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], StringPart::Expr(_)));
        assert!(matches!(&parts[1], StringPart::Text(t) if t == " apples"));
    }

    #[test]
    fn interpolation_error_position_is_absolute() {
        let err = parse_err("var s = \"x ${1 +} y\"");
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.position().map(|p| p.line), Some(1));
        assert!(err.position().is_some_and(|p| p.column > 12));
    }

    #[test]
    fn interpolation_trailing_tokens() {
        let err = parse_err(r#""${a b}""#);
        assert!(err.message().contains("string interpolation"));
    }

    #[test]
    fn event_handler_parsed() {
        let prog = parse("on saveButton.clicked(event, count2) {\n print(event)\n}");
        let StmtKind::On(h) = &prog.stmts[0].kind else {
            panic!("expected handler");
        };
        assert_eq!(h.key(), "saveButton.clicked");
        assert_eq!(h.params, vec!["event", "count2"]);
    }

    #[test]
    fn event_handler_naming() {
        let cases = [
            ("on Open.pressed() { }", "Invalid target id 'Open'. Expected lowerCamelCase"),
            ("on open.Pressed() { }", "Invalid event name 'Pressed'. Expected lowerCamelCase"),
            ("on open.pressed(A) { }", "Invalid parameter 'A'. Expected lowerCamelCase"),
            ("on open.pressed(a_b) { }", "Invalid parameter 'a_b'. Expected lowerCamelCase"),
        ];
        for (src, msg) in cases {
            assert_eq!(parse_err(src).message(), msg, "{src}");
        }
    }

    #[test]
    fn event_handler_bad_param_lists() {
        for src in [
            "on open.pressed(,) { }",
            "on open.pressed(a b) { }",
            "on open.pressed(a,) { }",
        ] {
            assert_eq!(parse_err(src).kind(), ErrorKind::Parse, "{src}");
        }
    }

    #[test]
    fn duplicate_event_handler() {
        let err = parse_err("on btn.click(e) { }\non btn.click(e) { }");
        assert_eq!(err.message(), "Duplicate event handler 'btn.click'");
        assert_eq!(err.position(), Some(Position::new(2, 1)));
    }

    #[test]
    fn nested_event_handler_rejected() {
        let err = parse_err("fun f() { on a.b() { } }");
        assert_eq!(err.message(), "Event handlers must be declared at top level");
    }

    #[test]
    fn unterminated_block() {
        let err = parse_err("fun f() {\n  var x = 1\n");
        assert_eq!(err.message(), "Expected '}' after block");
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let cases = [
            "(".repeat(100_000),
            format!("var a = {}", "[".repeat(50_000)),
            format!("x = {}1", "-".repeat(50_000)),
            format!("{}1", "1 + ".repeat(50_000)),
            format!("x{}", ".y".repeat(50_000)),
            "if (true) {\n".repeat(20_000),
            format!("if (a) {{ }}{}", " else if (a) { }".repeat(20_000)),
        ];
        for src in &cases {
            let err = parse_err(src);
            assert_eq!(err.kind(), ErrorKind::Parse, "{}", &src[..20]);
            assert_eq!(err.message(), "Expression nested too deeply");
        }
    }

    #[test]
    fn moderate_nesting_parses() {
        let src = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(single_expr(&src).kind, ExprKind::Number(n) if n == 1.0));
        parse(&format!("{}x", "!".repeat(100)));
        parse(&format!("{}{}", "if (true) {\n".repeat(60), "}\n".repeat(60)));
    }

    #[test]
    fn data_class() {
        let prog = parse("data class Point(x, y)");
        let StmtKind::DataClass(d) = &prog.stmts[0].kind else {
            panic!("expected data class");
        };
        assert_eq!(d.fields, vec!["x", "y"]);
    }
}
