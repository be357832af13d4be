//! Hybrid parser for moxy
//!
//! A hand-written recursive-descent parser with Pratt-style precedence
//! climbing for expressions and a raw-passthrough fallback for anything it
//! does not recognize. The fallback is the load-bearing idea: the
//! structural grammar stays small, and unparsed constructs are captured as
//! `Raw` nodes and re-emitted verbatim, which is what makes ordinary C
//! valid moxy.
//!
//! Speculation discipline: the parser never rewinds past a committed
//! construct. Lookahead that may fail (declaration vs. expression, cast
//! vs. parenthesized expression, lambda vs. cast) snapshots the position
//! and restores it on a *soft* error. A handful of errors are *fatal* and
//! abort even inside speculation: pipe misuse, `Future`/`await` without
//! the async flag, and `Unknown` tokens reaching the raw path.

use crate::ast::*;
use crate::config::TranslateOptions;
use crate::diag::{self, Diagnostic};
use crate::lexer;
use crate::token::{Token, TokenKind};
use std::collections::HashSet;

pub(crate) struct ParseError {
    pub diag: Diagnostic,
    pub fatal: bool,
}

impl ParseError {
    fn soft(diag: Diagnostic) -> Self {
        ParseError { diag, fatal: false }
    }

    fn fatal(diag: Diagnostic) -> Self {
        ParseError { diag, fatal: true }
    }

    fn into_fatal(mut self) -> Self {
        self.fatal = true;
        self
    }
}

type PResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
    filename: String,
    options: TranslateOptions,
    /// Names accepted in type positions: `@type` registrations plus enum
    /// declarations seen so far
    known_types: HashSet<String>,
    next_lambda_id: usize,
    lex_error: Option<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, filename: impl Into<String>, options: TranslateOptions) -> Self {
        let (tokens, lex_error) = match lexer::tokenize(source) {
            Ok(tokens) => (tokens, None),
            Err(diag) => (vec![Token::new(TokenKind::Eof, "", 1, 1)], Some(diag)),
        };
        Parser {
            tokens,
            pos: 0,
            source,
            filename: filename.into(),
            options,
            known_types: HashSet::new(),
            next_lambda_id: 0,
            lex_error,
        }
    }

    /// Register user type names (from the `@type` pragma) so the parser
    /// accepts them in type positions.
    pub fn register_types<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            self.known_types.insert(name.as_ref().to_string());
        }
    }

    pub fn parse(&mut self) -> Result<Program, String> {
        if let Some(diag) = self.lex_error.take() {
            return Err(diag.render(self.source, &self.filename));
        }

        let mut program = Program { decls: Vec::new() };
        while !self.at_end() {
            match self.parse_top_level() {
                Ok(decl) => program.decls.push(decl),
                Err(e) => return Err(e.diag.render(self.source, &self.filename)),
            }
        }
        Ok(program)
    }

    // ---- token plumbing ----

    fn tok(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn tok_at(&self, off: usize) -> &Token {
        let idx = (self.pos + off).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn kind(&self) -> TokenKind {
        self.tok().kind
    }

    fn at_end(&self) -> bool {
        self.kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = self.tok().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        let got = self.tok().clone();
        let mut d = Diagnostic::new(
            got.line,
            got.col,
            got.lexeme.chars().count(),
            format!(
                "expected {}, found {}",
                kind.display_name(),
                got.kind.display_name()
            ),
        );
        if let Some(hint) = diag::expected_hint(kind, got.kind) {
            d = d.with_hint(hint);
        } else if got.kind == TokenKind::Ident
            && let Some(hint) = diag::ident_hint(&got.lexeme)
        {
            d = d.with_hint(hint);
        } else if let Some(hint) = diag::stray_token_hint(got.kind) {
            d = d.with_hint(hint);
        }
        Err(ParseError::soft(d))
    }

    fn error_here(&self, message: impl Into<String>) -> Diagnostic {
        let t = self.tok();
        Diagnostic::new(t.line, t.col, t.lexeme.chars().count(), message)
    }

    // ---- top level ----

    fn parse_top_level(&mut self) -> PResult<Decl> {
        let t = self.tok().clone();

        if t.kind == TokenKind::EnumKw {
            if self.enum_is_moxy() {
                return self.parse_enum_decl();
            }
            return self.raw_decl();
        }

        if t.kind.starts_type()
            && let Some(decl) = self.try_func_or_global()?
        {
            return Ok(decl);
        }

        self.raw_decl()
    }

    /// Decide whether an `enum` token opens a moxy tagged enum or a C enum
    /// that should pass through raw. A moxy enum has a parenthesized field
    /// list on some variant, or a closing `}` not followed by `;` or an
    /// identifier (which would be a C enum variable declaration).
    fn enum_is_moxy(&self) -> bool {
        let mut i = 1; // past 'enum'
        if self.tok_at(i).kind != TokenKind::Ident {
            return false;
        }
        i += 1;
        if self.tok_at(i).kind != TokenKind::LBrace {
            return false;
        }
        i += 1;
        let mut depth = 1usize;
        let mut has_parens = false;
        loop {
            let k = self.tok_at(i).kind;
            match k {
                TokenKind::Eof => return false,
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::LParen if depth == 1 => has_parens = true,
                _ => {}
            }
            i += 1;
        }
        if has_parens {
            return true;
        }
        !matches!(
            self.tok_at(i + 1).kind,
            TokenKind::Semi | TokenKind::Ident
        )
    }

    fn parse_enum_decl(&mut self) -> PResult<Decl> {
        let kw = self.advance();
        let name = self.expect(TokenKind::Ident)?.lexeme;

        self.expect(TokenKind::LBrace).map_err(ParseError::into_fatal)?;
        let mut variants = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.at_end() {
                return Err(ParseError::fatal(
                    self.error_here(format!("unexpected end of file in enum '{}'", name)),
                ));
            }
            let vname = self.expect(TokenKind::Ident).map_err(ParseError::into_fatal)?.lexeme;
            let mut fields = Vec::new();
            if self.accept(TokenKind::LParen) {
                while !self.check(TokenKind::RParen) {
                    let fty = self.parse_type().map_err(ParseError::into_fatal)?;
                    let fname = self.expect(TokenKind::Ident).map_err(ParseError::into_fatal)?.lexeme;
                    fields.push(Field { ty: fty, name: fname });
                    if !self.accept(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen).map_err(ParseError::into_fatal)?;
            }
            variants.push(Variant { name: vname, fields });
            self.accept(TokenKind::Comma);
        }
        self.expect(TokenKind::RBrace).map_err(ParseError::into_fatal)?;

        self.known_types.insert(name.clone());
        Ok(Decl::new(
            DeclKind::Enum(EnumDecl { name, variants }),
            kw.line,
            kw.col,
        ))
    }

    /// Speculative: `type name ( params ) { body }` or `type name = expr ;`.
    /// Commits to a function only once the opening `{` is seen, so C
    /// prototypes and K&R definitions fall through to raw.
    fn try_func_or_global(&mut self) -> PResult<Option<Decl>> {
        let save = self.pos;
        let start = self.tok().clone();

        let ty = match self.parse_type() {
            Ok(ty) => ty,
            Err(e) if e.fatal => return Err(e),
            Err(_) => {
                self.pos = save;
                return Ok(None);
            }
        };
        if !self.check(TokenKind::Ident) {
            self.pos = save;
            return Ok(None);
        }
        let name = self.advance().lexeme;

        if self.accept(TokenKind::LParen) {
            let params = match self.parse_params() {
                Ok(params) => params,
                Err(e) if e.fatal => return Err(e),
                Err(_) => {
                    self.pos = save;
                    return Ok(None);
                }
            };
            if !self.check(TokenKind::LBrace) {
                self.pos = save;
                return Ok(None);
            }
            // Committed: body errors abort from here on
            let body = self.parse_block().map_err(ParseError::into_fatal)?;
            let is_main = name == "main";
            let returns_future = crate::types::is_future(&ty);
            return Ok(Some(Decl::new(
                DeclKind::Func(FuncDecl {
                    ret: ty,
                    name,
                    params,
                    body,
                    is_main,
                    returns_future,
                }),
                start.line,
                start.col,
            )));
        }

        if self.accept(TokenKind::Eq) {
            let value = match self.parse_expr() {
                Ok(value) => value,
                Err(e) if e.fatal => return Err(e),
                Err(_) => {
                    self.pos = save;
                    return Ok(None);
                }
            };
            if !self.accept(TokenKind::Semi) {
                self.pos = save;
                return Ok(None);
            }
            return Ok(Some(Decl::new(
                DeclKind::Var(VarDecl { ty, name, value }),
                start.line,
                start.col,
            )));
        }

        self.pos = save;
        Ok(None)
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.check(TokenKind::VoidKw) && self.tok_at(1).kind == TokenKind::RParen {
            self.advance();
        }
        while !self.check(TokenKind::RParen) {
            let ty = self.parse_type()?;
            let name = self.expect(TokenKind::Ident)?.lexeme;
            params.push(Param { ty, name });
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    // ---- types ----

    /// Parse a type into its canonical string form. Containers recurse;
    /// common C compositions (`const T`, `struct S`, `unsigned int`,
    /// trailing `*` and `[]`) are preserved verbatim.
    fn parse_type(&mut self) -> PResult<String> {
        let t = self.advance();
        let mut base = match t.kind {
            TokenKind::ResultKw => {
                self.expect(TokenKind::Lt)?;
                let inner = self.parse_type()?;
                self.expect(TokenKind::Gt)?;
                format!("Result<{}>", inner)
            }
            TokenKind::MapKw => {
                self.expect(TokenKind::LBracket)?;
                let key = self.parse_type()?;
                self.expect(TokenKind::Comma)?;
                let val = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                format!("map[{},{}]", key, val)
            }
            TokenKind::FutureKw => {
                if !self.options.async_enabled {
                    return Err(ParseError::fatal(
                        Diagnostic::new(
                            t.line,
                            t.col,
                            t.lexeme.chars().count(),
                            "'Future' requires the async feature flag",
                        )
                        .with_hint("enable async in the translator options to use futures"),
                    ));
                }
                self.expect(TokenKind::Lt)?;
                let inner = self.parse_type()?;
                self.expect(TokenKind::Gt)?;
                format!("Future<{}>", inner)
            }
            TokenKind::ConstKw => {
                let rest = self.parse_type()?;
                format!("const {}", rest)
            }
            TokenKind::StructKw | TokenKind::UnionKw => {
                let name = self.expect(TokenKind::Ident)?.lexeme;
                format!("{} {}", t.lexeme, name)
            }
            TokenKind::UnsignedKw | TokenKind::SignedKw => {
                let mut s = t.lexeme;
                if matches!(
                    self.kind(),
                    TokenKind::IntKw | TokenKind::CharKw | TokenKind::LongKw | TokenKind::ShortKw
                ) {
                    s.push(' ');
                    s.push_str(&self.advance().lexeme);
                }
                s
            }
            TokenKind::LongKw => {
                let mut s = t.lexeme;
                if matches!(self.kind(), TokenKind::LongKw | TokenKind::IntKw) {
                    s.push(' ');
                    s.push_str(&self.advance().lexeme);
                }
                s
            }
            TokenKind::StringKw
            | TokenKind::IntKw
            | TokenKind::FloatKw
            | TokenKind::DoubleKw
            | TokenKind::CharKw
            | TokenKind::BoolKw
            | TokenKind::ShortKw
            | TokenKind::VoidKw
            | TokenKind::Ident => t.lexeme,
            _ => {
                return Err(ParseError::soft(Diagnostic::new(
                    t.line,
                    t.col,
                    t.lexeme.chars().count(),
                    format!("expected type, found {}", t.kind.display_name()),
                )));
            }
        };

        loop {
            if self.check(TokenKind::Star) {
                self.advance();
                base.push('*');
                continue;
            }
            if self.check(TokenKind::LBracket) && self.tok_at(1).kind == TokenKind::RBracket {
                self.advance();
                self.advance();
                base.push_str("[]");
                continue;
            }
            break;
        }
        Ok(base)
    }

    // ---- statements ----

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.at_end() {
                return Err(ParseError::fatal(
                    self.error_here("unexpected end of file inside a block"),
                ));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let t = self.tok().clone();
        match t.kind {
            TokenKind::Ident
                if t.lexeme == "print" && self.tok_at(1).kind == TokenKind::LParen =>
            {
                self.parse_print()
            }
            TokenKind::Ident
                if t.lexeme == "assert" && self.tok_at(1).kind == TokenKind::LParen =>
            {
                self.parse_assert()
            }
            TokenKind::MatchKw => self.parse_match(),
            TokenKind::IfKw => self.parse_if(),
            TokenKind::WhileKw => self.parse_while(),
            TokenKind::ForKw => self.parse_for(),
            TokenKind::ReturnKw => self.parse_return(),
            TokenKind::LBrace => {
                let body = self.parse_block()?;
                Ok(Stmt::new(StmtKind::Block(body), t.line, t.col))
            }
            _ => {
                if t.kind.starts_type()
                    && let Some(stmt) = self.try_var_decl()?
                {
                    return Ok(stmt);
                }
                if let Some(stmt) = self.try_expr_stmt()? {
                    return Ok(stmt);
                }
                self.raw_stmt()
            }
        }
    }

    fn parse_print(&mut self) -> PResult<Stmt> {
        let kw = self.advance();
        self.expect(TokenKind::LParen)?;
        let arg = self.parse_expr()?;
        self.expect(TokenKind::RParen).map_err(ParseError::into_fatal)?;
        self.accept(TokenKind::Semi);
        Ok(Stmt::new(StmtKind::Print(arg), kw.line, kw.col))
    }

    fn parse_assert(&mut self) -> PResult<Stmt> {
        let kw = self.advance();
        self.expect(TokenKind::LParen)?;
        let arg = self.parse_expr()?;
        self.expect(TokenKind::RParen).map_err(ParseError::into_fatal)?;
        self.accept(TokenKind::Semi);
        Ok(Stmt::new(StmtKind::Assert(arg), kw.line, kw.col))
    }

    fn parse_match(&mut self) -> PResult<Stmt> {
        let kw = self.advance();
        let target = self.expect(TokenKind::Ident)?.lexeme;
        self.expect(TokenKind::LBrace)?;

        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.at_end() {
                return Err(ParseError::fatal(
                    self.error_here("unexpected end of file in match statement"),
                ));
            }

            let pattern = self.parse_pattern()?;
            self.expect(TokenKind::FatArrow).map_err(ParseError::into_fatal)?;
            let body = self.parse_stmt()?;
            arms.push(MatchArm {
                pattern,
                body: Box::new(body),
            });
            self.accept(TokenKind::Comma);
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Stmt::new(
            StmtKind::Match(MatchStmt { target, arms }),
            kw.line,
            kw.col,
        ))
    }

    fn parse_pattern(&mut self) -> PResult<Pattern> {
        let (enum_name, variant) = if matches!(self.kind(), TokenKind::OkKw | TokenKind::ErrKw) {
            let kw = self.advance();
            (String::new(), kw.lexeme)
        } else {
            let ename = self.expect(TokenKind::Ident).map_err(ParseError::into_fatal)?.lexeme;
            self.expect(TokenKind::ColonColon).map_err(ParseError::into_fatal)?;
            let vname = self.expect(TokenKind::Ident).map_err(ParseError::into_fatal)?.lexeme;
            (ename, vname)
        };

        let binding = if self.accept(TokenKind::LParen) {
            let b = self.expect(TokenKind::Ident).map_err(ParseError::into_fatal)?.lexeme;
            self.expect(TokenKind::RParen).map_err(ParseError::into_fatal)?;
            Some(b)
        } else {
            None
        };

        Ok(Pattern {
            enum_name,
            variant,
            binding,
        })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let kw = self.advance();
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen).map_err(ParseError::into_fatal)?;
        let then_body = self.parse_block().map_err(ParseError::into_fatal)?;

        let else_body = if self.accept(TokenKind::ElseKw) {
            if self.check(TokenKind::IfKw) {
                // else-if chains nest as a single-statement else block
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block().map_err(ParseError::into_fatal)?)
            }
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If(IfStmt {
                cond,
                then_body,
                else_body,
            }),
            kw.line,
            kw.col,
        ))
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let kw = self.advance();
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen).map_err(ParseError::into_fatal)?;
        let body = self.parse_block().map_err(ParseError::into_fatal)?;
        Ok(Stmt::new(
            StmtKind::While(WhileStmt { cond, body }),
            kw.line,
            kw.col,
        ))
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let kw = self.advance();

        if !self.check(TokenKind::LParen) {
            // for v in iter { ... } / for a, b in iter { ... }
            let mut vars = vec![self.expect(TokenKind::Ident)?.lexeme];
            if self.accept(TokenKind::Comma) {
                vars.push(self.expect(TokenKind::Ident).map_err(ParseError::into_fatal)?.lexeme);
            }
            self.expect(TokenKind::InKw).map_err(ParseError::into_fatal)?;
            let first = self.parse_expr()?;
            let iter = if self.accept(TokenKind::DotDot) {
                let end = self.parse_expr()?;
                ForIter::Range(first, end)
            } else {
                ForIter::Value(first)
            };
            let body = self.parse_block().map_err(ParseError::into_fatal)?;
            return Ok(Stmt::new(
                StmtKind::ForIn(ForInStmt { vars, iter, body }),
                kw.line,
                kw.col,
            ));
        }

        self.expect(TokenKind::LParen)?;
        let init = self.parse_for_clause()?;
        self.expect(TokenKind::Semi).map_err(ParseError::into_fatal)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Semi).map_err(ParseError::into_fatal)?;
        let step = self.parse_for_step()?;
        self.expect(TokenKind::RParen).map_err(ParseError::into_fatal)?;
        let body = self.parse_block().map_err(ParseError::into_fatal)?;

        Ok(Stmt::new(
            StmtKind::For(ForStmt {
                init: Box::new(init),
                cond,
                step: Box::new(step),
                body,
            }),
            kw.line,
            kw.col,
        ))
    }

    /// The init clause of a C-style for: a declaration or an expression,
    /// optionally an assignment. No trailing semicolon.
    fn parse_for_clause(&mut self) -> PResult<Stmt> {
        let t = self.tok().clone();
        if t.kind.starts_type() {
            let save = self.pos;
            let decl = (|| -> PResult<Stmt> {
                let ty = self.parse_type()?;
                let name = self.expect(TokenKind::Ident)?.lexeme;
                self.expect(TokenKind::Eq)?;
                let value = self.parse_expr()?;
                Ok(Stmt::new(
                    StmtKind::Var(VarDecl { ty, name, value }),
                    t.line,
                    t.col,
                ))
            })();
            match decl {
                Ok(stmt) => return Ok(stmt),
                Err(e) if e.fatal => return Err(e),
                Err(_) => self.pos = save,
            }
        }
        self.parse_for_step()
    }

    fn parse_for_step(&mut self) -> PResult<Stmt> {
        let t = self.tok().clone();
        let expr = self.parse_expr()?;
        if self.kind().is_assign_op() {
            let op = self.advance().lexeme;
            let value = self.parse_expr()?;
            return Ok(Stmt::new(
                StmtKind::Assign(AssignStmt {
                    target: expr,
                    op,
                    value,
                }),
                t.line,
                t.col,
            ));
        }
        Ok(Stmt::new(StmtKind::Expr(expr), t.line, t.col))
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        let kw = self.advance();
        if self.accept(TokenKind::Semi) {
            return Ok(Stmt::new(StmtKind::Return(None), kw.line, kw.col));
        }
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semi).map_err(ParseError::into_fatal)?;
        Ok(Stmt::new(StmtKind::Return(Some(value)), kw.line, kw.col))
    }

    /// Speculative `type name = expr ;` statement. Restores and declines on
    /// any soft failure so uninitialized declarations, multi-declarators
    /// and brace initializers ride the raw path.
    fn try_var_decl(&mut self) -> PResult<Option<Stmt>> {
        let save = self.pos;
        let t = self.tok().clone();
        let attempt = (|| -> PResult<Stmt> {
            let ty = self.parse_type()?;
            let name = self.expect(TokenKind::Ident)?.lexeme;
            self.expect(TokenKind::Eq)?;
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semi)?;
            Ok(Stmt::new(
                StmtKind::Var(VarDecl { ty, name, value }),
                t.line,
                t.col,
            ))
        })();
        match attempt {
            Ok(stmt) => Ok(Some(stmt)),
            Err(e) if e.fatal => Err(e),
            Err(_) => {
                self.pos = save;
                Ok(None)
            }
        }
    }

    /// Speculative expression statement or assignment. Commits when the
    /// statement is properly delimited (`;`, or a match-arm `,`/`}`).
    fn try_expr_stmt(&mut self) -> PResult<Option<Stmt>> {
        let save = self.pos;
        let t = self.tok().clone();

        let expr = match self.parse_expr() {
            Ok(expr) => expr,
            Err(e) if e.fatal => return Err(e),
            Err(_) => {
                self.pos = save;
                return Ok(None);
            }
        };

        if self.kind().is_assign_op() {
            let op = self.advance().lexeme;
            let value = match self.parse_expr() {
                Ok(value) => value,
                Err(e) if e.fatal => return Err(e),
                Err(_) => {
                    self.pos = save;
                    return Ok(None);
                }
            };
            if !self.accept(TokenKind::Semi) {
                self.pos = save;
                return Ok(None);
            }
            return Ok(Some(Stmt::new(
                StmtKind::Assign(AssignStmt {
                    target: expr,
                    op,
                    value,
                }),
                t.line,
                t.col,
            )));
        }

        let delimited = self.accept(TokenKind::Semi)
            || matches!(self.kind(), TokenKind::Comma | TokenKind::RBrace);
        if !delimited {
            self.pos = save;
            return Ok(None);
        }

        // `x |> print` rewrites to a print statement
        if let ExprKind::Call { name, mut args } = expr.kind.clone()
            && name == "print"
            && args.len() == 1
        {
            return Ok(Some(Stmt::new(
                StmtKind::Print(args.remove(0)),
                t.line,
                t.col,
            )));
        }

        Ok(Some(Stmt::new(StmtKind::Expr(expr), t.line, t.col)))
    }

    // ---- raw passthrough ----

    fn raw_decl(&mut self) -> PResult<Decl> {
        let (text, line, col) = self.raw_capture()?;
        Ok(Decl::new(DeclKind::Raw(text), line, col))
    }

    fn raw_stmt(&mut self) -> PResult<Stmt> {
        let (text, line, col) = self.raw_capture()?;
        Ok(Stmt::new(StmtKind::Raw(text), line, col))
    }

    /// Capture an unrecognized construct as a token range. The range ends
    /// at the first `;` at depth 0, or at a `}` returning to depth 0 that
    /// is not followed by a continuation (identifier, `*`, `while` for
    /// do-while, `;`). A `}` while already at depth 0 belongs to the
    /// enclosing block and is never consumed.
    fn raw_capture(&mut self) -> PResult<(String, usize, usize)> {
        let start = self.tok().clone();
        let mut toks: Vec<Token> = Vec::new();
        let mut depth = 0usize;

        loop {
            let t = self.tok().clone();
            match t.kind {
                TokenKind::Eof => break,
                TokenKind::Unknown => {
                    return Err(ParseError::fatal(Diagnostic::new(
                        t.line,
                        t.col,
                        t.lexeme.chars().count(),
                        format!("unexpected character '{}'", t.lexeme),
                    )));
                }
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                    depth += 1;
                    toks.push(self.advance());
                }
                TokenKind::RParen | TokenKind::RBracket => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    toks.push(self.advance());
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    toks.push(self.advance());
                    if depth == 0
                        && !matches!(
                            self.kind(),
                            TokenKind::Ident
                                | TokenKind::Star
                                | TokenKind::WhileKw
                                | TokenKind::Semi
                        )
                    {
                        break;
                    }
                }
                TokenKind::Semi if depth == 0 => {
                    toks.push(self.advance());
                    break;
                }
                _ => toks.push(self.advance()),
            }
        }

        if toks.is_empty() {
            return Err(ParseError::fatal(Diagnostic::new(
                start.line,
                start.col,
                start.lexeme.chars().count(),
                format!("unexpected {}", start.kind.display_name()),
            )));
        }

        Ok((raw_text(&toks), start.line, start.col))
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> PResult<Expr> {
        let cond = self.parse_binary(0)?;
        if self.accept(TokenKind::Question) {
            let then_val = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            let else_val = self.parse_ternary()?;
            let (line, col) = (cond.line, cond.col);
            return Ok(Expr::new(
                ExprKind::Ternary {
                    cond: Box::new(cond),
                    then_val: Box::new(then_val),
                    else_val: Box::new(else_val),
                },
                line,
                col,
            ));
        }
        Ok(cond)
    }

    fn parse_binary(&mut self, min_prec: i32) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let Some(prec) = binop_prec(self.kind()) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let op = self.advance();
            if op.kind == TokenKind::PipeArrow {
                let rhs = self.parse_unary()?;
                left = self.rewrite_pipe(left, rhs, &op)?;
                continue;
            }
            let right = self.parse_binary(prec + 1)?;
            let (line, col) = (left.line, left.col);
            left = Expr::new(
                ExprKind::Binary {
                    op: op.lexeme,
                    lhs: Box::new(left),
                    rhs: Box::new(right),
                },
                line,
                col,
            );
        }
        Ok(left)
    }

    /// Structural rewrite of `lhs |> rhs`: the piped value becomes the
    /// first argument of a call or method call; `|> print` becomes a print.
    fn rewrite_pipe(&mut self, lhs: Expr, rhs: Expr, op: &Token) -> PResult<Expr> {
        let (line, col) = (lhs.line, lhs.col);
        match rhs.kind {
            ExprKind::Call { name, mut args } => {
                args.insert(0, lhs);
                Ok(Expr::new(ExprKind::Call { name, args }, line, col))
            }
            ExprKind::Method {
                target,
                name,
                mut args,
                arrow,
            } => {
                args.insert(0, lhs);
                Ok(Expr::new(
                    ExprKind::Method {
                        target,
                        name,
                        args,
                        arrow,
                    },
                    line,
                    col,
                ))
            }
            ExprKind::Ident(name) if name == "print" => Ok(Expr::new(
                ExprKind::Call {
                    name,
                    args: vec![lhs],
                },
                line,
                col,
            )),
            ExprKind::Ident(name) => Err(ParseError::fatal(
                Diagnostic::new(
                    op.line,
                    op.col,
                    2,
                    format!("cannot pipe into '{}' without a call", name),
                )
                .with_hint(format!(
                    "write 'x |> {}()' to pass the piped value as the first argument",
                    name
                )),
            )),
            _ => Err(ParseError::fatal(
                Diagnostic::new(op.line, op.col, 2, "invalid pipe target")
                    .with_hint("the right side of '|>' must be a function or method call"),
            )),
        }
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let t = self.tok().clone();
        match t.kind {
            TokenKind::Bang
            | TokenKind::Minus
            | TokenKind::Tilde
            | TokenKind::Star
            | TokenKind::Amp
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus => {
                let op = self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: op.lexeme,
                        operand: Box::new(operand),
                        postfix: false,
                    },
                    t.line,
                    t.col,
                ))
            }
            TokenKind::SizeofKw => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: "sizeof".to_string(),
                        operand: Box::new(operand),
                        postfix: false,
                    },
                    t.line,
                    t.col,
                ))
            }
            TokenKind::AwaitKw => {
                if !self.options.async_enabled {
                    return Err(ParseError::fatal(
                        Diagnostic::new(
                            t.line,
                            t.col,
                            5,
                            "'await' requires the async feature flag",
                        )
                        .with_hint("enable async in the translator options to use futures"),
                    ));
                }
                self.advance();
                let inner = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Await(Box::new(inner)), t.line, t.col))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut left = self.parse_primary()?;
        loop {
            match self.kind() {
                TokenKind::Dot | TokenKind::Arrow => {
                    let arrow = self.advance().kind == TokenKind::Arrow;
                    let name = self.expect(TokenKind::Ident)?.lexeme;
                    let (line, col) = (left.line, left.col);
                    if self.accept(TokenKind::LParen) {
                        let args = self.parse_args()?;
                        left = Expr::new(
                            ExprKind::Method {
                                target: Box::new(left),
                                name,
                                args,
                                arrow,
                            },
                            line,
                            col,
                        );
                    } else {
                        left = Expr::new(
                            ExprKind::Field {
                                target: Box::new(left),
                                name,
                                arrow,
                            },
                            line,
                            col,
                        );
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    let (line, col) = (left.line, left.col);
                    left = Expr::new(
                        ExprKind::Index {
                            target: Box::new(left),
                            index: Box::new(index),
                        },
                        line,
                        col,
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = self.advance();
                    let (line, col) = (left.line, left.col);
                    left = Expr::new(
                        ExprKind::Unary {
                            op: op.lexeme,
                            operand: Box::new(left),
                            postfix: true,
                        },
                        line,
                        col,
                    );
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) {
            args.push(self.parse_expr()?);
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let t = self.tok().clone();
        match t.kind {
            TokenKind::LParen => {
                if let Some(lambda) = self.try_lambda()? {
                    return Ok(lambda);
                }
                if let Some(cast) = self.try_cast()? {
                    return Ok(cast);
                }
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::new(ExprKind::Paren(Box::new(inner)), t.line, t.col))
            }
            TokenKind::StrLit => {
                self.advance();
                Ok(Expr::new(ExprKind::StrLit(t.lexeme), t.line, t.col))
            }
            TokenKind::IntLit => {
                self.advance();
                Ok(Expr::new(ExprKind::IntLit(t.lexeme), t.line, t.col))
            }
            TokenKind::FloatLit => {
                self.advance();
                Ok(Expr::new(ExprKind::FloatLit(t.lexeme), t.line, t.col))
            }
            TokenKind::CharLit => {
                self.advance();
                Ok(Expr::new(ExprKind::CharLit(t.lexeme), t.line, t.col))
            }
            TokenKind::TrueKw | TokenKind::FalseKw => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::BoolLit(t.kind == TokenKind::TrueKw),
                    t.line,
                    t.col,
                ))
            }
            TokenKind::NullKw => {
                self.advance();
                Ok(Expr::new(ExprKind::Null, t.line, t.col))
            }
            TokenKind::OkKw | TokenKind::ErrKw => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let inner = Box::new(self.parse_expr()?);
                self.expect(TokenKind::RParen)?;
                let kind = if t.kind == TokenKind::OkKw {
                    ExprKind::OkExpr(inner)
                } else {
                    ExprKind::ErrExpr(inner)
                };
                Ok(Expr::new(kind, t.line, t.col))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(TokenKind::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.accept(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::new(ExprKind::ListLit(items), t.line, t.col))
            }
            TokenKind::LBrace => {
                self.advance();
                self.expect(TokenKind::RBrace)?;
                Ok(Expr::new(ExprKind::MapLit, t.line, t.col))
            }
            TokenKind::Ident => {
                self.advance();
                if self.accept(TokenKind::ColonColon) {
                    let variant = self.expect(TokenKind::Ident)?.lexeme;
                    let args = if self.accept(TokenKind::LParen) {
                        self.parse_args()?
                    } else {
                        Vec::new()
                    };
                    return Ok(Expr::new(
                        ExprKind::EnumInit {
                            enum_name: t.lexeme,
                            variant,
                            args,
                        },
                        t.line,
                        t.col,
                    ));
                }
                if self.check(TokenKind::LParen) && t.lexeme != "print" {
                    self.advance();
                    let args = self.parse_args()?;
                    return Ok(Expr::new(
                        ExprKind::Call {
                            name: t.lexeme,
                            args,
                        },
                        t.line,
                        t.col,
                    ));
                }
                Ok(Expr::new(ExprKind::Ident(t.lexeme), t.line, t.col))
            }
            _ => {
                let mut d = Diagnostic::new(
                    t.line,
                    t.col,
                    t.lexeme.chars().count(),
                    format!("unexpected {} in expression", t.kind.display_name()),
                );
                if let Some(hint) = diag::stray_token_hint(t.kind) {
                    d = d.with_hint(hint);
                }
                Err(ParseError::soft(d))
            }
        }
    }

    /// Speculative lambda: `(type name, ...) -> expr-or-block`. Declines
    /// unless a well-formed typed parameter list is followed by `->`.
    fn try_lambda(&mut self) -> PResult<Option<Expr>> {
        let save = self.pos;
        let start = self.tok().clone();
        self.advance(); // (

        let mut params = Vec::new();
        if !self.accept(TokenKind::RParen) {
            loop {
                let ty = match self.parse_type() {
                    Ok(ty) => ty,
                    Err(e) if e.fatal => return Err(e),
                    Err(_) => {
                        self.pos = save;
                        return Ok(None);
                    }
                };
                if !self.check(TokenKind::Ident) {
                    self.pos = save;
                    return Ok(None);
                }
                let name = self.advance().lexeme;
                params.push(Param { ty, name });
                if self.accept(TokenKind::Comma) {
                    continue;
                }
                if self.accept(TokenKind::RParen) {
                    break;
                }
                self.pos = save;
                return Ok(None);
            }
        }

        if !self.accept(TokenKind::Arrow) {
            self.pos = save;
            return Ok(None);
        }

        // Committed
        let body = if self.check(TokenKind::LBrace) {
            LambdaBody::Block(self.parse_block().map_err(ParseError::into_fatal)?)
        } else {
            LambdaBody::Expr(Box::new(self.parse_expr().map_err(ParseError::into_fatal)?))
        };
        let id = self.next_lambda_id;
        self.next_lambda_id += 1;
        Ok(Some(Expr::new(
            ExprKind::Lambda { id, params, body },
            start.line,
            start.col,
        )))
    }

    /// Speculative cast: `(type) expr`. The parenthesized token must
    /// plausibly start a type (identifiers only count when registered via
    /// `@type` or an enum declaration), and the `)` must be followed by an
    /// expression starter.
    fn try_cast(&mut self) -> PResult<Option<Expr>> {
        let next = self.tok_at(1);
        let plausible = match next.kind {
            TokenKind::Ident => self.known_types.contains(&next.lexeme),
            k => k.starts_type(),
        };
        if !plausible {
            return Ok(None);
        }

        let save = self.pos;
        let start = self.tok().clone();
        self.advance(); // (

        let ty = match self.parse_type() {
            Ok(ty) => ty,
            Err(e) if e.fatal => return Err(e),
            Err(_) => {
                self.pos = save;
                return Ok(None);
            }
        };
        if !self.accept(TokenKind::RParen) || !starts_expression(self.kind()) {
            self.pos = save;
            return Ok(None);
        }

        let operand = self.parse_unary()?;
        Ok(Some(Expr::new(
            ExprKind::Cast {
                ty,
                operand: Box::new(operand),
            },
            start.line,
            start.col,
        )))
    }
}

fn binop_prec(kind: TokenKind) -> Option<i32> {
    use TokenKind::*;
    let prec = match kind {
        PipeArrow => 0,
        OrOr => 1,
        AndAnd => 2,
        Pipe => 3,
        Caret => 4,
        Amp => 5,
        EqEq | Neq => 6,
        Lt | Gt | LtEq | GtEq => 7,
        Shl | Shr => 8,
        Plus | Minus => 9,
        Star | Slash | Percent => 10,
        _ => return None,
    };
    Some(prec)
}

fn starts_expression(kind: TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        kind,
        Ident
            | IntLit
            | FloatLit
            | StrLit
            | CharLit
            | TrueKw
            | FalseKw
            | NullKw
            | OkKw
            | ErrKw
            | LParen
            | LBracket
            | Bang
            | Minus
            | Tilde
            | Star
            | Amp
            | PlusPlus
            | MinusMinus
            | SizeofKw
            | AwaitKw
    )
}

/// Reconstruct source text from a raw token range with the fixed spacing
/// policy: a space between consecutive tokens unless the previous token
/// opens a grouping or is a prefix operator, or the next token closes or
/// punctuates. String and char literals are re-quoted with their original
/// delimiters.
pub(crate) fn raw_text(toks: &[Token]) -> String {
    use TokenKind::*;
    let mut out = String::new();
    for (i, t) in toks.iter().enumerate() {
        if i > 0 {
            let prev = toks[i - 1].kind;
            let no_space_after = matches!(
                prev,
                LParen | LBracket | LBrace | Dot | Arrow | Tilde | Bang | Amp | Star
            );
            let no_space_before = matches!(
                t.kind,
                RParen | RBracket | RBrace | Dot | Comma | Semi | Arrow | PlusPlus | MinusMinus
                    | Colon | LBracket
            );
            if !no_space_after && !no_space_before {
                out.push(' ');
            }
        }
        match t.kind {
            StrLit => {
                out.push('"');
                out.push_str(&t.lexeme);
                out.push('"');
            }
            CharLit => {
                out.push('\'');
                out.push_str(&t.lexeme);
                out.push('\'');
            }
            _ => out.push_str(&t.lexeme),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        let mut parser = Parser::new(source, "test.mxy", TranslateOptions::default());
        parser.parse().expect("parse failed")
    }

    fn parse_async(source: &str) -> Program {
        let mut parser = Parser::new(
            source,
            "test.mxy",
            TranslateOptions::default().with_async(),
        );
        parser.parse().expect("parse failed")
    }

    fn parse_err(source: &str) -> String {
        let mut parser = Parser::new(source, "test.mxy", TranslateOptions::default());
        parser.parse().expect_err("expected parse failure")
    }

    #[test]
    fn test_function_and_global() {
        let prog = parse_ok("int limit = 10;\nint twice(int x) { return x * 2; }\n");
        assert_eq!(prog.decls.len(), 2);
        assert!(matches!(prog.decls[0].kind, DeclKind::Var(_)));
        match &prog.decls[1].kind {
            DeclKind::Func(f) => {
                assert_eq!(f.name, "twice");
                assert_eq!(f.params.len(), 1);
                assert!(!f.is_main);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_main_flag() {
        let prog = parse_ok("void main() { print(1); }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => assert!(f.is_main),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_moxy_enum_vs_c_enum() {
        let prog = parse_ok("enum Shape { Circle(int r), Square(int s) }\n");
        assert!(matches!(prog.decls[0].kind, DeclKind::Enum(_)));

        // C enum: closing brace followed by a variable name
        let prog = parse_ok("enum Color { RED, GREEN } c;\n");
        assert!(matches!(prog.decls[0].kind, DeclKind::Raw(_)));

        // Field-free moxy enum: nothing after the brace
        let prog = parse_ok("enum Color { Red, Green }\n");
        match &prog.decls[0].kind {
            DeclKind::Enum(e) => assert!(e.is_simple()),
            other => panic!("expected enum, got {:?}", other),
        }
    }

    #[test]
    fn test_typedef_rides_raw() {
        let prog = parse_ok("typedef struct { int x; } Point;\n");
        match &prog.decls[0].kind {
            DeclKind::Raw(text) => assert_eq!(text, "typedef struct {int x;} Point;"),
            other => panic!("expected raw, got {:?}", other),
        }
    }

    #[test]
    fn test_prototype_rides_raw() {
        let prog = parse_ok("int add(int a, int b);\n");
        assert!(matches!(prog.decls[0].kind, DeclKind::Raw(_)));
    }

    #[test]
    fn test_raw_statement_inside_function() {
        let prog = parse_ok("void main() { Point p = {42}; return p.x; }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => {
                assert!(matches!(&f.body[0].kind, StmtKind::Raw(text) if text == "Point p = {42};"));
                assert!(matches!(&f.body[1].kind, StmtKind::Return(Some(_))));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_uninitialized_decl_rides_raw() {
        let prog = parse_ok("void main() { int arr[10]; int a, b; }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => {
                assert!(matches!(&f.body[0].kind, StmtKind::Raw(t) if t == "int arr[10];"));
                assert!(matches!(&f.body[1].kind, StmtKind::Raw(t) if t == "int a, b;"));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let prog = parse_ok("int x = 1 + 2 * 3;\n");
        match &prog.decls[0].kind {
            DeclKind::Var(v) => match &v.value.kind {
                ExprKind::Binary { op, rhs, .. } => {
                    assert_eq!(op, "+");
                    assert!(matches!(&rhs.kind, ExprKind::Binary { op, .. } if op == "*"));
                }
                other => panic!("expected binary, got {:?}", other),
            },
            other => panic!("expected var, got {:?}", other),
        }
    }

    #[test]
    fn test_ternary_binds_below_binaries() {
        let prog = parse_ok("int x = a > b ? a : b;\n");
        match &prog.decls[0].kind {
            DeclKind::Var(v) => assert!(matches!(v.value.kind, ExprKind::Ternary { .. })),
            other => panic!("expected var, got {:?}", other),
        }
    }

    #[test]
    fn test_postfix_vs_prefix_increment() {
        let prog = parse_ok("void main() { for (int i = 0; i < 3; i++) { print(i); } }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => match &f.body[0].kind {
                StmtKind::For(fs) => match &fs.step.kind {
                    StmtKind::Expr(e) => {
                        assert!(matches!(&e.kind, ExprKind::Unary { postfix: true, .. }))
                    }
                    other => panic!("expected expr step, got {:?}", other),
                },
                other => panic!("expected for, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_match_parses_arms() {
        let prog = parse_ok(
            "enum Shape { Circle(int r), Square(int s) }\n\
             void main() { Shape x = Shape::Circle(5); match x { Shape::Circle(r) => print(r), Shape::Square(s) => print(s), } }\n",
        );
        match &prog.decls[1].kind {
            DeclKind::Func(f) => match &f.body[1].kind {
                StmtKind::Match(m) => {
                    assert_eq!(m.target, "x");
                    assert_eq!(m.arms.len(), 2);
                    assert_eq!(m.arms[0].pattern.enum_name, "Shape");
                    assert_eq!(m.arms[0].pattern.binding.as_deref(), Some("r"));
                }
                other => panic!("expected match, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_result_shorthand_patterns() {
        let prog = parse_ok(
            "void main() { Result<int> r = f(); match r { Ok(v) => print(v), Err(e) => print(e), } }\n",
        );
        match &prog.decls[0].kind {
            DeclKind::Func(f) => match &f.body[1].kind {
                StmtKind::Match(m) => {
                    assert_eq!(m.arms[0].pattern.enum_name, "");
                    assert_eq!(m.arms[0].pattern.variant, "Ok");
                    assert_eq!(m.arms[1].pattern.variant, "Err");
                }
                other => panic!("expected match, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_for_in_range_and_value() {
        let prog = parse_ok("void main() { for i in 0..10 { print(i); } for v in xs { print(v); } }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => {
                assert!(matches!(
                    &f.body[0].kind,
                    StmtKind::ForIn(fi) if matches!(fi.iter, ForIter::Range(_, _))
                ));
                assert!(matches!(
                    &f.body[1].kind,
                    StmtKind::ForIn(fi) if matches!(fi.iter, ForIter::Value(_))
                ));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_pipe_rewrites_call() {
        let prog = parse_ok("void main() { int y = x |> add(1); }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => match &f.body[0].kind {
                StmtKind::Var(v) => match &v.value.kind {
                    ExprKind::Call { name, args } => {
                        assert_eq!(name, "add");
                        assert_eq!(args.len(), 2);
                        assert!(matches!(&args[0].kind, ExprKind::Ident(n) if n == "x"));
                    }
                    other => panic!("expected call, got {:?}", other),
                },
                other => panic!("expected var, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_pipe_into_print_is_print_stmt() {
        let prog = parse_ok("void main() { x |> print; }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => assert!(matches!(&f.body[0].kind, StmtKind::Print(_))),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_pipe_into_bare_ident_is_fatal() {
        let err = parse_err("void main() { x |> frob; }\n");
        assert!(err.contains("cannot pipe into 'frob'"));
        assert!(err.contains("frob()"));
    }

    #[test]
    fn test_future_requires_async_flag() {
        let err = parse_err("Future<int> g() { return 7; }\n");
        assert!(err.contains("async feature flag"));

        let prog = parse_async("Future<int> g() { return 7; }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => {
                assert!(f.returns_future);
                assert_eq!(f.ret, "Future<int>");
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_await_requires_async_flag() {
        let err = parse_err("void main() { int x = await g(); }\n");
        assert!(err.contains("await"));
        parse_async("void main() { int x = await g(); }\n");
    }

    #[test]
    fn test_lambda_expr_body() {
        let prog = parse_ok("void main() { apply((int x) -> x * 2); }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => match &f.body[0].kind {
                StmtKind::Expr(e) => match &e.kind {
                    ExprKind::Call { args, .. } => match &args[0].kind {
                        ExprKind::Lambda { id, params, body } => {
                            assert_eq!(*id, 0);
                            assert_eq!(params[0].ty, "int");
                            assert!(matches!(body, LambdaBody::Expr(_)));
                        }
                        other => panic!("expected lambda, got {:?}", other),
                    },
                    other => panic!("expected call, got {:?}", other),
                },
                other => panic!("expected expr stmt, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_lambda_ids_are_dense() {
        let prog = parse_ok(
            "void main() { apply((int x) -> x + 1); apply((int a, int b) -> { return a + b; }); }\n",
        );
        let mut ids = Vec::new();
        fn walk_expr(e: &Expr, ids: &mut Vec<usize>) {
            if let ExprKind::Call { args, .. } = &e.kind {
                for a in args {
                    if let ExprKind::Lambda { id, .. } = &a.kind {
                        ids.push(*id);
                    }
                }
            }
        }
        if let DeclKind::Func(f) = &prog.decls[0].kind {
            for s in &f.body {
                if let StmtKind::Expr(e) = &s.kind {
                    walk_expr(e, &mut ids);
                }
            }
        }
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_cast_needs_known_type() {
        // 'int' is always a type: cast
        let prog = parse_ok("void main() { int y = (int)x; }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => match &f.body[0].kind {
                StmtKind::Var(v) => assert!(matches!(v.value.kind, ExprKind::Cast { .. })),
                other => panic!("expected var, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }

        // unknown identifier in parens stays a parenthesized expression
        let prog = parse_ok("void main() { int y = (x) + 1; }\n");
        match &prog.decls[0].kind {
            DeclKind::Func(f) => match &f.body[0].kind {
                StmtKind::Var(v) => {
                    assert!(matches!(&v.value.kind, ExprKind::Binary { op, .. } if op == "+"))
                }
                other => panic!("expected var, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_registered_type_enables_cast() {
        let mut parser = Parser::new(
            "void main() { frob((Point)p); }\n",
            "test.mxy",
            TranslateOptions::default(),
        );
        parser.register_types(&["Point"]);
        let prog = parser.parse().unwrap();
        match &prog.decls[0].kind {
            DeclKind::Func(f) => match &f.body[0].kind {
                StmtKind::Expr(e) => match &e.kind {
                    ExprKind::Call { args, .. } => {
                        assert!(matches!(&args[0].kind, ExprKind::Cast { ty, .. } if ty == "Point"))
                    }
                    other => panic!("expected call, got {:?}", other),
                },
                other => panic!("expected expr stmt, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_all_tokens_consumed() {
        let source = "int x = 1;\nvoid main() { print(x); }\n";
        let mut parser = Parser::new(source, "test.mxy", TranslateOptions::default());
        parser.parse().unwrap();
        assert_eq!(parser.kind(), TokenKind::Eof);
    }

    #[test]
    fn test_diagnostic_has_snippet_and_hint() {
        let err = parse_err("void main() { if (x { print(1); } }\n");
        assert!(err.contains("test.mxy:1"));
        assert!(err.contains("^"));
    }

    #[test]
    fn test_missing_semi_hint() {
        let err = parse_err("void main() { return 1 }\n");
        assert!(err.contains("expected ';'"));
        assert!(err.contains("add ';' before '}'"));
    }

    #[test]
    fn test_raw_text_spacing() {
        let toks = lexer::tokenize("p -> next [ 3 ] . x ;").unwrap();
        let toks = &toks[..toks.len() - 1];
        assert_eq!(raw_text(toks), "p->next[3].x;");
    }
}
