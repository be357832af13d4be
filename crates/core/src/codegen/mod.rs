//! C code generation
//!
//! Turns a parsed [`Program`] into C11 source text. Generation runs in
//! passes: a collection pre-pass gathers container instantiations, lambda
//! bodies and function signatures, then emission proceeds in a fixed
//! order: user includes, auto includes, user directives, enum
//! definitions, monomorphized container templates, raw top-level
//! declarations, hoisted lambdas, forward declarations, globals, and
//! finally function bodies.
//!
//! All state that influences emission (symbol table, enum registry,
//! instantiation list, ARC scope stack, the `_aw`/`_fi` counters, feature
//! flags) lives on the `CodeGen` value; a fresh one is built per
//! translation request, so nothing leaks across requests.
//!
//! # Module structure
//!
//! - `error.rs`: the `CodeGenError` type
//! - `collect.rs`: pre-passes over the AST
//! - `templates.rs`: enum lowering and container templates
//! - `exprs.rs`: expression emission and local type inference
//! - `stmts.rs`: statement emission, match/for-in/async lowering, ARC

mod collect;
mod error;
mod exprs;
mod stmts;
mod templates;

pub use error::CodeGenError;

use crate::ast::{DeclKind, EnumDecl, LambdaBody, Param, Program};
use crate::config::TranslateOptions;
use crate::types;
use std::collections::HashMap;
use std::fmt::Write as _;

/// A lambda lifted out of the AST for hoisted emission.
#[derive(Debug, Clone)]
pub(super) struct LambdaInfo {
    pub id: usize,
    pub params: Vec<Param>,
    pub body: LambdaBody,
}

/// Scoped symbol table: a stack of (name, moxy type) entries with explicit
/// scope boundaries. The most recent binding for a name wins.
#[derive(Debug, Default)]
pub(super) struct SymTab {
    entries: Vec<(String, String)>,
    scopes: Vec<usize>,
}

impl SymTab {
    pub fn push_scope(&mut self) {
        self.scopes.push(self.entries.len());
    }

    pub fn pop_scope(&mut self) {
        if let Some(mark) = self.scopes.pop() {
            self.entries.truncate(mark);
        }
    }

    pub fn add(&mut self, name: &str, ty: &str) {
        self.entries.push((name.to_string(), ty.to_string()));
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_str())
    }
}

/// ARC scope stack: one frame per lexical scope, each holding the
/// containers declared in it. Popping a frame yields the locals to
/// release, in declaration order.
#[derive(Debug, Default)]
pub(super) struct ArcScopes {
    scopes: Vec<Vec<(String, String)>>,
}

impl ArcScopes {
    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn pop_scope(&mut self) -> Vec<(String, String)> {
        self.scopes.pop().unwrap_or_default()
    }

    pub fn register(&mut self, name: &str, ty: &str) {
        if let Some(top) = self.scopes.last_mut() {
            top.push((name.to_string(), ty.to_string()));
        }
    }

    /// All registered locals across every open scope, innermost last.
    /// Used at `return`, which exits the whole function.
    pub fn all_locals(&self) -> Vec<(String, String)> {
        self.scopes.iter().flatten().cloned().collect()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

pub struct CodeGen {
    out: String,
    indent: usize,
    options: TranslateOptions,
    user_includes: Vec<String>,
    user_directives: Vec<String>,
    pub(super) syms: SymTab,
    pub(super) fn_returns: HashMap<String, String>,
    pub(super) enums: Vec<EnumDecl>,
    pub(super) insts: Vec<String>,
    pub(super) lambdas: Vec<LambdaInfo>,
    pub(super) arc: ArcScopes,
    pub(super) await_counter: usize,
    pub(super) forin_counter: usize,
    /// moxy return type of the function currently being emitted
    pub(super) current_ret: String,
    /// `Some(inner type)` while emitting an async thread body; rewrites
    /// every `return expr` into the thread-exit form
    pub(super) thread_ret: Option<String>,
}

impl CodeGen {
    pub fn new(options: &TranslateOptions, includes: &[String], directives: &[String]) -> Self {
        CodeGen {
            out: String::new(),
            indent: 0,
            options: *options,
            user_includes: includes.to_vec(),
            user_directives: directives.to_vec(),
            syms: SymTab::default(),
            fn_returns: HashMap::new(),
            enums: Vec::new(),
            insts: Vec::new(),
            lambdas: Vec::new(),
            arc: ArcScopes::default(),
            await_counter: 0,
            forin_counter: 0,
            current_ret: String::new(),
            thread_ret: None,
        }
    }

    pub(super) fn arc_on(&self) -> bool {
        self.options.arc_enabled
    }

    pub(super) fn pad(&self) -> String {
        "    ".repeat(self.indent)
    }

    /// Render an expression to a string without touching the main output.
    pub(super) fn render_expr(&mut self, e: &crate::ast::Expr) -> Result<String, CodeGenError> {
        let saved = std::mem::take(&mut self.out);
        let result = self.emit_expr(e);
        let text = std::mem::replace(&mut self.out, saved);
        result?;
        Ok(text)
    }

    pub(super) fn find_enum(&self, name: &str) -> Option<&EnumDecl> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Type and name of field `idx` of `Enum::Variant`; defaults keep the
    /// generator going on malformed programs (the C compiler rejects them).
    pub(super) fn enum_field(&self, ename: &str, vname: &str, idx: usize) -> (String, String) {
        if let Some(e) = self.find_enum(ename)
            && let Some(v) = e.variants.iter().find(|v| v.name == vname)
            && let Some(f) = v.fields.get(idx)
        {
            return (f.ty.clone(), f.name.clone());
        }
        ("int".to_string(), "unknown".to_string())
    }

    /// Generate the full C translation unit.
    pub fn generate(&mut self, program: &Program) -> Result<String, CodeGenError> {
        self.collect(program)?;
        self.syms.push_scope();

        // 1. User includes, verbatim
        for inc in self.user_includes.clone() {
            writeln!(self.out, "{}", inc)?;
        }

        // 2. Auto includes, skipping any the user already wrote
        let mut auto = vec![
            "#include <stdlib.h>",
            "#include <stdio.h>",
            "#include <stdbool.h>",
        ];
        if self
            .insts
            .iter()
            .any(|t| types::is_list(t) || types::is_map(t))
        {
            auto.push("#include <string.h>");
        }
        if self.insts.iter().any(|t| types::is_future(t)) {
            auto.push("#include <pthread.h>");
        }
        for inc in auto {
            if !self.user_includes.iter().any(|u| u == inc) {
                writeln!(self.out, "{}", inc)?;
            }
        }
        writeln!(self.out)?;

        // 3. User directives
        if !self.user_directives.is_empty() {
            for d in self.user_directives.clone() {
                writeln!(self.out, "{}", d)?;
            }
            writeln!(self.out)?;
        }

        // 4. Enum definitions
        for decl in &program.decls {
            if let DeclKind::Enum(e) = &decl.kind {
                self.emit_enum(e)?;
            }
        }

        // 5. Container templates, one per instantiation
        for ty in self.insts.clone() {
            if types::is_list(&ty) {
                self.emit_list_template(&ty)?;
            } else if types::is_result(&ty) {
                self.emit_result_template(&ty)?;
            } else if types::is_map(&ty) {
                self.emit_map_template(&ty)?;
            } else if types::is_future(&ty) {
                self.emit_future_template(&ty)?;
            }
        }

        // 6. Raw top-level declarations, in source order
        let mut had_raw = false;
        for decl in &program.decls {
            if let DeclKind::Raw(text) = &decl.kind {
                writeln!(self.out, "{}", text)?;
                had_raw = true;
            }
        }
        if had_raw {
            writeln!(self.out)?;
        }

        // 7. Hoisted lambdas
        for lambda in self.lambdas.clone() {
            self.emit_lambda(&lambda)?;
        }

        // 8. Forward declarations
        let mut had_fwd = false;
        for decl in &program.decls {
            if let DeclKind::Func(f) = &decl.kind
                && !f.is_main
            {
                self.emit_forward(f)?;
                had_fwd = true;
            }
        }
        if had_fwd {
            writeln!(self.out)?;
        }

        // 9. Globals
        let mut had_global = false;
        for decl in &program.decls {
            if let DeclKind::Var(v) = &decl.kind {
                let v = v.clone();
                self.emit_var_decl(&v, true)?;
                had_global = true;
            }
        }
        if had_global {
            writeln!(self.out)?;
        }

        // 10. Function bodies
        for decl in &program.decls {
            if let DeclKind::Func(f) = &decl.kind {
                let f = f.clone();
                if f.returns_future {
                    self.emit_async_artifacts(&f)?;
                } else {
                    self.emit_function(&f)?;
                }
            }
        }

        self.syms.pop_scope();
        Ok(std::mem::take(&mut self.out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symtab_scoping() {
        let mut syms = SymTab::default();
        syms.push_scope();
        syms.add("x", "int");
        syms.push_scope();
        syms.add("x", "string");
        assert_eq!(syms.lookup("x"), Some("string"));
        syms.pop_scope();
        assert_eq!(syms.lookup("x"), Some("int"));
        syms.pop_scope();
        assert_eq!(syms.lookup("x"), None);
    }

    #[test]
    fn test_arc_scopes_balance() {
        let mut arc = ArcScopes::default();
        arc.push_scope();
        arc.register("v", "int[]");
        arc.push_scope();
        arc.register("w", "map[string,int]");
        assert_eq!(arc.depth(), 2);
        assert_eq!(arc.all_locals().len(), 2);
        let inner = arc.pop_scope();
        assert_eq!(inner, vec![("w".to_string(), "map[string,int]".to_string())]);
        let outer = arc.pop_scope();
        assert_eq!(outer.len(), 1);
        assert_eq!(arc.depth(), 0);
    }
}
