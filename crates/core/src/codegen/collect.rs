//! Collection pre-passes
//!
//! Walks the AST before emission to gather:
//! - every container type mentioned anywhere (deduplicated, ordered so
//!   that inner instantiations precede the types built from them),
//! - every lambda, keyed by its id, for hoisted emission,
//! - every function signature, so calls can be type-inferred,
//! - the enum registry consulted by enum and match lowering.

use super::{CodeGen, CodeGenError, LambdaInfo};
use crate::ast::{Decl, DeclKind, Expr, ExprKind, ForIter, LambdaBody, Program, Stmt, StmtKind};
use crate::types;

impl CodeGen {
    pub(super) fn collect(&mut self, program: &Program) -> Result<(), CodeGenError> {
        for decl in &program.decls {
            self.collect_decl(decl);
        }
        self.lambdas.sort_by_key(|l| l.id);
        Ok(())
    }

    fn collect_decl(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Enum(e) => {
                self.enums.push(e.clone());
                for v in &e.variants {
                    for f in &v.fields {
                        self.add_inst(&f.ty);
                    }
                }
            }
            DeclKind::Func(f) => {
                self.fn_returns.insert(f.name.clone(), f.ret.clone());
                self.add_inst(&f.ret);
                for p in &f.params {
                    self.add_inst(&p.ty);
                }
                for s in &f.body {
                    self.collect_stmt(s);
                }
            }
            DeclKind::Var(v) => {
                self.add_inst(&v.ty);
                self.collect_expr(&v.value);
            }
            DeclKind::Raw(_) => {}
        }
    }

    fn collect_stmt(&mut self, s: &Stmt) {
        match &s.kind {
            StmtKind::Print(e) | StmtKind::Assert(e) | StmtKind::Expr(e) => self.collect_expr(e),
            StmtKind::Var(v) => {
                self.add_inst(&v.ty);
                self.collect_expr(&v.value);
            }
            StmtKind::Assign(a) => {
                self.collect_expr(&a.target);
                self.collect_expr(&a.value);
            }
            StmtKind::Return(value) => {
                if let Some(e) = value {
                    self.collect_expr(e);
                }
            }
            StmtKind::If(n) => {
                self.collect_expr(&n.cond);
                for s in &n.then_body {
                    self.collect_stmt(s);
                }
                if let Some(eb) = &n.else_body {
                    for s in eb {
                        self.collect_stmt(s);
                    }
                }
            }
            StmtKind::While(n) => {
                self.collect_expr(&n.cond);
                for s in &n.body {
                    self.collect_stmt(s);
                }
            }
            StmtKind::For(n) => {
                self.collect_stmt(&n.init);
                self.collect_expr(&n.cond);
                self.collect_stmt(&n.step);
                for s in &n.body {
                    self.collect_stmt(s);
                }
            }
            StmtKind::ForIn(n) => {
                match &n.iter {
                    ForIter::Range(a, b) => {
                        self.collect_expr(a);
                        self.collect_expr(b);
                    }
                    ForIter::Value(e) => self.collect_expr(e),
                }
                for s in &n.body {
                    self.collect_stmt(s);
                }
            }
            StmtKind::Match(n) => {
                for arm in &n.arms {
                    self.collect_stmt(&arm.body);
                }
            }
            StmtKind::Block(stmts) => {
                for s in stmts {
                    self.collect_stmt(s);
                }
            }
            StmtKind::Raw(_) => {}
        }
    }

    fn collect_expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::Lambda { id, params, body } => {
                for p in params {
                    self.add_inst(&p.ty);
                }
                self.lambdas.push(LambdaInfo {
                    id: *id,
                    params: params.clone(),
                    body: body.clone(),
                });
                match body {
                    LambdaBody::Expr(inner) => self.collect_expr(inner),
                    LambdaBody::Block(stmts) => {
                        for s in stmts {
                            self.collect_stmt(s);
                        }
                    }
                }
            }
            ExprKind::Cast { ty, operand } => {
                self.add_inst(ty);
                self.collect_expr(operand);
            }
            ExprKind::EnumInit { args, .. } => {
                for a in args {
                    self.collect_expr(a);
                }
            }
            ExprKind::ListLit(items) => {
                for i in items {
                    self.collect_expr(i);
                }
            }
            ExprKind::OkExpr(inner)
            | ExprKind::ErrExpr(inner)
            | ExprKind::Paren(inner)
            | ExprKind::Await(inner) => self.collect_expr(inner),
            ExprKind::Unary { operand, .. } => self.collect_expr(operand),
            ExprKind::Field { target, .. } => self.collect_expr(target),
            ExprKind::Method { target, args, .. } => {
                self.collect_expr(target);
                for a in args {
                    self.collect_expr(a);
                }
            }
            ExprKind::Index { target, index } => {
                self.collect_expr(target);
                self.collect_expr(index);
            }
            ExprKind::Call { args, .. } => {
                for a in args {
                    self.collect_expr(a);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.collect_expr(lhs);
                self.collect_expr(rhs);
            }
            ExprKind::Ternary {
                cond,
                then_val,
                else_val,
            } => {
                self.collect_expr(cond);
                self.collect_expr(then_val);
                self.collect_expr(else_val);
            }
            ExprKind::Range { start, end } => {
                self.collect_expr(start);
                self.collect_expr(end);
            }
            _ => {}
        }
    }

    /// Record a container instantiation. Component containers are added
    /// first so their templates are emitted before the types that embed
    /// them (`map[string,int[]]` needs `list_int` defined first).
    pub(super) fn add_inst(&mut self, ty: &str) {
        if !types::is_container(ty) {
            return;
        }
        if types::is_list(ty) {
            self.add_inst(types::list_elem(ty));
        } else if types::is_result(ty) {
            self.add_inst(types::result_inner(ty));
        } else if types::is_future(ty) {
            self.add_inst(types::future_inner(ty));
        } else if types::is_map(ty) {
            self.add_inst(types::map_key(ty));
            self.add_inst(types::map_val(ty));
        }
        if !self.insts.iter().any(|t| t == ty) {
            self.insts.push(ty.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslateOptions;

    #[test]
    fn test_add_inst_orders_inner_first() {
        let mut cg = CodeGen::new(&TranslateOptions::default(), &[], &[]);
        cg.add_inst("map[string,int[]]");
        assert_eq!(cg.insts, vec!["int[]", "map[string,int[]]"]);
    }

    #[test]
    fn test_add_inst_dedups() {
        let mut cg = CodeGen::new(&TranslateOptions::default(), &[], &[]);
        cg.add_inst("int[]");
        cg.add_inst("int[]");
        cg.add_inst("Result<int[]>");
        assert_eq!(cg.insts, vec!["int[]", "Result<int[]>"]);
    }

    #[test]
    fn test_atomic_types_ignored() {
        let mut cg = CodeGen::new(&TranslateOptions::default(), &[], &[]);
        cg.add_inst("int");
        cg.add_inst("const char*");
        assert!(cg.insts.is_empty());
    }
}
