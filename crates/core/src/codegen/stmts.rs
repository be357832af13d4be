//! Statement emission
//!
//! Lowers moxy statements onto C: `print`/`assert` intrinsics, `match`
//! onto `switch`, for-in onto counted loops, `Future`/`await` onto
//! pthreads, and ARC scope management (retain on entry, release on every
//! exit path, ownership transfer on `return <ident>`).

use super::{CodeGen, CodeGenError, LambdaInfo};
use crate::ast::{
    AssignStmt, Expr, ExprKind, ForInStmt, ForIter, ForStmt, FuncDecl, IfStmt, LambdaBody,
    MatchStmt, Param, Stmt, StmtKind, VarDecl, WhileStmt,
};
use crate::types;
use std::fmt::Write as _;

impl CodeGen {
    pub(super) fn emit_stmt(&mut self, s: &Stmt) -> Result<(), CodeGenError> {
        match &s.kind {
            StmtKind::Print(arg) => self.emit_print(arg),
            StmtKind::Assert(arg) => self.emit_assert(arg, s.line),
            StmtKind::Var(v) => self.emit_var_decl(v, false),
            StmtKind::Match(m) => self.emit_match(m),
            StmtKind::If(n) => self.emit_if(n),
            StmtKind::While(n) => self.emit_while(n),
            StmtKind::For(n) => self.emit_for(n),
            StmtKind::ForIn(n) => self.emit_forin(n),
            StmtKind::Return(value) => self.emit_return(value.as_ref()),
            StmtKind::Assign(a) => self.emit_assign(a),
            StmtKind::Expr(e) => self.emit_expr_stmt(e),
            StmtKind::Block(stmts) => {
                let pad = self.pad();
                writeln!(self.out, "{}{{", pad)?;
                self.indent += 1;
                self.emit_scoped(stmts)?;
                self.indent -= 1;
                writeln!(self.out, "{}}}", pad)?;
                Ok(())
            }
            StmtKind::Raw(text) => {
                writeln!(self.out, "{}{}", self.pad(), text)?;
                Ok(())
            }
        }
    }

    /// Emit statements inside a fresh lexical scope: symbols pop at the
    /// end, ARC locals release in reverse declaration order.
    fn emit_scoped(&mut self, stmts: &[Stmt]) -> Result<(), CodeGenError> {
        self.syms.push_scope();
        self.arc.push_scope();
        for s in stmts {
            self.emit_stmt(s)?;
        }
        let ends_with_return = matches!(stmts.last().map(|s| &s.kind), Some(StmtKind::Return(_)));
        let locals = self.arc.pop_scope();
        if !ends_with_return {
            self.emit_releases(&locals, None)?;
        }
        self.syms.pop_scope();
        Ok(())
    }

    fn emit_releases(
        &mut self,
        locals: &[(String, String)],
        exclude: Option<&str>,
    ) -> Result<(), CodeGenError> {
        for (name, ty) in locals.iter().rev() {
            if Some(name.as_str()) == exclude {
                continue;
            }
            writeln!(
                self.out,
                "{}{}_release({});",
                self.pad(),
                types::mangle(ty),
                name
            )?;
        }
        Ok(())
    }

    fn emit_print(&mut self, arg: &Expr) -> Result<(), CodeGenError> {
        let fmt = self.fmt_for(arg);
        write!(self.out, "{}printf(\"{}\\n\", ", self.pad(), fmt)?;
        self.emit_expr(arg)?;
        writeln!(self.out, ");")?;
        Ok(())
    }

    fn emit_assert(&mut self, arg: &Expr, line: usize) -> Result<(), CodeGenError> {
        write!(self.out, "{}if (!(", self.pad())?;
        self.emit_expr(arg)?;
        writeln!(
            self.out,
            ")) {{ fprintf(stderr, \"assertion failed at line {}\\n\"); exit(1); }}",
            line
        )?;
        Ok(())
    }

    pub(super) fn emit_var_decl(&mut self, v: &VarDecl, is_global: bool) -> Result<(), CodeGenError> {
        let arc = self.arc_on();
        let ct = types::c_type(&v.ty, arc);
        let pad = if is_global { String::new() } else { self.pad() };
        self.syms.add(&v.name, &v.ty);

        match &v.value.kind {
            ExprKind::ListLit(items) if types::is_list(&v.ty) => {
                let tname = types::mangle(&v.ty);
                let celem = types::c_type(types::list_elem(&v.ty), arc);
                if items.is_empty() {
                    writeln!(self.out, "{}{} {} = {}_make(NULL, 0);", pad, ct, v.name, tname)?;
                } else {
                    write!(
                        self.out,
                        "{}{} {} = {}_make(({}[]){{",
                        pad, ct, v.name, tname, celem
                    )?;
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            write!(self.out, ", ")?;
                        }
                        self.emit_expr(item)?;
                    }
                    writeln!(self.out, "}}, {});", items.len())?;
                }
            }
            ExprKind::MapLit if types::is_map(&v.ty) => {
                writeln!(
                    self.out,
                    "{}{} {} = {}_make();",
                    pad,
                    ct,
                    v.name,
                    types::mangle(&v.ty)
                )?;
            }
            ExprKind::OkExpr(inner) if types::is_result(&v.ty) => {
                let rt = types::mangle(&v.ty);
                write!(
                    self.out,
                    "{}{} {} = ({}){{ .tag = {}_Ok, .ok = ",
                    pad, ct, v.name, rt, rt
                )?;
                self.emit_expr(inner)?;
                writeln!(self.out, " }};")?;
            }
            ExprKind::ErrExpr(inner) if types::is_result(&v.ty) => {
                let rt = types::mangle(&v.ty);
                write!(
                    self.out,
                    "{}{} {} = ({}){{ .tag = {}_Err, .err = ",
                    pad, ct, v.name, rt, rt
                )?;
                self.emit_expr(inner)?;
                writeln!(self.out, " }};")?;
            }
            ExprKind::Await(inner) => {
                self.emit_await_decl(&ct, &v.ty, &v.name, inner, &pad)?;
            }
            _ => {
                write!(self.out, "{}{} {} = ", pad, ct, v.name)?;
                self.emit_expr(&v.value)?;
                writeln!(self.out, ";")?;
            }
        }

        if arc && types::is_arc_managed(&v.ty) && !is_global {
            self.arc.register(&v.name, &v.ty);
        }
        Ok(())
    }

    /// `T x = await e;` joins the future and unwraps the thread result:
    /// discard for void, pointer cast for string, deref + free otherwise.
    fn emit_await_decl(
        &mut self,
        ct: &str,
        ty: &str,
        name: &str,
        inner: &Expr,
        pad: &str,
    ) -> Result<(), CodeGenError> {
        let n = self.await_counter;
        self.await_counter += 1;
        let fut_ty = self
            .infer_type(inner)
            .filter(|t| types::is_future(t))
            .map(|t| types::mangle(&t))
            .unwrap_or_else(|| format!("Future_{}", types::mangle(ty)));

        write!(self.out, "{}{} _aw{} = ", pad, fut_ty, n)?;
        self.emit_expr(inner)?;
        writeln!(self.out, ";")?;

        if ty == "void" {
            writeln!(self.out, "{}pthread_join(_aw{}.thread, NULL);", pad, n)?;
            return Ok(());
        }

        writeln!(self.out, "{}void *_aw{}_ret;", pad, n)?;
        writeln!(self.out, "{}pthread_join(_aw{}.thread, &_aw{}_ret);", pad, n, n)?;
        if ty == "string" {
            writeln!(self.out, "{}{} {} = (const char*)_aw{}_ret;", pad, ct, name, n)?;
        } else {
            writeln!(
                self.out,
                "{}{} {} = *({} *)_aw{}_ret;",
                pad, ct, name, ct, n
            )?;
            writeln!(self.out, "{}free(_aw{}_ret);", pad, n)?;
        }
        Ok(())
    }

    /// A bare `await e;` statement joins and discards.
    fn emit_await_stmt(&mut self, inner: &Expr) -> Result<(), CodeGenError> {
        let n = self.await_counter;
        self.await_counter += 1;
        let pad = self.pad();
        let fut_ty = self
            .infer_type(inner)
            .filter(|t| types::is_future(t))
            .map(|t| types::mangle(&t))
            .unwrap_or_else(|| "Future_void".to_string());
        write!(self.out, "{}{} _aw{} = ", pad, fut_ty, n)?;
        self.emit_expr(inner)?;
        writeln!(self.out, ";")?;
        writeln!(self.out, "{}pthread_join(_aw{}.thread, NULL);", pad, n)?;
        Ok(())
    }

    fn emit_expr_stmt(&mut self, e: &Expr) -> Result<(), CodeGenError> {
        if let ExprKind::Await(inner) = &e.kind {
            return self.emit_await_stmt(inner);
        }
        write!(self.out, "{}", self.pad())?;
        self.emit_expr(e)?;
        writeln!(self.out, ";")?;
        Ok(())
    }

    fn emit_match(&mut self, m: &MatchStmt) -> Result<(), CodeGenError> {
        let target_type = self.syms.lookup(&m.target).map(String::from);

        let is_result = target_type.as_deref().map(types::is_result).unwrap_or(false)
            || m.arms
                .first()
                .map(|a| a.pattern.enum_name.is_empty())
                .unwrap_or(false);

        // Simple-enum detection: the target's type wins, the first arm's
        // enum name is the fallback
        let registry_enum = target_type
            .as_deref()
            .and_then(|t| self.find_enum(t))
            .or_else(|| {
                m.arms
                    .first()
                    .filter(|a| !a.pattern.enum_name.is_empty())
                    .and_then(|a| self.find_enum(&a.pattern.enum_name))
            });
        let simple = !is_result && registry_enum.map(|e| e.is_simple()).unwrap_or(false);

        let pad = self.pad();
        if simple {
            writeln!(self.out, "{}switch ({}) {{", pad, m.target)?;
        } else {
            writeln!(self.out, "{}switch ({}.tag) {{", pad, m.target)?;
        }
        self.indent += 1;

        for arm in &m.arms {
            let pad = self.pad();
            if arm.pattern.enum_name.is_empty() {
                let rt = target_type
                    .as_deref()
                    .filter(|t| types::is_result(t))
                    .map(types::mangle)
                    .unwrap_or_else(|| "Result_unknown".to_string());
                writeln!(self.out, "{}case {}_{}: {{", pad, rt, arm.pattern.variant)?;
                self.indent += 1;
                self.syms.push_scope();
                self.arc.push_scope();

                if let Some(binding) = &arm.pattern.binding {
                    let is_ok = arm.pattern.variant == "Ok";
                    let (field, fty) = if is_ok {
                        let inner = target_type
                            .as_deref()
                            .filter(|t| types::is_result(t))
                            .map(|t| types::result_inner(t).to_string())
                            .unwrap_or_else(|| "int".to_string());
                        ("ok", inner)
                    } else {
                        ("err", "string".to_string())
                    };
                    let ct = if is_ok {
                        types::c_type(&fty, self.arc_on())
                    } else {
                        "const char*".to_string()
                    };
                    writeln!(
                        self.out,
                        "{}{} {} = {}.{};",
                        self.pad(),
                        ct,
                        binding,
                        m.target,
                        field
                    )?;
                    self.syms.add(binding, &fty);
                }

                self.emit_stmt(&arm.body)?;
                let locals = self.arc.pop_scope();
                self.emit_releases(&locals, None)?;
                self.syms.pop_scope();
                writeln!(self.out, "{}break;", self.pad())?;
                self.indent -= 1;
                writeln!(self.out, "{}}}", pad)?;
            } else {
                writeln!(
                    self.out,
                    "{}case {}_{}: {{",
                    pad, arm.pattern.enum_name, arm.pattern.variant
                )?;
                self.indent += 1;
                self.syms.push_scope();
                self.arc.push_scope();

                if let Some(binding) = &arm.pattern.binding {
                    let (fty, fname) =
                        self.enum_field(&arm.pattern.enum_name, &arm.pattern.variant, 0);
                    let ct = types::c_type(&fty, self.arc_on());
                    writeln!(
                        self.out,
                        "{}{} {} = {}.{}.{};",
                        self.pad(),
                        ct,
                        binding,
                        m.target,
                        arm.pattern.variant,
                        fname
                    )?;
                    self.syms.add(binding, &fty);
                }

                self.emit_stmt(&arm.body)?;
                let locals = self.arc.pop_scope();
                self.emit_releases(&locals, None)?;
                self.syms.pop_scope();
                writeln!(self.out, "{}break;", self.pad())?;
                self.indent -= 1;
                writeln!(self.out, "{}}}", pad)?;
            }
        }

        self.indent -= 1;
        writeln!(self.out, "{}}}", self.pad())?;
        Ok(())
    }

    fn emit_if(&mut self, n: &IfStmt) -> Result<(), CodeGenError> {
        self.emit_if_inner(n, false)
    }

    fn emit_if_inner(&mut self, n: &IfStmt, is_else_if: bool) -> Result<(), CodeGenError> {
        if !is_else_if {
            write!(self.out, "{}", self.pad())?;
        }
        write!(self.out, "if (")?;
        self.emit_expr(&n.cond)?;
        writeln!(self.out, ") {{")?;
        self.indent += 1;
        self.emit_scoped(&n.then_body)?;
        self.indent -= 1;

        if let Some(else_body) = &n.else_body {
            if else_body.len() == 1
                && let StmtKind::If(nested) = &else_body[0].kind
            {
                write!(self.out, "{}}} else ", self.pad())?;
                return self.emit_if_inner(nested, true);
            }
            writeln!(self.out, "{}}} else {{", self.pad())?;
            self.indent += 1;
            self.emit_scoped(else_body)?;
            self.indent -= 1;
        }
        writeln!(self.out, "{}}}", self.pad())?;
        Ok(())
    }

    fn emit_while(&mut self, n: &WhileStmt) -> Result<(), CodeGenError> {
        write!(self.out, "{}while (", self.pad())?;
        self.emit_expr(&n.cond)?;
        writeln!(self.out, ") {{")?;
        self.indent += 1;
        self.emit_scoped(&n.body)?;
        self.indent -= 1;
        writeln!(self.out, "{}}}", self.pad())?;
        Ok(())
    }

    fn emit_for(&mut self, n: &ForStmt) -> Result<(), CodeGenError> {
        self.syms.push_scope();
        write!(self.out, "{}for (", self.pad())?;

        match &n.init.kind {
            StmtKind::Var(v) => {
                let ct = types::c_type(&v.ty, self.arc_on());
                self.syms.add(&v.name, &v.ty);
                write!(self.out, "{} {} = ", ct, v.name)?;
                self.emit_expr(&v.value)?;
            }
            StmtKind::Assign(a) => self.emit_clause_assign(a)?,
            StmtKind::Expr(e) => self.emit_expr(e)?,
            _ => {}
        }
        write!(self.out, "; ")?;
        self.emit_expr(&n.cond)?;
        write!(self.out, "; ")?;
        match &n.step.kind {
            StmtKind::Assign(a) => self.emit_clause_assign(a)?,
            StmtKind::Expr(e) => self.emit_expr(e)?,
            _ => {}
        }
        writeln!(self.out, ") {{")?;

        self.indent += 1;
        self.emit_scoped(&n.body)?;
        self.indent -= 1;
        writeln!(self.out, "{}}}", self.pad())?;
        self.syms.pop_scope();
        Ok(())
    }

    fn emit_clause_assign(&mut self, a: &AssignStmt) -> Result<(), CodeGenError> {
        self.emit_expr(&a.target)?;
        write!(self.out, " {} ", a.op)?;
        self.emit_expr(&a.value)?;
        Ok(())
    }

    fn emit_forin(&mut self, n: &ForInStmt) -> Result<(), CodeGenError> {
        let pad = self.pad();
        match &n.iter {
            ForIter::Range(start, end) => {
                let var = &n.vars[0];
                write!(self.out, "{}for (int {} = ", pad, var)?;
                self.emit_expr(start)?;
                write!(self.out, "; {} < ", var)?;
                self.emit_expr(end)?;
                writeln!(self.out, "; {}++) {{", var)?;

                self.indent += 1;
                self.syms.push_scope();
                self.syms.add(var, "int");
                self.arc.push_scope();
                for s in &n.body {
                    self.emit_stmt(s)?;
                }
                let locals = self.arc.pop_scope();
                self.emit_releases(&locals, None)?;
                self.syms.pop_scope();
                self.indent -= 1;
                writeln!(self.out, "{}}}", pad)?;
            }
            ForIter::Value(iter) => {
                let counter = format!("_fi{}", self.forin_counter);
                self.forin_counter += 1;
                let iter_ty = self.infer_type(iter);
                let sep = self.member_sep(iter, false);
                let recv = self.render_expr(iter)?;

                writeln!(
                    self.out,
                    "{}for (int {} = 0; {} < {}{}len; {}++) {{",
                    pad, counter, counter, recv, sep, counter
                )?;
                self.indent += 1;
                self.syms.push_scope();
                self.arc.push_scope();

                match iter_ty.as_deref() {
                    Some(t) if types::is_map(t) => {
                        let kt = types::map_key(t).to_string();
                        let vt = types::map_val(t).to_string();
                        let kc = types::c_type(&kt, self.arc_on());
                        writeln!(
                            self.out,
                            "{}{} {} = {}{}entries[{}].key;",
                            self.pad(),
                            kc,
                            n.vars[0],
                            recv,
                            sep,
                            counter
                        )?;
                        self.syms.add(&n.vars[0], &kt);
                        if let Some(val_var) = n.vars.get(1) {
                            let vc = types::c_type(&vt, self.arc_on());
                            writeln!(
                                self.out,
                                "{}{} {} = {}{}entries[{}].val;",
                                self.pad(),
                                vc,
                                val_var,
                                recv,
                                sep,
                                counter
                            )?;
                            self.syms.add(val_var, &vt);
                        }
                    }
                    ty => {
                        // Lists; unknown iterables fall back to int elements
                        let elem = ty
                            .filter(|t| types::is_list(t))
                            .map(|t| types::list_elem(t).to_string())
                            .unwrap_or_else(|| "int".to_string());
                        let ec = types::c_type(&elem, self.arc_on());
                        if n.vars.len() == 2 {
                            writeln!(self.out, "{}int {} = {};", self.pad(), n.vars[0], counter)?;
                            self.syms.add(&n.vars[0], "int");
                            writeln!(
                                self.out,
                                "{}{} {} = {}{}data[{}];",
                                self.pad(),
                                ec,
                                n.vars[1],
                                recv,
                                sep,
                                counter
                            )?;
                            self.syms.add(&n.vars[1], &elem);
                        } else {
                            writeln!(
                                self.out,
                                "{}{} {} = {}{}data[{}];",
                                self.pad(),
                                ec,
                                n.vars[0],
                                recv,
                                sep,
                                counter
                            )?;
                            self.syms.add(&n.vars[0], &elem);
                        }
                    }
                }

                for s in &n.body {
                    self.emit_stmt(s)?;
                }
                let locals = self.arc.pop_scope();
                self.emit_releases(&locals, None)?;
                self.syms.pop_scope();
                self.indent -= 1;
                writeln!(self.out, "{}}}", pad)?;
            }
        }
        Ok(())
    }

    fn emit_return(&mut self, value: Option<&Expr>) -> Result<(), CodeGenError> {
        let pad = self.pad();

        // Function-wide ARC cleanup; a returned identifier transfers
        // ownership to the caller and is excluded
        if self.arc_on() {
            let locals = self.arc.all_locals();
            let exclude = value.and_then(|e| e.as_ident()).map(String::from);
            self.emit_releases(&locals, exclude.as_deref())?;
        }

        // Inside an async thread body, returns are rewritten
        if let Some(inner) = self.thread_ret.clone() {
            return self.emit_thread_return(&inner, value, &pad);
        }

        match value {
            None => writeln!(self.out, "{}return;", pad)?,
            Some(e) => match &e.kind {
                ExprKind::OkExpr(inner) if types::is_result(&self.current_ret) => {
                    let rt = types::mangle(&self.current_ret);
                    write!(self.out, "{}return ({}){{ .tag = {}_Ok, .ok = ", pad, rt, rt)?;
                    self.emit_expr(inner)?;
                    writeln!(self.out, " }};")?;
                }
                ExprKind::ErrExpr(inner) if types::is_result(&self.current_ret) => {
                    let rt = types::mangle(&self.current_ret);
                    write!(self.out, "{}return ({}){{ .tag = {}_Err, .err = ", pad, rt, rt)?;
                    self.emit_expr(inner)?;
                    writeln!(self.out, " }};")?;
                }
                _ => {
                    write!(self.out, "{}return ", pad)?;
                    self.emit_expr(e)?;
                    writeln!(self.out, ";")?;
                }
            },
        }
        Ok(())
    }

    /// Thread-exit rewrite: `NULL` for `Future<void>`, pointer cast for
    /// `Future<string>`, heap copy otherwise.
    fn emit_thread_return(
        &mut self,
        inner: &str,
        value: Option<&Expr>,
        pad: &str,
    ) -> Result<(), CodeGenError> {
        match value {
            None => writeln!(self.out, "{}return NULL;", pad)?,
            Some(_) if inner == "void" => writeln!(self.out, "{}return NULL;", pad)?,
            Some(e) if inner == "string" => {
                write!(self.out, "{}return (void*)", pad)?;
                self.emit_expr(e)?;
                writeln!(self.out, ";")?;
            }
            Some(e) => {
                let ct = types::c_type(inner, self.arc_on());
                write!(
                    self.out,
                    "{}{{ {} *_r = malloc(sizeof({})); *_r = ",
                    pad, ct, ct
                )?;
                self.emit_expr(e)?;
                writeln!(self.out, "; return _r; }}")?;
            }
        }
        Ok(())
    }

    fn emit_assign(&mut self, a: &AssignStmt) -> Result<(), CodeGenError> {
        let pad = self.pad();

        if let ExprKind::Await(inner) = &a.value.kind {
            let inner = inner.clone();
            let target_ty = a
                .target
                .as_ident()
                .and_then(|n| self.syms.lookup(n))
                .map(String::from)
                .unwrap_or_else(|| "int".to_string());
            let ct = types::c_type(&target_ty, self.arc_on());
            let target = self.render_expr(&a.target)?;
            let n = self.await_counter;
            self.await_counter += 1;
            let fut_ty = self
                .infer_type(&inner)
                .filter(|t| types::is_future(t))
                .map(|t| types::mangle(&t))
                .unwrap_or_else(|| format!("Future_{}", types::mangle(&target_ty)));

            write!(self.out, "{}{} _aw{} = ", pad, fut_ty, n)?;
            self.emit_expr(&inner)?;
            writeln!(self.out, ";")?;
            if target_ty == "void" {
                writeln!(self.out, "{}pthread_join(_aw{}.thread, NULL);", pad, n)?;
            } else if target_ty == "string" {
                writeln!(self.out, "{}void *_aw{}_ret;", pad, n)?;
                writeln!(self.out, "{}pthread_join(_aw{}.thread, &_aw{}_ret);", pad, n, n)?;
                writeln!(self.out, "{}{} = (const char*)_aw{}_ret;", pad, target, n)?;
            } else {
                writeln!(self.out, "{}void *_aw{}_ret;", pad, n)?;
                writeln!(self.out, "{}pthread_join(_aw{}.thread, &_aw{}_ret);", pad, n, n)?;
                writeln!(self.out, "{}{} = *({} *)_aw{}_ret;", pad, target, ct, n)?;
                writeln!(self.out, "{}free(_aw{}_ret);", pad, n)?;
            }
            return Ok(());
        }

        // ARC assignment: release the old value first; retain when the new
        // value is another ARC identifier
        if self.arc_on()
            && a.op == "="
            && let Some(name) = a.target.as_ident()
            && let Some(ty) = self.syms.lookup(name).map(String::from)
            && types::is_arc_managed(&ty)
        {
            let name = name.to_string();
            let mangled = types::mangle(&ty);
            writeln!(self.out, "{}{}_release({});", pad, mangled, name)?;
            write!(self.out, "{}{} = ", pad, name)?;
            self.emit_expr(&a.value)?;
            writeln!(self.out, ";")?;
            let rhs_is_arc_ident = a
                .value
                .as_ident()
                .and_then(|n| self.syms.lookup(n))
                .map(types::is_arc_managed)
                .unwrap_or(false);
            if rhs_is_arc_ident {
                writeln!(self.out, "{}{}_retain({});", pad, mangled, name)?;
            }
            return Ok(());
        }

        write!(self.out, "{}", pad)?;
        self.emit_expr(&a.target)?;
        write!(self.out, " {} ", a.op)?;
        self.emit_expr(&a.value)?;
        writeln!(self.out, ";")?;
        Ok(())
    }

    // ---- functions ----

    fn write_params(&mut self, params: &[Param]) -> Result<(), CodeGenError> {
        if params.is_empty() {
            write!(self.out, "void")?;
            return Ok(());
        }
        let arc = self.arc_on();
        for (i, p) in params.iter().enumerate() {
            if i > 0 {
                write!(self.out, ", ")?;
            }
            write!(self.out, "{} {}", types::c_type(&p.ty, arc), p.name)?;
        }
        Ok(())
    }

    pub(super) fn emit_forward(&mut self, f: &FuncDecl) -> Result<(), CodeGenError> {
        write!(self.out, "{} {}(", types::c_type(&f.ret, self.arc_on()), f.name)?;
        self.write_params(&f.params)?;
        writeln!(self.out, ");")?;
        Ok(())
    }

    pub(super) fn emit_function(&mut self, f: &FuncDecl) -> Result<(), CodeGenError> {
        self.current_ret = f.ret.clone();
        if f.is_main {
            writeln!(self.out, "int main(void) {{")?;
        } else {
            write!(self.out, "{} {}(", types::c_type(&f.ret, self.arc_on()), f.name)?;
            self.write_params(&f.params)?;
            writeln!(self.out, ") {{")?;
        }

        self.syms.push_scope();
        self.arc.push_scope();
        self.indent = 1;

        for p in &f.params {
            self.syms.add(&p.name, &p.ty);
        }
        // ARC parameters are retained on entry and rebalanced by the
        // standard release-on-exit path
        if self.arc_on() {
            for p in &f.params {
                if types::is_arc_managed(&p.ty) {
                    writeln!(
                        self.out,
                        "    {}_retain({});",
                        types::mangle(&p.ty),
                        p.name
                    )?;
                    self.arc.register(&p.name, &p.ty);
                }
            }
        }

        for s in &f.body {
            self.emit_stmt(s)?;
        }

        let ends_with_return =
            matches!(f.body.last().map(|s| &s.kind), Some(StmtKind::Return(_)));
        let locals = self.arc.pop_scope();
        if !ends_with_return {
            self.emit_releases(&locals, None)?;
            if f.is_main {
                writeln!(self.out, "    return 0;")?;
            }
        }

        self.indent = 0;
        self.syms.pop_scope();
        writeln!(self.out, "}}\n")?;
        Ok(())
    }

    // ---- lambdas ----

    pub(super) fn emit_lambda(&mut self, lambda: &LambdaInfo) -> Result<(), CodeGenError> {
        self.syms.push_scope();
        for p in &lambda.params {
            self.syms.add(&p.name, &p.ty);
        }

        // Return type: the expression body's type, or the first return
        // expression in a block body, defaulting to int
        let ret_ty = match &lambda.body {
            LambdaBody::Expr(e) => self.infer_type(e).unwrap_or_else(|| "int".to_string()),
            LambdaBody::Block(stmts) => first_return_expr(stmts)
                .and_then(|e| self.infer_type(e))
                .unwrap_or_else(|| "int".to_string()),
        };

        write!(
            self.out,
            "static {} __moxy_lambda_{}(",
            types::c_type(&ret_ty, self.arc_on()),
            lambda.id
        )?;
        self.write_params(&lambda.params)?;
        writeln!(self.out, ") {{")?;

        match &lambda.body {
            LambdaBody::Expr(e) => {
                let e = e.clone();
                write!(self.out, "    return ")?;
                self.emit_expr(&e)?;
                writeln!(self.out, ";")?;
            }
            LambdaBody::Block(stmts) => {
                let stmts = stmts.clone();
                self.indent = 1;
                for s in &stmts {
                    self.emit_stmt(s)?;
                }
                self.indent = 0;
            }
        }
        writeln!(self.out, "}}\n")?;
        self.syms.pop_scope();
        Ok(())
    }

    // ---- async artifacts ----

    /// `Future<T> f(params) { body }` expands to a private args struct, a
    /// thread function taking `void*`, and a launcher that allocates the
    /// args and calls `pthread_create`.
    pub(super) fn emit_async_artifacts(&mut self, f: &FuncDecl) -> Result<(), CodeGenError> {
        let inner = types::future_inner(&f.ret).to_string();
        let fut_ty = types::mangle(&f.ret);
        let arc = self.arc_on();
        self.current_ret = f.ret.clone();

        // args struct
        writeln!(self.out, "typedef struct {{")?;
        if f.params.is_empty() {
            writeln!(self.out, "    int _unused;")?;
        }
        for p in &f.params {
            writeln!(self.out, "    {} {};", types::c_type(&p.ty, arc), p.name)?;
        }
        writeln!(self.out, "}} _{}_args;\n", f.name)?;

        // thread function
        writeln!(self.out, "static void *_{}_thread(void *_arg) {{", f.name)?;
        writeln!(self.out, "    _{}_args *_a = (_{}_args *)_arg;", f.name, f.name)?;
        for p in &f.params {
            writeln!(
                self.out,
                "    {} {} = _a->{};",
                types::c_type(&p.ty, arc),
                p.name,
                p.name
            )?;
        }
        writeln!(self.out, "    free(_arg);")?;

        self.syms.push_scope();
        self.arc.push_scope();
        self.indent = 1;
        for p in &f.params {
            self.syms.add(&p.name, &p.ty);
        }
        self.thread_ret = Some(inner.clone());
        for s in &f.body {
            self.emit_stmt(s)?;
        }
        self.thread_ret = None;

        let ends_with_return =
            matches!(f.body.last().map(|s| &s.kind), Some(StmtKind::Return(_)));
        let locals = self.arc.pop_scope();
        if !ends_with_return {
            self.emit_releases(&locals, None)?;
            writeln!(self.out, "    return NULL;")?;
        }
        self.indent = 0;
        self.syms.pop_scope();
        writeln!(self.out, "}}\n")?;

        // launcher
        write!(self.out, "{} {}(", fut_ty, f.name)?;
        self.write_params(&f.params)?;
        writeln!(self.out, ") {{")?;
        writeln!(
            self.out,
            "    _{}_args *_a = (_{}_args*)malloc(sizeof(_{}_args));",
            f.name, f.name, f.name
        )?;
        for p in &f.params {
            writeln!(self.out, "    _a->{} = {};", p.name, p.name)?;
        }
        writeln!(self.out, "    {} _fut;", fut_ty)?;
        writeln!(self.out, "    _fut.started = 1;")?;
        writeln!(
            self.out,
            "    pthread_create(&_fut.thread, NULL, _{}_thread, _a);",
            f.name
        )?;
        writeln!(self.out, "    return _fut;")?;
        writeln!(self.out, "}}\n")?;
        Ok(())
    }
}

/// First `return expr;` in a statement tree, used for lambda return-type
/// inference.
fn first_return_expr(stmts: &[Stmt]) -> Option<&Expr> {
    for s in stmts {
        match &s.kind {
            StmtKind::Return(Some(e)) => return Some(e),
            StmtKind::If(n) => {
                if let Some(e) = first_return_expr(&n.then_body) {
                    return Some(e);
                }
                if let Some(eb) = &n.else_body
                    && let Some(e) = first_return_expr(eb)
                {
                    return Some(e);
                }
            }
            StmtKind::While(n) => {
                if let Some(e) = first_return_expr(&n.body) {
                    return Some(e);
                }
            }
            StmtKind::For(n) => {
                if let Some(e) = first_return_expr(&n.body) {
                    return Some(e);
                }
            }
            StmtKind::ForIn(n) => {
                if let Some(e) = first_return_expr(&n.body) {
                    return Some(e);
                }
            }
            StmtKind::Block(inner) => {
                if let Some(e) = first_return_expr(inner) {
                    return Some(e);
                }
            }
            StmtKind::Match(m) => {
                for arm in &m.arms {
                    if let Some(e) = first_return_expr(std::slice::from_ref(arm.body.as_ref())) {
                        return Some(e);
                    }
                }
            }
            _ => {}
        }
    }
    None
}
