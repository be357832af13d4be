//! Expression emission and local type inference
//!
//! Inference here exists only to pick printf formats, dispatch container
//! methods and drive ARC decisions; it is not a type checker. Unknown
//! types emit whatever falls out of the rules and the C compiler has the
//! final word.

use super::{CodeGen, CodeGenError};
use crate::ast::{Expr, ExprKind};
use crate::types;
use std::fmt::Write as _;

impl CodeGen {
    pub(super) fn emit_expr(&mut self, e: &Expr) -> Result<(), CodeGenError> {
        match &e.kind {
            ExprKind::StrLit(s) => write!(self.out, "\"{}\"", s)?,
            ExprKind::IntLit(s) | ExprKind::FloatLit(s) => write!(self.out, "{}", s)?,
            ExprKind::CharLit(s) => write!(self.out, "'{}'", s)?,
            ExprKind::BoolLit(b) => write!(self.out, "{}", if *b { "true" } else { "false" })?,
            ExprKind::Null => write!(self.out, "NULL")?,
            ExprKind::Ident(name) => write!(self.out, "{}", name)?,
            ExprKind::Paren(inner) => {
                write!(self.out, "(")?;
                self.emit_expr(inner)?;
                write!(self.out, ")")?;
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.emit_expr(lhs)?;
                write!(self.out, " {} ", op)?;
                self.emit_expr(rhs)?;
            }
            ExprKind::Unary {
                op,
                operand,
                postfix,
            } => {
                if *postfix {
                    self.emit_expr(operand)?;
                    write!(self.out, "{}", op)?;
                } else {
                    write!(self.out, "{}", op)?;
                    self.emit_expr(operand)?;
                }
            }
            ExprKind::Ternary {
                cond,
                then_val,
                else_val,
            } => {
                self.emit_expr(cond)?;
                write!(self.out, " ? ")?;
                self.emit_expr(then_val)?;
                write!(self.out, " : ")?;
                self.emit_expr(else_val)?;
            }
            ExprKind::Cast { ty, operand } => {
                write!(self.out, "({})", types::c_type(ty, self.arc_on()))?;
                self.emit_expr(operand)?;
            }
            ExprKind::EnumInit {
                enum_name,
                variant,
                args,
            } => self.emit_enum_init(enum_name, variant, args)?,
            ExprKind::Field {
                target,
                name,
                arrow,
            } => {
                let sep = self.member_sep(target, *arrow);
                self.emit_expr(target)?;
                write!(self.out, "{}{}", sep, name)?;
            }
            ExprKind::Index { target, index } => {
                let sep = self.member_sep(target, false);
                self.emit_expr(target)?;
                write!(self.out, "{}data[", sep)?;
                self.emit_expr(index)?;
                write!(self.out, "]")?;
            }
            ExprKind::Method {
                target,
                name,
                args,
                arrow,
            } => self.emit_method(target, name, args, *arrow)?,
            ExprKind::Call { name, args } => {
                write!(self.out, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(self.out, ", ")?;
                    }
                    self.emit_expr(a)?;
                }
                write!(self.out, ")")?;
            }
            ExprKind::Lambda { id, .. } => write!(self.out, "__moxy_lambda_{}", id)?,
            // These only have meaning in specific statement contexts
            // (declarations, returns, for-in); bare occurrences emit nothing
            ExprKind::ListLit(_)
            | ExprKind::MapLit
            | ExprKind::OkExpr(_)
            | ExprKind::ErrExpr(_)
            | ExprKind::Await(_)
            | ExprKind::Range { .. } => {}
        }
        Ok(())
    }

    /// `.` or `->` for a member access: an explicit arrow in the source is
    /// preserved; otherwise the receiver's inferred type decides, since ARC
    /// containers are pointers.
    pub(super) fn member_sep(&self, target: &Expr, arrow: bool) -> &'static str {
        if arrow {
            return "->";
        }
        if self.arc_on()
            && let Some(t) = self.infer_type(target)
            && types::is_arc_managed(&t)
        {
            return "->";
        }
        "."
    }

    fn emit_enum_init(
        &mut self,
        enum_name: &str,
        variant: &str,
        args: &[Expr],
    ) -> Result<(), CodeGenError> {
        // Simple enums construct as the bare constant
        if let Some(e) = self.find_enum(enum_name)
            && e.is_simple()
        {
            write!(self.out, "{}_{}", enum_name, variant)?;
            return Ok(());
        }

        write!(self.out, "({}){{ .tag = {}_{}", enum_name, enum_name, variant)?;
        let fields: Vec<(String, String)> = self
            .find_enum(enum_name)
            .and_then(|e| e.variants.iter().find(|v| v.name == variant))
            .map(|v| {
                v.fields
                    .iter()
                    .map(|f| (f.name.clone(), f.ty.clone()))
                    .collect()
            })
            .unwrap_or_default();
        if !fields.is_empty() {
            write!(self.out, ", .{} = {{ ", variant)?;
            for (i, (fname, _)) in fields.iter().enumerate() {
                if i >= args.len() {
                    break;
                }
                if i > 0 {
                    write!(self.out, ", ")?;
                }
                write!(self.out, ".{} = ", fname)?;
                self.emit_expr(&args[i])?;
            }
            write!(self.out, " }}")?;
        }
        write!(self.out, " }}")?;
        Ok(())
    }

    /// Container methods route to the generated template functions; other
    /// receivers emit as C function-pointer-style member calls.
    fn emit_method(
        &mut self,
        target: &Expr,
        name: &str,
        args: &[Expr],
        arrow: bool,
    ) -> Result<(), CodeGenError> {
        let tt = self.infer_type(target);
        if let Some(tt) = tt.filter(|t| types::is_list(t) || types::is_map(t)) {
            let tname = types::mangle(&tt);
            write!(self.out, "{}_{}(", tname, name)?;
            if !self.arc_on() {
                write!(self.out, "&")?;
            }
            self.emit_expr(target)?;
            for a in args {
                write!(self.out, ", ")?;
                self.emit_expr(a)?;
            }
            write!(self.out, ")")?;
            return Ok(());
        }

        self.emit_expr(target)?;
        write!(self.out, "{}{}(", if arrow { "->" } else { "." }, name)?;
        for (i, a) in args.iter().enumerate() {
            if i > 0 {
                write!(self.out, ", ")?;
            }
            self.emit_expr(a)?;
        }
        write!(self.out, ")")?;
        Ok(())
    }

    /// Best-effort type of an expression, as a canonical type string.
    pub(super) fn infer_type(&self, e: &Expr) -> Option<String> {
        match &e.kind {
            ExprKind::IntLit(_) => Some("int".to_string()),
            ExprKind::FloatLit(_) => Some("float".to_string()),
            ExprKind::StrLit(_) => Some("string".to_string()),
            ExprKind::CharLit(_) => Some("char".to_string()),
            ExprKind::BoolLit(_) => Some("bool".to_string()),
            ExprKind::Ident(name) => self.syms.lookup(name).map(String::from),
            ExprKind::Field { name, .. } => {
                if name == "len" {
                    Some("int".to_string())
                } else {
                    None
                }
            }
            ExprKind::Index { target, .. } => {
                let tt = self.infer_type(target)?;
                if types::is_list(&tt) {
                    Some(types::list_elem(&tt).to_string())
                } else {
                    None
                }
            }
            ExprKind::Method { target, name, .. } => {
                let tt = self.infer_type(target)?;
                if types::is_map(&tt) {
                    match name.as_str() {
                        "get" => Some(types::map_val(&tt).to_string()),
                        "has" => Some("bool".to_string()),
                        _ => None,
                    }
                } else {
                    None
                }
            }
            ExprKind::Call { name, .. } => self.fn_returns.get(name).cloned(),
            ExprKind::Binary { op, lhs, .. } => {
                if matches!(
                    op.as_str(),
                    "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||"
                ) {
                    Some("bool".to_string())
                } else {
                    self.infer_type(lhs)
                }
            }
            ExprKind::Paren(inner) => self.infer_type(inner),
            ExprKind::Unary { operand, .. } => self.infer_type(operand),
            ExprKind::Ternary { then_val, .. } => self.infer_type(then_val),
            ExprKind::Cast { ty, .. } => Some(ty.clone()),
            ExprKind::Await(inner) => {
                let tt = self.infer_type(inner)?;
                if types::is_future(&tt) {
                    Some(types::future_inner(&tt).to_string())
                } else {
                    None
                }
            }
            ExprKind::EnumInit { enum_name, .. } => Some(enum_name.clone()),
            _ => None,
        }
    }

    /// printf format specifier for a print argument.
    pub(super) fn fmt_for(&self, e: &Expr) -> &'static str {
        match &e.kind {
            ExprKind::StrLit(_) => "%s",
            ExprKind::IntLit(_) | ExprKind::BoolLit(_) => "%d",
            ExprKind::FloatLit(_) => "%f",
            ExprKind::CharLit(_) => "%c",
            _ => {
                let t = self.infer_type(e);
                types::fmt_spec(t.as_deref())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslateOptions;
    use crate::parser::Parser;
    use crate::ast::{DeclKind, StmtKind};

    fn expr_from(source: &str) -> Expr {
        // Wrap in a function and pull the first expression back out
        let full = format!("void main() {{ int probe = {}; }}", source);
        let mut parser = Parser::new(&full, "t.mxy", TranslateOptions::default());
        let prog = parser.parse().unwrap();
        match &prog.decls[0].kind {
            DeclKind::Func(f) => match &f.body[0].kind {
                StmtKind::Var(v) => v.value.clone(),
                other => panic!("expected var, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    fn emit(source: &str) -> String {
        let e = expr_from(source);
        let mut cg = CodeGen::new(&TranslateOptions::default(), &[], &[]);
        cg.emit_expr(&e).unwrap();
        std::mem::take(&mut cg.out)
    }

    #[test]
    fn test_literals() {
        assert_eq!(emit("42"), "42");
        assert_eq!(emit("0x1FL"), "0x1FL");
        assert_eq!(emit("2.5f"), "2.5f");
        assert_eq!(emit("\"hi\\n\""), "\"hi\\n\"");
        assert_eq!(emit("'x'"), "'x'");
        assert_eq!(emit("true"), "true");
        assert_eq!(emit("null"), "NULL");
    }

    #[test]
    fn test_operators() {
        assert_eq!(emit("1 + 2 * 3"), "1 + 2 * 3");
        assert_eq!(emit("(a + b) / c"), "(a + b) / c");
        assert_eq!(emit("a >= 1 && b != 2"), "a >= 1 && b != 2");
        assert_eq!(emit("-x"), "-x");
        assert_eq!(emit("a >> 2 | b"), "a >> 2 | b");
    }

    #[test]
    fn test_ternary_and_cast() {
        assert_eq!(emit("a > b ? a : b"), "a > b ? a : b");
        assert_eq!(emit("(int)x"), "(int)x");
        assert_eq!(emit("(string)p"), "(const char*)p");
    }

    #[test]
    fn test_postfix_incr() {
        assert_eq!(emit("i++"), "i++");
        assert_eq!(emit("++i"), "++i");
        assert_eq!(emit("p--"), "p--");
    }

    #[test]
    fn test_call_and_member() {
        assert_eq!(emit("f(1, 2)"), "f(1, 2)");
        assert_eq!(emit("p.x"), "p.x");
        assert_eq!(emit("p->x"), "p->x");
    }

    #[test]
    fn test_lambda_emits_hoisted_name() {
        assert_eq!(emit("(int x) -> x * 2"), "__moxy_lambda_0");
    }

    #[test]
    fn test_index_on_list_uses_data() {
        let e = expr_from("v[2]");
        let mut cg = CodeGen::new(&TranslateOptions::default(), &[], &[]);
        cg.syms.push_scope();
        cg.syms.add("v", "int[]");
        cg.emit_expr(&e).unwrap();
        assert_eq!(cg.out, "v.data[2]");
    }

    #[test]
    fn test_index_arc_uses_arrow() {
        let e = expr_from("v[2]");
        let mut cg = CodeGen::new(&TranslateOptions::default().with_arc(), &[], &[]);
        cg.syms.push_scope();
        cg.syms.add("v", "int[]");
        cg.emit_expr(&e).unwrap();
        assert_eq!(cg.out, "v->data[2]");
    }

    #[test]
    fn test_map_method_dispatch() {
        let e = expr_from("m.get(\"k\")");
        let mut cg = CodeGen::new(&TranslateOptions::default(), &[], &[]);
        cg.syms.push_scope();
        cg.syms.add("m", "map[string,int]");
        cg.emit_expr(&e).unwrap();
        assert_eq!(cg.out, "map_string_int_get(&m, \"k\")");
    }

    #[test]
    fn test_map_method_dispatch_arc() {
        let e = expr_from("m.set(\"k\", 1)");
        let mut cg = CodeGen::new(&TranslateOptions::default().with_arc(), &[], &[]);
        cg.syms.push_scope();
        cg.syms.add("m", "map[string,int]");
        cg.emit_expr(&e).unwrap();
        assert_eq!(cg.out, "map_string_int_set(m, \"k\", 1)");
    }

    #[test]
    fn test_unknown_method_passthrough() {
        assert_eq!(emit("obj.callback(1)"), "obj.callback(1)");
    }

    #[test]
    fn test_infer_types() {
        let mut cg = CodeGen::new(&TranslateOptions::default(), &[], &[]);
        cg.syms.push_scope();
        cg.syms.add("v", "int[]");
        cg.syms.add("m", "map[string,bool]");
        cg.fn_returns.insert("f".to_string(), "string".to_string());

        assert_eq!(cg.infer_type(&expr_from("v[0]")).as_deref(), Some("int"));
        assert_eq!(cg.infer_type(&expr_from("v.len")).as_deref(), Some("int"));
        assert_eq!(
            cg.infer_type(&expr_from("m.get(\"k\")")).as_deref(),
            Some("bool")
        );
        assert_eq!(cg.infer_type(&expr_from("f()")).as_deref(), Some("string"));
        assert_eq!(cg.infer_type(&expr_from("1 < 2")).as_deref(), Some("bool"));
        assert_eq!(cg.infer_type(&expr_from("1 + 2")).as_deref(), Some("int"));
        assert_eq!(cg.infer_type(&expr_from("missing")), None);
    }

    #[test]
    fn test_fmt_for() {
        let mut cg = CodeGen::new(&TranslateOptions::default(), &[], &[]);
        cg.syms.push_scope();
        cg.syms.add("s", "string");
        assert_eq!(cg.fmt_for(&expr_from("\"x\"")), "%s");
        assert_eq!(cg.fmt_for(&expr_from("s")), "%s");
        assert_eq!(cg.fmt_for(&expr_from("1.5")), "%f");
        assert_eq!(cg.fmt_for(&expr_from("unknown_var")), "%d");
    }
}
