//! Enum lowering and monomorphized container templates
//!
//! One template per collected instantiation. Lists and maps come in two
//! flavors: plain stack values, or heap-allocated reference-counted
//! structs when ARC is enabled. `Result<T>` is a discriminated union with
//! a `const char*` error payload; `Future<T>` wraps a pthread handle.

use super::{CodeGen, CodeGenError};
use crate::ast::EnumDecl;
use crate::types;
use std::fmt::Write as _;

impl CodeGen {
    /// Simple enums lower to a plain C enum; tagged enums get a `_Tag`
    /// enum plus a struct with an anonymous union of per-variant structs.
    pub(super) fn emit_enum(&mut self, e: &EnumDecl) -> Result<(), CodeGenError> {
        let name = &e.name;

        if e.is_simple() {
            writeln!(self.out, "typedef enum {{")?;
            for v in &e.variants {
                writeln!(self.out, "    {}_{},", name, v.name)?;
            }
            writeln!(self.out, "}} {};\n", name)?;
            return Ok(());
        }

        writeln!(self.out, "typedef enum {{")?;
        for v in &e.variants {
            writeln!(self.out, "    {}_{},", name, v.name)?;
        }
        writeln!(self.out, "}} {}_Tag;\n", name)?;

        writeln!(self.out, "typedef struct {{")?;
        writeln!(self.out, "    {}_Tag tag;", name)?;
        writeln!(self.out, "    union {{")?;
        for v in &e.variants {
            if v.fields.is_empty() {
                continue;
            }
            write!(self.out, "        struct {{")?;
            for f in &v.fields {
                write!(self.out, " {} {};", types::c_type(&f.ty, self.arc_on()), f.name)?;
            }
            writeln!(self.out, " }} {};", v.name)?;
        }
        writeln!(self.out, "    }};")?;
        writeln!(self.out, "}} {};\n", name)?;
        Ok(())
    }

    pub(super) fn emit_list_template(&mut self, ty: &str) -> Result<(), CodeGenError> {
        let elem = types::list_elem(ty).to_string();
        let celem = types::c_type(&elem, self.arc_on());
        let tname = types::mangle(ty);

        if self.arc_on() {
            writeln!(self.out, "typedef struct {{")?;
            writeln!(self.out, "    int _rc;")?;
            writeln!(self.out, "    {} *data;", celem)?;
            writeln!(self.out, "    int len;")?;
            writeln!(self.out, "    int cap;")?;
            writeln!(self.out, "}} {};\n", tname)?;

            writeln!(
                self.out,
                "static {} *{}_make({} *init, int n) {{",
                tname, tname, celem
            )?;
            writeln!(self.out, "    {} *l = ({}*)malloc(sizeof({}));", tname, tname, tname)?;
            writeln!(self.out, "    l->_rc = 1;")?;
            writeln!(self.out, "    l->cap = n < 8 ? 8 : n;")?;
            writeln!(
                self.out,
                "    l->data = ({}*)malloc(l->cap * sizeof({}));",
                celem, celem
            )?;
            writeln!(self.out, "    l->len = n;")?;
            writeln!(
                self.out,
                "    if (n > 0) memcpy(l->data, init, n * sizeof({}));",
                celem
            )?;
            writeln!(self.out, "    return l;")?;
            writeln!(self.out, "}}\n")?;

            writeln!(self.out, "static void {}_retain({} *l) {{", tname, tname)?;
            writeln!(self.out, "    if (l) l->_rc++;")?;
            writeln!(self.out, "}}\n")?;

            writeln!(self.out, "static void {}_release({} *l) {{", tname, tname)?;
            writeln!(self.out, "    if (!l) return;")?;
            writeln!(self.out, "    if (--l->_rc == 0) {{")?;
            writeln!(self.out, "        free(l->data);")?;
            writeln!(self.out, "        free(l);")?;
            writeln!(self.out, "    }}")?;
            writeln!(self.out, "}}\n")?;
        } else {
            writeln!(self.out, "typedef struct {{")?;
            writeln!(self.out, "    {} *data;", celem)?;
            writeln!(self.out, "    int len;")?;
            writeln!(self.out, "    int cap;")?;
            writeln!(self.out, "}} {};\n", tname)?;

            writeln!(
                self.out,
                "static {} {}_make({} *init, int n) {{",
                tname, tname, celem
            )?;
            writeln!(self.out, "    {} l;", tname)?;
            writeln!(self.out, "    l.cap = n < 8 ? 8 : n;")?;
            writeln!(
                self.out,
                "    l.data = ({}*)malloc(l.cap * sizeof({}));",
                celem, celem
            )?;
            writeln!(self.out, "    l.len = n;")?;
            writeln!(
                self.out,
                "    if (n > 0) memcpy(l.data, init, n * sizeof({}));",
                celem
            )?;
            writeln!(self.out, "    return l;")?;
            writeln!(self.out, "}}\n")?;
        }

        writeln!(
            self.out,
            "static void {}_push({} *l, {} val) {{",
            tname, tname, celem
        )?;
        writeln!(self.out, "    if (l->len >= l->cap) {{")?;
        writeln!(self.out, "        l->cap = l->cap < 8 ? 8 : l->cap * 2;")?;
        writeln!(
            self.out,
            "        l->data = ({}*)realloc(l->data, l->cap * sizeof({}));",
            celem, celem
        )?;
        writeln!(self.out, "    }}")?;
        writeln!(self.out, "    l->data[l->len++] = val;")?;
        writeln!(self.out, "}}\n")?;
        Ok(())
    }

    pub(super) fn emit_map_template(&mut self, ty: &str) -> Result<(), CodeGenError> {
        let key = types::map_key(ty).to_string();
        let val = types::map_val(ty).to_string();
        let ck = types::c_type(&key, self.arc_on());
        let cv = types::c_type(&val, self.arc_on());
        let tname = types::mangle(ty);

        // String keys compare with strcmp, everything else with ==
        let cmp = if key == "string" {
            "strcmp(m->entries[i].key, key) == 0"
        } else {
            "m->entries[i].key == key"
        };

        if self.arc_on() {
            writeln!(self.out, "typedef struct {{")?;
            writeln!(self.out, "    int _rc;")?;
            writeln!(self.out, "    struct {{ {} key; {} val; }} *entries;", ck, cv)?;
            writeln!(self.out, "    int len;")?;
            writeln!(self.out, "    int cap;")?;
            writeln!(self.out, "}} {};\n", tname)?;

            writeln!(self.out, "static {} *{}_make(void) {{", tname, tname)?;
            writeln!(self.out, "    {} *m = ({}*)malloc(sizeof({}));", tname, tname, tname)?;
            writeln!(self.out, "    m->_rc = 1;")?;
            writeln!(self.out, "    m->cap = 8;")?;
            writeln!(self.out, "    m->entries = malloc(m->cap * sizeof(*m->entries));")?;
            writeln!(self.out, "    m->len = 0;")?;
            writeln!(self.out, "    return m;")?;
            writeln!(self.out, "}}\n")?;

            writeln!(self.out, "static void {}_retain({} *m) {{", tname, tname)?;
            writeln!(self.out, "    if (m) m->_rc++;")?;
            writeln!(self.out, "}}\n")?;

            writeln!(self.out, "static void {}_release({} *m) {{", tname, tname)?;
            writeln!(self.out, "    if (!m) return;")?;
            writeln!(self.out, "    if (--m->_rc == 0) {{")?;
            writeln!(self.out, "        free(m->entries);")?;
            writeln!(self.out, "        free(m);")?;
            writeln!(self.out, "    }}")?;
            writeln!(self.out, "}}\n")?;
        } else {
            writeln!(self.out, "typedef struct {{")?;
            writeln!(self.out, "    struct {{ {} key; {} val; }} *entries;", ck, cv)?;
            writeln!(self.out, "    int len;")?;
            writeln!(self.out, "    int cap;")?;
            writeln!(self.out, "}} {};\n", tname)?;

            writeln!(self.out, "static {} {}_make(void) {{", tname, tname)?;
            writeln!(self.out, "    {} m;", tname)?;
            writeln!(self.out, "    m.cap = 8;")?;
            writeln!(self.out, "    m.entries = malloc(m.cap * sizeof(*m.entries));")?;
            writeln!(self.out, "    m.len = 0;")?;
            writeln!(self.out, "    return m;")?;
            writeln!(self.out, "}}\n")?;
        }

        writeln!(
            self.out,
            "static void {}_set({} *m, {} key, {} val) {{",
            tname, tname, ck, cv
        )?;
        writeln!(self.out, "    for (int i = 0; i < m->len; i++) {{")?;
        writeln!(self.out, "        if ({}) {{ m->entries[i].val = val; return; }}", cmp)?;
        writeln!(self.out, "    }}")?;
        writeln!(self.out, "    if (m->len >= m->cap) {{")?;
        writeln!(self.out, "        m->cap *= 2;")?;
        writeln!(
            self.out,
            "        m->entries = realloc(m->entries, m->cap * sizeof(*m->entries));"
        )?;
        writeln!(self.out, "    }}")?;
        writeln!(self.out, "    m->entries[m->len].key = key;")?;
        writeln!(self.out, "    m->entries[m->len].val = val;")?;
        writeln!(self.out, "    m->len++;")?;
        writeln!(self.out, "}}\n")?;

        writeln!(
            self.out,
            "static {} {}_get({} *m, {} key) {{",
            cv, tname, tname, ck
        )?;
        writeln!(self.out, "    for (int i = 0; i < m->len; i++)")?;
        writeln!(self.out, "        if ({}) return m->entries[i].val;", cmp)?;
        writeln!(self.out, "    return ({}){{0}};", cv)?;
        writeln!(self.out, "}}\n")?;

        writeln!(
            self.out,
            "static bool {}_has({} *m, {} key) {{",
            tname, tname, ck
        )?;
        writeln!(self.out, "    for (int i = 0; i < m->len; i++)")?;
        writeln!(self.out, "        if ({}) return true;", cmp)?;
        writeln!(self.out, "    return false;")?;
        writeln!(self.out, "}}\n")?;
        Ok(())
    }

    pub(super) fn emit_result_template(&mut self, ty: &str) -> Result<(), CodeGenError> {
        let inner = types::result_inner(ty).to_string();
        let cinner = types::c_type(&inner, self.arc_on());
        let tname = types::mangle(ty);

        writeln!(
            self.out,
            "typedef enum {{ {}_Ok, {}_Err }} {}_Tag;",
            tname, tname, tname
        )?;
        writeln!(self.out, "typedef struct {{")?;
        writeln!(self.out, "    {}_Tag tag;", tname)?;
        writeln!(self.out, "    union {{")?;
        writeln!(self.out, "        {} ok;", cinner)?;
        writeln!(self.out, "        const char* err;")?;
        writeln!(self.out, "    }};")?;
        writeln!(self.out, "}} {};\n", tname)?;

        // An ARC payload needs a release when the result is dropped
        if self.arc_on() && types::is_arc_managed(&inner) {
            writeln!(self.out, "static void {}_cleanup({} *r) {{", tname, tname)?;
            writeln!(
                self.out,
                "    if (r->tag == {}_Ok) {}_release(r->ok);",
                tname,
                types::mangle(&inner)
            )?;
            writeln!(self.out, "}}\n")?;
        }
        Ok(())
    }

    pub(super) fn emit_future_template(&mut self, ty: &str) -> Result<(), CodeGenError> {
        let inner = types::future_inner(ty).to_string();
        let tname = types::mangle(ty);
        let result_ty = if inner == "void" {
            "int".to_string()
        } else {
            types::c_type(&inner, self.arc_on())
        };

        writeln!(self.out, "typedef struct {{")?;
        writeln!(self.out, "    pthread_t thread;")?;
        writeln!(self.out, "    {} result;", result_ty)?;
        writeln!(self.out, "    int started;")?;
        writeln!(self.out, "}} {};\n", tname)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslateOptions;

    fn generate_template(ty: &str, arc: bool) -> String {
        let opts = if arc {
            TranslateOptions::default().with_arc()
        } else {
            TranslateOptions::default()
        };
        let mut cg = CodeGen::new(&opts, &[], &[]);
        if types::is_list(ty) {
            cg.emit_list_template(ty).unwrap();
        } else if types::is_map(ty) {
            cg.emit_map_template(ty).unwrap();
        } else if types::is_result(ty) {
            cg.emit_result_template(ty).unwrap();
        } else {
            cg.emit_future_template(ty).unwrap();
        }
        std::mem::take(&mut cg.out)
    }

    #[test]
    fn test_list_template_plain() {
        let c = generate_template("int[]", false);
        assert!(c.contains("int *data;"));
        assert!(c.contains("static list_int list_int_make(int *init, int n) {"));
        assert!(c.contains("l.cap = n < 8 ? 8 : n;"));
        assert!(c.contains("static void list_int_push(list_int *l, int val) {"));
        assert!(!c.contains("_rc"));
    }

    #[test]
    fn test_list_template_arc() {
        let c = generate_template("int[]", true);
        assert!(c.contains("int _rc;"));
        assert!(c.contains("static list_int *list_int_make(int *init, int n) {"));
        assert!(c.contains("l->_rc = 1;"));
        assert!(c.contains("static void list_int_retain(list_int *l) {"));
        assert!(c.contains("static void list_int_release(list_int *l) {"));
        assert!(c.contains("if (--l->_rc == 0) {"));
    }

    #[test]
    fn test_map_template_string_keys_use_strcmp() {
        let c = generate_template("map[string,int]", false);
        assert!(c.contains("strcmp(m->entries[i].key, key) == 0"));
        assert!(c.contains("static void map_string_int_set(map_string_int *m, const char* key, int val) {"));
        assert!(c.contains("static bool map_string_int_has(map_string_int *m, const char* key) {"));
    }

    #[test]
    fn test_map_template_int_keys_use_eq() {
        let c = generate_template("map[int,int]", false);
        assert!(c.contains("m->entries[i].key == key"));
        assert!(!c.contains("strcmp"));
    }

    #[test]
    fn test_result_template() {
        let c = generate_template("Result<int>", false);
        assert!(c.contains("typedef enum { Result_int_Ok, Result_int_Err } Result_int_Tag;"));
        assert!(c.contains("int ok;"));
        assert!(c.contains("const char* err;"));
        assert!(!c.contains("cleanup"));
    }

    #[test]
    fn test_result_template_arc_payload_gets_cleanup() {
        let c = generate_template("Result<int[]>", true);
        assert!(c.contains("list_int* ok;"));
        assert!(c.contains("static void Result_list_int_cleanup(Result_list_int *r) {"));
        assert!(c.contains("list_int_release(r->ok);"));
    }

    #[test]
    fn test_future_template() {
        let c = generate_template("Future<int>", false);
        assert!(c.contains("pthread_t thread;"));
        assert!(c.contains("int result;"));
        assert!(c.contains("int started;"));
        assert!(c.contains("} Future_int;"));

        let c = generate_template("Future<void>", false);
        assert!(c.contains("int result;"));

        let c = generate_template("Future<string>", false);
        assert!(c.contains("const char* result;"));
    }
}
