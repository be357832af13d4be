//! The type-string DSL
//!
//! Types flow through the translator as canonical strings: atomic names
//! (`int`, `string`, ...), lists (`T[]`), results (`Result<T>`), maps
//! (`map[K,V]`), futures (`Future<T>`), and free-form C compositions
//! (`const char*`, `struct Foo*`) preserved verbatim. The DSL is
//! recursive; `map[string,int[]]` is valid. A canonical string is both the
//! instantiation key and the source of the mangled C identifier.

/// `T[]`
pub fn is_list(t: &str) -> bool {
    t.len() >= 3 && t.ends_with("[]")
}

/// `Result<T>`
pub fn is_result(t: &str) -> bool {
    t.starts_with("Result<") && t.ends_with('>')
}

/// `map[K,V]`
pub fn is_map(t: &str) -> bool {
    t.starts_with("map[") && t.ends_with(']')
}

/// `Future<T>`
pub fn is_future(t: &str) -> bool {
    t.starts_with("Future<") && t.ends_with('>')
}

/// The generic container kinds that get monomorphized templates.
pub fn is_container(t: &str) -> bool {
    is_list(t) || is_result(t) || is_map(t) || is_future(t)
}

/// The heap-owning kinds managed by ARC when the feature is on.
pub fn is_arc_managed(t: &str) -> bool {
    is_list(t) || is_map(t)
}

pub fn list_elem(t: &str) -> &str {
    &t[..t.len() - 2]
}

pub fn result_inner(t: &str) -> &str {
    &t["Result<".len()..t.len() - 1]
}

pub fn future_inner(t: &str) -> &str {
    &t["Future<".len()..t.len() - 1]
}

/// Split the body of a `map[K,V]` at the top-level comma. Nested brackets
/// and angles are respected so `map[string,int[]]` splits correctly.
fn map_parts(t: &str) -> (&str, &str) {
    let body = &t["map[".len()..t.len() - 1];
    let mut depth = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '[' | '<' => depth += 1,
            ']' | '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return (&body[..i], &body[i + 1..]),
            _ => {}
        }
    }
    (body, "")
}

pub fn map_key(t: &str) -> &str {
    map_parts(t).0
}

pub fn map_val(t: &str) -> &str {
    map_parts(t).1
}

/// Derive the mangled C identifier for a canonical type string:
/// `list_int`, `map_string_int`, `Result_list_int`, `Future_void`.
/// `string` keeps its name in mangled positions.
pub fn mangle(t: &str) -> String {
    if is_list(t) {
        return format!("list_{}", mangle(list_elem(t)));
    }
    if is_result(t) {
        return format!("Result_{}", mangle(result_inner(t)));
    }
    if is_map(t) {
        return format!("map_{}_{}", mangle(map_key(t)), mangle(map_val(t)));
    }
    if is_future(t) {
        return format!("Future_{}", mangle(future_inner(t)));
    }
    // Free-form C compositions sanitize to identifier characters
    t.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Map an atomic moxy type to its terminal C spelling. Unknown names pass
/// through verbatim (user structs, `const char*`, ...).
fn atomic_c(t: &str) -> &str {
    match t {
        "string" => "const char*",
        _ => t,
    }
}

/// Map any canonical type string to its C type. Under ARC, lists and maps
/// are heap-allocated and their C type is a pointer to the template struct.
pub fn c_type(t: &str, arc: bool) -> String {
    if is_list(t) || is_map(t) {
        let name = mangle(t);
        if arc {
            return format!("{}*", name);
        }
        return name;
    }
    if is_result(t) || is_future(t) {
        return mangle(t);
    }
    atomic_c(t).to_string()
}

/// printf format specifier for a known moxy type; `%d` when unknown.
pub fn fmt_spec(t: Option<&str>) -> &'static str {
    match t {
        Some("string") => "%s",
        Some("float") | Some("double") => "%f",
        Some("char") => "%c",
        Some("long") => "%ld",
        Some("short") => "%hd",
        _ => "%d",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert!(is_list("int[]"));
        assert!(is_list("int[][]"));
        assert!(!is_list("[]"));
        assert!(is_result("Result<int>"));
        assert!(is_map("map[string,int]"));
        assert!(is_future("Future<void>"));
        assert!(!is_container("int"));
        assert!(is_arc_managed("map[string,int]"));
        assert!(!is_arc_managed("Result<int>"));
    }

    #[test]
    fn test_decompose() {
        assert_eq!(list_elem("int[]"), "int");
        assert_eq!(list_elem("int[][]"), "int[]");
        assert_eq!(result_inner("Result<int[]>"), "int[]");
        assert_eq!(future_inner("Future<string>"), "string");
        assert_eq!(map_key("map[string,int]"), "string");
        assert_eq!(map_val("map[string,int]"), "int");
    }

    #[test]
    fn test_nested_map_split() {
        assert_eq!(map_key("map[string,int[]]"), "string");
        assert_eq!(map_val("map[string,int[]]"), "int[]");
        assert_eq!(map_key("map[map[string,int],bool]"), "map[string,int]");
        assert_eq!(map_val("map[map[string,int],bool]"), "bool");
        assert_eq!(map_val("map[string,Result<int>]"), "Result<int>");
    }

    #[test]
    fn test_mangle() {
        assert_eq!(mangle("int[]"), "list_int");
        assert_eq!(mangle("string[]"), "list_string");
        assert_eq!(mangle("Result<int>"), "Result_int");
        assert_eq!(mangle("map[string,int]"), "map_string_int");
        assert_eq!(mangle("map[string,int[]]"), "map_string_list_int");
        assert_eq!(mangle("Future<void>"), "Future_void");
        assert_eq!(mangle("int[][]"), "list_list_int");
    }

    #[test]
    fn test_c_type() {
        assert_eq!(c_type("int", false), "int");
        assert_eq!(c_type("string", false), "const char*");
        assert_eq!(c_type("int[]", false), "list_int");
        assert_eq!(c_type("int[]", true), "list_int*");
        assert_eq!(c_type("map[string,int]", true), "map_string_int*");
        assert_eq!(c_type("Result<int>", true), "Result_int");
        assert_eq!(c_type("Future<int>", false), "Future_int");
        assert_eq!(c_type("struct Foo*", false), "struct Foo*");
    }

    #[test]
    fn test_fmt_spec() {
        assert_eq!(fmt_spec(Some("string")), "%s");
        assert_eq!(fmt_spec(Some("int")), "%d");
        assert_eq!(fmt_spec(Some("bool")), "%d");
        assert_eq!(fmt_spec(Some("double")), "%f");
        assert_eq!(fmt_spec(None), "%d");
    }
}
