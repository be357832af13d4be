//! Embedded Standard Library
//!
//! Stdlib modules embedded at compile time so the translator is fully
//! self-contained. The preprocessor queries this table whenever an
//! `#include "x.mxy"` misses on disk; keys are the virtual paths exactly
//! as written in the include.

use std::collections::HashMap;
use std::sync::LazyLock;

static STDLIB: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    m.insert("std/math.mxy", include_str!("../stdlib/math.mxy"));
    m.insert("std/prelude.mxy", include_str!("../stdlib/prelude.mxy"));
    m
});

/// Get an embedded stdlib module by its virtual path.
pub fn get_stdlib(path: &str) -> Option<&'static str> {
    STDLIB.get(path).copied()
}

/// Check whether a virtual path exists in the embedded stdlib.
pub fn has_stdlib(path: &str) -> bool {
    STDLIB.contains_key(path)
}

/// List all embedded stdlib paths.
pub fn list_stdlib() -> Vec<&'static str> {
    STDLIB.keys().copied().collect()
}
