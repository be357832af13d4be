//! moxy Core Translator
//!
//! Compiles moxy sources (`.mxy`) into portable C11 text. moxy is C plus
//! enums with pattern matching, lambdas, ranges, a pipe operator, and
//! optional ARC and async lowering. Ordinary C passes through unchanged,
//! so any C file is already valid moxy.
//!
//! The pipeline is preprocess → lex → parse → generate; each stage fully
//! consumes its input before the next runs, and every piece of mutable
//! state lives on per-call values, so translations never interfere.
//!
//! # Example
//!
//! ```rust,ignore
//! use moxyc::{TranslateOptions, translate_file};
//!
//! let options = TranslateOptions::new().with_arc();
//! let c_source = translate_file(Path::new("app.mxy"), &options)?;
//! ```
//!
//! The CLI, package manager, formatter and language server are external
//! collaborators that call [`translate_file`]; none of them live in this
//! crate.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod diag;
pub mod lexer;
pub mod parser;
pub mod preprocess;
pub mod stdlib_embed;
pub mod token;
pub mod types;

pub use ast::Program;
pub use codegen::{CodeGen, CodeGenError};
pub use config::TranslateOptions;
pub use parser::Parser;
pub use preprocess::{Preprocessed, preprocess};

use std::fs;
use std::path::Path;

/// Translate a `.mxy` file on disk to C source text.
///
/// This is the single entry point the external tooling calls. Errors are
/// fully rendered diagnostics ready for stderr.
pub fn translate_file(source_path: &Path, options: &TranslateOptions) -> Result<String, String> {
    let source = fs::read_to_string(source_path)
        .map_err(|_| format!("cannot open '{}'", source_path.display()))?;
    translate_source(&source, source_path, options)
}

/// Translate in-memory source. `source_path` supplies the include base
/// directory and the filename shown in diagnostics.
pub fn translate_source(
    source: &str,
    source_path: &Path,
    options: &TranslateOptions,
) -> Result<String, String> {
    let pre = preprocess::preprocess(source, source_path)?;

    let mut parser = Parser::new(&pre.source, source_path.display().to_string(), *options);
    parser.register_types(&pre.type_names);
    let program = parser.parse()?;

    let mut generator = CodeGen::new(options, &pre.includes, &pre.directives);
    generator.generate(&program).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_source_minimal() {
        let c = translate_source(
            "void main() { print(1); }\n",
            Path::new("t.mxy"),
            &TranslateOptions::default(),
        )
        .unwrap();
        assert!(c.contains("int main(void) {"));
        assert!(c.contains("printf(\"%d\\n\", 1);"));
        assert!(c.contains("return 0;"));
    }

    #[test]
    fn test_translate_missing_file() {
        let err = translate_file(Path::new("/no/such/file.mxy"), &TranslateOptions::default())
            .unwrap_err();
        assert!(err.contains("cannot open"));
    }

    #[test]
    fn test_parse_error_is_rendered() {
        let err = translate_source(
            "void main() { return 1 }\n",
            Path::new("t.mxy"),
            &TranslateOptions::default(),
        )
        .unwrap_err();
        assert!(err.contains("expected ';'"));
        assert!(err.contains("t.mxy:1"));
    }
}
