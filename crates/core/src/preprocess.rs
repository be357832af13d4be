//! Preprocessor
//!
//! Runs over raw source text before lexing. `#include "x.mxy"` is resolved
//! by textual inlining (directory of the current file first, embedded
//! stdlib on miss); every other `#include` is captured for verbatim
//! emission by the generator; remaining `#` lines become user directives.
//! The `@type` pragma registers user type names for the parser.
//!
//! Captured lines are replaced with blank lines so diagnostics pointing
//! into the preprocessed text keep their line numbers. Each file is only
//! inlined once, which also makes include cycles harmless.

use crate::diag::Diagnostic;
use crate::stdlib_embed;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the preprocessor extracts from one top-level file.
#[derive(Debug, Default)]
pub struct Preprocessed {
    /// The spliced source text handed to the lexer
    pub source: String,
    /// Verbatim C `#include` lines, deduplicated, in first-seen order
    pub includes: Vec<String>,
    /// Non-include `#` lines, in source order
    pub directives: Vec<String>,
    /// Type names registered via `@type`
    pub type_names: Vec<String>,
}

/// Preprocess the source of `path`. The preprocessor keeps no state across
/// top-level files; it is a pure transform parameterized by the file's
/// directory.
pub fn preprocess(source: &str, path: &Path) -> Result<Preprocessed, String> {
    let mut pp = Preprocessor {
        out: Preprocessed::default(),
        inlined: HashSet::new(),
    };
    let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let text = pp.run(source, &path.display().to_string(), &base_dir)?;
    pp.out.source = text;
    Ok(pp.out)
}

struct Preprocessor {
    out: Preprocessed,
    /// Disk paths and stdlib keys already spliced in
    inlined: HashSet<PathBuf>,
}

impl Preprocessor {
    fn run(&mut self, source: &str, display: &str, base_dir: &Path) -> Result<String, String> {
        let mut text = String::with_capacity(source.len());

        for (idx, line) in source.lines().enumerate() {
            let trimmed = line.trim_start();

            if let Some(rest) = include_directive(trimmed) {
                let (filename, angled) = parse_include_target(rest);
                if filename.is_empty() {
                    // Malformed include; keep it as a user directive and let
                    // the C compiler complain
                    self.out.directives.push(trimmed.to_string());
                    text.push('\n');
                    continue;
                }

                if filename.ends_with(".mxy") {
                    let spliced =
                        self.splice(&filename, base_dir, source, display, idx + 1, line)?;
                    text.push_str(&spliced);
                    if !spliced.ends_with('\n') {
                        text.push('\n');
                    }
                } else {
                    let directive = if angled {
                        format!("#include <{}>", filename)
                    } else {
                        format!("#include \"{}\"", filename)
                    };
                    if !self.out.includes.contains(&directive) {
                        self.out.includes.push(directive);
                    }
                    text.push('\n');
                }
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix("@type") {
                let names = rest.trim().trim_end_matches(';');
                for name in names.split(',') {
                    let name = name.trim();
                    if !name.is_empty() {
                        self.out.type_names.push(name.to_string());
                    }
                }
                text.push('\n');
                continue;
            }

            if trimmed.starts_with('#') {
                self.out.directives.push(trimmed.to_string());
                text.push('\n');
                continue;
            }

            text.push_str(line);
            text.push('\n');
        }

        Ok(text)
    }

    /// Resolve a `.mxy` include: directory of the current file first, then
    /// the embedded stdlib. Returns the recursively preprocessed content,
    /// or an empty string if it was already inlined.
    fn splice(
        &mut self,
        filename: &str,
        base_dir: &Path,
        source: &str,
        display: &str,
        line_no: usize,
        line: &str,
    ) -> Result<String, String> {
        let disk_path = base_dir.join(filename);
        if disk_path.is_file() {
            let canonical = disk_path.canonicalize().unwrap_or_else(|_| disk_path.clone());
            if !self.inlined.insert(canonical) {
                return Ok(String::new());
            }
            let content = fs::read_to_string(&disk_path)
                .map_err(|e| format!("cannot read '{}': {}", disk_path.display(), e))?;
            let nested_dir = disk_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf();
            return self.run(&content, &disk_path.display().to_string(), &nested_dir);
        }

        if let Some(content) = stdlib_embed::get_stdlib(filename) {
            if !self.inlined.insert(PathBuf::from(format!("std:{}", filename))) {
                return Ok(String::new());
            }
            // Stdlib modules resolve their own includes against the table,
            // so the includer's base dir is passed through unchanged
            return self.run(content, filename, base_dir);
        }

        let col = line.find('#').map(|i| i + 1).unwrap_or(1);
        let diag = Diagnostic::new(line_no, col, line.trim_end().len(), format!("cannot find '{}'", filename));
        Err(diag.render(source, display))
    }
}

/// If `line` is an include directive, return the text after `#include`.
fn include_directive(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#include")?;
    match rest.bytes().next() {
        Some(b' ') | Some(b'\t') | Some(b'"') | Some(b'<') => Some(rest),
        _ => None,
    }
}

/// Extract the include target and whether it used angle brackets.
fn parse_include_target(rest: &str) -> (String, bool) {
    let rest = rest.trim_start();
    if let Some(body) = rest.strip_prefix('"') {
        if let Some(end) = body.find('"') {
            return (body[..end].to_string(), false);
        }
    } else if let Some(body) = rest.strip_prefix('<') {
        if let Some(end) = body.find('>') {
            return (body[..end].to_string(), true);
        }
    }
    (String::new(), false)
}
