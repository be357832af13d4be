//! Diagnostic rendering
//!
//! Errors are reported rustc-style: a bold headline, a `-->` locus, the
//! offending source line with a caret underline, and an optional `= help:`
//! hint. The translator has no error recovery; the first diagnostic
//! produced by any stage aborts the translation, so diagnostics are
//! rendered eagerly into the error string returned to the caller.

use crate::token::TokenKind;

/// A single error diagnostic with enough context to render a snippet.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// 1-indexed source line
    pub line: usize,
    /// 1-indexed source column
    pub col: usize,
    /// Width of the caret underline, in characters (minimum 1)
    pub span: usize,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(line: usize, col: usize, span: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            line,
            col,
            span: span.max(1),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Render the diagnostic against the source it points into.
    ///
    /// Output format (ANSI-styled):
    /// ```text
    /// error: expected ';', found '}'
    ///   --> demo.mxy:3:14
    ///    |
    ///  3 |     print(x)
    ///    |              ^
    ///   = help: add ';' before '}'
    /// ```
    pub fn render(&self, source: &str, filename: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "\x1b[1;31merror\x1b[0m\x1b[1m: {}\x1b[0m\n",
            self.message
        ));
        out.push_str(&format!(
            "  \x1b[1;34m-->\x1b[0m {}:{}:{}\n",
            filename, self.line, self.col
        ));

        if let Some(src_line) = source.lines().nth(self.line.saturating_sub(1)) {
            let w = digit_width(self.line);
            out.push_str(&format!(" {:w$} |\n", "", w = w));
            out.push_str(&format!(" {:w$} | {}\n", self.line, src_line, w = w));

            let mut underline = format!(" {:w$} | ", "", w = w);
            let caret_pos = self.col.saturating_sub(1);
            for (i, c) in src_line.chars().enumerate() {
                if i >= caret_pos {
                    break;
                }
                // Keep tabs so the caret lines up under tab-indented code
                underline.push(if c == '\t' { '\t' } else { ' ' });
            }
            for _ in src_line.chars().count()..caret_pos {
                underline.push(' ');
            }
            for _ in 0..self.span.min(40) {
                underline.push('^');
            }
            out.push_str(&underline);
            out.push('\n');
        }

        if let Some(hint) = &self.hint {
            out.push_str(&format!("  \x1b[1;32m= help\x1b[0m: {}\n", hint));
        }

        out
    }
}

fn digit_width(n: usize) -> usize {
    match n {
        0..=9 => 1,
        10..=99 => 2,
        100..=999 => 3,
        _ => 4,
    }
}

/// Hint for an "expected X, found Y" mismatch, keyed on the token pair.
pub fn expected_hint(expected: TokenKind, got: TokenKind) -> Option<&'static str> {
    use TokenKind::*;
    let hint = match (expected, got) {
        (Semi, Comma) => "in match arms, wrap statements in braces: { statement; }",
        (Semi, RBrace) => "add ';' before '}'",
        (Semi, _) => "add ';' at end of statement",
        (LBrace, Eq) => "function bodies must be wrapped in { }",
        (RParen, _) => "unclosed '(' — add ')' to match",
        (RBracket, _) => "unclosed '[' — add ']' to match",
        (RBrace, _) => "unclosed '{' — add '}' to match",
        (LParen, Ident) => "expected '(' after function name",
        _ => return None,
    };
    Some(hint)
}

/// Spell-correction hint for identifiers borrowed from other languages.
pub fn ident_hint(name: &str) -> Option<&'static str> {
    let hint = match name {
        "str" => "did you mean 'string'?",
        "fn" | "func" | "def" => "moxy uses C-style function syntax: returnType name(args) { ... }",
        "let" | "var" => "moxy uses C-style declarations: type name = value;",
        "println" | "printf" | "puts" => "did you mean 'print'?",
        "elif" | "elsif" => "did you mean 'else if'?",
        _ => return None,
    };
    Some(hint)
}

/// Hint for a token that only has meaning in a different context.
pub fn stray_token_hint(kind: TokenKind) -> Option<&'static str> {
    match kind {
        TokenKind::FatArrow => Some("'=>' is only valid inside match arms"),
        TokenKind::DotDot => Some("'..' ranges are only valid in for-in loops"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_has_locus_and_caret() {
        let src = "void main() {\n    print(x)\n}\n";
        let d = Diagnostic::new(2, 5, 5, "expected ';', found '}'").with_hint("add ';' before '}'");
        let rendered = d.render(src, "demo.mxy");
        assert!(rendered.contains("error"));
        assert!(rendered.contains("demo.mxy:2:5"));
        assert!(rendered.contains("print(x)"));
        assert!(rendered.contains("^^^^^"));
        assert!(rendered.contains("= help"));
    }

    #[test]
    fn test_caret_capped_at_40() {
        let src = "x\n";
        let d = Diagnostic::new(1, 1, 500, "too wide");
        let rendered = d.render(src, "t.mxy");
        let carets = rendered.chars().filter(|c| *c == '^').count();
        assert_eq!(carets, 40);
    }

    #[test]
    fn test_expected_hints() {
        use TokenKind::*;
        assert_eq!(expected_hint(Semi, RBrace), Some("add ';' before '}'"));
        assert_eq!(
            expected_hint(LBrace, Eq),
            Some("function bodies must be wrapped in { }")
        );
        assert_eq!(expected_hint(Comma, Semi), None);
    }

    #[test]
    fn test_ident_hints() {
        assert!(ident_hint("str").unwrap().contains("string"));
        assert!(ident_hint("fn").unwrap().contains("C-style"));
        assert!(ident_hint("reasonable_name").is_none());
    }
}
