//! Lexer for moxy
//!
//! Single-pass, greedy, no backtracking. Whitespace and both comment forms
//! are separators. String and char literals keep their escape sequences
//! verbatim (the generator re-emits them untouched); numeric literals keep
//! any `L`/`U`/`f` suffixes in the lexeme. Bytes that fit no rule become a
//! distinguished `Unknown` token; the parser decides what to do with them.

use crate::diag::Diagnostic;
use crate::token::{Token, TokenKind, keyword};

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> u8 {
        self.src.get(self.pos).copied().unwrap_or(0)
    }

    fn peek2(&self) -> u8 {
        self.src.get(self.pos + 1).copied().unwrap_or(0)
    }

    fn peek3(&self) -> u8 {
        self.src.get(self.pos + 2).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let c = self.peek();
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn skip_separators(&mut self) {
        loop {
            let c = self.peek();
            if c == b' ' || c == b'\t' || c == b'\n' || c == b'\r' {
                self.advance();
                continue;
            }
            if c == b'/' && self.peek2() == b'/' {
                while self.peek() != 0 && self.peek() != b'\n' {
                    self.advance();
                }
                continue;
            }
            if c == b'/' && self.peek2() == b'*' {
                self.advance();
                self.advance();
                while self.peek() != 0 && !(self.peek() == b'*' && self.peek2() == b'/') {
                    self.advance();
                }
                if self.peek() != 0 {
                    self.advance();
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    fn slice(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.src[start..end]).into_owned()
    }

    /// Lex the next token. Returns `Err` only for unterminated string or
    /// character literals, pointing at the opening quote.
    pub fn next_token(&mut self) -> Result<Token, Diagnostic> {
        self.skip_separators();

        let line = self.line;
        let col = self.col;
        let c = self.peek();

        if c == 0 {
            return Ok(Token::new(TokenKind::Eof, "", line, col));
        }

        if c == b'"' {
            self.advance();
            let start = self.pos;
            while self.peek() != 0 && self.peek() != b'"' {
                if self.peek() == b'\\' {
                    self.advance();
                }
                if self.peek() != 0 {
                    self.advance();
                }
            }
            if self.peek() == 0 {
                return Err(Diagnostic::new(line, col, 1, "unterminated string literal"));
            }
            let text = self.slice(start, self.pos);
            self.advance();
            return Ok(Token::new(TokenKind::StrLit, text, line, col));
        }

        if c == b'\'' {
            self.advance();
            let start = self.pos;
            if self.peek() == b'\\' {
                self.advance();
                self.advance();
            } else {
                self.advance();
            }
            if self.peek() != b'\'' {
                return Err(Diagnostic::new(
                    line,
                    col,
                    1,
                    "unterminated character literal",
                ));
            }
            let text = self.slice(start, self.pos);
            self.advance();
            return Ok(Token::new(TokenKind::CharLit, text, line, col));
        }

        if c.is_ascii_digit() {
            let start = self.pos;
            let mut is_float = false;

            if c == b'0' && (self.peek2() == b'x' || self.peek2() == b'X') {
                self.advance();
                self.advance();
                while self.peek().is_ascii_hexdigit() {
                    self.advance();
                }
            } else {
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
                if self.peek() == b'.' && self.peek2().is_ascii_digit() {
                    is_float = true;
                    self.advance();
                    while self.peek().is_ascii_digit() {
                        self.advance();
                    }
                }
                if self.peek() == b'e' || self.peek() == b'E' {
                    is_float = true;
                    self.advance();
                    if self.peek() == b'+' || self.peek() == b'-' {
                        self.advance();
                    }
                    while self.peek().is_ascii_digit() {
                        self.advance();
                    }
                }
            }

            // Trailing suffixes stay in the lexeme; f/F turns it into a float
            while matches!(self.peek(), b'L' | b'l' | b'U' | b'u' | b'f' | b'F') {
                if self.peek() == b'f' || self.peek() == b'F' {
                    is_float = true;
                }
                self.advance();
            }

            let kind = if is_float {
                TokenKind::FloatLit
            } else {
                TokenKind::IntLit
            };
            return Ok(Token::new(kind, self.slice(start, self.pos), line, col));
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            let start = self.pos;
            while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
                self.advance();
            }
            let word = self.slice(start, self.pos);
            let kind = keyword(&word).unwrap_or(TokenKind::Ident);
            return Ok(Token::new(kind, word, line, col));
        }

        let c2 = self.peek2();
        let c3 = self.peek3();

        // Three-character operators before two-character before one
        let three = match (c, c2, c3) {
            (b'<', b'<', b'=') => Some((TokenKind::ShlEq, "<<=")),
            (b'>', b'>', b'=') => Some((TokenKind::ShrEq, ">>=")),
            (b'.', b'.', b'.') => Some((TokenKind::Ellipsis, "...")),
            _ => None,
        };
        if let Some((kind, text)) = three {
            self.advance();
            self.advance();
            self.advance();
            return Ok(Token::new(kind, text, line, col));
        }

        let two = match (c, c2) {
            (b':', b':') => Some((TokenKind::ColonColon, "::")),
            (b'=', b'>') => Some((TokenKind::FatArrow, "=>")),
            (b'=', b'=') => Some((TokenKind::EqEq, "==")),
            (b'!', b'=') => Some((TokenKind::Neq, "!=")),
            (b'<', b'<') => Some((TokenKind::Shl, "<<")),
            (b'<', b'=') => Some((TokenKind::LtEq, "<=")),
            (b'>', b'>') => Some((TokenKind::Shr, ">>")),
            (b'>', b'=') => Some((TokenKind::GtEq, ">=")),
            (b'&', b'&') => Some((TokenKind::AndAnd, "&&")),
            (b'&', b'=') => Some((TokenKind::AmpEq, "&=")),
            (b'|', b'|') => Some((TokenKind::OrOr, "||")),
            (b'|', b'>') => Some((TokenKind::PipeArrow, "|>")),
            (b'|', b'=') => Some((TokenKind::PipeEq, "|=")),
            (b'^', b'=') => Some((TokenKind::CaretEq, "^=")),
            (b'%', b'=') => Some((TokenKind::PercentEq, "%=")),
            (b'-', b'>') => Some((TokenKind::Arrow, "->")),
            (b'.', b'.') => Some((TokenKind::DotDot, "..")),
            (b'+', b'=') => Some((TokenKind::PlusEq, "+=")),
            (b'-', b'=') => Some((TokenKind::MinusEq, "-=")),
            (b'*', b'=') => Some((TokenKind::StarEq, "*=")),
            (b'/', b'=') => Some((TokenKind::SlashEq, "/=")),
            (b'+', b'+') => Some((TokenKind::PlusPlus, "++")),
            (b'-', b'-') => Some((TokenKind::MinusMinus, "--")),
            _ => None,
        };
        if let Some((kind, text)) = two {
            self.advance();
            self.advance();
            return Ok(Token::new(kind, text, line, col));
        }

        let one = match c {
            b'{' => Some((TokenKind::LBrace, "{")),
            b'}' => Some((TokenKind::RBrace, "}")),
            b'(' => Some((TokenKind::LParen, "(")),
            b')' => Some((TokenKind::RParen, ")")),
            b'[' => Some((TokenKind::LBracket, "[")),
            b']' => Some((TokenKind::RBracket, "]")),
            b',' => Some((TokenKind::Comma, ",")),
            b';' => Some((TokenKind::Semi, ";")),
            b'=' => Some((TokenKind::Eq, "=")),
            b'<' => Some((TokenKind::Lt, "<")),
            b'>' => Some((TokenKind::Gt, ">")),
            b'.' => Some((TokenKind::Dot, ".")),
            b'+' => Some((TokenKind::Plus, "+")),
            b'-' => Some((TokenKind::Minus, "-")),
            b'*' => Some((TokenKind::Star, "*")),
            b'/' => Some((TokenKind::Slash, "/")),
            b'%' => Some((TokenKind::Percent, "%")),
            b'!' => Some((TokenKind::Bang, "!")),
            b':' => Some((TokenKind::Colon, ":")),
            b'?' => Some((TokenKind::Question, "?")),
            b'&' => Some((TokenKind::Amp, "&")),
            b'|' => Some((TokenKind::Pipe, "|")),
            b'^' => Some((TokenKind::Caret, "^")),
            b'~' => Some((TokenKind::Tilde, "~")),
            _ => None,
        };
        if let Some((kind, text)) = one {
            self.advance();
            return Ok(Token::new(kind, text, line, col));
        }

        // Unrecognized byte: consume the whole UTF-8 character so multi-byte
        // input cannot be split mid-sequence
        let start = self.pos;
        self.advance();
        while self.peek() & 0b1100_0000 == 0b1000_0000 {
            self.advance();
        }
        Ok(Token::new(
            TokenKind::Unknown,
            self.slice(start, self.pos),
            line,
            col,
        ))
    }
}

/// Lex a whole source into a token stream ending in exactly one `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token()?;
        let done = tok.kind == TokenKind::Eof;
        tokens.push(tok);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("int x match foo"),
            vec![IntKw, Ident, MatchKw, Ident, Eof]
        );
    }

    #[test]
    fn test_comments_are_separators() {
        assert_eq!(
            kinds("a // line\n b /* block\nstill */ c"),
            vec![Ident, Ident, Ident, Eof]
        );
    }

    #[test]
    fn test_maximal_munch() {
        assert_eq!(kinds("<<="), vec![ShlEq, Eof]);
        assert_eq!(kinds("<<"), vec![Shl, Eof]);
        assert_eq!(kinds("<= <"), vec![LtEq, Lt, Eof]);
        assert_eq!(kinds("..."), vec![Ellipsis, Eof]);
        assert_eq!(kinds(".."), vec![DotDot, Eof]);
        assert_eq!(kinds("|> || |= |"), vec![PipeArrow, OrOr, PipeEq, Pipe, Eof]);
    }

    #[test]
    fn test_numeric_literals() {
        let toks = tokenize("42 0x1F 3.25 1e9 2.5e-3 10L 7u 1.5f 3F").unwrap();
        let got: Vec<(TokenKind, &str)> = toks
            .iter()
            .map(|t| (t.kind, t.lexeme.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (IntLit, "42"),
                (IntLit, "0x1F"),
                (FloatLit, "3.25"),
                (FloatLit, "1e9"),
                (FloatLit, "2.5e-3"),
                (IntLit, "10L"),
                (IntLit, "7u"),
                (FloatLit, "1.5f"),
                (FloatLit, "3F"),
                (Eof, ""),
            ]
        );
    }

    #[test]
    fn test_string_escapes_kept_verbatim() {
        let toks = tokenize(r#""hello\n\"quoted\"""#).unwrap();
        assert_eq!(toks[0].kind, StrLit);
        assert_eq!(toks[0].lexeme, r#"hello\n\"quoted\""#);
    }

    #[test]
    fn test_char_literals() {
        let toks = tokenize(r"'a' '\n'").unwrap();
        assert_eq!(toks[0].lexeme, "a");
        assert_eq!(toks[1].lexeme, r"\n");
    }

    #[test]
    fn test_unterminated_string_points_at_quote() {
        let err = tokenize("int x = \"oops").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.col, 9);
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn test_unknown_byte() {
        let toks = tokenize("a @ b").unwrap();
        assert_eq!(toks[1].kind, Unknown);
        assert_eq!(toks[1].lexeme, "@");
    }

    #[test]
    fn test_positions_monotone_single_eof() {
        let toks = tokenize("int a = 1;\nint b = 2;\n").unwrap();
        let eofs = toks.iter().filter(|t| t.kind == Eof).count();
        assert_eq!(eofs, 1);
        assert_eq!(toks.last().unwrap().kind, Eof);
        let mut prev = (0usize, 0usize);
        for t in &toks {
            assert!((t.line, t.col) >= prev, "positions went backwards");
            prev = (t.line, t.col);
        }
    }
}
