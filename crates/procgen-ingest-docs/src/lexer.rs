//! Code/comment lexer for package source.
//!
//! Splits source into alternating code and comment spans. Line comments run
//! to the end of the line (the newline is consumed), block comments to the
//! next `*/`; whichever marker comes first wins. Markers inside single-quoted
//! literals are code. A literal never spans a newline, so one unbalanced quote
//! hides markers only up to the end of its line. Block comments do not nest.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Code {
        text: &'a str,
        line: usize,
    },
    Comment {
        text: &'a str,
        line: usize,
        block: bool,
    },
}

impl Token<'_> {
    pub fn line(&self) -> usize {
        match self {
            Token::Code { line, .. } | Token::Comment { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated block comment starting on line {line}")]
    UnterminatedComment { line: usize },
}

/// Iterator over the spans of one source text. Stops after the first error.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    failed: bool,
}

pub fn lex(src: &str) -> Lexer<'_> {
    Lexer {
        src,
        pos: 0,
        line: 1,
        failed: false,
    }
}

/// Collect every span, or the lexical error that ended the scan.
pub fn tokenize(src: &str) -> Result<Vec<Token<'_>>, LexError> {
    lex(src).collect()
}

#[derive(Clone, Copy)]
enum Marker {
    Line,
    Block,
}

impl<'a> Lexer<'a> {
    /// First comment marker at or after `from` outside a quoted literal.
    fn next_marker(&self, from: usize) -> Option<(usize, Marker)> {
        let bytes = self.src.as_bytes();
        let mut quoted = false;
        let mut i = from;
        while i < bytes.len() {
            match bytes[i] {
                b'\'' => quoted = !quoted,
                b'\n' => quoted = false,
                b'-' if !quoted && bytes.get(i + 1) == Some(&b'-') => return Some((i, Marker::Line)),
                b'/' if !quoted && bytes.get(i + 1) == Some(&b'*') => {
                    return Some((i, Marker::Block))
                }
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn advance(&mut self, to: usize) {
        self.line += self.src[self.pos..to].matches('\n').count();
        self.pos = to;
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.src.len() {
            return None;
        }
        let start = self.pos;
        let line = self.line;
        match self.next_marker(start) {
            None => {
                self.advance(self.src.len());
                Some(Ok(Token::Code {
                    text: &self.src[start..],
                    line,
                }))
            }
            Some((at, _)) if at > start => {
                self.advance(at);
                Some(Ok(Token::Code {
                    text: &self.src[start..at],
                    line,
                }))
            }
            Some((_, Marker::Line)) => {
                let body = start + 2;
                let (text_end, next) = match self.src[body..].find('\n') {
                    Some(nl) => (body + nl, body + nl + 1),
                    None => (self.src.len(), self.src.len()),
                };
                self.advance(next);
                Some(Ok(Token::Comment {
                    text: &self.src[body..text_end],
                    line,
                    block: false,
                }))
            }
            Some((_, Marker::Block)) => {
                let body = start + 2;
                match self.src[body..].find("*/") {
                    Some(end) => {
                        self.advance(body + end + 2);
                        Some(Ok(Token::Comment {
                            text: &self.src[body..body + end],
                            line,
                            block: true,
                        }))
                    }
                    None => {
                        self.failed = true;
                        Some(Err(LexError::UnterminatedComment { line }))
                    }
                }
            }
        }
    }
}
