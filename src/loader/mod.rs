//! Program image loader: turns text into the word array a context starts from.
//!
//! The format is a flat list of integer words, decimal or `0x` hexadecimal,
//! separated by whitespace or commas. `#` starts a comment that runs to the end
//! of the line.

pub mod source_map;

use logos::Logos;

use crate::vm::{MAX_PROGRAM_CELLS, Word};

pub use source_map::SourceMap;

/// Byte range in the loaded source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl From<std::ops::Range<usize>> for Span {
    fn from(r: std::ops::Range<usize>) -> Self {
        Span { start: r.start, end: r.end }
    }
}

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n,]+")]
#[logos(skip(r"#[^\n]*", allow_greedy = true))]
pub enum Token {
    #[regex(r"-?0[xX][0-9a-fA-F]+", parse_hex)]
    Hex(Word),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<Word>().ok())]
    Decimal(Word),
}

impl Token {
    pub fn value(&self) -> Word {
        match self {
            Token::Hex(v) | Token::Decimal(v) => *v,
        }
    }
}

fn parse_hex(lex: &mut logos::Lexer<Token>) -> Option<Word> {
    let slice = lex.slice();
    let (negative, digits) = match slice.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, slice),
    };
    let magnitude = u64::from_str_radix(&digits[2..], 16).ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        Word::try_from(magnitude).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    UnexpectedCharacter,
    OutOfRange,
    TooLarge,
}

impl LoadErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            LoadErrorKind::UnexpectedCharacter => "AVM-L001",
            LoadErrorKind::OutOfRange => "AVM-L002",
            LoadErrorKind::TooLarge => "AVM-L003",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Load error at position {position}: '{snippet}'. {suggestion}")]
pub struct LoadError {
    pub kind: LoadErrorKind,
    pub position: usize,
    pub span: Span,
    pub snippet: String,
    pub suggestion: String,
}

/// Load a program image. Stops at the first malformed token.
pub fn load(source: &str) -> Result<Vec<Word>, LoadError> {
    let mut lexer = Token::lexer(source);
    let mut words = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => {
                if words.len() + 1 >= MAX_PROGRAM_CELLS {
                    return Err(LoadError {
                        kind: LoadErrorKind::TooLarge,
                        position: span.start,
                        span: span.clone().into(),
                        snippet: source[span].to_string(),
                        suggestion: format!(
                            "Program images must hold fewer than {MAX_PROGRAM_CELLS} words."
                        ),
                    });
                }
                words.push(token.value());
            }
            Err(()) => {
                let snippet = &source[span.clone()];
                let kind = classify(snippet);
                return Err(LoadError {
                    kind,
                    position: span.start,
                    span: span.clone().into(),
                    snippet: snippet.to_string(),
                    suggestion: suggest_fix(kind, snippet),
                });
            }
        }
    }

    Ok(words)
}

/// A literal that matched the number pattern but failed to convert is out of range.
fn classify(snippet: &str) -> LoadErrorKind {
    let digits = snippet.strip_prefix('-').unwrap_or(snippet);
    let is_number = !digits.is_empty()
        && (digits.bytes().all(|b| b.is_ascii_digit())
            || digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))
                .is_some_and(|h| !h.is_empty() && h.bytes().all(|b| b.is_ascii_hexdigit())));
    if is_number { LoadErrorKind::OutOfRange } else { LoadErrorKind::UnexpectedCharacter }
}

fn suggest_fix(kind: LoadErrorKind, snippet: &str) -> String {
    match kind {
        LoadErrorKind::OutOfRange => format!(
            "Words are signed 64-bit: use a value between {} and {}.",
            Word::MIN,
            Word::MAX
        ),
        LoadErrorKind::UnexpectedCharacter if snippet == "-" => {
            "A minus sign must be directly followed by digits.".to_string()
        }
        _ => format!(
            "Unexpected character(s): '{snippet}'. Only integers, commas, whitespace and # comments are allowed."
        ),
    }
}
