//! Post-edit syntax checks, selected by file extension.
//!
//! These are lexical heuristics, not parsers. A language-specific parser
//! can be registered through [`SyntaxCheckers::register`] without changing
//! how edits are reported.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::ToolError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.column, self.message)
    }
}

pub trait SyntaxChecker: Send + Sync {
    fn language(&self) -> &str;
    fn check(&self, content: &str) -> Result<(), SyntaxIssue>;
}

#[derive(Clone, Default)]
pub struct SyntaxCheckers {
    by_extension: HashMap<String, Arc<dyn SyntaxChecker>>,
}

impl SyntaxCheckers {
    /// No checks at all; every file is accepted.
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut checkers = Self::default();
        checkers.register(&["json"], Arc::new(JsonChecker));
        checkers.register(
            &["js", "jsx", "mjs", "cjs", "ts", "tsx"],
            Arc::new(DelimiterChecker::new("javascript", QuoteStyle::Script)),
        );
        checkers.register(
            &["c", "h", "cc", "cpp", "hpp", "java", "cs", "kt", "swift"],
            Arc::new(DelimiterChecker::new("c-family", QuoteStyle::CharLiteral)),
        );
        checkers.register(
            &["go"],
            Arc::new(DelimiterChecker::new("go", QuoteStyle::Go)),
        );
        checkers.register(
            &["rs"],
            Arc::new(DelimiterChecker::new("rust", QuoteStyle::Rust)),
        );
        checkers
    }

    pub fn register(&mut self, extensions: &[&str], checker: Arc<dyn SyntaxChecker>) {
        for extension in extensions {
            self.by_extension
                .insert(extension.to_ascii_lowercase(), checker.clone());
        }
    }

    pub fn checker_for(&self, path: &str) -> Option<&Arc<dyn SyntaxChecker>> {
        let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(&extension)
    }

    /// Checks `content` as the language implied by `path`. Files with an
    /// unknown extension always pass.
    pub fn check(&self, path: &str, content: &str) -> Result<(), ToolError> {
        let Some(checker) = self.checker_for(path) else {
            return Ok(());
        };
        if content.trim().is_empty() {
            return Ok(());
        }
        checker.check(content).map_err(|issue| {
            ToolError::Validation(format!(
                "edit to '{}' would leave invalid {} ({}); the file was not changed",
                path,
                checker.language(),
                issue
            ))
        })
    }
}

pub struct JsonChecker;

impl SyntaxChecker for JsonChecker {
    fn language(&self) -> &str {
        "json"
    }

    fn check(&self, content: &str) -> Result<(), SyntaxIssue> {
        serde_json::from_str::<serde_json::Value>(content)
            .map(|_| ())
            .map_err(|error| SyntaxIssue {
                line: error.line(),
                column: error.column(),
                message: error.to_string(),
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `'...'` and `` `...` `` are strings; `/.../` in expression
    /// position is a regex literal.
    Script,
    /// `'x'` is a character literal.
    CharLiteral,
    /// `'x'` is a rune, `` `...` `` is a raw string.
    Go,
    /// `'x'` is a character literal unless it reads as a lifetime;
    /// `r"…"` and `r#"…"#` are raw strings.
    Rust,
}

/// Checks that `()`, `[]` and `{}` are balanced outside of strings and
/// comments.
pub struct DelimiterChecker {
    language: String,
    quotes: QuoteStyle,
}

impl DelimiterChecker {
    pub fn new(language: impl Into<String>, quotes: QuoteStyle) -> Self {
        Self {
            language: language.into(),
            quotes,
        }
    }
}

const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await",
];

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

struct Cursor {
    chars: Vec<char>,
    idx: usize,
    line: usize,
    column: usize,
}

impl Cursor {
    fn new(content: &str) -> Self {
        Self {
            chars: content.chars().collect(),
            idx: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek(0)?;
        self.idx += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Consumes a quoted literal whose opening quote was already consumed.
    fn skip_quoted(&mut self, quote: char, escapes: bool) -> bool {
        while let Some(ch) = self.bump() {
            if escapes && ch == '\\' {
                self.bump();
            } else if ch == quote {
                return true;
            }
        }
        false
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.peek(0) {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) -> bool {
        while let Some(ch) = self.bump() {
            if ch == '*' && self.peek(0) == Some('/') {
                self.bump();
                return true;
            }
        }
        false
    }

    /// Whether the character just consumed continues an identifier or number.
    fn follows_word(&self) -> bool {
        self.idx >= 2 && is_word_char(self.chars[self.idx - 2])
    }

    /// Consumes a Rust raw string (`r"…"`, `r#"…"#`, `br"…"`) whose first
    /// prefix character was just consumed. `None` when no raw string starts
    /// here, otherwise whether it was terminated.
    fn skip_rust_raw_string(&mut self, prefix: char) -> Option<bool> {
        let mut ahead = 0;
        if prefix == 'b' {
            if self.peek(0) != Some('r') {
                return None;
            }
            ahead = 1;
        }
        let mut hashes = 0;
        while self.peek(ahead + hashes) == Some('#') {
            hashes += 1;
        }
        if self.peek(ahead + hashes) != Some('"') {
            return None;
        }
        for _ in 0..=ahead + hashes {
            self.bump();
        }
        while let Some(ch) = self.bump() {
            if ch == '"' && (0..hashes).all(|offset| self.peek(offset) == Some('#')) {
                for _ in 0..hashes {
                    self.bump();
                }
                return Some(true);
            }
        }
        Some(false)
    }

    /// Whether a `/` just consumed sits where a script expression may start,
    /// making it the opening of a regex literal rather than a division.
    fn regex_allowed(&self) -> bool {
        let mut pos = self.idx.saturating_sub(1);
        while pos > 0 && self.chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        if pos == 0 {
            return true;
        }
        let before = self.chars[pos - 1];
        if is_word_char(before) {
            let end = pos;
            while pos > 0 && is_word_char(self.chars[pos - 1]) {
                pos -= 1;
            }
            let word: String = self.chars[pos..end].iter().collect();
            return REGEX_PRECEDING_KEYWORDS.contains(&word.as_str());
        }
        !matches!(before, ')' | ']' | '}' | '<' | '"' | '\'' | '`')
    }

    /// Consumes a regex literal body after its opening `/`. Brackets inside
    /// character classes and escapes are not delimiters.
    fn skip_regex_literal(&mut self) -> bool {
        let mut in_class = false;
        while let Some(ch) = self.peek(0) {
            if ch == '\n' {
                return false;
            }
            self.bump();
            match ch {
                '\\' => {
                    if self.peek(0).is_some_and(|next| next != '\n') {
                        self.bump();
                    }
                }
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => return true,
                _ => {}
            }
        }
        false
    }

    /// Whether the `'` just consumed starts a Rust char literal rather than a
    /// lifetime or label.
    fn rust_char_literal_ahead(&self) -> bool {
        match (self.peek(0), self.peek(1)) {
            (Some('\\'), _) => true,
            (Some(_), Some('\'')) => true,
            _ => false,
        }
    }
}

impl SyntaxChecker for DelimiterChecker {
    fn language(&self) -> &str {
        &self.language
    }

    fn check(&self, content: &str) -> Result<(), SyntaxIssue> {
        let mut cursor = Cursor::new(content);
        let mut stack: Vec<(char, usize, usize)> = Vec::new();

        loop {
            let (line, column) = (cursor.line, cursor.column);
            let Some(ch) = cursor.bump() else {
                break;
            };
            let unterminated = |what: &str| SyntaxIssue {
                line,
                column,
                message: format!("unterminated {what}"),
            };

            match ch {
                '/' if cursor.peek(0) == Some('/') => cursor.skip_line(),
                '/' if cursor.peek(0) == Some('*') => {
                    cursor.bump();
                    if !cursor.skip_block_comment() {
                        return Err(unterminated("block comment"));
                    }
                }
                '/' if self.quotes == QuoteStyle::Script && cursor.regex_allowed() => {
                    if !cursor.skip_regex_literal() {
                        return Err(unterminated("regular expression literal"));
                    }
                }
                'r' | 'b' if self.quotes == QuoteStyle::Rust && !cursor.follows_word() => {
                    if cursor.skip_rust_raw_string(ch) == Some(false) {
                        return Err(unterminated("raw string literal"));
                    }
                }
                '"' => {
                    if !cursor.skip_quoted('"', true) {
                        return Err(unterminated("string literal"));
                    }
                }
                '`' if matches!(self.quotes, QuoteStyle::Script | QuoteStyle::Go) => {
                    let escapes = self.quotes == QuoteStyle::Script;
                    if !cursor.skip_quoted('`', escapes) {
                        return Err(unterminated("template or raw string"));
                    }
                }
                '\'' => {
                    let is_literal = match self.quotes {
                        QuoteStyle::Rust => cursor.rust_char_literal_ahead(),
                        _ => true,
                    };
                    if is_literal && !cursor.skip_quoted('\'', true) {
                        return Err(unterminated("character or string literal"));
                    }
                }
                '(' | '[' | '{' => stack.push((ch, line, column)),
                ')' | ']' | '}' => {
                    let expected = match ch {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _, _)) if open == expected => {}
                        Some((open, open_line, open_column)) => {
                            return Err(SyntaxIssue {
                                line,
                                column,
                                message: format!(
                                    "'{ch}' does not close '{open}' opened at line {open_line}, column {open_column}"
                                ),
                            });
                        }
                        None => {
                            return Err(SyntaxIssue {
                                line,
                                column,
                                message: format!("unexpected '{ch}' with nothing open"),
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some((open, line, column)) = stack.pop() {
            return Err(SyntaxIssue {
                line,
                column,
                message: format!("'{open}' is never closed"),
            });
        }
        Ok(())
    }
}
