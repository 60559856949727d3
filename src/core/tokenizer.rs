//! Quake-style tokenizer for console lines and script text.
//!
//! Tokens are separated by whitespace. `//` starts a line comment, `/* */`
//! a block comment, and `"..."` a literal token with no escape processing.
//! The characters `{ } ( ) ' :` stand alone as single-character tokens.
//! No external dependencies.

/// Maximum number of characters in a single token.
pub const MAX_TOKEN_LEN: usize = 4096;

/// Maximum number of arguments kept for one command line.
pub const MAX_ARGS: usize = 80;

/// What to do with a token longer than [`MAX_TOKEN_LEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Abort the token and report no result.
    #[default]
    Fail,
    /// Keep the first [`MAX_TOKEN_LEN`] characters and drop the rest.
    Truncate,
}

fn is_blank(c: char) -> bool {
    c <= ' ' && c != '\n'
}

fn is_single_char_token(c: char) -> bool {
    matches!(c, '{' | '}' | '(' | ')' | '\'' | ':')
}

fn ends_word(c: char) -> bool {
    c <= ' ' || matches!(c, '{' | '}' | '(' | ')' | '\'')
}

/// Cursor over a text buffer that yields one token at a time.
///
/// A newline ends the current line: [`Tokenizer::next_token`] consumes it and
/// returns `None`, so a caller looping on `next_token` stops at line end.
///
/// # Examples
///
/// ```
/// use bevy_quake_console::core::Tokenizer;
///
/// let mut tokens = Tokenizer::new(r#"bind "F1" {toggle} // trailing"#);
/// assert_eq!(tokens.next_token().as_deref(), Some("bind"));
/// assert_eq!(tokens.next_token().as_deref(), Some("F1"));
/// assert_eq!(tokens.next_token().as_deref(), Some("{"));
/// assert_eq!(tokens.next_token().as_deref(), Some("toggle"));
/// assert_eq!(tokens.next_token().as_deref(), Some("}"));
/// assert_eq!(tokens.next_token(), None);
/// ```
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    overflow: OverflowPolicy,
}

impl<'a> Tokenizer<'a> {
    /// Create a tokenizer positioned at the start of `input`.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            overflow: OverflowPolicy::Fail,
        }
    }

    /// Set the overflow policy for long tokens.
    pub fn overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    /// Current byte offset into the input.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The unconsumed part of the input.
    #[inline]
    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Skip blanks up to (not including) the next newline or visible character.
    pub fn skip_blanks(&mut self) {
        let rest = self.remaining();
        let skipped = rest.len() - rest.trim_start_matches(is_blank).len();
        self.pos += skipped;
    }

    /// Skip blanks and comments in any order.
    ///
    /// Returns `false` when the line (or the input) has ended. A newline that
    /// ends the line is consumed.
    fn skip_to_token(&mut self) -> bool {
        loop {
            self.skip_blanks();
            let rest = self.remaining();

            if rest.is_empty() {
                return false;
            }
            if rest.starts_with('\n') {
                self.pos += 1;
                return false;
            }
            if rest.starts_with("//") {
                self.pos += rest.find('\n').unwrap_or(rest.len());
                continue;
            }
            if rest.starts_with("/*") {
                // Unterminated block comments run to the end of the buffer.
                self.pos += rest[2..].find("*/").map(|i| i + 4).unwrap_or(rest.len());
                continue;
            }
            return true;
        }
    }

    fn limit(&self, text: &str) -> Option<String> {
        match text.char_indices().nth(MAX_TOKEN_LEN) {
            None => Some(text.to_string()),
            Some(_) if self.overflow == OverflowPolicy::Fail => None,
            Some((cut, _)) => Some(text[..cut].to_string()),
        }
    }

    /// Produce the next token on the current line.
    ///
    /// Returns `None` at end of line, at end of input, for an unterminated
    /// quote, and for an oversized token under [`OverflowPolicy::Fail`].
    pub fn next_token(&mut self) -> Option<String> {
        if !self.skip_to_token() {
            return None;
        }

        let c = self.peek()?;
        let start = self.pos;

        if c == '"' {
            let body = &self.input[start + 1..];
            return match body.find('"') {
                Some(end) => {
                    self.pos = start + 1 + end + 1;
                    self.limit(&body[..end])
                }
                None => {
                    self.pos = self.input.len();
                    None
                }
            };
        }

        if is_single_char_token(c) {
            self.pos += c.len_utf8();
            return Some(c.to_string());
        }

        let rest = self.remaining();
        let len = rest.find(ends_word).unwrap_or(rest.len());
        self.pos += len;
        self.limit(&rest[..len])
    }
}

/// A command line split into arguments.
///
/// Argument 0 is the command name. [`TokenizedLine::args_string`] keeps the raw
/// text after the command name, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedLine {
    args: Vec<String>,
    args_string: String,
}

impl TokenizedLine {
    /// All arguments, including the command name.
    #[inline]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Raw text following the command name.
    #[inline]
    pub fn args_string(&self) -> &str {
        &self.args_string
    }

    /// The command name, if any token was found.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Check if the line held no tokens.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Split one command line into arguments.
///
/// Stops at the first newline. At most [`MAX_ARGS`] arguments are kept.
///
/// # Examples
///
/// ```
/// use bevy_quake_console::core::tokenize_line;
///
/// let line = tokenize_line(r#"alias foo "echo a; echo b""#);
/// assert_eq!(line.args(), ["alias", "foo", "echo a; echo b"]);
/// assert_eq!(line.args_string(), r#"foo "echo a; echo b""#);
/// ```
pub fn tokenize_line(line: &str) -> TokenizedLine {
    let mut tokens = Tokenizer::new(line);
    let mut out = TokenizedLine::default();

    loop {
        tokens.skip_blanks();
        let rest = tokens.remaining();
        if rest.is_empty() || rest.starts_with('\n') {
            break;
        }

        if out.args.len() == 1 {
            out.args_string = rest.to_string();
        }

        let Some(token) = tokens.next_token() else {
            break;
        };

        if out.args.len() < MAX_ARGS {
            out.args.push(token);
        }
    }

    out
}
