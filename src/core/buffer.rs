//! Pending command text.
//!
//! Scripts, user input and alias expansions all land here before execution.
//! Text appended with [`CommandBuffer::add_text`] runs after everything already
//! queued; text inserted with [`CommandBuffer::insert_text`] runs first.

use bevy::prelude::*;

/// Editable queue of command text waiting to be executed.
///
/// Lines are delimited by `\n` or by a `;` that is outside quotes and not
/// after a `//` comment marker on the same line.
#[derive(Resource, Debug, Default)]
pub struct CommandBuffer {
    text: String,
    waiting: bool,
}

impl CommandBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue text to run after everything already buffered.
    pub fn add_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Queue text (plus a newline) to run before everything already buffered.
    pub fn insert_text(&mut self, text: &str) {
        let mut front = String::with_capacity(text.len() + 1 + self.text.len());
        front.push_str(text);
        front.push('\n');
        front.push_str(&self.text);
        self.text = front;
    }

    /// Stop execution until [`CommandBuffer::waited`] is called.
    pub fn wait(&mut self) {
        self.waiting = true;
    }

    /// Clear the wait flag. Called once per tick by the driver.
    pub fn waited(&mut self) {
        self.waiting = false;
    }

    /// Check if a `wait` is pending.
    #[inline]
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Check if no text is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The raw queued text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Drop all queued text.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Remove and return the next line, or `None` if the buffer is empty.
    ///
    /// The delimiter itself is consumed and not part of the returned line.
    pub fn next_line(&mut self) -> Option<String> {
        if self.text.is_empty() {
            return None;
        }

        let bytes = self.text.as_bytes();
        let mut quotes = 0usize;
        let mut comment = false;
        let mut end = None;

        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'"' => quotes += 1,
                b'/' if bytes.get(i + 1) == Some(&b'/') => comment = true,
                b';' if quotes % 2 == 0 && !comment => {
                    end = Some(i);
                    break;
                }
                b'\n' => {
                    end = Some(i);
                    break;
                }
                _ => {}
            }
        }

        let line = match end {
            Some(i) => {
                let line = self.text[..i].to_string();
                self.text.drain(..=i);
                line
            }
            None => std::mem::take(&mut self.text),
        };

        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(buffer: &mut CommandBuffer) -> Vec<String> {
        std::iter::from_fn(|| buffer.next_line()).collect()
    }

    #[test]
    fn test_semicolon_splits_lines() {
        let mut buffer = CommandBuffer::new();
        buffer.add_text("echo hello; echo world");
        assert_eq!(drain(&mut buffer), vec!["echo hello", " echo world"]);
    }

    #[test]
    fn test_semicolon_in_quotes_is_inert() {
        let mut buffer = CommandBuffer::new();
        buffer.add_text("alias foo \"echo a; echo b\"\nfoo\n");
        assert_eq!(
            drain(&mut buffer),
            vec!["alias foo \"echo a; echo b\"", "foo"]
        );
    }

    #[test]
    fn test_semicolon_after_comment_is_inert() {
        let mut buffer = CommandBuffer::new();
        buffer.add_text("echo a // note; still comment\necho b");
        assert_eq!(
            drain(&mut buffer),
            vec!["echo a // note; still comment", "echo b"]
        );
    }

    #[test]
    fn test_insert_runs_first() {
        let mut buffer = CommandBuffer::new();
        buffer.add_text("second\n");
        buffer.insert_text("first");
        assert_eq!(buffer.as_str(), "first\nsecond\n");
        assert_eq!(drain(&mut buffer), vec!["first", "second"]);
    }

    #[test]
    fn test_add_runs_last() {
        let mut buffer = CommandBuffer::new();
        buffer.add_text("one\n");
        buffer.add_text("two\n");
        assert_eq!(buffer.next_line().as_deref(), Some("one"));
        buffer.add_text("three\n");
        assert_eq!(drain(&mut buffer), vec!["two", "three"]);
    }

    #[test]
    fn test_empty_lines_are_returned() {
        let mut buffer = CommandBuffer::new();
        buffer.add_text("\n\n;");
        assert_eq!(drain(&mut buffer), vec!["", "", ""]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_wait_flag() {
        let mut buffer = CommandBuffer::new();
        assert!(!buffer.is_waiting());
        buffer.wait();
        assert!(buffer.is_waiting());
        buffer.waited();
        assert!(!buffer.is_waiting());
    }
}
