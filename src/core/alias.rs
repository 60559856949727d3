//! Alias table: names bound to command text.
//!
//! When an alias runs, its text is inserted at the front of the
//! [`CommandBuffer`](super::CommandBuffer), so it executes before anything
//! already queued.

use std::collections::BTreeMap;

use bevy::prelude::*;

/// Aliases must be shorter than this many characters.
pub const MAX_ALIAS_NAME: usize = 32;

/// Alias text must be shorter than this many characters.
pub const MAX_ALIAS_VALUE: usize = 1024;

/// Sorted table of aliases.
#[derive(Resource, Debug, Default)]
pub struct AliasTable {
    aliases: BTreeMap<String, String>,
}

impl AliasTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to the given words, joined by single spaces.
    ///
    /// The stored text always ends in a newline. Names that are too long are
    /// rejected; text that is too long is replaced by a bare newline.
    pub fn define<'a>(&mut self, name: &str, words: impl IntoIterator<Item = &'a str>) -> bool {
        if name.chars().count() >= MAX_ALIAS_NAME {
            warn!("Alias name is too long");
            return false;
        }

        let mut value = words.into_iter().collect::<Vec<_>>().join(" ");
        value.push('\n');

        if value.chars().count() >= MAX_ALIAS_VALUE {
            warn!("alias value too long!");
            value = "\n".to_string();
        }

        self.aliases.insert(name.to_string(), value);
        true
    }

    /// Get the text bound to an alias.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// Check if an alias exists.
    pub fn contains(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Remove one alias. Returns `false` if it did not exist.
    pub fn remove(&mut self, name: &str) -> bool {
        self.aliases.remove(name).is_some()
    }

    /// Remove all aliases.
    pub fn clear(&mut self) {
        self.aliases.clear();
    }

    /// Iterate over `(name, text)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Get the number of aliases.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
