//! Console command (ConCommand) implementation.
//!
//! ConCommands are named commands that execute functions when invoked. Each
//! command belongs to a [`CmdSource`] class that limits who may trigger it.

use std::sync::Arc;

use bevy::prelude::*;

use super::TokenizedLine;

/// Origin of a command invocation, and the class a command is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum CmdSource {
    /// Sent by a remote client.
    Client,
    /// Typed locally, or read from a script.
    #[default]
    Console,
    /// Issued by the server.
    Server,
}

impl CmdSource {
    /// Get the display name for this source.
    pub fn name(&self) -> &'static str {
        match self {
            CmdSource::Client => "client",
            CmdSource::Console => "console",
            CmdSource::Server => "server",
        }
    }
}

impl std::fmt::Display for CmdSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments passed to a command handler.
///
/// Indexing excludes the command name; use [`CommandArgs::name`] for that.
#[derive(Debug, Clone)]
pub struct CommandArgs<'a> {
    name: &'a str,
    args: Vec<&'a str>,
    raw: &'a str,
    source: CmdSource,
}

impl<'a> CommandArgs<'a> {
    /// Create new command args from a name, parsed arguments and the raw argument text.
    pub fn new(name: &'a str, args: Vec<&'a str>, raw: &'a str, source: CmdSource) -> Self {
        Self {
            name,
            args,
            raw,
            source,
        }
    }

    /// Borrow the arguments of a tokenized line.
    pub fn from_line(line: &'a TokenizedLine, source: CmdSource) -> Self {
        let mut all = line.args().iter().map(String::as_str);
        let name = all.next().unwrap_or("");
        Self::new(name, all.collect(), line.args_string(), source)
    }

    /// The command name as typed.
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Where the invocation came from.
    #[inline]
    pub fn source(&self) -> CmdSource {
        self.source
    }

    /// Raw text after the command name.
    #[inline]
    pub fn raw(&self) -> &str {
        self.raw
    }

    /// Get the number of arguments.
    #[inline]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Check if there are no arguments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Get an argument by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.args.get(index).copied()
    }

    /// Get an argument or a default value.
    #[inline]
    pub fn get_or(&self, index: usize, default: &'a str) -> &str {
        self.args.get(index).copied().unwrap_or(default)
    }

    /// Try to parse an argument as a specific type.
    pub fn parse<T: std::str::FromStr>(&self, index: usize) -> Option<T> {
        self.get(index).and_then(|s| s.parse().ok())
    }

    /// Parse an argument with a default value.
    pub fn parse_or<T: std::str::FromStr>(&self, index: usize, default: T) -> T {
        self.parse(index).unwrap_or(default)
    }

    /// Get all arguments as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[&str] {
        &self.args
    }

    /// Iterate over arguments.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.args.iter().copied()
    }

    /// Join all arguments with a separator.
    pub fn join(&self, separator: &str) -> String {
        self.args.join(separator)
    }

    /// Join arguments starting from an index.
    pub fn join_from(&self, start: usize, separator: &str) -> String {
        self.args.get(start..).unwrap_or(&[]).join(separator)
    }

    /// Find an argument equal to `param`, ignoring ASCII case.
    ///
    /// An empty `param` is a caller bug; it is reported and matches nothing.
    pub fn check_param(&self, param: &str) -> Option<usize> {
        if param.is_empty() {
            warn!("check_param: empty parameter name");
            return None;
        }
        self.args.iter().position(|a| a.eq_ignore_ascii_case(param))
    }
}

impl<'a> std::ops::Index<usize> for CommandArgs<'a> {
    type Output = str;

    fn index(&self, index: usize) -> &Self::Output {
        self.args[index]
    }
}

/// Type alias for command handler functions.
///
/// Handlers receive:
/// - `args`: The parsed command arguments
/// - `world`: Mutable access to the Bevy world, which owns every console resource
pub type CommandHandler = Arc<dyn Fn(&CommandArgs, &mut World) + Send + Sync>;

/// Stable identity of a registered command, used to remove it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CmdId(pub(crate) u64);

/// A console command with a handler function.
///
/// # Examples
///
/// ```ignore
/// let kick = ConCommand::new("kick", |args, world| {
///     info!("kicking {}", args.get_or(0, "nobody"));
/// }).source(CmdSource::Server);
/// ```
pub struct ConCommand {
    name: Box<str>,
    source: CmdSource,
    handler: CommandHandler,
}

impl ConCommand {
    /// Create a new console-class command with the given name and handler.
    pub fn new<F>(name: impl Into<Box<str>>, handler: F) -> Self
    where
        F: Fn(&CommandArgs, &mut World) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source: CmdSource::Console,
            handler: Arc::new(handler),
        }
    }

    /// Set the source class this command answers to.
    pub fn source(mut self, source: CmdSource) -> Self {
        self.source = source;
        self
    }

    /// Get the command name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the source class.
    #[inline]
    pub fn get_source(&self) -> CmdSource {
        self.source
    }

    pub(crate) fn into_parts(self) -> (Box<str>, CmdSource, CommandHandler) {
        (self.name, self.source, self.handler)
    }
}

impl std::fmt::Debug for ConCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConCommand")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
