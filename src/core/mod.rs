//! Core interpreter types.
//!
//! This module provides the fundamental building blocks:
//! - [`Tokenizer`] - Quote and comment aware lexer
//! - [`CommandBuffer`] - Pending text split into executable lines
//! - [`CmdRegistry`] - Source-scoped command table
//! - [`AliasTable`] - Name to macro text bindings
//! - [`CvarRegistry`] - Flagged string/number variables
//! - [`Console`] - Unified system parameter for convenient access
//! - Events for communication between layers

mod alias;
mod buffer;
mod cmdline;
mod concommand;
mod console;
mod convar;
mod cvars;
mod dispatch;
mod events;
mod registry;
mod tokenizer;

pub use alias::{AliasTable, MAX_ALIAS_NAME, MAX_ALIAS_VALUE};
pub use buffer::CommandBuffer;
pub use cmdline::{stuffed_commands, CmdLine, MAX_CMDLINE_ARGS, MAX_CMDLINE_LEN};
pub use concommand::{CmdId, CmdSource, CommandArgs, CommandHandler, ConCommand};
pub use console::{Console, ConsoleRef};
pub use convar::{format_value, parse_value, ConVar, ConVarFlags, CvarCallback};
pub use cvars::CvarRegistry;
pub use dispatch::{execute, execute_string};
pub use events::{ConVarChangedEvent, ConsoleEventsPlugin, ConsoleInputEvent, GameDirChangedEvent};
pub use registry::{CmdDescriptor, CmdRegistry};
pub use tokenizer::{tokenize_line, OverflowPolicy, TokenizedLine, Tokenizer, MAX_ARGS, MAX_TOKEN_LEN};
