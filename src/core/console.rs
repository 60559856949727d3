//! Unified console API for convenient access.
//!
//! The [`Console`] system parameter combines [`CmdRegistry`], [`CvarRegistry`]
//! and [`CommandBuffer`] into a single ergonomic API, so systems outside the
//! interpreter can register commands, tune variables and queue text.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

use super::{CmdId, CmdRegistry, CommandBuffer, ConCommand, ConVar, CvarCallback, CvarRegistry};

/// Unified console system parameter for convenient access.
///
/// # Examples
///
/// ```ignore
/// fn setup_console(mut console: Console) {
///     console.register_var(ConVar::new("sv_gravity", "800").flags(ConVarFlags::NOTIFY));
///
///     console.register_cmd(ConCommand::new("noclip", |_, _world| {
///         info!("noclip ON");
///     }));
///
///     console.set("sv_gravity", "1000");
///     console.add_text("exec autoexec.cfg\n");
/// }
/// ```
#[derive(SystemParam)]
pub struct Console<'w> {
    cmds: ResMut<'w, CmdRegistry>,
    cvars: ResMut<'w, CvarRegistry>,
    buffer: ResMut<'w, CommandBuffer>,
}

impl Console<'_> {
    /// Register a console variable.
    ///
    /// Returns `false` if the name is already a variable or a command.
    pub fn register_var(&mut self, var: ConVar) -> bool {
        self.cvars.register(&self.cmds, var)
    }

    /// Register a console command.
    ///
    /// Returns `None` if the name is a variable or the (name, source) pair is taken.
    pub fn register_cmd(&mut self, cmd: ConCommand) -> Option<CmdId> {
        self.cmds.add(&self.cvars, cmd)
    }

    /// Remove a command registered earlier.
    ///
    /// # Panics
    ///
    /// Panics if no command with this id exists.
    pub fn remove_cmd(&mut self, id: CmdId) {
        self.cmds.remove(id);
    }

    /// Install or clear a change callback on a variable.
    pub fn set_callback(&mut self, name: &str, callback: Option<CvarCallback>) -> bool {
        self.cvars.set_callback(name, callback)
    }

    /// Numeric value of a variable, 0 if missing.
    pub fn value(&self, name: &str) -> f64 {
        self.cvars.value(name)
    }

    /// String value of a variable, empty if missing.
    pub fn string(&self, name: &str) -> &str {
        self.cvars.string(name)
    }

    /// Set a variable from a string.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        self.cvars.set(name, value)
    }

    /// Set a variable from a number.
    pub fn set_value(&mut self, name: &str, value: f64) -> bool {
        self.cvars.set_value(name, value)
    }

    /// Check if a command or variable has this name.
    pub fn contains(&self, name: &str) -> bool {
        self.cmds.contains(name) || self.cvars.contains(name)
    }

    /// Queue text to run after everything already buffered.
    pub fn add_text(&mut self, text: &str) {
        self.buffer.add_text(text);
    }

    /// Queue text to run before everything already buffered.
    pub fn insert_text(&mut self, text: &str) {
        self.buffer.insert_text(text);
    }

    /// Get read-only access to the command registry.
    pub fn cmds(&self) -> &CmdRegistry {
        &self.cmds
    }

    /// Get read-only access to the variable registry.
    pub fn cvars(&self) -> &CvarRegistry {
        &self.cvars
    }
}

/// Read-only console system parameter.
///
/// Use this when you only need to read console values, not modify them.
/// This allows for better parallelism in Bevy's scheduler.
#[derive(SystemParam)]
pub struct ConsoleRef<'w> {
    cmds: Res<'w, CmdRegistry>,
    cvars: Res<'w, CvarRegistry>,
}

impl ConsoleRef<'_> {
    /// Numeric value of a variable, 0 if missing.
    pub fn value(&self, name: &str) -> f64 {
        self.cvars.value(name)
    }

    /// String value of a variable, empty if missing.
    pub fn string(&self, name: &str) -> &str {
        self.cvars.string(name)
    }

    /// Find a variable by name.
    pub fn find(&self, name: &str) -> Option<&ConVar> {
        self.cvars.find(name)
    }

    /// Check if a command or variable has this name.
    pub fn contains(&self, name: &str) -> bool {
        self.cmds.contains(name) || self.cvars.contains(name)
    }

    /// First command or variable name starting with `partial`.
    pub fn complete(&self, partial: &str) -> Option<&str> {
        self.cmds.complete(partial).or_else(|| self.cvars.complete(partial))
    }

    /// Get read-only access to the command registry.
    pub fn cmds(&self) -> &CmdRegistry {
        &self.cmds
    }

    /// Get read-only access to the variable registry.
    pub fn cvars(&self) -> &CvarRegistry {
        &self.cvars
    }
}
