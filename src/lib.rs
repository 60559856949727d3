//! A Quake-style command interpreter, cvar registry and pak file system for Bevy.
//!
//! bevy_quake_console provides:
//!
//! - **Command buffer**: `;`/newline separated script text with `wait` and aliases
//! - **ConCommand**: source-scoped console commands with handlers
//! - **ConVar**: string/number variables with ROM, LOCKED and ARCHIVE flags
//! - **FileSystem**: layered game directories and `.pak` archives
//!
//! # Features
//!
//! - `terminal`: stdin backend for dedicated servers
//!
//! # Quick Start
//!
//! ```ignore
//! use bevy::prelude::*;
//! use bevy_quake_console::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(DefaultPlugins)
//!         .insert_resource(HostParams {
//!             base_dir: "/opt/quake".into(),
//!             ..default()
//!         })
//!         .add_plugins(ConsolePlugin)
//!         .add_systems(Startup, setup_console)
//!         .run();
//! }
//!
//! fn setup_console(mut console: Console) {
//!     console.register_var(ConVar::new("sv_gravity", "800").flags(ConVarFlags::NOTIFY));
//!
//!     console.register_cmd(ConCommand::new("noclip", |_, _world| {
//!         info!("noclip ON");
//!     }));
//! }
//! ```

use bevy::prelude::*;

pub mod core;
pub mod fs;

mod builtins;

#[cfg(feature = "terminal")]
pub mod terminal;

pub use builtins::register_builtins;

pub use core::{
    AliasTable, CmdId, CmdLine, CmdRegistry, CmdSource, CommandArgs, CommandBuffer, CommandHandler, ConCommand,
    ConVar, ConVarChangedEvent, ConVarFlags, Console, ConsoleEventsPlugin, ConsoleInputEvent, ConsoleRef,
    CvarRegistry, GameDirChangedEvent,
};
pub use fs::{FileSystem, FsError, HostParams};

#[cfg(feature = "terminal")]
pub use terminal::TerminalPlugin;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::core::{
        CmdSource, CommandArgs, ConCommand, ConVar, ConVarChangedEvent, ConVarFlags, Console, ConsoleInputEvent,
        ConsoleRef, GameDirChangedEvent,
    };
    pub use crate::fs::{FileSystem, HostParams};
    pub use crate::ConsolePlugin;
}

/// Main console plugin.
///
/// Insert [`HostParams`] and, for tests or embedding, a [`CmdLine`] before
/// adding the plugin. Without a `CmdLine` the process arguments are used.
#[derive(Default)]
pub struct ConsolePlugin;

impl Plugin for ConsolePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<CmdLine>() {
            app.insert_resource(CmdLine::from_env());
        }

        app.init_resource::<HostParams>()
            .init_resource::<CommandBuffer>()
            .init_resource::<CmdRegistry>()
            .init_resource::<AliasTable>()
            .init_resource::<CvarRegistry>()
            .add_plugins(core::ConsoleEventsPlugin);

        app.add_systems(Startup, register_builtin_commands)
            .add_systems(PostStartup, boot);

        // One tick of script execution per frame:
        // 1. feed_console_input: submitted text goes to the end of the buffer
        // 2. execute_buffer: release a pending wait and run buffered lines
        // 3. publish_cvar_changes: announce variables that changed
        app.add_systems(
            Update,
            (feed_console_input, execute_buffer, publish_cvar_changes).chain(),
        );

        #[cfg(feature = "terminal")]
        {
            let dedicated = app.world().resource::<CmdLine>().dedicated();
            if dedicated && !app.is_plugin_added::<terminal::TerminalPlugin>() {
                app.add_plugins(terminal::TerminalPlugin);
            }
        }
    }
}

fn register_builtin_commands(mut cmds: ResMut<CmdRegistry>, mut cvars: ResMut<CvarRegistry>) {
    register_builtins(&mut cmds, &mut cvars);
}

/// Bring up the file system and queue the startup script.
///
/// Runs after every `Startup` system so commands and variables registered
/// there already exist when the config and script are read.
fn boot(world: &mut World) {
    let cmdline = world.resource::<CmdLine>().clone();
    let host = world.resource::<HostParams>().clone();

    world
        .resource_mut::<CvarRegistry>()
        .set_rom("cmdline", cmdline.as_str().trim());

    match fs::FileSystem::init(&host, &cmdline) {
        Ok(files) => {
            load_early_cvars(world, &files, &host, &cmdline);
            world
                .resource_mut::<CvarRegistry>()
                .set_rom("registered", if files.is_registered() { "1" } else { "0" });
            world.insert_resource(files);

            world
                .resource_mut::<CommandBuffer>()
                .add_text(&format!("exec {}\n", host.startup_script));
        }
        Err(error) => {
            error!("{}", error);
            world.write_message(AppExit::error());
        }
    }

    world.resource_mut::<CmdRegistry>().mark_initialized();
    world.resource_mut::<CvarRegistry>().mark_initialized();
}

fn load_early_cvars(world: &mut World, files: &FileSystem, host: &HostParams, cmdline: &CmdLine) {
    if host.early_cvars.is_empty() {
        return;
    }

    let mut cvars = world.resource_mut::<CvarRegistry>();
    if let Some(mut config) = fs::ConfigFile::open_config(files, host, cmdline)
        && let Err(error) = config.read_cvars(&mut cvars, &host.early_cvars)
    {
        warn!("couldn't read {}: {}", fs::CONFIG_FILE, error);
    }
    fs::read_cvar_overrides(cmdline, &mut cvars, &host.early_cvars);
}

fn feed_console_input(mut events: MessageReader<ConsoleInputEvent>, mut buffer: ResMut<CommandBuffer>) {
    for event in events.read() {
        buffer.add_text(&event.command);
        if !event.command.ends_with('\n') {
            buffer.add_text("\n");
        }
    }
}

fn execute_buffer(world: &mut World) {
    world.resource_mut::<CommandBuffer>().waited();
    core::execute(world);
}

fn publish_cvar_changes(mut cvars: ResMut<CvarRegistry>, mut changes: MessageWriter<ConVarChangedEvent>) {
    for change in cvars.drain_changes() {
        changes.write(change);
    }
}
