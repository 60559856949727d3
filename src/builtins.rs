//! Built-in commands and variables.
//!
//! Everything here talks to the interpreter only through the resources in
//! the [`World`], the same way user commands do.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use bevy::prelude::*;

use crate::core::{
    stuffed_commands, AliasTable, CmdLine, CmdRegistry, CmdSource, CommandArgs, CommandBuffer, ConCommand,
    ConVar, ConVarFlags, CvarRegistry, GameDirChangedEvent,
};
use crate::fs::{forbidden_game_dir, rooted_name, FileSystem, HostParams, SearchKind, BASE_GAME, CONFIG_FILE};

/// Register the interpreter's own commands and variables.
pub fn register_builtins(cmds: &mut CmdRegistry, cvars: &mut CvarRegistry) {
    cvars.register(cmds, ConVar::new("cl_warncmd", "1"));
    cvars.register(cmds, ConVar::new("cl_nopext", "0"));
    cvars.register(cmds, ConVar::new("registered", "1").flags(ConVarFlags::ROM));
    cvars.register(cmds, ConVar::new("cmdline", "").flags(ConVarFlags::ROM));

    // Command buffer and aliases
    cmds.add(cvars, ConCommand::new("cmdlist", cmd_list));
    cmds.add(cvars, ConCommand::new("unalias", cmd_unalias));
    cmds.add(cvars, ConCommand::new("unaliasall", cmd_unalias_all));
    cmds.add(cvars, ConCommand::new("stuffcmds", cmd_stuff_cmds));
    cmds.add(cvars, ConCommand::new("exec", cmd_exec));
    cmds.add(cvars, ConCommand::new("echo", cmd_echo));
    cmds.add(cvars, ConCommand::new("alias", cmd_alias));
    cmds.add(cvars, ConCommand::new("wait", cmd_wait));
    cmds.add(cvars, ConCommand::new("apropos", cmd_apropos));
    cmds.add(cvars, ConCommand::new("find", cmd_apropos));

    // Variables
    cmds.add(cvars, ConCommand::new("cvarlist", cmd_cvar_list));
    cmds.add(cvars, ConCommand::new("toggle", cmd_toggle));
    cmds.add(cvars, ConCommand::new("cycle", cmd_cycle));
    cmds.add(cvars, ConCommand::new("inc", cmd_inc));
    cmds.add(cvars, ConCommand::new("reset", cmd_reset));
    cmds.add(cvars, ConCommand::new("resetall", cmd_reset_all));
    cmds.add(cvars, ConCommand::new("resetcfg", cmd_reset_cfg));
    cmds.add(cvars, ConCommand::new("set", cmd_set));
    cmds.add(cvars, ConCommand::new("seta", cmd_set));

    // File system
    cmds.add(cvars, ConCommand::new("path", cmd_path));
    cmds.add(cvars, ConCommand::new("game", cmd_game));
    cmds.add(cvars, ConCommand::new("host_writeconfig", cmd_write_config));
}

fn warncmd(world: &World) -> bool {
    world.resource::<CvarRegistry>().value("cl_warncmd") != 0.0
}

fn cmd_list(args: &CommandArgs, world: &mut World) {
    let partial = args.get_or(0, "");
    let mut count = 0;
    for cmd in world.resource::<CmdRegistry>().prefix_iter(partial) {
        info!("   {}", cmd.name());
        count += 1;
    }

    if partial.is_empty() {
        info!("{} commands", count);
    } else {
        info!("{} commands beginning with \"{}\"", count, partial);
    }
}

fn cmd_unalias(args: &CommandArgs, world: &mut World) {
    let [name] = args.as_slice() else {
        info!("unalias <name> : delete alias");
        return;
    };

    if !world.resource_mut::<AliasTable>().remove(name) {
        info!("No alias named {}", name);
    }
}

fn cmd_unalias_all(_args: &CommandArgs, world: &mut World) {
    world.resource_mut::<AliasTable>().clear();
}

fn cmd_stuff_cmds(_args: &CommandArgs, world: &mut World) {
    let text = stuffed_commands(world.resource::<CvarRegistry>().string("cmdline"));
    if !text.is_empty() {
        world.resource_mut::<CommandBuffer>().insert_text(&text);
    }
}

fn cmd_exec(args: &CommandArgs, world: &mut World) {
    let [name] = args.as_slice() else {
        info!("exec <filename> : execute a script file");
        return;
    };

    let Some(script) = load_script(world, name) else {
        if warncmd(world) {
            warn!("couldn't exec {}", name);
        }
        return;
    };

    if warncmd(world) {
        info!("execing {}", name);
    }
    world
        .resource_mut::<CommandBuffer>()
        .insert_text(&String::from_utf8_lossy(&script));
}

/// In multiuser mode the per-user directory is checked before the search path.
fn load_script(world: &World, name: &str) -> Option<Vec<u8>> {
    let multiuser = world.get_resource::<CmdLine>().is_some_and(CmdLine::multiuser);
    if multiuser
        && !rooted_name(name)
        && let Some(dir) = world.get_resource::<HostParams>().and_then(|h| h.user_dir.as_ref())
        && let Ok(bytes) = std::fs::read(dir.join(name))
    {
        return Some(bytes);
    }

    world.get_resource::<FileSystem>()?.load_file(name)
}

fn cmd_echo(args: &CommandArgs, _world: &mut World) {
    info!("{}", args.join(" "));
}

fn cmd_alias(args: &CommandArgs, world: &mut World) {
    match args.as_slice() {
        [] => {
            let aliases = world.resource::<AliasTable>();
            for (name, value) in aliases.iter() {
                info!("   {}: {}", name, value.trim_end());
            }
            match aliases.len() {
                0 => info!("no alias commands found"),
                n => info!("{} alias command(s)", n),
            }
        }
        [name] => {
            if let Some(value) = world.resource::<AliasTable>().get(name) {
                info!("   {}: {}", name, value.trim_end());
            }
        }
        [name, words @ ..] => {
            world
                .resource_mut::<AliasTable>()
                .define(name, words.iter().copied());
        }
    }
}

fn cmd_wait(_args: &CommandArgs, world: &mut World) {
    world.resource_mut::<CommandBuffer>().wait();
}

fn cmd_apropos(args: &CommandArgs, world: &mut World) {
    let Some(needle) = args.get(0).filter(|s| !s.is_empty()) else {
        info!(
            "{} <substring> : search through commands and cvars for the given substring",
            args.name()
        );
        return;
    };

    let mut hits = 0;
    for cmd in world.resource::<CmdRegistry>().iter() {
        if cmd.source() != CmdSource::Server && cmd.name().contains(needle) {
            info!("{}", cmd.name());
            hits += 1;
        }
    }
    for var in world.resource::<CvarRegistry>().iter() {
        if var.name().contains(needle) {
            info!("{} (current value \"{}\")", var.name(), var.string());
            hits += 1;
        }
    }

    if hits == 0 {
        info!("no cvars nor commands contain that substring");
    }
}

fn cmd_cvar_list(args: &CommandArgs, world: &mut World) {
    let partial = args.get_or(0, "");
    let mut count = 0;
    for var in world.resource::<CvarRegistry>().prefix_iter(partial) {
        let flags = var.get_flags();
        let archive = if flags.contains(ConVarFlags::ARCHIVE) { '*' } else { ' ' };
        let notify = if flags.contains(ConVarFlags::NOTIFY) { 's' } else { ' ' };
        info!("{}{} {} \"{}\"", archive, notify, var.name(), var.string());
        count += 1;
    }

    if partial.is_empty() {
        info!("{} cvars", count);
    } else {
        info!("{} cvars beginning with \"{}\"", count, partial);
    }
}

fn cmd_toggle(args: &CommandArgs, world: &mut World) {
    let Some(name) = args.get(0) else {
        info!("toggle <cvar> [value] [altvalue]: toggle cvar");
        return;
    };

    let mut cvars = world.resource_mut::<CvarRegistry>();
    let Some(var) = cvars.find(name) else {
        warn!("variable \"{}\" not found", name);
        return;
    };

    let next = match args.get(1) {
        Some(value) => {
            let alt = args.get(2).unwrap_or(var.default_string());
            if var.string() == value { alt } else { value }
        }
        None if var.value() == 0.0 => "1",
        None => "0",
    }
    .to_string();

    cvars.set(name, &next);
}

fn cmd_cycle(args: &CommandArgs, world: &mut World) {
    let (name, values) = match args.as_slice() {
        [name, values @ ..] if !values.is_empty() => (*name, values),
        _ => {
            info!("cycle <cvar> <value list>: cycle cvar through a list of values");
            return;
        }
    };

    let mut cvars = world.resource_mut::<CvarRegistry>();
    let Some(var) = cvars.find(name) else {
        warn!("variable \"{}\" not found", name);
        return;
    };

    // A list holding the current value twice keeps landing on the first copy.
    let current = values[..values.len() - 1]
        .iter()
        .position(|v| match v.parse::<f64>() {
            Ok(number) => (number - var.value()).abs() < 0.0001,
            Err(_) => *v == var.string(),
        })
        .unwrap_or(values.len() - 1);

    let next = values[(current + 1) % values.len()].to_string();
    cvars.set(name, &next);
}

fn cmd_inc(args: &CommandArgs, world: &mut World) {
    let (name, amount) = match args.as_slice() {
        [name] => (*name, 1.0),
        [name, _] => (*name, args.parse_or(1, 1.0)),
        _ => {
            info!("inc <cvar> [amount] : increment cvar");
            return;
        }
    };

    let mut cvars = world.resource_mut::<CvarRegistry>();
    let value = cvars.value(name) + amount;
    cvars.set_value(name, value);
}

fn cmd_reset(args: &CommandArgs, world: &mut World) {
    let [name] = args.as_slice() else {
        info!("reset <cvar> : reset cvar to default");
        return;
    };
    world.resource_mut::<CvarRegistry>().reset(name);
}

fn cmd_reset_all(_args: &CommandArgs, world: &mut World) {
    let mut cvars = world.resource_mut::<CvarRegistry>();
    for name in cvars.names() {
        cvars.reset(&name);
    }
}

fn cmd_reset_cfg(_args: &CommandArgs, world: &mut World) {
    let mut cvars = world.resource_mut::<CvarRegistry>();
    let archived: Vec<String> = cvars
        .iter_flagged(ConVarFlags::ARCHIVE)
        .map(|var| var.name().to_string())
        .collect();
    for name in archived {
        cvars.reset(&name);
    }
}

/// `set` and `seta`. Creates the variable when missing; `seta` also archives it.
fn cmd_set(args: &CommandArgs, world: &mut World) {
    let (name, value) = match args.as_slice() {
        [name, value] => (*name, *value),
        [name, _, ..] => {
            warn!("{} \"{}\" command with extra args", args.name(), name);
            return;
        }
        _ => {
            info!("{} <cvar> <value>", args.name());
            return;
        }
    };
    let archive = args.name() == "seta";

    world.resource_scope(|world, mut cvars: Mut<CvarRegistry>| {
        let Some(var) = cvars.create(world.resource::<CmdRegistry>(), name, value) else {
            warn!("{} could not create a cvar named \"{}\"", args.name(), name);
            return;
        };

        if var.get_flags().intersects(ConVarFlags::ROM | ConVarFlags::LOCKED) {
            warn!("{} is read-only", name);
            return;
        }
        if archive {
            var.flags_mut().insert(ConVarFlags::ARCHIVE | ConVarFlags::SETA);
        }

        cvars.set(name, value);
    });
}

fn cmd_path(_args: &CommandArgs, world: &mut World) {
    let Some(fs) = world.get_resource::<FileSystem>() else {
        return;
    };

    info!("Current search path:");
    for layer in fs.search_paths() {
        match layer.kind() {
            SearchKind::Pack(pack) => info!("{} ({} files)", pack.path().display(), pack.len()),
            SearchKind::Directory(dir) => info!("{}", dir.display()),
        }
    }
}

/// `game [[-]dir ...]`. Directories given with a leading `-` take priority.
fn cmd_game(args: &CommandArgs, world: &mut World) {
    let Some(current) = world.get_resource::<FileSystem>().map(|fs| fs.game_names(true)) else {
        return;
    };

    if args.is_empty() {
        info!("\"game\" is \"{}\"", current);
        return;
    }

    if world.resource::<CvarRegistry>().value("registered") == 0.0 {
        info!("You must have the registered version to use modified games");
        return;
    }

    let mut games = vec![BASE_GAME];
    for priority in [true, false] {
        for arg in args.iter() {
            let dir = match arg.strip_prefix('-') {
                Some(dir) if priority => dir,
                None if !priority => arg,
                _ => continue,
            };

            if forbidden_game_dir(dir) {
                warn!("gamedir should be a single directory name, not a path");
                return;
            }
            if dir != BASE_GAME {
                games.push(dir);
            }
        }
    }

    let games = games.join(";");
    if games == current {
        info!("\"game\" is already \"{}\"", games);
        return;
    }

    let reset = {
        let mut fs = world.resource_mut::<FileSystem>();
        fs.set_modified();
        fs.reset_game_directories(&games)
            .map(|()| (fs.game_names(true), fs.game_names(false)))
    };

    let (full, changed) = match reset {
        Ok(names) => names,
        Err(error) => {
            error!("{}", error);
            world.write_message(AppExit::error());
            return;
        }
    };

    info!("\"game\" changed to \"{}\"", full);
    world.write_message(GameDirChangedEvent { games: changed });

    let script = world
        .get_resource::<HostParams>()
        .map_or_else(|| HostParams::default().startup_script, |host| host.startup_script.clone());
    world
        .resource_mut::<CommandBuffer>()
        .add_text(&format!("exec {script}\n"));
}

fn cmd_write_config(args: &CommandArgs, world: &mut World) {
    let name = args.get_or(0, CONFIG_FILE);
    if name.contains("..") || name.contains(['/', '\\']) || rooted_name(name) {
        warn!("host_writeconfig: {} is not a plain file name", name);
        return;
    }

    let Some(fs) = world.get_resource::<FileSystem>() else {
        return;
    };
    let path = fs.game_dir().join(name);

    match write_config(&path, world.resource::<CvarRegistry>(), world.resource::<AliasTable>()) {
        Ok(()) => info!("Wrote {}", path.display()),
        Err(error) => warn!("Couldn't write {}: {}", path.display(), error),
    }
}

/// Archived variables as `seta` lines, then every alias.
fn write_config(path: &Path, cvars: &CvarRegistry, aliases: &AliasTable) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    cvars.write_variables(&mut writer)?;
    for (name, value) in aliases.iter() {
        writeln!(writer, "alias {} \"{}\"", name, value.trim_end())?;
    }
    writer.flush()
}
