//! Line dispatch: commands, then aliases, then cvars.

use bevy::prelude::*;

use super::registry::Resolved;
use super::{tokenize_line, AliasTable, CmdRegistry, CmdSource, CommandArgs, CommandBuffer, CvarRegistry};

/// Run a single line.
///
/// Commands compatible with `source` are tried first. Console and server
/// lines that match no command fall through to the alias table and then to
/// an implicit cvar get/set; aliases shadow cvars of the same name. An unknown
/// name is reported (when `cl_warncmd` is non-zero) but still counts as
/// handled.
///
/// Client lines only ever reach client commands. A miss returns `false`
/// without consulting aliases or cvars and without the unknown-command
/// warning, so a remote client cannot expand aliases or read and write
/// variables.
///
/// Returns `false` only for rejected or unknown client lines.
pub fn execute_string(world: &mut World, line: &str, source: CmdSource) -> bool {
    let tokens = tokenize_line(line);
    let Some(name) = tokens.name() else {
        return true;
    };
    let args = CommandArgs::from_line(&tokens, source);

    match world.resource::<CmdRegistry>().resolve(name, source) {
        Resolved::Run(handler) => {
            handler(&args, world);
            return true;
        }
        Resolved::Rejected => {
            warn!("{} tried to {}", source, name);
            return false;
        }
        Resolved::Missing if source == CmdSource::Client => return false,
        Resolved::Missing => {}
    }

    let alias = world.resource::<AliasTable>().get(name).map(str::to_string);
    if let Some(text) = alias {
        world.resource_mut::<CommandBuffer>().insert_text(&text);
        return true;
    }

    let mut cvars = world.resource_mut::<CvarRegistry>();
    if !cvars.handle_command(&args) && cvars.value("cl_warncmd") != 0.0 {
        warn!("Unknown command: \"{}\"", name);
    }
    true
}

/// Run buffered lines until the buffer empties or a `wait` is pending.
pub fn execute(world: &mut World) {
    loop {
        let line = {
            let mut buffer = world.resource_mut::<CommandBuffer>();
            if buffer.is_waiting() {
                break;
            }
            match buffer.next_line() {
                Some(line) => line,
                None => break,
            }
        };
        execute_string(world, &line, CmdSource::Console);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConCommand, ConVar};

    #[derive(Resource, Default)]
    struct Executed(Vec<String>);

    fn world() -> World {
        let mut world = World::new();
        world.init_resource::<CommandBuffer>();
        world.init_resource::<CmdRegistry>();
        world.init_resource::<AliasTable>();
        world.init_resource::<CvarRegistry>();
        world.init_resource::<Executed>();
        world
    }

    fn add(world: &mut World, cmd: ConCommand) {
        world.resource_scope(|world, mut cmds: Mut<CmdRegistry>| {
            cmds.add(world.resource::<CvarRegistry>(), cmd);
        });
    }

    fn recorder(name: &str) -> ConCommand {
        ConCommand::new(name.to_string(), |args, world| {
            let line = std::iter::once(args.name()).chain(args.iter()).collect::<Vec<_>>().join(" ");
            world.resource_mut::<Executed>().0.push(line);
        })
    }

    fn executed(world: &World) -> Vec<String> {
        world.resource::<Executed>().0.clone()
    }

    #[test]
    fn test_semicolon_gives_two_dispatches() {
        let mut world = world();
        add(&mut world, recorder("echo"));

        world.resource_mut::<CommandBuffer>().add_text("echo hello; echo world");
        execute(&mut world);

        assert_eq!(executed(&world), vec!["echo hello", "echo world"]);
    }

    #[test]
    fn test_alias_expands_in_place() {
        let mut world = world();
        add(&mut world, recorder("echo"));
        world.resource_mut::<AliasTable>().define("greet", ["echo hi"]);

        world.resource_mut::<CommandBuffer>().add_text("greet\necho after\n");
        execute(&mut world);

        assert_eq!(executed(&world), vec!["echo hi", "echo after"]);
    }

    #[test]
    fn test_wait_yields_until_cleared() {
        let mut world = world();
        add(&mut world, recorder("echo"));
        add(
            &mut world,
            ConCommand::new("wait", |_, world| world.resource_mut::<CommandBuffer>().wait()),
        );

        world.resource_mut::<CommandBuffer>().add_text("echo one; wait; echo two\n");
        execute(&mut world);
        assert_eq!(executed(&world), vec!["echo one"]);

        execute(&mut world);
        assert_eq!(executed(&world).len(), 1);

        world.resource_mut::<CommandBuffer>().waited();
        execute(&mut world);
        assert_eq!(executed(&world), vec!["echo one", "echo two"]);
    }

    #[test]
    fn test_source_scoping() {
        let mut world = world();
        add(&mut world, recorder("status"));
        add(&mut world, recorder("kick").source(CmdSource::Server));
        add(&mut world, recorder("say").source(CmdSource::Client));

        assert!(!execute_string(&mut world, "status", CmdSource::Client));
        assert!(execute_string(&mut world, "say hello", CmdSource::Client));
        assert!(!execute_string(&mut world, "unknown", CmdSource::Client));
        assert!(execute_string(&mut world, "kick", CmdSource::Console));
        assert!(execute_string(&mut world, "kick player", CmdSource::Server));

        assert_eq!(executed(&world), vec!["say hello", "kick player"]);
    }

    #[test]
    fn test_cvar_fallthrough() {
        let mut world = world();
        world.resource_scope(|world, mut cvars: Mut<CvarRegistry>| {
            cvars.register(world.resource::<CmdRegistry>(), ConVar::new("skill", "1"));
        });

        assert!(execute_string(&mut world, "skill 3", CmdSource::Console));
        assert_eq!(world.resource::<CvarRegistry>().string("skill"), "3");
    }

    #[test]
    fn test_alias_shadows_cvar() {
        let mut world = world();
        add(&mut world, recorder("echo"));
        world.resource_scope(|world, mut cvars: Mut<CvarRegistry>| {
            cvars.register(world.resource::<CmdRegistry>(), ConVar::new("skill", "1"));
        });
        world.resource_mut::<AliasTable>().define("skill", ["echo aliased"]);

        assert!(execute_string(&mut world, "skill 3", CmdSource::Console));
        execute(&mut world);

        assert_eq!(executed(&world), vec!["echo aliased"]);
        assert_eq!(world.resource::<CvarRegistry>().string("skill"), "1");
    }

    #[test]
    fn test_client_lines_skip_aliases_and_cvars() {
        let mut world = world();
        add(&mut world, recorder("echo"));
        world.resource_scope(|world, mut cvars: Mut<CvarRegistry>| {
            cvars.register(world.resource::<CmdRegistry>(), ConVar::new("rcon_password", "secret"));
        });
        world.resource_mut::<AliasTable>().define("greet", ["echo hi"]);

        assert!(!execute_string(&mut world, "greet", CmdSource::Client));
        assert!(!execute_string(&mut world, "rcon_password open", CmdSource::Client));
        execute(&mut world);

        assert!(executed(&world).is_empty());
        assert!(world.resource::<CommandBuffer>().is_empty());
        assert_eq!(world.resource::<CvarRegistry>().string("rcon_password"), "secret");
    }

    #[test]
    fn test_unknown_console_line_is_handled() {
        let mut world = world();
        assert!(execute_string(&mut world, "no_such_thing 1 2", CmdSource::Console));
        assert!(execute_string(&mut world, "   ", CmdSource::Client));
    }

    #[test]
    fn test_handler_can_queue_text() {
        let mut world = world();
        add(&mut world, recorder("echo"));
        add(
            &mut world,
            ConCommand::new("twice", |args, world| {
                let text = format!("echo {0}\necho {0}", args.get_or(0, ""));
                world.resource_mut::<CommandBuffer>().insert_text(&text);
            }),
        );

        world.resource_mut::<CommandBuffer>().add_text("twice x; echo y\n");
        execute(&mut world);

        assert_eq!(executed(&world), vec!["echo x", "echo x", "echo y"]);
    }
}
