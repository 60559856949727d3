//! Command registry.
//!
//! Commands are kept sorted by name so listings and prefix searches are
//! deterministic. The same name may be registered once per [`CmdSource`].

use bevy::prelude::*;

use super::{CmdId, CmdSource, CommandHandler, ConCommand, CvarRegistry};

/// A registered command.
pub struct CmdDescriptor {
    id: CmdId,
    name: Box<str>,
    source: CmdSource,
    dynamic: bool,
    handler: CommandHandler,
}

impl CmdDescriptor {
    /// Identity for [`CmdRegistry::remove`].
    #[inline]
    pub fn id(&self) -> CmdId {
        self.id
    }

    /// Get the command name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the source class.
    #[inline]
    pub fn source(&self) -> CmdSource {
        self.source
    }

    /// Whether the command was added after startup finished.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

impl std::fmt::Debug for CmdDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source", &self.source)
            .field("dynamic", &self.dynamic)
            .finish_non_exhaustive()
    }
}

/// Outcome of looking a command up for one invocation.
pub(crate) enum Resolved {
    /// A compatible command was found.
    Run(CommandHandler),
    /// A client tried to run a command it may not use.
    Rejected,
    /// No compatible command exists.
    Missing,
}

/// Sorted table of console commands.
///
/// # Examples
///
/// ```ignore
/// let mut registry = CmdRegistry::new();
/// let cvars = CvarRegistry::new();
///
/// let id = registry.add(&cvars, ConCommand::new("noclip", |_, _| {}));
/// assert!(registry.exists("noclip"));
/// registry.remove(id.unwrap());
/// ```
#[derive(Resource, Default)]
pub struct CmdRegistry {
    cmds: Vec<CmdDescriptor>,
    next_id: u64,
    initialized: bool,
}

impl CmdRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command.
    ///
    /// Fails (with a warning) if a cvar already uses the name, or if the name
    /// is already registered for the same source class.
    pub fn add(&mut self, cvars: &CvarRegistry, cmd: ConCommand) -> Option<CmdId> {
        let (name, source, handler) = cmd.into_parts();

        if cvars.contains(&name) {
            warn!("add_command: {} already defined as a var", name);
            return None;
        }

        if self.range(&name).any(|c| c.source == source) {
            warn!("add_command: {} already defined", name);
            return None;
        }

        let id = CmdId(self.next_id);
        self.next_id += 1;

        let at = self
            .cmds
            .partition_point(|c| (c.name.as_ref(), c.source) < (name.as_ref(), source));
        self.cmds.insert(
            at,
            CmdDescriptor {
                id,
                name,
                source,
                dynamic: self.initialized,
                handler,
            },
        );
        Some(id)
    }

    /// Unregister a command by identity.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not registered: the caller and the registry disagree
    /// about what exists, and continuing would dispatch stale commands.
    pub fn remove(&mut self, id: CmdId) {
        match self.cmds.iter().position(|c| c.id == id) {
            Some(index) => {
                self.cmds.remove(index);
            }
            None => panic!("remove_command: unable to remove command {:?}", id),
        }
    }

    fn range<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CmdDescriptor> + 'a {
        let start = self.cmds.partition_point(|c| c.name.as_ref() < name);
        self.cmds[start..].iter().take_while(move |c| c.name.as_ref() == name)
    }

    /// Check if a console-class command with this name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.range(name).any(|c| c.source == CmdSource::Console)
    }

    /// Check if any command with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.range(name).next().is_some()
    }

    /// First command name (in sorted order) starting with `partial`.
    pub fn complete(&self, partial: &str) -> Option<&str> {
        if partial.is_empty() {
            return None;
        }
        self.prefix_iter(partial).next().map(CmdDescriptor::name)
    }

    /// Iterate over commands whose name starts with `prefix`.
    pub fn prefix_iter<'a, 'p>(&'a self, prefix: &'p str) -> impl Iterator<Item = &'a CmdDescriptor> + use<'a, 'p> {
        let start = self.cmds.partition_point(|c| c.name.as_ref() < prefix);
        self.cmds[start..]
            .iter()
            .take_while(move |c| c.name.starts_with(prefix))
    }

    /// Iterate over all commands in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CmdDescriptor> {
        self.cmds.iter()
    }

    /// Get the number of registered commands.
    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Mark startup as finished. Later registrations are flagged dynamic.
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Find the command an invocation from `source` should run.
    ///
    /// - Client: only client-class commands; any other match is rejected.
    /// - Console: anything except server-class commands.
    /// - Server: only server-class commands.
    pub(crate) fn resolve(&self, name: &str, source: CmdSource) -> Resolved {
        for cmd in self.range(name) {
            match source {
                CmdSource::Client if cmd.source != CmdSource::Client => return Resolved::Rejected,
                CmdSource::Console if cmd.source == CmdSource::Server => continue,
                CmdSource::Server if cmd.source != CmdSource::Server => continue,
                _ => return Resolved::Run(cmd.handler.clone()),
            }
        }
        Resolved::Missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConVar;

    fn noop(name: &str) -> ConCommand {
        ConCommand::new(name.to_string(), |_, _| {})
    }

    #[test]
    fn test_registry_sorted() {
        let mut registry = CmdRegistry::new();
        let cvars = CvarRegistry::new();

        for name in ["path", "echo", "wait", "alias", "exec", "cmdlist"] {
            assert!(registry.add(&cvars, noop(name)).is_some());
        }

        let names: Vec<_> = registry.iter().map(|c| c.name()).collect();
        assert!(names.windows(2).all(|w| w[0] < w[1]), "{names:?}");
    }

    #[test]
    fn test_duplicate_per_source() {
        let mut registry = CmdRegistry::new();
        let cvars = CvarRegistry::new();

        assert!(registry.add(&cvars, noop("say")).is_some());
        assert!(registry.add(&cvars, noop("say")).is_none());
        assert!(registry.add(&cvars, noop("say").source(CmdSource::Client)).is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_rejects_cvar_name() {
        let mut registry = CmdRegistry::new();
        let mut cvars = CvarRegistry::new();
        cvars.register(&registry, ConVar::new("skill", "1"));

        assert!(registry.add(&cvars, noop("skill")).is_none());
        assert!(!registry.contains("skill"));
    }

    #[test]
    fn test_remove() {
        let mut registry = CmdRegistry::new();
        let cvars = CvarRegistry::new();

        let id = registry.add(&cvars, noop("temp")).unwrap();
        assert!(registry.exists("temp"));
        registry.remove(id);
        assert!(!registry.exists("temp"));
    }

    #[test]
    #[should_panic(expected = "unable to remove")]
    fn test_remove_unknown_panics() {
        let mut registry = CmdRegistry::new();
        let cvars = CvarRegistry::new();

        let id = registry.add(&cvars, noop("temp")).unwrap();
        registry.remove(id);
        registry.remove(id);
    }

    #[test]
    fn test_exists_is_console_only() {
        let mut registry = CmdRegistry::new();
        let cvars = CvarRegistry::new();
        registry.add(&cvars, noop("kick").source(CmdSource::Server));

        assert!(!registry.exists("kick"));
        assert!(registry.contains("kick"));
    }

    #[test]
    fn test_complete_and_prefix() {
        let mut registry = CmdRegistry::new();
        let cvars = CvarRegistry::new();
        for name in ["unalias", "unaliasall", "echo", "exec"] {
            registry.add(&cvars, noop(name));
        }

        assert_eq!(registry.complete("una"), Some("unalias"));
        assert_eq!(registry.complete("ex"), Some("exec"));
        assert_eq!(registry.complete(""), None);
        assert_eq!(registry.prefix_iter("e").count(), 2);
    }

    #[test]
    fn test_completion_outlives_typed_prefix() {
        let mut registry = CmdRegistry::new();
        registry.add(&CvarRegistry::new(), noop("unaliasall"));

        let completed = {
            let typed = String::from("unal");
            registry.complete(&typed)
        };
        assert_eq!(completed, Some("unaliasall"));
    }

    #[test]
    fn test_dynamic_after_init() {
        let mut registry = CmdRegistry::new();
        let cvars = CvarRegistry::new();
        registry.add(&cvars, noop("early"));
        registry.mark_initialized();
        registry.add(&cvars, noop("late"));

        let dynamic: Vec<_> = registry.iter().map(|c| (c.name(), c.is_dynamic())).collect();
        assert_eq!(dynamic, vec![("early", false), ("late", true)]);
    }

    #[test]
    fn test_resolve_scoping() {
        let mut registry = CmdRegistry::new();
        let cvars = CvarRegistry::new();
        registry.add(&cvars, noop("status"));
        registry.add(&cvars, noop("kick").source(CmdSource::Server));
        registry.add(&cvars, noop("say").source(CmdSource::Client));

        assert!(matches!(registry.resolve("status", CmdSource::Console), Resolved::Run(_)));
        assert!(matches!(registry.resolve("kick", CmdSource::Console), Resolved::Missing));
        assert!(matches!(registry.resolve("kick", CmdSource::Server), Resolved::Run(_)));
        assert!(matches!(registry.resolve("status", CmdSource::Server), Resolved::Missing));
        assert!(matches!(registry.resolve("status", CmdSource::Client), Resolved::Rejected));
        assert!(matches!(registry.resolve("say", CmdSource::Client), Resolved::Run(_)));
        assert!(matches!(registry.resolve("say", CmdSource::Console), Resolved::Run(_)));
        assert!(matches!(registry.resolve("nothing", CmdSource::Client), Resolved::Missing));
    }
}
