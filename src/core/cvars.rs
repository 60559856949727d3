//! Console variable registry.
//!
//! Variables are stored by name in ascending order. All writes go through
//! [`CvarRegistry::set`] or one of its siblings so that ROM and LOCKED
//! variables stay frozen and every change is queued as a
//! [`ConVarChangedEvent`].

use std::collections::BTreeMap;
use std::io::{self, Write};

use bevy::prelude::*;

use super::{format_value, CmdRegistry, CommandArgs, ConVar, ConVarChangedEvent, ConVarFlags, CvarCallback};

/// Sorted table of console variables.
///
/// # Examples
///
/// ```
/// use bevy_quake_console::core::{CmdRegistry, ConVar, ConVarFlags, CvarRegistry};
///
/// let cmds = CmdRegistry::new();
/// let mut cvars = CvarRegistry::new();
/// cvars.register(&cmds, ConVar::new("registered", "0").flags(ConVarFlags::ROM));
///
/// cvars.set("registered", "1");
/// assert_eq!(cvars.string("registered"), "0");
///
/// cvars.set_rom("registered", "1");
/// assert_eq!(cvars.value("registered"), 1.0);
/// ```
#[derive(Resource, Default)]
pub struct CvarRegistry {
    vars: BTreeMap<Box<str>, ConVar>,
    changes: Vec<ConVarChangedEvent>,
    initialized: bool,
}

impl CvarRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable. Its construction value becomes the default.
    ///
    /// Fails (with a warning) if the name is taken by a command or a variable.
    pub fn register(&mut self, cmds: &CmdRegistry, mut var: ConVar) -> bool {
        if self.vars.contains_key(var.name()) {
            warn!("Can't register variable {}, already defined", var.name());
            return false;
        }

        if cmds.contains(var.name()) {
            warn!("register_variable: {} is a command", var.name());
            return false;
        }

        var.register_value();
        self.vars.insert(var.name().into(), var);
        true
    }

    /// Look up a variable, or create a user-defined one with `value`.
    ///
    /// Returns `None` if a command already owns the name.
    pub fn create(&mut self, cmds: &CmdRegistry, name: &str, value: &str) -> Option<&mut ConVar> {
        if !self.vars.contains_key(name) {
            if cmds.contains(name) {
                return None;
            }
            self.register(cmds, ConVar::new(name, value).flags(ConVarFlags::USER_DEFINED));
        }
        self.vars.get_mut(name)
    }

    /// Find a variable by name.
    #[inline]
    pub fn find(&self, name: &str) -> Option<&ConVar> {
        self.vars.get(name)
    }

    pub(crate) fn find_mut(&mut self, name: &str) -> Option<&mut ConVar> {
        self.vars.get_mut(name)
    }

    /// Check if a variable with this name exists.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Numeric value of a variable, or 0 if it does not exist.
    pub fn value(&self, name: &str) -> f64 {
        self.vars.get(name).map_or(0.0, ConVar::value)
    }

    /// String value of a variable, or `""` if it does not exist.
    pub fn string(&self, name: &str) -> &str {
        self.vars.get(name).map_or("", ConVar::string)
    }

    fn set_quick(&mut self, name: &str, value: &str) -> bool {
        let Some(var) = self.vars.get_mut(name) else {
            return false;
        };

        let flags = var.get_flags();
        if flags.intersects(ConVarFlags::ROM | ConVarFlags::LOCKED) || !flags.contains(ConVarFlags::REGISTERED) {
            return false;
        }

        // Values written before startup completes (config files, the command
        // line) become the new defaults, as does the first value of a
        // variable registered without one.
        if !self.initialized || var.default_string().is_empty() {
            var.set_default(value);
        }

        match var.assign(value) {
            Some(old) => {
                self.changes.push(ConVarChangedEvent::new(name, old, value));
                true
            }
            None => false,
        }
    }

    /// Set a variable's string value. Returns `true` if the value changed.
    ///
    /// ROM and LOCKED variables silently ignore the request.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        if !self.vars.contains_key(name) {
            warn!("set: variable {} not found", name);
            return false;
        }
        self.set_quick(name, value)
    }

    /// Set a variable from a number. See [`format_value`] for the stored text.
    pub fn set_value(&mut self, name: &str, value: f64) -> bool {
        self.set(name, &format_value(value))
    }

    /// Set a ROM variable. The only sanctioned way to change one.
    pub fn set_rom(&mut self, name: &str, value: &str) -> bool {
        let Some(var) = self.vars.get_mut(name) else {
            return false;
        };

        let rom = var.get_flags().contains(ConVarFlags::ROM);
        var.flags_mut().remove(ConVarFlags::ROM);
        let changed = self.set_quick(name, value);
        if rom && let Some(var) = self.vars.get_mut(name) {
            var.flags_mut().insert(ConVarFlags::ROM);
        }
        changed
    }

    /// Numeric form of [`CvarRegistry::set_rom`].
    pub fn set_value_rom(&mut self, name: &str, value: f64) -> bool {
        self.set_rom(name, &format_value(value))
    }

    /// Restore a variable's default value.
    pub fn reset(&mut self, name: &str) -> bool {
        let Some(default) = self.vars.get(name).map(|v| v.default_string().to_string()) else {
            warn!("variable \"{}\" not found", name);
            return false;
        };
        self.set_quick(name, &default)
    }

    /// Freeze a variable against [`CvarRegistry::set`].
    pub fn lock(&mut self, name: &str) {
        if let Some(var) = self.vars.get_mut(name) {
            var.flags_mut().insert(ConVarFlags::LOCKED);
        }
    }

    /// Undo [`CvarRegistry::lock`].
    pub fn unlock(&mut self, name: &str) {
        if let Some(var) = self.vars.get_mut(name) {
            var.flags_mut().remove(ConVarFlags::LOCKED);
        }
    }

    /// Unlock every variable.
    pub fn unlock_all(&mut self) {
        for var in self.vars.values_mut() {
            var.flags_mut().remove(ConVarFlags::LOCKED);
        }
    }

    /// Install or clear a change callback.
    pub fn set_callback(&mut self, name: &str, callback: Option<CvarCallback>) -> bool {
        match self.vars.get_mut(name) {
            Some(var) => {
                var.set_callback(callback);
                true
            }
            None => false,
        }
    }

    /// First variable name (in sorted order) starting with `partial`.
    pub fn complete(&self, partial: &str) -> Option<&str> {
        if partial.is_empty() {
            return None;
        }
        self.prefix_iter(partial).next().map(ConVar::name)
    }

    /// Iterate over variables whose name starts with `prefix`.
    pub fn prefix_iter<'a, 'p>(&'a self, prefix: &'p str) -> impl Iterator<Item = &'a ConVar> + use<'a, 'p> {
        self.vars
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .map(|(_, v)| v)
            .take_while(move |v| v.name().starts_with(prefix))
    }

    /// Iterate over all variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ConVar> {
        self.vars.values()
    }

    /// Iterate over variables carrying every flag in `flags`.
    pub fn iter_flagged(&self, flags: ConVarFlags) -> impl Iterator<Item = &ConVar> {
        self.vars.values().filter(move |v| v.get_flags().contains(flags))
    }

    /// Names of all variables, for commands that mutate while iterating.
    pub fn names(&self) -> Vec<String> {
        self.vars.keys().map(|k| k.to_string()).collect()
    }

    /// Get the number of registered variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Mark startup as finished. Later writes no longer move defaults.
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Treat a command line naming a variable as an implicit get or set.
    ///
    /// Returns `false` if no variable has that name.
    pub fn handle_command(&mut self, args: &CommandArgs) -> bool {
        let Some(var) = self.vars.get(args.name()) else {
            return false;
        };

        match args.get(0) {
            None => info!("{}", var),
            Some(value) => {
                self.set(args.name(), value);
            }
        }
        true
    }

    /// Write archived variables as `seta NAME "VALUE"` lines.
    ///
    /// Only variables created or written by the user are saved.
    pub fn write_variables(&self, writer: &mut impl Write) -> io::Result<()> {
        for var in self.iter_flagged(ConVarFlags::ARCHIVE) {
            if var.get_flags().intersects(ConVarFlags::USER_DEFINED | ConVarFlags::SETA) {
                writeln!(writer, "seta {} \"{}\"", var.name(), var.string())?;
            }
        }
        Ok(())
    }

    /// Take the changes recorded since the last call.
    pub fn drain_changes(&mut self) -> Vec<ConVarChangedEvent> {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CmdSource, ConCommand};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> (CmdRegistry, CvarRegistry) {
        (CmdRegistry::new(), CvarRegistry::new())
    }

    #[test]
    fn test_register_order_is_ascending() {
        let (cmds, mut cvars) = registry();
        for name in ["volume", "fov", "skill", "cl_warncmd", "hostname", "deathmatch"] {
            assert!(cvars.register(&cmds, ConVar::new(name, "0")));
        }

        let names: Vec<_> = cvars.iter().map(ConVar::name).collect();
        assert!(names.windows(2).all(|w| w[0] < w[1]), "{names:?}");
    }

    #[test]
    fn test_register_rejects_duplicates_and_commands() {
        let (mut cmds, mut cvars) = registry();
        cmds.add(&cvars, ConCommand::new("echo", |_, _| {}));

        assert!(cvars.register(&cmds, ConVar::new("skill", "1")));
        assert!(!cvars.register(&cmds, ConVar::new("skill", "3")));
        assert!(!cvars.register(&cmds, ConVar::new("echo", "1")));
        assert_eq!(cvars.string("skill"), "1");
        assert!(!cvars.contains("echo"));
    }

    #[test]
    fn test_set_same_value_notifies_once() {
        let (cmds, mut cvars) = registry();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        cvars.register(
            &cmds,
            ConVar::new("cl_warncmd", "0").callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        cvars.mark_initialized();

        assert!(cvars.set("cl_warncmd", "1"));
        assert!(!cvars.set("cl_warncmd", "1"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cvars.find("cl_warncmd").unwrap().get_flags().contains(ConVarFlags::CHANGED));
        assert_eq!(cvars.drain_changes().len(), 1);
        assert!(cvars.drain_changes().is_empty());
    }

    #[test]
    fn test_rom_rejects_set() {
        let (cmds, mut cvars) = registry();
        cvars.register(&cmds, ConVar::new("registered", "1").flags(ConVarFlags::ROM));

        assert!(!cvars.set("registered", "0"));
        assert!(!cvars.set_value("registered", 0.0));
        assert_eq!(cvars.string("registered"), "1");

        assert!(cvars.set_value_rom("registered", 0.0));
        assert_eq!(cvars.string("registered"), "0");
        assert!(cvars.find("registered").unwrap().get_flags().contains(ConVarFlags::ROM));
    }

    #[test]
    fn test_lock_and_unlock() {
        let (cmds, mut cvars) = registry();
        cvars.register(&cmds, ConVar::new("sv_gravity", "800"));
        cvars.register(&cmds, ConVar::new("sv_friction", "4"));

        cvars.lock("sv_gravity");
        cvars.lock("sv_friction");
        assert!(!cvars.set("sv_gravity", "100"));

        cvars.unlock("sv_gravity");
        assert!(cvars.set("sv_gravity", "100"));
        assert!(!cvars.set("sv_friction", "1"));

        cvars.unlock_all();
        assert!(cvars.set("sv_friction", "1"));
    }

    #[test]
    fn test_unknown_reads_as_empty() {
        let (_, mut cvars) = registry();
        assert_eq!(cvars.value("nothing"), 0.0);
        assert_eq!(cvars.string("nothing"), "");
        assert!(!cvars.set("nothing", "1"));
        assert!(!cvars.reset("nothing"));
    }

    #[test]
    fn test_set_value_formatting() {
        let (cmds, mut cvars) = registry();
        cvars.register(&cmds, ConVar::new("volume", "0.7"));

        cvars.set_value("volume", 1.0);
        assert_eq!(cvars.string("volume"), "1");
        cvars.set_value("volume", 0.5);
        assert_eq!(cvars.string("volume"), "0.5");
    }

    #[test]
    fn test_defaults_follow_startup_writes() {
        let (cmds, mut cvars) = registry();
        cvars.register(&cmds, ConVar::new("fov", "90"));

        cvars.set("fov", "100");
        cvars.mark_initialized();
        cvars.set("fov", "110");

        assert_eq!(cvars.find("fov").unwrap().default_string(), "100");
        cvars.reset("fov");
        assert_eq!(cvars.string("fov"), "100");
    }

    #[test]
    fn test_empty_default_takes_first_value() {
        let (cmds, mut cvars) = registry();
        cvars.mark_initialized();
        cvars.register(&cmds, ConVar::new("name", ""));

        cvars.set("name", "player");
        cvars.set("name", "other");

        assert_eq!(cvars.find("name").unwrap().default_string(), "player");
        cvars.reset("name");
        assert_eq!(cvars.string("name"), "player");
    }

    #[test]
    fn test_create_user_defined() {
        let (mut cmds, mut cvars) = registry();
        cmds.add(&cvars, ConCommand::new("map", |_, _| {}).source(CmdSource::Server));

        let var = cvars.create(&cmds, "my_setting", "5").unwrap();
        assert!(var.get_flags().contains(ConVarFlags::USER_DEFINED));
        assert_eq!(var.value(), 5.0);

        assert!(cvars.create(&cmds, "my_setting", "9").is_some());
        assert_eq!(cvars.string("my_setting"), "5");
        assert!(cvars.create(&cmds, "map", "1").is_none());
    }

    #[test]
    fn test_complete_and_iter_flagged() {
        let (cmds, mut cvars) = registry();
        cvars.register(&cmds, ConVar::new("sv_gravity", "800").flags(ConVarFlags::SERVER_INFO));
        cvars.register(&cmds, ConVar::new("sv_maxspeed", "320").flags(ConVarFlags::SERVER_INFO));
        cvars.register(&cmds, ConVar::new("skill", "1"));

        assert_eq!(cvars.complete("sv_"), Some("sv_gravity"));
        assert_eq!(cvars.complete("sk"), Some("skill"));
        assert_eq!(cvars.complete("zz"), None);
        assert_eq!(cvars.prefix_iter("sv").count(), 2);
        assert_eq!(cvars.iter_flagged(ConVarFlags::SERVER_INFO).count(), 2);
    }

    #[test]
    fn test_completion_outlives_typed_prefix() {
        let (cmds, mut cvars) = registry();
        cvars.register(&cmds, ConVar::new("sv_gravity", "800"));

        let completed = {
            let typed = String::from("sv_g");
            cvars.complete(&typed)
        };
        assert_eq!(completed, Some("sv_gravity"));
        let names: Vec<&str> = {
            let typed = String::from("sv");
            cvars.prefix_iter(&typed).map(ConVar::name).collect()
        };
        assert_eq!(names, ["sv_gravity"]);
    }

    #[test]
    fn test_set_callback_toggles_flag() {
        let (cmds, mut cvars) = registry();
        cvars.register(&cmds, ConVar::new("gamma", "1"));

        assert!(cvars.set_callback("gamma", Some(Box::new(|_| {}))));
        assert!(cvars.find("gamma").unwrap().get_flags().contains(ConVarFlags::CALLBACK));
        cvars.set_callback("gamma", None);
        assert!(!cvars.find("gamma").unwrap().has_callback());
        assert!(!cvars.set_callback("missing", None));
    }

    #[test]
    fn test_handle_command() {
        let (cmds, mut cvars) = registry();
        cvars.register(&cmds, ConVar::new("skill", "1"));

        let query = CommandArgs::new("skill", vec![], "", CmdSource::Console);
        assert!(cvars.handle_command(&query));
        assert_eq!(cvars.string("skill"), "1");

        let assign = CommandArgs::new("skill", vec!["3"], "3", CmdSource::Console);
        assert!(cvars.handle_command(&assign));
        assert_eq!(cvars.string("skill"), "3");

        let unknown = CommandArgs::new("nope", vec![], "", CmdSource::Console);
        assert!(!cvars.handle_command(&unknown));
    }

    #[test]
    fn test_write_variables() {
        let (cmds, mut cvars) = registry();
        cvars.register(&cmds, ConVar::new("volume", "0.7").flags(ConVarFlags::ARCHIVE));
        cvars.register(&cmds, ConVar::new("name", "player").flags(ConVarFlags::ARCHIVE | ConVarFlags::SETA));
        cvars.register(&cmds, ConVar::new("temp", "1").flags(ConVarFlags::USER_DEFINED));
        cvars.create(&cmds, "mine", "x").unwrap().flags_mut().insert(ConVarFlags::ARCHIVE);

        let mut out = Vec::new();
        cvars.write_variables(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "seta mine \"x\"\nseta name \"player\"\n"
        );
    }
}
