//! Console variable (ConVar) implementation.
//!
//! A ConVar holds a string value and a numeric value derived from it. The
//! numeric side is never set on its own: it is re-parsed on every change, and
//! text that is not a number reads as zero.

use std::fmt::{self, Display};

/// Flags controlling ConVar behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConVarFlags(u32);

impl ConVarFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// Value is saved to the config file.
    pub const ARCHIVE: Self = Self(1 << 0);

    /// Changes are announced to connected players.
    pub const NOTIFY: Self = Self(1 << 1);

    /// Sent to clients as part of the server info string.
    pub const SERVER_INFO: Self = Self(1 << 2);

    /// Sent to the server as part of the user info string.
    pub const USER_INFO: Self = Self(1 << 3);

    /// Value changed at least once after registration.
    pub const CHANGED: Self = Self(1 << 4);

    /// Read-only at runtime. Only the `*_rom` setters may change it.
    pub const ROM: Self = Self(1 << 5);

    /// Temporarily frozen by the engine.
    pub const LOCKED: Self = Self(1 << 6);

    /// Present in the registry.
    pub const REGISTERED: Self = Self(1 << 7);

    /// A change callback is installed.
    pub const CALLBACK: Self = Self(1 << 8);

    /// Created at runtime by `set`/`seta` rather than by engine code.
    pub const USER_DEFINED: Self = Self(1 << 9);

    /// Mirrored into game logic.
    pub const AUTO_CVAR: Self = Self(1 << 10);

    /// Created or last written by `seta`.
    pub const SETA: Self = Self(1 << 11);

    /// Check if all flags in `other` are set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any flag in `other` is set.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Combine two flag sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Remove flags.
    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Check if no flags are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set the given flags in place.
    #[inline]
    pub fn insert(&mut self, other: Self) {
        *self = self.union(other);
    }

    /// Clear the given flags in place.
    #[inline]
    pub fn remove(&mut self, other: Self) {
        *self = self.difference(other);
    }
}

impl std::ops::BitOr for ConVarFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for ConVarFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

/// Called after a ConVar's value changed.
pub type CvarCallback = Box<dyn Fn(&ConVar) + Send + Sync>;

/// Parse a cvar string as a number, reading anything unparsable as zero.
pub fn parse_value(s: &str) -> f64 {
    s.trim().parse().unwrap_or(0.0)
}

/// Format a number for storage in a cvar.
///
/// Values within 1e-4 of an integer are written without a fraction.
pub fn format_value(value: f64) -> String {
    let rounded = (value + 0.5) as i64;
    if (value - rounded as f64).abs() < 0.0001 {
        rounded.to_string()
    } else {
        value.to_string()
    }
}

/// A console variable.
///
/// # Examples
///
/// ```
/// use bevy_quake_console::core::{ConVar, ConVarFlags};
///
/// let fov = ConVar::new("fov", "90").flags(ConVarFlags::ARCHIVE);
/// assert_eq!(fov.string(), "90");
/// assert_eq!(fov.value(), 90.0);
/// ```
pub struct ConVar {
    name: Box<str>,
    string: String,
    value: f64,
    flags: ConVarFlags,
    default: String,
    callback: Option<CvarCallback>,
}

impl ConVar {
    /// Create a new ConVar with the given name and initial value.
    pub fn new(name: impl Into<Box<str>>, value: impl Into<String>) -> Self {
        let string = value.into();
        Self {
            name: name.into(),
            value: parse_value(&string),
            default: string.clone(),
            string,
            flags: ConVarFlags::NONE,
            callback: None,
        }
    }

    /// Set the flags.
    pub fn flags(mut self, flags: ConVarFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Install a change callback.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConVar) + Send + Sync + 'static,
    {
        self.set_callback(Some(Box::new(callback)));
        self
    }

    /// Get the name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current string value.
    #[inline]
    pub fn string(&self) -> &str {
        &self.string
    }

    /// Get the numeric value derived from the string.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Get the flags.
    #[inline]
    pub fn get_flags(&self) -> ConVarFlags {
        self.flags
    }

    /// Get the value assigned at registration.
    #[inline]
    pub fn default_string(&self) -> &str {
        &self.default
    }

    /// Check if the current value differs from default.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.string != self.default
    }

    /// Check if a change callback is installed.
    #[inline]
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn flags_mut(&mut self) -> &mut ConVarFlags {
        &mut self.flags
    }

    pub(crate) fn set_callback(&mut self, callback: Option<CvarCallback>) {
        if callback.is_some() {
            self.flags.insert(ConVarFlags::CALLBACK);
        } else {
            self.flags.remove(ConVarFlags::CALLBACK);
        }
        self.callback = callback;
    }

    /// Store the value that registration assigns, without side effects.
    pub(crate) fn register_value(&mut self) {
        self.flags.insert(ConVarFlags::REGISTERED);
        self.default = self.string.clone();
        self.value = parse_value(&self.string);
    }

    pub(crate) fn set_default(&mut self, value: &str) {
        self.default = value.to_string();
    }

    /// Assign a new value, ignoring ROM/LOCKED.
    ///
    /// Returns the previous string if the value changed. The callback runs
    /// only on a change. Filling an empty variable does not count as a change.
    pub(crate) fn assign(&mut self, value: &str) -> Option<String> {
        if self.string == value {
            return None;
        }

        if !self.string.is_empty() {
            self.flags.insert(ConVarFlags::CHANGED);
        }
        let old = std::mem::replace(&mut self.string, value.to_string());
        self.value = parse_value(&self.string);

        if let Some(callback) = &self.callback {
            callback(self);
        }
        Some(old)
    }
}

impl Display for ConVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" is \"{}\"", self.name, self.string)
    }
}

impl fmt::Debug for ConVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConVar")
            .field("name", &self.name)
            .field("string", &self.string)
            .field("value", &self.value)
            .field("flags", &self.flags)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_convar_basic() {
        let cvar = ConVar::new("sv_gravity", "800");
        assert_eq!(cvar.name(), "sv_gravity");
        assert_eq!(cvar.string(), "800");
        assert_eq!(cvar.value(), 800.0);
    }

    #[test]
    fn test_non_numeric_reads_as_zero() {
        let cvar = ConVar::new("hostname", "UNNAMED");
        assert_eq!(cvar.value(), 0.0);
    }

    #[test]
    fn test_assign_reports_change_once() {
        let mut cvar = ConVar::new("cl_warncmd", "1");
        cvar.register_value();

        assert_eq!(cvar.assign("0").as_deref(), Some("1"));
        assert_eq!(cvar.assign("0"), None);
        assert!(cvar.get_flags().contains(ConVarFlags::CHANGED));
        assert_eq!(cvar.value(), 0.0);
        assert!(cvar.is_modified());
    }

    #[test]
    fn test_callback_runs_after_store() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let mut cvar = ConVar::new("r_gamma", "1").callback(move |v| {
            assert_eq!(v.string(), "0.8");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(cvar.get_flags().contains(ConVarFlags::CALLBACK));

        cvar.assign("0.8");
        cvar.assign("0.8");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(3.0), "3");
        assert_eq!(format_value(2.99999), "3");
        assert_eq!(format_value(0.25), "0.25");
        assert_eq!(format_value(-1.0), "-1");
    }

    #[test]
    fn test_convar_flags() {
        let mut flags = ConVarFlags::ARCHIVE | ConVarFlags::NOTIFY;
        assert!(flags.contains(ConVarFlags::ARCHIVE));
        assert!(flags.intersects(ConVarFlags::NOTIFY | ConVarFlags::ROM));
        assert!(!flags.contains(ConVarFlags::ROM));

        flags.remove(ConVarFlags::ARCHIVE);
        assert!(!flags.contains(ConVarFlags::ARCHIVE));
        assert!(!flags.is_empty());
    }

    #[test]
    fn test_display() {
        let cvar = ConVar::new("skill", "1");
        assert_eq!(cvar.to_string(), "\"skill\" is \"1\"");
    }
}
