//! Console events for communication between layers.
//!
//! Events are the primary mechanism for:
//! - Front ends -> Core: Command input
//! - Core -> Systems: ConVar changes and game directory switches

use bevy::prelude::*;

/// Event sent when text is submitted to the console.
///
/// The text is appended to the command buffer and runs on the next update.
/// It may hold several lines, separated by `;` or newlines.
///
/// # Examples
///
/// ```ignore
/// fn submit_command(mut events: MessageWriter<ConsoleInputEvent>) {
///     events.write(ConsoleInputEvent::new("skill 2; map e1m1"));
/// }
/// ```
#[derive(Message, Debug, Clone)]
pub struct ConsoleInputEvent {
    /// The raw command text to execute.
    pub command: String,
}

impl ConsoleInputEvent {
    /// Create a new input event.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

/// Event sent when a ConVar value changes.
///
/// # Examples
///
/// ```ignore
/// fn on_gravity_change(mut events: MessageReader<ConVarChangedEvent>) {
///     for event in events.read() {
///         if &*event.name == "sv_gravity" {
///             info!("Gravity changed to {}", event.new_value);
///         }
///     }
/// }
/// ```
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct ConVarChangedEvent {
    /// The name of the ConVar that changed.
    pub name: Box<str>,
    /// The old value as a string.
    pub old_value: String,
    /// The new value as a string.
    pub new_value: String,
}

impl ConVarChangedEvent {
    /// Create a new change event.
    pub fn new(
        name: impl Into<Box<str>>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}

/// Event sent after the `game` command rebuilt the search path.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct GameDirChangedEvent {
    /// The new game directories, `;`-separated, without the base game.
    pub games: String,
}

/// Plugin that registers all console events.
pub struct ConsoleEventsPlugin;

impl Plugin for ConsoleEventsPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<ConsoleInputEvent>()
            .add_message::<ConVarChangedEvent>()
            .add_message::<GameDirChangedEvent>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_input_event() {
        let event = ConsoleInputEvent::new("sv_cheats 1");
        assert_eq!(event.command, "sv_cheats 1");
    }

    #[test]
    fn test_convar_changed_event() {
        let event = ConVarChangedEvent::new("sv_gravity", "800", "1000");
        assert_eq!(&*event.name, "sv_gravity");
        assert_eq!(event.old_value, "800");
        assert_eq!(event.new_value, "1000");
    }
}
