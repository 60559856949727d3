//! Process command line.

use bevy::prelude::*;

/// Maximum number of arguments kept from the process command line.
pub const MAX_CMDLINE_ARGS: usize = 50;

/// Maximum length of the joined command line.
pub const MAX_CMDLINE_LEN: usize = 256;

/// Arguments the engine was started with.
///
/// Argument 0 is the program name and is never matched by
/// [`CmdLine::check_param`].
#[derive(Resource, Debug, Clone, Default)]
pub struct CmdLine {
    args: Vec<String>,
    joined: String,
    safe: bool,
    rogue: bool,
    hipnotic: bool,
    standard: bool,
}

impl CmdLine {
    /// Build from an argument list, capping the count and total length.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut line = Self {
            standard: true,
            ..Self::default()
        };
        let mut remaining = MAX_CMDLINE_LEN;

        for arg in args.into_iter().take(MAX_CMDLINE_ARGS) {
            let mut arg: String = arg.into();
            let truncated = arg.len() > remaining;
            if truncated {
                let mut cut = remaining;
                while !arg.is_char_boundary(cut) {
                    cut -= 1;
                }
                arg.truncate(cut);
            }

            if arg == "-safe" {
                line.safe = true;
            }

            remaining -= arg.len();
            line.joined.push_str(&arg);
            line.args.push(arg);

            if truncated || remaining == 0 {
                break;
            }
            line.joined.push(' ');
            remaining -= 1;
        }

        line.joined.truncate(line.joined.trim_end_matches(' ').len());

        if line.check_param("-rogue").is_some() {
            line.rogue = true;
            line.standard = false;
        }
        if line.check_param("-hipnotic").is_some() || line.check_param("-quoth").is_some() {
            line.hipnotic = true;
            line.standard = false;
        }

        line
    }

    /// Build from the current process arguments.
    pub fn from_env() -> Self {
        Self::new(std::env::args())
    }

    /// Index of the first argument equal to `param`.
    pub fn check_param(&self, param: &str) -> Option<usize> {
        self.check_param_next(0, param)
    }

    /// Index of the first argument equal to `param` after index `last`.
    pub fn check_param_next(&self, last: usize, param: &str) -> Option<usize> {
        self.args
            .iter()
            .enumerate()
            .skip(last + 1)
            .find(|(_, a)| *a == param)
            .map(|(i, _)| i)
    }

    /// The argument following `param`, if both are present.
    pub fn param_value(&self, param: &str) -> Option<&str> {
        self.check_param(param).and_then(|i| self.arg(i + 1))
    }

    /// Get an argument by index.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// All kept arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The kept arguments joined with single spaces.
    pub fn as_str(&self) -> &str {
        &self.joined
    }

    /// `-safe` was given.
    pub fn safe_mode(&self) -> bool {
        self.safe
    }

    /// `-rogue` was given.
    pub fn rogue(&self) -> bool {
        self.rogue
    }

    /// `-hipnotic` or `-quoth` was given.
    pub fn hipnotic(&self) -> bool {
        self.hipnotic
    }

    /// No mission pack was selected.
    pub fn standard_quake(&self) -> bool {
        self.standard
    }

    /// `-dedicated` was given.
    pub fn dedicated(&self) -> bool {
        self.check_param("-dedicated").is_some()
    }

    /// `-multiuser` was given.
    pub fn multiuser(&self) -> bool {
        self.check_param("-multiuser").is_some()
    }

    /// `-fitz` was given.
    pub fn fitz(&self) -> bool {
        self.check_param("-fitz").is_some()
    }

    /// `-validation` was given.
    pub fn validation(&self) -> bool {
        self.check_param("-validation").is_some()
    }

    /// Commands introduced by `+` on the command line, separated by `; `.
    ///
    /// A `+` run ends at the next argument starting with `-`.
    pub fn stuffed_commands(&self) -> String {
        stuffed_commands(&self.joined)
    }
}

/// Collect the `+command args` runs of a joined command line.
pub fn stuffed_commands(cmdline: &str) -> String {
    let mut out = String::new();
    let mut plus = false;
    let mut prev = ' ';

    for c in cmdline.chars() {
        if c == '+' {
            plus = true;
            if out.pop().is_some() {
                out.push_str("; ");
            }
        } else if c == '-' && prev == ' ' {
            plus = false;
        } else if plus {
            out.push(c);
        }
        prev = c;
    }

    out.truncate(out.trim_end().len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_param_skips_program_name() {
        let line = CmdLine::new(["-game", "-game", "rogue"]);
        assert_eq!(line.check_param("-game"), Some(1));
        assert_eq!(line.check_param_next(1, "-game"), None);
        assert_eq!(line.check_param("rogue"), Some(2));
        assert_eq!(line.param_value("-game"), Some("rogue"));
    }

    #[test]
    fn test_mission_pack_flags() {
        let line = CmdLine::new(["quake", "-quoth"]);
        assert!(line.hipnotic());
        assert!(!line.standard_quake());

        let line = CmdLine::new(["quake", "-safe"]);
        assert!(line.safe_mode());
        assert!(line.standard_quake());
    }

    #[test]
    fn test_limits() {
        let many: Vec<String> = (0..80).map(|i| format!("a{i}")).collect();
        assert_eq!(CmdLine::new(many).args().len(), MAX_CMDLINE_ARGS);

        let long = CmdLine::new(["quake", "x".repeat(400).as_str()]);
        assert_eq!(long.as_str().len(), MAX_CMDLINE_LEN);
    }

    #[test]
    fn test_joined() {
        let line = CmdLine::new(["quake", "-dedicated", "+map", "e1m1"]);
        assert_eq!(line.as_str(), "quake -dedicated +map e1m1");
        assert!(line.dedicated());
        assert!(!line.fitz());
    }

    #[test]
    fn test_stuffed_commands() {
        assert_eq!(stuffed_commands("quake +map e1m1 +skill 2"), "map e1m1; skill 2");
        assert_eq!(stuffed_commands("quake +map e1m1 -game hipnotic"), "map e1m1");
        assert_eq!(stuffed_commands("quake +sv_gravity -100"), "sv_gravity");
        assert_eq!(stuffed_commands("quake -safe"), "");
    }
}
