//! Early config reading.
//!
//! Some cvars have to be known before the startup script runs. They are
//! picked out of the config file directly, one `name "value"` line at a time.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use bevy::prelude::*;

use super::{BoundedReader, FileSystem, HostParams, CONFIG_FILE};
use crate::core::{CmdLine, CvarRegistry};

/// An open config file.
#[derive(Debug)]
pub struct ConfigFile {
    reader: BoundedReader,
}

impl ConfigFile {
    /// Open `name` from the search path.
    pub fn open(fs: &FileSystem, name: &str) -> Option<Self> {
        fs.open_file(name).filter(|f| f.size > 0).map(|f| Self { reader: f.reader })
    }

    /// Open the user config.
    ///
    /// With `-multiuser`, `config.cfg` in the per-user directory comes before
    /// the search path.
    pub fn open_config(fs: &FileSystem, host: &HostParams, cmdline: &CmdLine) -> Option<Self> {
        if cmdline.multiuser()
            && let Some(dir) = &host.user_dir
            && let Ok(file) = File::open(dir.join(CONFIG_FILE))
            && let Ok(reader) = BoundedReader::from_file(file)
        {
            return Some(Self { reader });
        }
        Self::open(fs, CONFIG_FILE)
    }

    /// Read config text from any reader.
    pub fn from_reader(reader: BoundedReader) -> Self {
        Self { reader }
    }

    /// Set every whitelisted cvar that has a well-formed line.
    ///
    /// A line is used only if its first word is whitelisted and it ends with
    /// a `"`. Reading stops once every whitelisted name was seen. The file is
    /// rewound afterwards. Returns how many lines were applied.
    pub fn read_cvars(&mut self, cvars: &mut CvarRegistry, whitelist: &[String]) -> io::Result<usize> {
        if whitelist.is_empty() {
            return Ok(0);
        }

        let mut bytes = Vec::new();
        self.reader.read_to_end(&mut bytes)?;
        let text = String::from_utf8_lossy(&bytes);

        let mut found = 0;
        for line in text.lines() {
            let Some((name, value)) = parse_line(line) else {
                continue;
            };
            if !whitelist.iter().any(|w| w == name) {
                continue;
            }

            cvars.set(name, value);
            found += 1;
            if found == whitelist.len() {
                break;
            }
        }

        self.reader.seek(SeekFrom::Start(0))?;
        Ok(found)
    }
}

/// Split a `name "value"` line. Tabs count as spaces.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches('\r');
    let space = line.find([' ', '\t'])?;
    if space == 0 || !line.ends_with('"') {
        return None;
    }

    let name = &line[..space];
    let first_quote = line.find('"')?;
    let last_quote = line.len() - 1;
    if first_quote == last_quote {
        debug!("config: malformed line {:?}", line);
        return None;
    }

    Some((name, &line[first_quote + 1..last_quote]))
}

/// Apply `+name value` pairs from the command line to whitelisted cvars.
///
/// A value starting with `-` or `+` is taken as the next option and ignored.
pub fn read_cvar_overrides(cmdline: &CmdLine, cvars: &mut CvarRegistry, whitelist: &[String]) {
    for name in whitelist {
        let Some(index) = cmdline.check_param(&format!("+{name}")) else {
            continue;
        };
        let Some(value) = cmdline.arg(index + 1) else {
            continue;
        };
        if !value.starts_with(['-', '+']) {
            cvars.set(name, value);
        }
    }
}
