//! Virtual file system.
//!
//! Files are resolved through a stack of search paths. Each game directory
//! contributes a directory layer followed by its `pak0.pak`, `pak1.pak`, ...
//! archives; the most recently added layer wins.

mod config;
mod pack;
mod reader;

pub use config::{read_cvar_overrides, ConfigFile};
pub use pack::{crc16, Pack, PackEntry, PackError, MAX_FILES_IN_PACK, PAK0_CRCS, PAK0_FILE_COUNT};
pub use reader::{shared, BoundedReader, ReadSeek, SharedStream};

#[cfg(test)]
pub(crate) use pack::build_pack;

use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bevy::prelude::*;
use thiserror::Error;

use crate::core::CmdLine;

/// The game directory that is always loaded.
pub const BASE_GAME: &str = "id1";

/// The file name treated as the user configuration.
pub const CONFIG_FILE: &str = "config.cfg";

/// Host configuration.
#[derive(Resource, Debug, Clone)]
pub struct HostParams {
    /// Directory holding the game directories.
    pub base_dir: PathBuf,
    /// Writable per-user directory. When set and different from `base_dir`,
    /// every game directory gets a second layer here.
    pub user_dir: Option<PathBuf>,
    /// Brotli-compressed archive shipped with the engine.
    pub embedded_pak: Option<Arc<[u8]>>,
    /// File probed before `config.cfg` in each directory layer.
    pub config_override: String,
    /// Script queued once startup finishes.
    pub startup_script: String,
    /// Cvars read from the config file before the startup script runs.
    pub early_cvars: Vec<String>,
}

impl Default for HostParams {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            user_dir: None,
            embedded_pak: None,
            config_override: "engine.cfg".to_string(),
            startup_script: "quake.rc".to_string(),
            early_cvars: Vec::new(),
        }
    }
}

/// Errors that stop the file system from being trusted.
#[derive(Debug, Error)]
pub enum FsError {
    /// `-basedir` was given without a usable directory.
    #[error("bad argument to -basedir")]
    BadBaseDir,

    /// A game directory name contained a separator or other forbidden text.
    #[error("gamedir should be a single directory name, not a path: \"{0}\"")]
    ForbiddenGameDir(String),

    /// Every bit of the search path id is taken.
    #[error("too many game directories, can't add \"{0}\"")]
    TooManyGameDirs(String),

    /// An archive failed validation.
    #[error(transparent)]
    Pack(#[from] PackError),

    /// The per-user game directory could not be created.
    #[error("unable to create directory {path}: {error}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        error: io::Error,
    },

    /// The embedded archive failed to decompress.
    #[error("error extracting embedded pak: {0}")]
    Embedded(io::Error),

    /// Modified games need the registered data.
    #[error(
        "you must have the registered version to use modified games; basedir is {base_dir}, \
         check that it has an id1 subdirectory containing pak0.pak and pak1.pak, \
         or use -basedir to specify another directory"
    )]
    SharewareModified {
        /// The base directory that was searched.
        base_dir: PathBuf,
    },
}

/// Check a game directory name for separators, traversal and command syntax.
pub fn forbidden_game_dir(name: &str) -> bool {
    name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\', std::path::MAIN_SEPARATOR, ':', '"', ';'])
}

/// Check for names that would leave a search directory when joined to it.
pub fn rooted_name(name: &str) -> bool {
    let path = Path::new(name);
    path.has_root() || path.is_absolute() || name.starts_with(['/', '\\']) || name.contains(':')
}

/// Mission pack selected by the active game directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mission {
    /// No mission pack.
    #[default]
    Standard,
    /// `rogue`
    Rogue,
    /// `hipnotic` or `quoth`
    Hipnotic,
}

/// What a search path layer reads from.
#[derive(Debug)]
pub enum SearchKind {
    /// A directory on disk.
    Directory(PathBuf),
    /// A parsed archive.
    Pack(Pack),
}

/// One layer of the search path.
#[derive(Debug)]
pub struct SearchPath {
    id: u32,
    game: String,
    kind: SearchKind,
}

impl SearchPath {
    /// Priority id. Each game directory gets the next power of two.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Game directory this layer belongs to.
    #[inline]
    pub fn game(&self) -> &str {
        &self.game
    }

    /// Directory or archive.
    #[inline]
    pub fn kind(&self) -> &SearchKind {
        &self.kind
    }
}

/// A file found on the search path, opened for reading.
#[derive(Debug)]
pub struct OpenedFile {
    /// File size in bytes.
    pub size: u64,
    /// Id of the layer that held the file.
    pub path_id: u32,
    /// Reader over the file contents.
    pub reader: BoundedReader,
}

enum Found<'a> {
    Entry(&'a Pack, &'a PackEntry),
    File(PathBuf),
}

/// Layered, read-only file system.
#[derive(Resource)]
pub struct FileSystem {
    base_dir: PathBuf,
    user_dir: Option<PathBuf>,
    game_dir: PathBuf,
    game_names: String,
    layers: Vec<SearchPath>,
    base_layers: usize,
    modified: bool,
    registered: bool,
    fitz: bool,
    mission: Mission,
    config_override: String,
    embedded: Option<Arc<[u8]>>,
    embedded_pak: Option<Arc<[u8]>>,
}

impl FileSystem {
    /// Build the search path from host parameters and the command line.
    ///
    /// Honors `-basedir`, `-basegame`, `-rogue`/`-hipnotic`/`-quoth`, `-game`
    /// and `-fitz`, then checks for the registered game data.
    pub fn init(host: &HostParams, cmdline: &CmdLine) -> Result<Self, FsError> {
        let basedir_index = cmdline.check_param("-basedir");
        let base_dir = match basedir_index {
            Some(i) if i + 1 < cmdline.args().len() => PathBuf::from(cmdline.arg(i + 1).unwrap_or_default()),
            _ => host.base_dir.clone(),
        };
        if base_dir.as_os_str().is_empty() {
            return Err(FsError::BadBaseDir);
        }

        let user_dir = host.user_dir.clone().filter(|dir| *dir != host.base_dir);

        let mut fs = Self {
            game_dir: base_dir.join(BASE_GAME),
            base_dir,
            user_dir,
            game_names: String::new(),
            layers: Vec::new(),
            base_layers: 0,
            modified: false,
            registered: true,
            fitz: cmdline.fitz(),
            mission: Mission::Standard,
            config_override: host.config_override.clone(),
            embedded: host.embedded_pak.clone(),
            embedded_pak: None,
        };

        let args = cmdline.args().len();
        let mut index = cmdline.check_param_next(basedir_index.unwrap_or(0), "-basegame");
        if index.is_some() {
            fs.modified = true;
            while let Some(i) = index.filter(|i| i + 1 < args) {
                let dir = cmdline.arg(i + 1).unwrap_or_default();
                if forbidden_game_dir(dir) {
                    return Err(FsError::ForbiddenGameDir(dir.to_string()));
                }
                fs.add_game_directory(dir)?;
                index = cmdline.check_param_next(i, "-basegame");
            }
        } else {
            fs.add_game_directory(BASE_GAME)?;
        }

        fs.base_layers = fs.layers.len();
        fs.reset_game_directories("")?;

        if cmdline.rogue() {
            fs.add_game_directory("rogue")?;
        } else if cmdline.check_param("-hipnotic").is_some() {
            fs.add_game_directory("hipnotic")?;
        } else if cmdline.check_param("-quoth").is_some() {
            fs.add_game_directory("quoth")?;
        }

        let mut index = cmdline.check_param("-game");
        while let Some(i) = index.filter(|i| i + 1 < args) {
            let dir = cmdline.arg(i + 1).unwrap_or_default();
            if forbidden_game_dir(dir) {
                return Err(FsError::ForbiddenGameDir(dir.to_string()));
            }
            fs.modified = true;
            fs.add_game_directory(dir)?;
            index = cmdline.check_param_next(i, "-game");
        }

        fs.check_registered()?;
        Ok(fs)
    }

    fn check_registered(&mut self) -> Result<(), FsError> {
        self.registered = self.find("gfx/pop.lmp").is_some_and(|(size, _, _)| size > 0);

        if !self.registered {
            info!("Playing shareware version.");
            if self.modified {
                return Err(FsError::SharewareModified {
                    base_dir: self.base_dir.clone(),
                });
            }
        } else {
            info!("Playing registered version.");
        }
        Ok(())
    }

    fn embedded_pak(&mut self) -> Result<Option<Arc<[u8]>>, FsError> {
        let Some(compressed) = &self.embedded else {
            return Ok(None);
        };

        if self.embedded_pak.is_none() {
            let mut out = Vec::new();
            brotli::BrotliDecompress(&mut Cursor::new(compressed.as_ref()), &mut out).map_err(FsError::Embedded)?;
            self.embedded_pak = Some(out.into());
        }
        Ok(self.embedded_pak.clone())
    }

    fn add_path(&mut self, id: u32, game: &str, dir: &Path) -> Result<(), FsError> {
        self.layers.push(SearchPath {
            id,
            game: game.to_string(),
            kind: SearchKind::Directory(dir.to_path_buf()),
        });

        for index in 0.. {
            let path = dir.join(format!("pak{index}.pak"));
            if !path.is_file() {
                break;
            }

            let pack = Pack::open_path(&path)?;
            let loaded = pack.is_some();
            if let Some(pack) = pack {
                self.modified |= !pack.is_stock();
                self.layers.push(SearchPath {
                    id,
                    game: game.to_string(),
                    kind: SearchKind::Pack(pack),
                });
            }

            if index == 0
                && id == 1
                && !self.fitz
                && let Some(bytes) = self.embedded_pak()?
            {
                // The engine's own archive never marks the game as modified.
                if let Some(pack) = Pack::load("embedded.pak", Cursor::new(bytes))? {
                    self.layers.push(SearchPath {
                        id,
                        game: game.to_string(),
                        kind: SearchKind::Pack(pack),
                    });
                }
            }

            if !loaded {
                break;
            }
        }
        Ok(())
    }

    /// Add a game directory (and its archives) on top of the search path.
    pub fn add_game_directory(&mut self, dir: &str) -> Result<(), FsError> {
        if forbidden_game_dir(dir) {
            return Err(FsError::ForbiddenGameDir(dir.to_string()));
        }

        let id = match self.layers.last() {
            Some(top) => top.id.checked_mul(2).ok_or_else(|| FsError::TooManyGameDirs(dir.to_string()))?,
            None => 1,
        };

        if !self.game_names.is_empty() {
            self.game_names.push(';');
        }
        self.game_names.push_str(dir);

        match dir {
            "rogue" => self.mission = Mission::Rogue,
            "hipnotic" | "quoth" => self.mission = Mission::Hipnotic,
            _ => {}
        }

        self.game_dir = self.base_dir.join(dir);
        let game_dir = self.game_dir.clone();
        self.add_path(id, dir, &game_dir)?;

        if let Some(user_dir) = self.user_dir.clone() {
            self.game_dir = user_dir.join(dir);
            std::fs::create_dir_all(&self.game_dir).map_err(|error| FsError::CreateDir {
                path: self.game_dir.clone(),
                error,
            })?;
            let game_dir = self.game_dir.clone();
            self.add_path(id, dir, &game_dir)?;
        }
        Ok(())
    }

    /// Drop every layer above the base game and load `games` instead.
    ///
    /// `games` is `;`-separated. The base game and repeated names are skipped.
    pub fn reset_game_directories(&mut self, games: &str) -> Result<(), FsError> {
        self.layers.truncate(self.base_layers);
        self.mission = Mission::Standard;
        self.game_names.clear();
        self.game_dir = self.user_dir.as_deref().unwrap_or(&self.base_dir).join(BASE_GAME);

        let segments: Vec<&str> = games.split(';').collect();
        for (index, game) in segments.iter().enumerate() {
            if game.is_empty() || *game == BASE_GAME || segments[..index].contains(game) {
                continue;
            }
            self.add_game_directory(game)?;
        }
        Ok(())
    }

    fn find(&self, name: &str) -> Option<(u64, u32, Found<'_>)> {
        if rooted_name(name) {
            warn!("refusing to look up rooted file name \"{}\"", name);
            return None;
        }
        let nested = name.contains(['/', '\\']);

        for layer in self.layers.iter().rev() {
            match &layer.kind {
                SearchKind::Pack(pack) => {
                    if let Some(entry) = pack.find(name) {
                        return Some((entry.len().into(), layer.id, Found::Entry(pack, entry)));
                    }
                }
                SearchKind::Directory(_) if !self.registered && nested => continue,
                SearchKind::Directory(dir) => {
                    let mut candidates = Vec::with_capacity(2);
                    if name == CONFIG_FILE {
                        candidates.push(dir.join(&self.config_override));
                    }
                    candidates.push(dir.join(name));

                    for path in candidates {
                        if let Ok(meta) = std::fs::metadata(&path)
                            && meta.is_file()
                        {
                            return Some((meta.len(), layer.id, Found::File(path)));
                        }
                    }
                }
            }
        }
        None
    }

    /// Check if a non-empty file with this name exists on the search path.
    pub fn file_exists(&self, name: &str) -> bool {
        self.find(name).is_some_and(|(size, _, _)| size > 0)
    }

    /// Open a file from the highest-priority layer that has it.
    pub fn open_file(&self, name: &str) -> Option<OpenedFile> {
        let (size, path_id, found) = self.find(name)?;

        let reader = match found {
            Found::Entry(pack, entry) => pack.open(entry),
            Found::File(path) => std::fs::File::open(&path).and_then(BoundedReader::from_file),
        };

        match reader {
            Ok(reader) => Some(OpenedFile { size, path_id, reader }),
            Err(error) => {
                warn!("couldn't open {}: {}", name, error);
                None
            }
        }
    }

    /// Read a whole file from the search path.
    ///
    /// Empty files read as missing.
    pub fn load_file(&self, name: &str) -> Option<Vec<u8>> {
        let mut file = self.open_file(name).filter(|f| f.size > 0)?;
        let mut data = Vec::with_capacity(file.size as usize);
        match file.reader.read_to_end(&mut data) {
            Ok(_) => Some(data),
            Err(error) => {
                warn!("couldn't read {}: {}", name, error);
                None
            }
        }
    }

    /// Active game directories, `;`-separated. With `full`, the base game
    /// comes first.
    pub fn game_names(&self, full: bool) -> String {
        match (full, self.game_names.is_empty()) {
            (false, _) => self.game_names.clone(),
            (true, true) => BASE_GAME.to_string(),
            (true, false) => format!("{};{}", BASE_GAME, self.game_names),
        }
    }

    /// Search path layers, highest priority first.
    pub fn search_paths(&self) -> impl Iterator<Item = &SearchPath> {
        self.layers.iter().rev()
    }

    /// Directory that receives written files for the current game.
    #[inline]
    pub fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    /// Resolved base directory.
    #[inline]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Whether non-stock content is loaded.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Mark the game as modified.
    pub fn set_modified(&mut self) {
        self.modified = true;
    }

    /// Whether the registered game data was found.
    #[inline]
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// The active mission pack.
    #[inline]
    pub fn mission(&self) -> Mission {
        self.mission
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("base_dir", &self.base_dir)
            .field("game_dir", &self.game_dir)
            .field("game_names", &self.game_names)
            .field("layers", &self.layers.len())
            .field("modified", &self.modified)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}
