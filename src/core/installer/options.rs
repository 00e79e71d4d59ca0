use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::library::{LibraryDeclaration, Platform};
use crate::core::loaders::{LoaderRequest, MultiMcComponent};
use crate::core::mods::{ManifestMod, OptionalSelection};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Client,
    Server,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote file the pack ships besides its mods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackFile {
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// A pack, already deserialized from its source format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackManifest {
    pub minecraft_version: String,
    pub loader: Option<LoaderRequest>,
    /// MultiMC packs describe the game and loader as components instead.
    pub components: Vec<MultiMcComponent>,
    /// The vanilla game jar for the side being installed.
    pub game_jar: Option<PackFile>,
    pub libraries: Vec<LibraryDeclaration>,
    pub mods: Vec<ManifestMod>,
    /// Zip of config files unpacked over the instance root.
    pub configs: Option<PackFile>,
}

/// Per-run choices made by the caller.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub name: String,
    /// Final instance directory.
    pub root: PathBuf,
    pub side: Side,
    pub selection: OptionalSelection,
    pub platform: Platform,
}

impl InstallOptions {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, side: Side) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            side,
            selection: OptionalSelection::All,
            platform: Platform::current(),
        }
    }

    pub fn with_selection(mut self, selection: OptionalSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}
