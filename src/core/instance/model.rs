use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::installer::Side;
use crate::core::loaders::{LaunchArguments, LoaderVersion};
use crate::core::mods::{Mod, ModType};

/// File name of the persisted metadata inside an instance root.
pub const METADATA_FILE: &str = "instance.json";

/// One file placed into the instance by an install.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledMod {
    pub name: String,
    pub version: String,
    /// Relative to the instance root.
    pub file: PathBuf,
    pub mod_type: ModType,
    pub optional: bool,
}

impl From<&Mod> for InstalledMod {
    fn from(m: &Mod) -> Self {
        Self {
            name: m.name.clone(),
            version: m.version.clone(),
            file: m.relative_path(),
            mod_type: m.mod_type,
            optional: m.optional,
        }
    }
}

/// What an install produced, persisted as `instance.json` so that later
/// updates and reinstalls know what is already there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub name: String,
    pub minecraft_version: String,
    pub side: Side,
    pub loader: Option<LoaderVersion>,
    pub main_class: Option<String>,
    #[serde(default)]
    pub arguments: LaunchArguments,
    /// Library paths relative to the shared libraries directory.
    #[serde(default)]
    pub libraries: Vec<PathBuf>,
    #[serde(default)]
    pub mods: Vec<InstalledMod>,
    pub installed_at: DateTime<Utc>,
}

impl InstanceMetadata {
    pub fn new(name: impl Into<String>, minecraft_version: impl Into<String>, side: Side) -> Self {
        Self {
            name: name.into(),
            minecraft_version: minecraft_version.into(),
            side,
            loader: None,
            main_class: None,
            arguments: LaunchArguments::default(),
            libraries: Vec::new(),
            mods: Vec::new(),
            installed_at: Utc::now(),
        }
    }
}
