use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{InstallerError, InstallerResult};

const APP_DIR_NAME: &str = "ModpackInstaller";

/// Installer settings, persisted as JSON. Every field has a default so a
/// partial (or missing) file is always valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Root for shared state: libraries, loader installers, download cache, temp dirs.
    pub data_dir: PathBuf,
    /// Maximum number of parallel downloads.
    pub concurrency: usize,
    /// Attempts per download for transient network failures.
    pub max_attempts: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub user_agent: String,
    /// Java binary used to run loader processors.
    pub java_path: PathBuf,
    pub fabric_meta_url: String,
    pub legacy_fabric_meta_url: String,
    pub quilt_meta_url: String,
    pub forge_maven_url: String,
    pub neoforge_maven_url: String,
    /// Where the user's browser drops manually downloaded files.
    pub browser_downloads_dir: Option<PathBuf>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            concurrency: 8,
            max_attempts: 3,
            connect_timeout_secs: 15,
            read_timeout_secs: 30,
            user_agent: concat!("ModpackInstaller/", env!("CARGO_PKG_VERSION")).to_string(),
            java_path: PathBuf::from("java"),
            fabric_meta_url: "https://meta.fabricmc.net/v2".to_string(),
            legacy_fabric_meta_url: "https://meta.legacyfabric.net/v2".to_string(),
            quilt_meta_url: "https://meta.quiltmc.org/v3".to_string(),
            forge_maven_url: "https://maven.minecraftforge.net".to_string(),
            neoforge_maven_url: "https://maven.neoforged.net/releases".to_string(),
            browser_downloads_dir: dirs::download_dir(),
        }
    }
}

impl InstallerConfig {
    /// Load settings from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> InstallerResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| InstallerError::io(path, e))?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Settings rooted at `data_dir`, everything else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    /// Cached loader installer artifacts, shared across instances.
    pub fn loaders_dir(&self) -> PathBuf {
        self.data_dir.join("loaders")
    }

    /// Shared cache for mod files.
    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    pub fn temp_root(&self) -> PathBuf {
        self.data_dir.join("temp")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
