use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::config::InstallerConfig;
use crate::core::downloader::Downloader;
use crate::core::installer::Side;
use crate::core::progress::ProgressReporter;

/// Everything a loader plugin needs from the run it is bound to.
#[derive(Clone)]
pub struct LoaderContext {
    pub config: Arc<InstallerConfig>,
    pub downloader: Arc<Downloader>,
    pub progress: Arc<ProgressReporter>,
    pub cancel: CancellationToken,
    pub side: Side,
    pub minecraft_version: String,
    /// Final instance directory.
    pub root: PathBuf,
    /// Run-scoped temp directory.
    pub temp_dir: PathBuf,
    /// Mirror of `root` that FINALIZING moves into place. Loader output
    /// destined for the instance is written here.
    pub staging_dir: PathBuf,
}

impl LoaderContext {
    pub fn libraries_dir(&self) -> PathBuf {
        self.config.libraries_dir()
    }

    pub fn loaders_dir(&self) -> PathBuf {
        self.config.loaders_dir()
    }

    /// Where installer archives are unpacked for this run.
    pub fn installer_dir(&self) -> PathBuf {
        self.temp_dir.join("loader")
    }

    /// The vanilla game jar for the current side, in library layout.
    pub fn minecraft_jar(&self) -> PathBuf {
        let side = self.side.as_str();
        self.libraries_dir()
            .join("net")
            .join("minecraft")
            .join(side)
            .join(&self.minecraft_version)
            .join(format!("{}-{}.jar", side, self.minecraft_version))
    }
}
