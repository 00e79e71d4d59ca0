// ─── Installer ───
// The state machine that drives one install run:
//   CREATED → BACKING_UP → RESOLVING → DOWNLOADING → INSTALLING_LOADER
//   → FINALIZING → COMPLETED   (or FAILED / CANCELLED from any phase)

mod failure;
mod options;
mod pipeline;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::config::InstallerConfig;
use crate::core::downloader::Downloader;
use crate::core::error::InstallerResult;
use crate::core::http::CredentialProvider;
use crate::core::progress::{ProgressSink, TracingProgress};

pub use failure::{FailureSummary, InstallFailure};
pub use options::{InstallOptions, PackFile, PackManifest, Side};
pub use pipeline::{InstallReport, InstanceInstaller};
pub use state::InstallState;

/// Shared collaborators for install runs. Replaces process-wide managers.
#[derive(Clone)]
pub struct InstallerContext {
    pub config: Arc<InstallerConfig>,
    pub downloader: Arc<Downloader>,
    pub progress: Arc<dyn ProgressSink>,
}

impl InstallerContext {
    pub fn new(config: InstallerConfig) -> InstallerResult<Self> {
        let downloader = Downloader::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            downloader: Arc::new(downloader),
            progress: Arc::new(TracingProgress),
        })
    }

    /// Rebuild the downloader so gated mirrors receive `credentials`' token.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> InstallerResult<Self> {
        self.downloader = Arc::new(Downloader::new(&self.config)?.with_credentials(credentials));
        Ok(self)
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }
}

/// Directories one run reads and writes.
#[derive(Debug, Clone)]
pub struct InstallerPaths {
    pub root: PathBuf,
    /// Run-scoped, removed on every terminal state.
    pub temp: PathBuf,
    /// Mirror of the instance layout, moved into `root` when finalizing.
    pub staging: PathBuf,
    pub backup: PathBuf,
    pub mods: PathBuf,
    pub config: PathBuf,
}

impl InstallerPaths {
    pub fn new(root: PathBuf, temp: PathBuf) -> Self {
        Self {
            staging: temp.join("staging"),
            backup: temp.join("backup"),
            mods: root.join("mods"),
            config: root.join("config"),
            root,
            temp,
        }
    }
}
