pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::config::InstallerConfig;
pub use crate::core::error::{InstallerError, InstallerResult};
pub use crate::core::installer::{
    FailureSummary, InstallFailure, InstallOptions, InstallReport, InstallState, InstallerContext,
    InstanceInstaller, PackManifest, Side,
};
pub use crate::core::progress::{ProgressEvent, ProgressSink};

/// Install the structured logging subscriber. `RUST_LOG` overrides the default
/// filter. Calling it again is harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,modpack_installer=debug")),
        )
        .try_init();
}
