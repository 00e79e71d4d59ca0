use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, warn};

use modpack_installer::core::mods::OptionalSelection;
use modpack_installer::core::progress::TracingProgress;
use modpack_installer::{
    init_logging, InstallOptions, InstallerConfig, InstallerContext, InstanceInstaller, PackManifest,
    Side,
};

/// One install, as handed over by a launcher front end.
#[derive(Debug, Deserialize)]
struct InstallPlan {
    name: String,
    root: PathBuf,
    #[serde(default)]
    side: Side,
    #[serde(default)]
    selection: OptionalSelection,
    manifest: PackManifest,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let mut args = std::env::args().skip(1);
    let Some(plan_path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: modpack-install <plan.json> [config.json]");
        return ExitCode::from(2);
    };
    let config_path = args.next().map(PathBuf::from);

    match run(plan_path, config_path).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    plan_path: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => InstallerConfig::load(&path)?,
        None => InstallerConfig::default(),
    };
    let plan: InstallPlan = serde_json::from_str(&tokio::fs::read_to_string(&plan_path).await?)?;

    let ctx = InstallerContext::new(config)?.with_progress(Arc::new(TracingProgress));
    let options = InstallOptions::new(plan.name, plan.root, plan.side).with_selection(plan.selection);
    let installer = InstanceInstaller::new(ctx, options, plan.manifest);

    let cancel = installer.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling install");
            cancel.cancel();
        }
    });

    match installer.install().await {
        Ok(report) => {
            info!(
                "Done: {} mod(s), {} of {} bytes",
                report.metadata.mods.len(),
                report.bytes_downloaded,
                report.bytes_total
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) if failure.is_cancelled() => Ok(ExitCode::from(130)),
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.summary())?);
            Ok(ExitCode::FAILURE)
        }
    }
}
