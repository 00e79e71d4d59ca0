use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::failure::InstallFailure;
use super::options::{InstallOptions, PackManifest, Side};
use super::state::InstallState;
use super::{InstallerContext, InstallerPaths};
use crate::core::backup;
use crate::core::downloader::{Download, DownloadOutcome};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::fs;
use crate::core::hashing::{hash_bytes, Checksum, HashAlgorithm};
use crate::core::instance::{InstalledMod, InstanceMetadata, InstanceStore};
use crate::core::library::{Library, LibraryResolver};
use crate::core::loaders::{convert_components, Loader, LoaderContext, LoaderRequest};
use crate::core::mods::{DownloadType, Mod, ModResolver, ModType};
use crate::core::progress::ProgressReporter;

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub metadata: InstanceMetadata,
    pub fetched_files: usize,
    pub cache_hits: usize,
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
}

/// Everything RESOLVING decided.
struct Plan {
    minecraft_version: String,
    loader: Option<Loader>,
    mods: Vec<Mod>,
    libraries: Vec<Library>,
    downloads: Vec<Download>,
    /// Browser-only mods and where the browser saved them.
    browser: Vec<(PathBuf, Mod)>,
    /// Natives jars to unpack for the client.
    natives: Vec<PathBuf>,
    /// The pack's configs archive, once downloaded.
    configs: Option<PathBuf>,
}

/// Drives one install of a pack into one instance directory.
///
/// A run owns its temp directory exclusively. Callers must not start two
/// runs against the same instance root at once.
pub struct InstanceInstaller {
    ctx: InstallerContext,
    options: InstallOptions,
    manifest: PackManifest,
    paths: InstallerPaths,
    progress: Arc<ProgressReporter>,
    cancel: CancellationToken,
    state: Mutex<InstallState>,
}

impl InstanceInstaller {
    pub fn new(ctx: InstallerContext, options: InstallOptions, manifest: PackManifest) -> Self {
        let temp = ctx.config.temp_root().join(Uuid::new_v4().to_string());
        let paths = InstallerPaths::new(options.root.clone(), temp);
        let progress = Arc::new(ProgressReporter::new(ctx.progress.clone()));

        Self {
            ctx,
            options,
            manifest,
            paths,
            progress,
            cancel: CancellationToken::new(),
            state: Mutex::new(InstallState::Created),
        }
    }

    /// Cancelling this token stops the run at the next safe point.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> InstallState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn paths(&self) -> &InstallerPaths {
        &self.paths
    }

    pub fn total_bytes(&self) -> u64 {
        self.progress.total()
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.progress.downloaded()
    }

    /// Run the whole pipeline. The temp directory is removed whatever the outcome,
    /// and instance metadata is only written by a run that reaches its end.
    pub async fn install(&self) -> Result<InstallReport, InstallFailure> {
        if self.state() != InstallState::Created {
            return Err(InstallFailure {
                phase: self.state(),
                error: InstallerError::Other("installer has already run".into()),
            });
        }

        info!(
            "Installing '{}' ({}) into {:?}",
            self.options.name, self.options.side, self.paths.root
        );

        let result = self.run().await;
        self.cleanup().await;

        match result {
            Ok(report) => {
                self.enter(InstallState::Completed, "Install complete");
                info!(
                    "Installed '{}': {} file(s) fetched, {} cache hit(s), {} bytes",
                    self.options.name, report.fetched_files, report.cache_hits, report.bytes_downloaded
                );
                Ok(report)
            }
            Err(error) => {
                let failure = InstallFailure {
                    phase: self.state(),
                    error,
                };
                if failure.is_cancelled() {
                    warn!("Install of '{}' cancelled while {}", self.options.name, failure.phase);
                } else {
                    error!("Install of '{}' failed: {}", self.options.name, failure);
                }
                self.enter(failure.final_state(), failure.summary().cause);
                Err(failure)
            }
        }
    }

    // ── Phases ──────────────────────────────────────────

    async fn run(&self) -> InstallerResult<InstallReport> {
        self.checkpoint()?;
        tokio::fs::create_dir_all(&self.paths.temp)
            .await
            .map_err(|e| InstallerError::io(&self.paths.temp, e))?;

        let store = InstanceStore::new(&self.paths.root);
        let previous = store.load().await?;

        if previous.is_some() {
            self.enter(InstallState::BackingUp, "Backing up user files");
            let paths = self.paths.clone();
            tokio::task::spawn_blocking(move || backup::backup_all(&paths)).await??;
            self.checkpoint()?;
        }

        self.enter(InstallState::Resolving, "Resolving pack");
        let mut plan = self.resolve().await?;
        self.checkpoint()?;

        self.enter(InstallState::Downloading, "Downloading files");
        let (fetched_files, cache_hits) = self.download(&mut plan).await?;
        self.checkpoint()?;

        if let Some(loader) = &plan.loader {
            self.enter(InstallState::InstallingLoader, "Installing loader");
            loader.run_processors().await?;
            self.checkpoint()?;
        }

        self.enter(InstallState::Finalizing, "Finalizing instance");
        let metadata = self.finalize(&store, previous.as_ref(), &plan).await?;

        Ok(InstallReport {
            metadata,
            fetched_files,
            cache_hits,
            bytes_downloaded: self.progress.downloaded(),
            bytes_total: self.progress.total(),
        })
    }

    async fn resolve(&self) -> InstallerResult<Plan> {
        let (minecraft_version, request) = if self.manifest.components.is_empty() {
            (
                self.manifest.minecraft_version.clone(),
                self.manifest.loader.clone(),
            )
        } else {
            convert_components(&self.manifest.components)?
        };
        if minecraft_version.is_empty() {
            return Err(InstallerError::ManifestResolution(
                "pack does not name a Minecraft version".into(),
            ));
        }

        let mod_resolver = ModResolver::new(self.ctx.config.browser_downloads_dir.clone());
        let mods = mod_resolver.resolve(
            &self.manifest.mods,
            self.options.side,
            &self.options.selection,
        )?;
        info!("Resolved {} mod(s) for {}", mods.len(), self.options.side);

        let loader = match request {
            Some(request) => Some(self.configure_loader(request, &minecraft_version).await?),
            None => None,
        };

        let (loader_libraries, install_libraries) = loader
            .as_ref()
            .map(|l| (l.libraries(), l.install_libraries()))
            .unwrap_or_default();
        let libraries_dir = self.ctx.config.libraries_dir();
        let resolver = LibraryResolver::new(&libraries_dir, &self.options.platform);
        let libraries = resolver.resolve(&self.manifest.libraries, &loader_libraries)?;
        let install_only = resolver.resolve(&[], &install_libraries)?;
        info!(
            "Resolved {} librar(y/ies), {} install-time",
            libraries.len(),
            install_only.len()
        );

        let mut downloads: Vec<Download> = libraries
            .iter()
            .chain(&install_only)
            .filter_map(|lib| lib.download(&libraries_dir))
            .collect();

        if let Some(game) = &self.manifest.game_jar {
            let ctx = self.loader_context(&minecraft_version);
            let checksum = game.sha1.as_deref().and_then(Checksum::parse_hex);
            let mut jar = Download::prepare(game.url.clone(), ctx.minecraft_jar(), checksum, game.size)
                .named(format!("minecraft {} {}", self.options.side, minecraft_version));
            if self.options.side == Side::Server {
                jar = jar.copy_to(
                    self.paths
                        .staging
                        .join(format!("minecraft_server.{minecraft_version}.jar")),
                );
            }
            downloads.push(jar);
        }

        let configs = self.manifest.configs.as_ref().map(|archive| {
            let dest = self.paths.temp.join("Configs.zip");
            let checksum = archive.sha1.as_deref().and_then(Checksum::parse_hex);
            downloads.push(
                Download::prepare(archive.url.clone(), dest.clone(), checksum, archive.size)
                    .named("pack configs"),
            );
            dest
        });

        let natives = if self.options.side == Side::Client {
            libraries
                .iter()
                .filter(|lib| lib.natives)
                .map(|lib| lib.absolute_path(&libraries_dir))
                .collect()
        } else {
            Vec::new()
        };

        let mut browser = Vec::new();
        for m in &mods {
            if m.download_type == DownloadType::Browser {
                if let Some(source) = mod_resolver.browser_file(m) {
                    browser.push((source, m.clone()));
                }
                continue;
            }
            downloads.push(self.mod_download(m));
        }

        let mut seen = HashSet::new();
        downloads.retain(|d| seen.insert(d.dest.clone()));

        Ok(Plan {
            minecraft_version,
            loader,
            mods,
            libraries,
            downloads,
            browser,
            natives,
            configs,
        })
    }

    async fn download(&self, plan: &mut Plan) -> InstallerResult<(usize, usize)> {
        let mut expected = 0u64;
        let mut queued = 0usize;
        for download in &plan.downloads {
            if download.needs_download().await? {
                expected += download.size.unwrap_or(0);
                queued += 1;
            }
        }
        self.progress.add_total(expected);
        info!(
            "{} of {} file(s) need downloading ({} bytes known)",
            queued,
            plan.downloads.len(),
            expected
        );

        for (source, m) in &plan.browser {
            self.checkpoint()?;
            self.stage_browser_file(source, m).await?;
        }

        let downloads = std::mem::take(&mut plan.downloads);
        let finished = self
            .ctx
            .downloader
            .download_batch(downloads, &self.progress, &self.cancel)
            .await?;

        let (mut fetched, mut hits) = (0, 0);
        for (download, outcome) in &finished {
            match outcome {
                DownloadOutcome::CacheHit => hits += 1,
                DownloadOutcome::Fetched { bytes } => {
                    fetched += 1;
                    // Unknown sizes join the total once their length is known.
                    if download.size.is_none() {
                        self.progress.add_total(*bytes);
                    }
                }
            }
        }
        plan.downloads = finished.into_iter().map(|(d, _)| d).collect();

        Ok((fetched, hits))
    }

    async fn finalize(
        &self,
        store: &InstanceStore,
        previous: Option<&InstanceMetadata>,
        plan: &Plan,
    ) -> InstallerResult<InstanceMetadata> {
        if let Some(previous) = previous {
            let removed = store.remove_installed_mods(previous).await?;
            debug!("Removed {} file(s) from the previous install", removed);
        }

        let archives: Vec<PathBuf> = plan
            .mods
            .iter()
            .filter(|m| m.mod_type == ModType::Extract)
            .map(|m| self.cache_path(m))
            .collect();
        let paths = self.paths.clone();
        let restore = previous.is_some();
        let natives = plan.natives.clone();
        let configs = plan.configs.clone();

        tokio::task::spawn_blocking(move || -> InstallerResult<()> {
            for jar in &natives {
                if !jar.is_file() {
                    warn!("Natives jar {:?} is missing, skipping", jar);
                    continue;
                }
                let count = fs::extract_natives(jar, &paths.staging.join("natives"))?;
                debug!("Extracted {} native(s) from {:?}", count, jar);
            }
            if let Some(configs) = &configs {
                debug!("Extracting pack configs");
                fs::unzip(configs, &paths.staging)?;
            }
            if paths.staging.is_dir() {
                fs::move_dir_contents(&paths.staging, &paths.root)?;
            }
            for dir in [&paths.root, &paths.mods, &paths.config] {
                std::fs::create_dir_all(dir).map_err(|e| InstallerError::io(dir, e))?;
            }
            for archive in &archives {
                debug!("Extracting {:?} into the instance", archive);
                fs::unzip(archive, &paths.root)?;
            }
            if restore {
                backup::restore_all(&paths)?;
            }
            Ok(())
        })
        .await??;

        let mut metadata =
            InstanceMetadata::new(&self.options.name, &plan.minecraft_version, self.options.side);
        if let Some(loader) = &plan.loader {
            metadata.loader = loader.loader_version();
            metadata.main_class = loader.main_class();
            metadata.arguments = loader.arguments();
        }
        metadata.libraries = plan.libraries.iter().map(|l| l.path.clone()).collect();
        metadata.mods = plan.mods.iter().map(InstalledMod::from).collect();
        store.save(&metadata).await?;

        Ok(metadata)
    }

    // ── Helpers ─────────────────────────────────────────

    async fn configure_loader(
        &self,
        request: LoaderRequest,
        minecraft_version: &str,
    ) -> InstallerResult<Loader> {
        let mut metadata = request.metadata;
        if metadata.minecraft.is_empty() {
            metadata.minecraft = minecraft_version.to_string();
        }

        let mut loader = Loader::new(request.loader_type);
        loader
            .configure(
                &metadata,
                self.loader_context(minecraft_version),
                request.version_override.as_ref(),
            )
            .await?;
        loader.download_and_extract_installer().await?;

        if let Some(version) = loader.loader_version() {
            info!("Using {} {}", version.loader_type, version.version);
        }
        Ok(loader)
    }

    fn loader_context(&self, minecraft_version: &str) -> LoaderContext {
        LoaderContext {
            config: self.ctx.config.clone(),
            downloader: self.ctx.downloader.clone(),
            progress: self.progress.clone(),
            cancel: self.cancel.clone(),
            side: self.options.side,
            minecraft_version: minecraft_version.to_string(),
            root: self.paths.root.clone(),
            temp_dir: self.paths.temp.clone(),
            staging_dir: self.paths.staging.clone(),
        }
    }

    /// Location of a mod in the shared content cache. Files without a
    /// checksum are kept under a directory named after their URL's hash.
    fn cache_path(&self, m: &Mod) -> PathBuf {
        let downloads = self.ctx.config.downloads_dir();
        if m.checksum().is_some() {
            return downloads.join(m.relative_path());
        }
        let key = hash_bytes(m.url.as_bytes(), HashAlgorithm::Sha1);
        downloads.join("by-url").join(key.to_string()).join(m.relative_path())
    }

    fn mod_download(&self, m: &Mod) -> Download {
        let mut download = Download::prepare(m.url.clone(), self.cache_path(m), m.checksum(), m.filesize)
            .named(m.file.clone());
        if m.mod_type != ModType::Extract {
            download = download.copy_to(self.paths.staging.join(m.relative_path()));
        }
        if m.download_type == DownloadType::CurseMirror {
            download = download.authorized();
        }
        download
    }

    /// Verify and stage a file the user fetched by hand.
    async fn stage_browser_file(&self, source: &Path, m: &Mod) -> InstallerResult<()> {
        if let Some(expected) = m.checksum() {
            if !expected.matches_file(source).await? {
                let actual = expected.compute_same_kind(source).await?;
                return Err(InstallerError::Integrity {
                    url: m.url.clone(),
                    path: source.to_path_buf(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        let dest = if m.mod_type == ModType::Extract {
            self.cache_path(m)
        } else {
            self.paths.staging.join(m.relative_path())
        };
        debug!("Staging browser download {:?}", source);
        let source = source.to_path_buf();
        tokio::task::spawn_blocking(move || fs::copy_file(&source, &dest)).await??;
        Ok(())
    }

    fn enter(&self, state: InstallState, step: impl Into<String>) {
        let step = step.into();
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        info!("[{}] {}", state, step);
        self.progress.step(state, step);
    }

    fn checkpoint(&self) -> InstallerResult<()> {
        if self.cancel.is_cancelled() {
            return Err(InstallerError::Cancelled);
        }
        Ok(())
    }

    async fn cleanup(&self) {
        let temp = self.paths.temp.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || fs::remove_dir_best_effort(&temp)).await {
            warn!("Temp cleanup task failed: {}", e);
        }
    }
}
