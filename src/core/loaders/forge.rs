use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;

use super::context::LoaderContext;
use super::processor::{self, DataEntry, Processor, ProcessorVariables};
use super::version::{LaunchArguments, LoaderMetadata, LoaderType, LoaderVersion};
use super::LoaderPlugin;
use crate::core::downloader::{Download, DownloadOutcome};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::fs;
use crate::core::hashing::Checksum;
use crate::core::library::LibraryDeclaration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeFlavor {
    Forge,
    NeoForge,
}

impl ForgeFlavor {
    fn loader_type(self) -> LoaderType {
        match self {
            ForgeFlavor::Forge => LoaderType::Forge,
            ForgeFlavor::NeoForge => LoaderType::NeoForge,
        }
    }

    /// Maven group path and artifact id of the installer.
    fn artifact(self) -> (&'static str, &'static str) {
        match self {
            ForgeFlavor::Forge => ("net/minecraftforge", "forge"),
            ForgeFlavor::NeoForge => ("net/neoforged", "neoforge"),
        }
    }

    /// Coordinate prefix of the loader's own library in `version.json`.
    fn library_prefix(self) -> &'static str {
        match self {
            ForgeFlavor::Forge => "net.minecraftforge:forge:",
            ForgeFlavor::NeoForge => "net.neoforged:neoforge:",
        }
    }
}

/// Subset of `install_profile.json` (1.13+ installers).
#[derive(Debug, Deserialize)]
pub struct ForgeInstallProfile {
    #[serde(default)]
    pub data: HashMap<String, DataEntry>,
    #[serde(default)]
    pub processors: Vec<Processor>,
    #[serde(default)]
    pub libraries: Vec<LibraryDeclaration>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgeArguments {
    #[serde(default)]
    pub game: Vec<serde_json::Value>,
    #[serde(default)]
    pub jvm: Vec<serde_json::Value>,
}

/// Subset of the `version.json` bundled in the installer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeVersionJson {
    pub main_class: String,
    #[serde(default)]
    pub libraries: Vec<LibraryDeclaration>,
    #[serde(default)]
    pub arguments: Option<ForgeArguments>,
}

/// Forge and NeoForge: installer jar, install profile and processors.
pub struct ForgeLoader {
    flavor: ForgeFlavor,
    ctx: Option<LoaderContext>,
    version: String,
    raw_version: String,
    recommended: bool,
    installer_url: String,
    installer_checksum: Option<Checksum>,
    profile: Option<ForgeInstallProfile>,
    version_json: Option<ForgeVersionJson>,
}

impl ForgeLoader {
    pub fn new(flavor: ForgeFlavor) -> Self {
        Self {
            flavor,
            ctx: None,
            version: String::new(),
            raw_version: String::new(),
            recommended: false,
            installer_url: String::new(),
            installer_checksum: None,
            profile: None,
            version_json: None,
        }
    }

    fn context(&self) -> InstallerResult<&LoaderContext> {
        self.ctx
            .as_ref()
            .ok_or_else(|| InstallerError::Other(format!("{} loader used before configure", self.flavor.loader_type())))
    }

    fn installer_filename(&self) -> String {
        format!("{}-{}-installer.jar", self.flavor.artifact().1, self.raw_version)
    }

    fn installer_path(&self, ctx: &LoaderContext) -> PathBuf {
        ctx.loaders_dir().join(self.installer_filename())
    }

    fn default_installer_url(&self, maven: &str) -> String {
        let (group, artifact) = self.flavor.artifact();
        format!(
            "{}/{}/{}/{}/{}",
            maven.trim_end_matches('/'),
            group,
            artifact,
            self.raw_version,
            self.installer_filename()
        )
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> InstallerResult<T> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            InstallerError::ManifestResolution(format!("installer is missing {:?}", path.file_name().unwrap_or_default()))
        } else {
            InstallerError::io(path, e)
        }
    })?;
    Ok(serde_json::from_str(&raw)?)
}

#[async_trait]
impl LoaderPlugin for ForgeLoader {
    async fn configure(
        &mut self,
        metadata: &LoaderMetadata,
        ctx: LoaderContext,
        version_override: Option<&LoaderVersion>,
    ) -> InstallerResult<()> {
        let minecraft = if metadata.minecraft.is_empty() {
            ctx.minecraft_version.clone()
        } else {
            metadata.minecraft.clone()
        };

        let (version, raw) = match version_override {
            Some(v) => (v.version.clone(), v.raw_version.clone()),
            None => match &metadata.version {
                Some(v) => (v.clone(), metadata.raw_version.clone()),
                None => {
                    return Err(InstallerError::ManifestResolution(format!(
                        "no {} version given for Minecraft {}",
                        self.flavor.loader_type(),
                        minecraft
                    )))
                }
            },
        };

        self.raw_version = raw.unwrap_or_else(|| match self.flavor {
            ForgeFlavor::Forge => format!("{}-{}", minecraft, version),
            ForgeFlavor::NeoForge => version.clone(),
        });
        self.version = version;
        self.recommended = version_override.map_or(metadata.recommended, |v| v.recommended);

        let maven = match self.flavor {
            ForgeFlavor::Forge => &ctx.config.forge_maven_url,
            ForgeFlavor::NeoForge => &ctx.config.neoforge_maven_url,
        };
        self.installer_url = match &metadata.installer_url {
            Some(url) => url.clone(),
            None => self.default_installer_url(maven),
        };
        self.installer_checksum = metadata.installer_sha1.as_deref().and_then(Checksum::parse_hex);

        info!(
            "Configured {} {} for Minecraft {}",
            self.flavor.loader_type(),
            self.raw_version,
            minecraft
        );
        self.ctx = Some(ctx);
        Ok(())
    }

    fn loader_version(&self) -> Option<LoaderVersion> {
        self.ctx.as_ref()?;
        Some(LoaderVersion {
            version: self.version.clone(),
            raw_version: Some(self.raw_version.clone()),
            recommended: self.recommended,
            loader_type: self.flavor.loader_type(),
        })
    }

    async fn download_and_extract_installer(&mut self) -> InstallerResult<()> {
        let ctx = self.context()?.clone();
        let installer = self.installer_path(&ctx);

        let mut download = Download::prepare(
            self.installer_url.clone(),
            &installer,
            self.installer_checksum.clone(),
            None,
        )
        .named(self.installer_filename());
        if let DownloadOutcome::Fetched { bytes } =
            ctx.downloader.fetch(&mut download, &ctx.progress, &ctx.cancel).await?
        {
            ctx.progress.add_total(bytes);
        }

        let extracted = ctx.installer_dir();
        {
            let (archive, dest) = (installer.clone(), extracted.clone());
            tokio::task::spawn_blocking(move || fs::unzip(&archive, &dest)).await??;
        }

        let profile: ForgeInstallProfile = read_json(&extracted.join("install_profile.json")).await?;
        let version_json: ForgeVersionJson = read_json(&extracted.join("version.json")).await?;

        // Installers ship some artifacts (the patched loader jar itself) under maven/.
        let embedded = extracted.join("maven");
        if tokio::fs::metadata(&embedded).await.is_ok() {
            let libraries = ctx.libraries_dir();
            tokio::task::spawn_blocking(move || fs::copy_dir_recursive(&embedded, &libraries)).await??;
        }

        info!(
            "Extracted {} installer: {} processors, {} install libraries",
            self.flavor.loader_type(),
            profile.processors.len(),
            profile.libraries.len()
        );
        self.profile = Some(profile);
        self.version_json = Some(version_json);
        Ok(())
    }

    async fn run_processors(&self) -> InstallerResult<()> {
        let ctx = self.context()?;
        let profile = self.profile.as_ref().ok_or_else(|| {
            InstallerError::Other("processors requested before the installer was extracted".into())
        })?;

        let vars = ProcessorVariables::new(&profile.data, ctx, &self.installer_path(ctx));
        processor::run_all(&profile.processors, &vars, ctx).await?;

        info!("{} {} installed", self.flavor.loader_type(), self.raw_version);
        Ok(())
    }

    fn libraries(&self) -> Vec<LibraryDeclaration> {
        self.version_json
            .as_ref()
            .map(|v| v.libraries.clone())
            .unwrap_or_default()
    }

    fn install_libraries(&self) -> Vec<LibraryDeclaration> {
        self.profile
            .as_ref()
            .map(|p| p.libraries.clone())
            .unwrap_or_default()
    }

    fn arguments(&self) -> LaunchArguments {
        self.version_json
            .as_ref()
            .and_then(|v| v.arguments.as_ref())
            .map(|a| LaunchArguments::from_values(&a.game, &a.jvm))
            .unwrap_or_default()
    }

    fn main_class(&self) -> Option<String> {
        self.version_json.as_ref().map(|v| v.main_class.clone())
    }

    fn server_jar(&self) -> Option<String> {
        let prefix = self.flavor.library_prefix();
        self.version_json
            .as_ref()?
            .libraries
            .iter()
            .find(|l| l.name.starts_with(prefix))
            .and_then(|l| l.downloads.as_ref()?.artifact.as_ref())
            .and_then(|a| a.path.rsplit('/').next().map(str::to_string))
    }

    fn uses_minecraft_libraries(&self) -> bool {
        true
    }

    fn uses_minecraft_arguments(&self) -> bool {
        true
    }
}
