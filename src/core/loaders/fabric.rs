use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::context::LoaderContext;
use super::version::{LaunchArguments, LoaderMetadata, LoaderType, LoaderVersion};
use super::LoaderPlugin;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::installer::Side;
use crate::core::library::LibraryDeclaration;
use crate::core::maven::{MavenArtifact, FABRIC_MAVEN, LEGACY_FABRIC_MAVEN, QUILT_MAVEN};

/// Loaders that share the Fabric meta API and profile format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabricFlavor {
    Fabric,
    LegacyFabric,
    Quilt,
}

impl FabricFlavor {
    fn loader_type(self) -> LoaderType {
        match self {
            FabricFlavor::Fabric => LoaderType::Fabric,
            FabricFlavor::LegacyFabric => LoaderType::LegacyFabric,
            FabricFlavor::Quilt => LoaderType::Quilt,
        }
    }

    fn meta_url(self, ctx: &LoaderContext) -> String {
        let url = match self {
            FabricFlavor::Fabric => &ctx.config.fabric_meta_url,
            FabricFlavor::LegacyFabric => &ctx.config.legacy_fabric_meta_url,
            FabricFlavor::Quilt => &ctx.config.quilt_meta_url,
        };
        url.trim_end_matches('/').to_string()
    }

    fn maven(self) -> &'static str {
        match self {
            FabricFlavor::Fabric => FABRIC_MAVEN,
            FabricFlavor::LegacyFabric => LEGACY_FABRIC_MAVEN,
            FabricFlavor::Quilt => QUILT_MAVEN,
        }
    }

    fn loader_coordinate(self, version: &str) -> String {
        match self {
            FabricFlavor::Quilt => format!("org.quiltmc:quilt-loader:{}", version),
            _ => format!("net.fabricmc:fabric-loader:{}", version),
        }
    }

    fn server_jar_name(self) -> &'static str {
        match self {
            FabricFlavor::Quilt => "quilt-server-launch.jar",
            _ => "fabric-server-launch.jar",
        }
    }

    fn server_launcher_class(self) -> &'static str {
        match self {
            FabricFlavor::Quilt => "org.quiltmc.loader.impl.launch.server.QuiltServerLauncher",
            _ => "net.fabricmc.loader.launch.server.FabricServerLauncher",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricProfile {
    pub id: Option<String>,
    pub main_class: String,
    #[serde(default)]
    pub libraries: Vec<FabricLibrary>,
    pub arguments: Option<FabricArguments>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FabricLibrary {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FabricArguments {
    #[serde(default)]
    pub jvm: Vec<String>,
    #[serde(default)]
    pub game: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MetaLoaderEntry {
    loader: MetaLoader,
}

#[derive(Debug, Deserialize)]
struct MetaLoader {
    version: String,
    #[serde(default)]
    stable: bool,
}

/// Fabric, LegacyFabric and Quilt. No installer; processors only run server side.
pub struct FabricLoader {
    flavor: FabricFlavor,
    ctx: Option<LoaderContext>,
    version: String,
    recommended: bool,
    profile: Option<FabricProfile>,
}

impl FabricLoader {
    pub fn new(flavor: FabricFlavor) -> Self {
        Self {
            flavor,
            ctx: None,
            version: String::new(),
            recommended: false,
            profile: None,
        }
    }

    fn context(&self) -> InstallerResult<&LoaderContext> {
        self.ctx.as_ref().ok_or_else(|| {
            InstallerError::Other(format!("{} loader used before configure", self.flavor.loader_type()))
        })
    }

    async fn latest_version(&self, ctx: &LoaderContext, minecraft: &str) -> InstallerResult<MetaLoader> {
        let url = format!("{}/versions/loader/{}", self.flavor.meta_url(ctx), minecraft);
        let entries: Vec<MetaLoaderEntry> = ctx.downloader.fetch_json(&url).await?;
        entries.into_iter().next().map(|e| e.loader).ok_or_else(|| {
            InstallerError::ManifestResolution(format!(
                "no {} builds for Minecraft {}",
                self.flavor.loader_type(),
                minecraft
            ))
        })
    }

    async fn fetch_profile(
        &self,
        ctx: &LoaderContext,
        minecraft: &str,
        version: &str,
    ) -> InstallerResult<FabricProfile> {
        let kind = match ctx.side {
            Side::Client => "profile",
            Side::Server => "server",
        };
        let url = format!(
            "{}/versions/loader/{}/{}/{}/json",
            self.flavor.meta_url(ctx),
            minecraft,
            version,
            kind
        );
        let profile: FabricProfile = ctx.downloader.fetch_json(&url).await?;

        if profile.main_class.is_empty() {
            return Err(InstallerError::ManifestResolution(format!(
                "{} profile is missing its main class",
                self.flavor.loader_type()
            )));
        }
        Ok(profile)
    }

    fn ensure_loader_artifact(&self, libraries: &mut Vec<LibraryDeclaration>) {
        let coord = self.flavor.loader_coordinate(&self.version);
        if libraries.iter().any(|lib| lib.name == coord) {
            return;
        }
        libraries.push(LibraryDeclaration {
            name: coord,
            url: Some(self.flavor.maven().to_string()),
            ..Default::default()
        });
    }

    fn library_files(&self, libraries_dir: &Path) -> InstallerResult<Vec<PathBuf>> {
        self.libraries()
            .iter()
            .map(|lib| Ok(MavenArtifact::parse(&lib.name)?.path_in(libraries_dir)))
            .collect()
    }
}

/// Merge the library jars into a single launchable server jar.
///
/// The first jar that provides an entry wins; the manifest and launch
/// properties are always the generated ones.
fn write_server_launch_jar(
    target: &Path,
    launcher_class: &str,
    main_class: &str,
    library_files: &[PathBuf],
) -> InstallerResult<()> {
    if target.exists() {
        std::fs::remove_file(target).map_err(|e| InstallerError::io(target, e))?;
    }
    let file = std::fs::File::create(target).map_err(|e| InstallerError::io(target, e))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    let mut added: HashSet<String> = HashSet::new();

    added.insert("META-INF/MANIFEST.MF".to_string());
    writer.start_file("META-INF/MANIFEST.MF", options)?;
    write!(
        writer,
        "Manifest-Version: 1.0\r\nMain-Class: {}\r\n\r\n",
        launcher_class
    )
    .map_err(|e| InstallerError::io(target, e))?;

    added.insert("fabric-server-launch.properties".to_string());
    writer.start_file("fabric-server-launch.properties", options)?;
    writeln!(writer, "launch.mainClass={}", main_class).map_err(|e| InstallerError::io(target, e))?;

    for library in library_files {
        let source = std::fs::File::open(library).map_err(|e| InstallerError::io(library, e))?;
        let mut archive = zip::ZipArchive::new(source)?;
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            if added.insert(entry.name().to_string()) {
                writer.raw_copy_file(entry)?;
            }
        }
    }

    writer.finish()?;
    Ok(())
}

#[async_trait]
impl LoaderPlugin for FabricLoader {
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

        if let Some(v) = version_override {
            self.version = v.version.clone();
            self.recommended = v.recommended;
        } else if let Some(v) = &metadata.version {
            self.version = v.clone();
        } else if metadata.latest {
            debug!("Resolving latest {} build", self.flavor.loader_type());
            let latest = self.latest_version(&ctx, &minecraft).await?;
            self.version = latest.version;
            self.recommended = latest.stable;
        } else {
            return Err(InstallerError::ManifestResolution(format!(
                "no {} version given for Minecraft {}",
                self.flavor.loader_type(),
                minecraft
            )));
        }

        let profile = match &metadata.profile {
            Some(value) => serde_json::from_value(value.clone())?,
            None => self.fetch_profile(&ctx, &minecraft, &self.version).await?,
        };

        info!(
            "Configured {} {} for Minecraft {}",
            self.flavor.loader_type(),
            self.version,
            minecraft
        );
        self.profile = Some(profile);
        self.ctx = Some(ctx);
        Ok(())
    }

    fn loader_version(&self) -> Option<LoaderVersion> {
        self.ctx.as_ref()?;
        Some(LoaderVersion {
            version: self.version.clone(),
            raw_version: None,
            recommended: self.recommended,
            loader_type: self.flavor.loader_type(),
        })
    }

    async fn download_and_extract_installer(&mut self) -> InstallerResult<()> {
        Ok(())
    }

    async fn run_processors(&self) -> InstallerResult<()> {
        let ctx = self.context()?;
        if ctx.side == Side::Client {
            return Ok(());
        }

        let target = ctx.staging_dir.join(self.flavor.server_jar_name());
        let launcher_class = self.flavor.server_launcher_class();
        let main_class = self.main_class().unwrap_or_default();
        let files = self.library_files(&ctx.libraries_dir())?;

        tokio::fs::create_dir_all(&ctx.staging_dir)
            .await
            .map_err(|e| InstallerError::io(&ctx.staging_dir, e))?;
        {
            let target = target.clone();
            tokio::task::spawn_blocking(move || {
                write_server_launch_jar(&target, launcher_class, &main_class, &files)
            })
            .await??;
        }

        let properties = ctx.staging_dir.join("fabric-server-launcher.properties");
        let server_jar = format!("minecraft_server.{}.jar", ctx.minecraft_version);
        tokio::fs::write(&properties, format!("serverJar={}\n", server_jar))
            .await
            .map_err(|e| InstallerError::io(&properties, e))?;

        info!("Built {:?}", target);
        Ok(())
    }

    fn libraries(&self) -> Vec<LibraryDeclaration> {
        let repository = self.flavor.maven();
        let mut libraries: Vec<LibraryDeclaration> = self
            .profile
            .iter()
            .flat_map(|p| p.libraries.iter())
            .map(|lib| LibraryDeclaration {
                name: lib.name.clone(),
                url: Some(lib.url.clone().unwrap_or_else(|| repository.to_string())),
                ..Default::default()
            })
            .collect();
        self.ensure_loader_artifact(&mut libraries);
        libraries
    }

    fn install_libraries(&self) -> Vec<LibraryDeclaration> {
        Vec::new()
    }

    fn arguments(&self) -> LaunchArguments {
        let args = self
            .profile
            .as_ref()
            .and_then(|p| p.arguments.clone())
            .unwrap_or_default();
        LaunchArguments {
            game: args.game,
            jvm: args.jvm,
        }
    }

    fn main_class(&self) -> Option<String> {
        self.profile.as_ref().map(|p| p.main_class.clone())
    }

    fn server_jar(&self) -> Option<String> {
        Some(self.flavor.server_jar_name().to_string())
    }

    fn uses_minecraft_libraries(&self) -> bool {
        true
    }

    fn uses_minecraft_arguments(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::InstallerConfig;
    use crate::core::downloader::Downloader;
    use crate::core::progress::{NoopProgress, ProgressReporter};
    use httpmock::prelude::*;
    use std::io::Read;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn context(data_dir: &Path, side: Side, meta_url: Option<String>) -> LoaderContext {
        let mut config = InstallerConfig::with_data_dir(data_dir);
        if let Some(url) = meta_url {
            config.fabric_meta_url = url.clone();
            config.quilt_meta_url = url;
        }
        LoaderContext {
            downloader: Arc::new(Downloader::new(&config).unwrap()),
            config: Arc::new(config),
            progress: Arc::new(ProgressReporter::new(Arc::new(NoopProgress))),
            cancel: CancellationToken::new(),
            side,
            minecraft_version: "1.21.1".into(),
            root: data_dir.join("instance"),
            temp_dir: data_dir.join("temp/run"),
            staging_dir: data_dir.join("temp/run/staging"),
        }
    }

    fn profile_json() -> serde_json::Value {
        serde_json::json!({
            "id": "fabric-loader-0.16.10-1.21.1",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "libraries": [
                {"name": "net.fabricmc:intermediary:1.21.1", "url": "https://maven.fabricmc.net/"}
            ],
            "arguments": {"jvm": ["-DFabricMcEmu= net.minecraft.client.main.Main "], "game": []}
        })
    }

    #[tokio::test]
    async fn ensure_loader_artifact_adds_loader_coordinate_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut fabric = FabricLoader::new(FabricFlavor::Fabric);
        let metadata = LoaderMetadata {
            version: Some("0.16.10".into()),
            profile: Some(profile_json()),
            ..Default::default()
        };
        fabric
            .configure(&metadata, context(dir.path(), Side::Client, None), None)
            .await
            .unwrap();

        let libs = fabric.libraries();
        let loader: Vec<_> = libs
            .iter()
            .filter(|l| l.name == "net.fabricmc:fabric-loader:0.16.10")
            .collect();
        assert_eq!(loader.len(), 1);
        assert_eq!(loader[0].url.as_deref(), Some(FABRIC_MAVEN));
        assert_eq!(
            fabric.main_class().as_deref(),
            Some("net.fabricmc.loader.impl.launch.knot.KnotClient")
        );
    }

    #[tokio::test]
    async fn latest_version_and_profile_come_from_meta() {
        let server = MockServer::start_async().await;
        let versions = server
            .mock_async(|when, then| {
                when.method(GET).path("/versions/loader/1.21.1");
                then.status(200).json_body(serde_json::json!([
                    {"loader": {"version": "0.16.10", "stable": true}},
                    {"loader": {"version": "0.16.9", "stable": true}}
                ]));
            })
            .await;
        let profile = server
            .mock_async(|when, then| {
                when.method(GET).path("/versions/loader/1.21.1/0.16.10/profile/json");
                then.status(200).json_body(profile_json());
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut fabric = FabricLoader::new(FabricFlavor::Fabric);
        let metadata = LoaderMetadata {
            latest: true,
            ..Default::default()
        };
        fabric
            .configure(&metadata, context(dir.path(), Side::Client, Some(server.base_url())), None)
            .await
            .unwrap();

        let version = fabric.loader_version().unwrap();
        assert_eq!(version.version, "0.16.10");
        assert!(version.recommended);
        versions.assert_hits_async(1).await;
        profile.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn quilt_uses_its_own_loader_coordinate() {
        let dir = tempfile::tempdir().unwrap();
        let mut quilt = FabricLoader::new(FabricFlavor::Quilt);
        let metadata = LoaderMetadata {
            version: Some("0.26.4".into()),
            profile: Some(profile_json()),
            ..Default::default()
        };
        quilt
            .configure(&metadata, context(dir.path(), Side::Client, None), None)
            .await
            .unwrap();

        assert!(quilt
            .libraries()
            .iter()
            .any(|l| l.name == "org.quiltmc:quilt-loader:0.26.4"));
        assert_eq!(quilt.server_jar().as_deref(), Some("quilt-server-launch.jar"));
    }

    #[tokio::test]
    async fn server_side_builds_launch_jar() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Side::Server, None);
        let mut fabric = FabricLoader::new(FabricFlavor::Fabric);
        let metadata = LoaderMetadata {
            version: Some("0.16.10".into()),
            profile: Some(profile_json()),
            ..Default::default()
        };
        fabric.configure(&metadata, ctx.clone(), None).await.unwrap();

        for lib in fabric.libraries() {
            let path = MavenArtifact::parse(&lib.name).unwrap().path_in(&ctx.libraries_dir());
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
            zip.write_all(b"Manifest-Version: 1.0\r\n").unwrap();
            zip.start_file(format!("{}.class", lib.name.replace(':', "_")), options)
                .unwrap();
            zip.write_all(b"class").unwrap();
            zip.finish().unwrap();
        }

        fabric.run_processors().await.unwrap();

        assert!(!ctx.root.exists());
        let jar = ctx.staging_dir.join("fabric-server-launch.jar");
        let mut archive = zip::ZipArchive::new(std::fs::File::open(&jar).unwrap()).unwrap();
        let mut manifest = String::new();
        archive
            .by_name("META-INF/MANIFEST.MF")
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        assert!(manifest.contains("FabricServerLauncher"));
        assert!(archive.by_name("net.fabricmc_intermediary_1.21.1.class").is_ok());
        assert!(archive.by_name("fabric-server-launch.properties").is_ok());

        let props = std::fs::read_to_string(ctx.staging_dir.join("fabric-server-launcher.properties")).unwrap();
        assert_eq!(props, "serverJar=minecraft_server.1.21.1.jar\n");
    }
}
