use async_trait::async_trait;
use tracing::info;

use super::context::LoaderContext;
use super::version::{LaunchArguments, LoaderMetadata, LoaderType, LoaderVersion};
use super::LoaderPlugin;
use crate::core::downloader::{Download, DownloadOutcome};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::hashing::{Checksum, HashCode};
use crate::core::library::LibraryDeclaration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperFlavor {
    Paper,
    Purpur,
}

impl PaperFlavor {
    fn loader_type(self) -> LoaderType {
        match self {
            PaperFlavor::Paper => LoaderType::Paper,
            PaperFlavor::Purpur => LoaderType::Purpur,
        }
    }

    fn default_url(self, minecraft: &str, build: &str) -> String {
        match self {
            PaperFlavor::Paper => format!(
                "https://api.papermc.io/v2/projects/paper/versions/{0}/builds/{1}/downloads/paper-{0}-{1}.jar",
                minecraft, build
            ),
            PaperFlavor::Purpur => format!("https://api.purpurmc.org/v2/purpur/{}/{}/download", minecraft, build),
        }
    }
}

/// Paper and Purpur: the loader is the server jar itself.
pub struct PaperLoader {
    flavor: PaperFlavor,
    ctx: Option<LoaderContext>,
    build: String,
    filename: String,
    download_url: String,
    sha256: Option<Checksum>,
}

impl PaperLoader {
    pub fn new(flavor: PaperFlavor) -> Self {
        Self {
            flavor,
            ctx: None,
            build: String::new(),
            filename: String::new(),
            download_url: String::new(),
            sha256: None,
        }
    }
}

#[async_trait]
impl LoaderPlugin for PaperLoader {
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

        self.build = version_override
            .map(|v| v.version.clone())
            .or_else(|| metadata.version.clone())
            .ok_or_else(|| {
                InstallerError::ManifestResolution(format!(
                    "no {} build given for Minecraft {}",
                    self.flavor.loader_type(),
                    minecraft
                ))
            })?;

        self.filename = metadata.filename.clone().unwrap_or_else(|| {
            format!("{}-{}-{}.jar", self.flavor.loader_type(), minecraft, self.build)
        });
        self.download_url = metadata
            .download_url
            .clone()
            .unwrap_or_else(|| self.flavor.default_url(&minecraft, &self.build));
        self.sha256 = metadata
            .sha256
            .as_deref()
            .map(HashCode::from_hex)
            .filter(|code| !code.is_empty())
            .map(Checksum::Sha256);

        self.ctx = Some(ctx);
        Ok(())
    }

    fn loader_version(&self) -> Option<LoaderVersion> {
        self.ctx.as_ref()?;
        Some(LoaderVersion::new(self.build.clone(), self.flavor.loader_type()))
    }

    async fn download_and_extract_installer(&mut self) -> InstallerResult<()> {
        Ok(())
    }

    /// Fetch the server jar into the shared loaders cache and stage a copy for the root.
    async fn run_processors(&self) -> InstallerResult<()> {
        let ctx = self.ctx.as_ref().ok_or_else(|| {
            InstallerError::Other(format!("{} loader used before configure", self.flavor.loader_type()))
        })?;

        let mut download = Download::prepare(
            self.download_url.clone(),
            ctx.loaders_dir().join(&self.filename),
            self.sha256.clone(),
            None,
        )
        .copy_to(ctx.staging_dir.join(&self.filename))
        .named(self.filename.clone());

        if let DownloadOutcome::Fetched { bytes } =
            ctx.downloader.fetch(&mut download, &ctx.progress, &ctx.cancel).await?
        {
            ctx.progress.add_total(bytes);
        }

        info!("{} {} server jar ready", self.flavor.loader_type(), self.build);
        Ok(())
    }

    fn libraries(&self) -> Vec<LibraryDeclaration> {
        Vec::new()
    }

    fn install_libraries(&self) -> Vec<LibraryDeclaration> {
        Vec::new()
    }

    fn arguments(&self) -> LaunchArguments {
        LaunchArguments::default()
    }

    fn main_class(&self) -> Option<String> {
        None
    }

    fn server_jar(&self) -> Option<String> {
        Some(self.filename.clone())
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
    use crate::core::hashing::{hash_bytes, HashAlgorithm};
    use crate::core::installer::Side;
    use crate::core::progress::{NoopProgress, ProgressReporter};
    use httpmock::prelude::*;
    use std::path::Path;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn context(data_dir: &Path) -> LoaderContext {
        let config = InstallerConfig::with_data_dir(data_dir);
        LoaderContext {
            downloader: Arc::new(Downloader::new(&config).unwrap()),
            config: Arc::new(config),
            progress: Arc::new(ProgressReporter::new(Arc::new(NoopProgress))),
            cancel: CancellationToken::new(),
            side: Side::Server,
            minecraft_version: "1.20.4".into(),
            root: data_dir.join("server"),
            temp_dir: data_dir.join("temp/run"),
            staging_dir: data_dir.join("temp/run/staging"),
        }
    }

    #[tokio::test]
    async fn server_jar_is_cached_and_staged() {
        let server = MockServer::start_async().await;
        let jar = b"paper server jar".to_vec();
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/paper-1.20.4-496.jar");
                then.status(200).body(jar.clone());
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let metadata = LoaderMetadata {
            version: Some("496".into()),
            filename: Some("paper-1.20.4-496.jar".into()),
            download_url: Some(server.url("/paper-1.20.4-496.jar")),
            sha256: Some(hash_bytes(&jar, HashAlgorithm::Sha256).to_string()),
            ..Default::default()
        };

        let mut paper = PaperLoader::new(PaperFlavor::Paper);
        paper.configure(&metadata, ctx.clone(), None).await.unwrap();
        paper.run_processors().await.unwrap();

        assert_eq!(std::fs::read(ctx.staging_dir.join("paper-1.20.4-496.jar")).unwrap(), jar);
        assert!(!ctx.root.exists());
        assert!(ctx.loaders_dir().join("paper-1.20.4-496.jar").exists());
        assert_eq!(ctx.progress.total(), jar.len() as u64);

        // A second instance reuses the cached jar.
        paper.run_processors().await.unwrap();
        mock.assert_hits_async(1).await;
        assert_eq!(ctx.progress.total(), jar.len() as u64);
    }

    #[tokio::test]
    async fn purpur_defaults_filename_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut purpur = PaperLoader::new(PaperFlavor::Purpur);
        let metadata = LoaderMetadata {
            version: Some("2176".into()),
            ..Default::default()
        };
        purpur.configure(&metadata, context(dir.path()), None).await.unwrap();

        assert_eq!(purpur.server_jar().as_deref(), Some("purpur-1.20.4-2176.jar"));
        assert_eq!(
            purpur.download_url,
            "https://api.purpurmc.org/v2/purpur/1.20.4/2176/download"
        );
        assert_eq!(purpur.loader_version().unwrap().loader_type, LoaderType::Purpur);
    }
}
