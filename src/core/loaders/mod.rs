mod context;
mod fabric;
mod forge;
mod multimc;
mod paper;
mod processor;
mod version;

use async_trait::async_trait;

use crate::core::error::InstallerResult;
use crate::core::library::LibraryDeclaration;

pub use context::LoaderContext;
pub use fabric::{FabricFlavor, FabricLoader};
pub use forge::{ForgeFlavor, ForgeLoader};
pub use multimc::{convert_components, MultiMcComponent};
pub use paper::{PaperFlavor, PaperLoader};
pub use version::{LaunchArguments, LoaderMetadata, LoaderRequest, LoaderType, LoaderVersion};

/// Contract every loader flavor implements.
///
/// `configure` binds the plugin to a run and must be called first.
/// The orchestrator then calls `download_and_extract_installer`, resolves
/// `libraries`/`install_libraries`, downloads, and finally `run_processors`.
#[async_trait]
pub trait LoaderPlugin: Send + Sync {
    async fn configure(
        &mut self,
        metadata: &LoaderMetadata,
        ctx: LoaderContext,
        version_override: Option<&LoaderVersion>,
    ) -> InstallerResult<()>;

    fn loader_version(&self) -> Option<LoaderVersion>;

    async fn download_and_extract_installer(&mut self) -> InstallerResult<()>;

    async fn run_processors(&self) -> InstallerResult<()>;

    /// Libraries needed at runtime.
    fn libraries(&self) -> Vec<LibraryDeclaration>;

    /// Libraries only needed while processors run.
    fn install_libraries(&self) -> Vec<LibraryDeclaration>;

    fn arguments(&self) -> LaunchArguments;

    fn main_class(&self) -> Option<String>;

    fn server_jar(&self) -> Option<String>;

    fn uses_minecraft_libraries(&self) -> bool;

    fn uses_minecraft_arguments(&self) -> bool;
}

/// Dispatcher without `Box<dyn>`.
pub enum Loader {
    Forge(ForgeLoader),
    Fabric(FabricLoader),
    Paper(PaperLoader),
}

impl Loader {
    pub fn new(loader_type: LoaderType) -> Self {
        match loader_type {
            LoaderType::Forge => Self::Forge(ForgeLoader::new(ForgeFlavor::Forge)),
            LoaderType::NeoForge => Self::Forge(ForgeLoader::new(ForgeFlavor::NeoForge)),
            LoaderType::Fabric => Self::Fabric(FabricLoader::new(FabricFlavor::Fabric)),
            LoaderType::LegacyFabric => Self::Fabric(FabricLoader::new(FabricFlavor::LegacyFabric)),
            LoaderType::Quilt => Self::Fabric(FabricLoader::new(FabricFlavor::Quilt)),
            LoaderType::Paper => Self::Paper(PaperLoader::new(PaperFlavor::Paper)),
            LoaderType::Purpur => Self::Paper(PaperLoader::new(PaperFlavor::Purpur)),
        }
    }

    fn plugin(&self) -> &dyn LoaderPlugin {
        match self {
            Loader::Forge(l) => l,
            Loader::Fabric(l) => l,
            Loader::Paper(l) => l,
        }
    }

    fn plugin_mut(&mut self) -> &mut dyn LoaderPlugin {
        match self {
            Loader::Forge(l) => l,
            Loader::Fabric(l) => l,
            Loader::Paper(l) => l,
        }
    }

    pub async fn configure(
        &mut self,
        metadata: &LoaderMetadata,
        ctx: LoaderContext,
        version_override: Option<&LoaderVersion>,
    ) -> InstallerResult<()> {
        self.plugin_mut().configure(metadata, ctx, version_override).await
    }

    pub fn loader_version(&self) -> Option<LoaderVersion> {
        self.plugin().loader_version()
    }

    pub async fn download_and_extract_installer(&mut self) -> InstallerResult<()> {
        self.plugin_mut().download_and_extract_installer().await
    }

    pub async fn run_processors(&self) -> InstallerResult<()> {
        self.plugin().run_processors().await
    }

    pub fn libraries(&self) -> Vec<LibraryDeclaration> {
        self.plugin().libraries()
    }

    pub fn install_libraries(&self) -> Vec<LibraryDeclaration> {
        self.plugin().install_libraries()
    }

    pub fn arguments(&self) -> LaunchArguments {
        self.plugin().arguments()
    }

    pub fn main_class(&self) -> Option<String> {
        self.plugin().main_class()
    }

    pub fn server_jar(&self) -> Option<String> {
        self.plugin().server_jar()
    }

    pub fn uses_minecraft_libraries(&self) -> bool {
        self.plugin().uses_minecraft_libraries()
    }

    pub fn uses_minecraft_arguments(&self) -> bool {
        self.plugin().uses_minecraft_arguments()
    }
}
