mod artifact;

pub use artifact::MavenArtifact;

/// Repositories the loaders pull libraries from when a declaration carries no URL.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
pub const FABRIC_MAVEN: &str = "https://maven.fabricmc.net";
pub const LEGACY_FABRIC_MAVEN: &str = "https://maven.legacyfabric.net";
pub const QUILT_MAVEN: &str = "https://maven.quiltmc.org/repository/release";
