use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported mod loaders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    Forge,
    NeoForge,
    Fabric,
    LegacyFabric,
    Quilt,
    Paper,
    Purpur,
}

impl fmt::Display for LoaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoaderType::Forge => "forge",
            LoaderType::NeoForge => "neoforge",
            LoaderType::Fabric => "fabric",
            LoaderType::LegacyFabric => "legacyfabric",
            LoaderType::Quilt => "quilt",
            LoaderType::Paper => "paper",
            LoaderType::Purpur => "purpur",
        };
        write!(f, "{}", s)
    }
}

/// Identifies one loader build. Two versions are the same build when their
/// `version` strings are equal; nothing else takes part in the comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_version: Option<String>,
    #[serde(default)]
    pub recommended: bool,
    pub loader_type: LoaderType,
}

impl LoaderVersion {
    pub fn new(version: impl Into<String>, loader_type: LoaderType) -> Self {
        Self {
            version: version.into(),
            raw_version: None,
            recommended: false,
            loader_type,
        }
    }
}

impl PartialEq for LoaderVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for LoaderVersion {}

/// What a manifest says about its loader. Which fields matter depends on the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderMetadata {
    /// Filled from the pack's Minecraft version when left empty.
    pub minecraft: String,
    pub version: Option<String>,
    /// Forge-style `<minecraft>-<version>` build id.
    pub raw_version: Option<String>,
    pub latest: bool,
    pub recommended: bool,
    pub installer_url: Option<String>,
    pub installer_sha1: Option<String>,
    /// Paper/Purpur server jar.
    pub download_url: Option<String>,
    pub filename: Option<String>,
    pub sha256: Option<String>,
    /// Fabric-style launch profile, when the manifest ships one.
    pub profile: Option<serde_json::Value>,
}

/// A request to install a specific loader alongside the pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderRequest {
    pub loader_type: LoaderType,
    #[serde(default)]
    pub metadata: LoaderMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_override: Option<LoaderVersion>,
}

impl LoaderRequest {
    pub fn new(loader_type: LoaderType, metadata: LoaderMetadata) -> Self {
        Self {
            loader_type,
            metadata,
            version_override: None,
        }
    }
}

/// Extra launch arguments contributed by a loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchArguments {
    #[serde(default)]
    pub game: Vec<String>,
    #[serde(default)]
    pub jvm: Vec<String>,
}

impl LaunchArguments {
    /// Keep only plain string arguments; rule-gated objects are dropped.
    pub fn from_values(game: &[serde_json::Value], jvm: &[serde_json::Value]) -> Self {
        let strings = |values: &[serde_json::Value]| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        };
        Self {
            game: strings(game),
            jvm: strings(jvm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_compare_by_version_string_only() {
        let a = LoaderVersion {
            version: "47.2.0".into(),
            raw_version: Some("1.20.1-47.2.0".into()),
            recommended: true,
            loader_type: LoaderType::Forge,
        };
        let b = LoaderVersion::new("47.2.0", LoaderType::Forge);
        assert_eq!(a, b);
        assert_ne!(a, LoaderVersion::new("47.2.1", LoaderType::Forge));
    }

    #[test]
    fn loader_type_serializes_lowercase() {
        let json = serde_json::to_string(&LoaderType::LegacyFabric).unwrap();
        assert_eq!(json, "\"legacyfabric\"");
        assert_eq!(LoaderType::NeoForge.to_string(), "neoforge");
    }

    #[test]
    fn object_arguments_are_skipped() {
        let game = vec![
            serde_json::json!("--fml.forgeVersion"),
            serde_json::json!("47.2.0"),
            serde_json::json!({"rules": [], "value": "--demo"}),
        ];
        let args = LaunchArguments::from_values(&game, &[]);
        assert_eq!(args.game, vec!["--fml.forgeVersion", "47.2.0"]);
    }
}
