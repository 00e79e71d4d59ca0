use serde::{Deserialize, Serialize};

use super::version::{LoaderMetadata, LoaderRequest, LoaderType};
use crate::core::error::{InstallerError, InstallerResult};

/// One entry of a MultiMC `mmc-pack.json` component list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiMcComponent {
    pub uid: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub cached_version: Option<String>,
}

impl MultiMcComponent {
    fn resolved_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or(self.cached_version.as_deref())
            .filter(|v| !v.is_empty())
    }
}

fn loader_for_uid(uid: &str) -> Option<LoaderType> {
    match uid {
        "net.minecraftforge" => Some(LoaderType::Forge),
        "net.neoforged" => Some(LoaderType::NeoForge),
        "net.fabricmc.fabric-loader" => Some(LoaderType::Fabric),
        "org.quiltmc.quilt-loader" => Some(LoaderType::Quilt),
        _ => None,
    }
}

/// Turn a component list into the Minecraft version and, if present, the loader to install.
pub fn convert_components(
    components: &[MultiMcComponent],
) -> InstallerResult<(String, Option<LoaderRequest>)> {
    let minecraft = components
        .iter()
        .find(|c| c.uid == "net.minecraft")
        .and_then(|c| c.resolved_version())
        .ok_or_else(|| {
            InstallerError::ManifestResolution("component list has no net.minecraft version".into())
        })?
        .to_string();

    let mut loader = None;
    for component in components {
        let Some(loader_type) = loader_for_uid(&component.uid) else {
            continue;
        };
        if loader.is_some() {
            return Err(InstallerError::ManifestResolution(
                "component list declares more than one loader".into(),
            ));
        }
        let version = component.resolved_version().ok_or_else(|| {
            InstallerError::ManifestResolution(format!("{} has no version", component.uid))
        })?;
        loader = Some(LoaderRequest::new(
            loader_type,
            LoaderMetadata {
                minecraft: minecraft.clone(),
                version: Some(version.to_string()),
                ..Default::default()
            },
        ));
    }

    Ok((minecraft, loader))
}
