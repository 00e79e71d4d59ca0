use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{InstallerError, InstallerResult};
use crate::core::fs;
use crate::core::hashing::{Checksum, HashCode};
use crate::core::installer::Side;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownloadType {
    #[default]
    Direct,
    /// Must be fetched by the user through a browser.
    Browser,
    /// Served from a gated mirror that requires the access token.
    ///
    /// No adapter produces this; it only comes from native manifest entries.
    CurseMirror,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModType {
    #[default]
    Mods,
    ResourcePack,
    ShaderPack,
    CoreMods,
    Plugins,
    Worlds,
    /// Archive unpacked into the instance root.
    Extract,
    Root,
}

impl ModType {
    /// Sub-directory of the instance root this kind of file goes to.
    pub fn default_dir(&self) -> &'static str {
        match self {
            ModType::Mods => "mods",
            ModType::ResourcePack => "resourcepacks",
            ModType::ShaderPack => "shaderpacks",
            ModType::CoreMods => "coremods",
            ModType::Plugins => "plugins",
            ModType::Worlds => "saves",
            ModType::Extract | ModType::Root => "",
        }
    }

    /// Classify a file by the first component of its install path.
    pub fn from_dir(dir: &str) -> Self {
        match dir.split('/').next().unwrap_or_default() {
            "mods" => ModType::Mods,
            "resourcepacks" => ModType::ResourcePack,
            "shaderpacks" => ModType::ShaderPack,
            "coremods" => ModType::CoreMods,
            "plugins" => ModType::Plugins,
            "saves" => ModType::Worlds,
            _ => ModType::Root,
        }
    }
}

/// Normalized installable file, whatever manifest format it came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mod {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub url: String,
    /// Directory relative to the instance root, forward slashes.
    #[serde(default)]
    pub path: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub download_type: DownloadType,
    #[serde(default)]
    pub mod_type: ModType,
    #[serde(default = "yes")]
    pub client: bool,
    #[serde(default = "yes")]
    pub server: bool,
    #[serde(default)]
    pub optional: bool,
    /// Names of mods that must also be selected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
    /// An optional mod that follows the named mod's selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked: Option<String>,
    /// Mods sharing a group are mutually exclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn yes() -> bool {
    true
}

impl Mod {
    /// The strongest integrity value present: sha256, then sha1, md5, fingerprint.
    pub fn checksum(&self) -> Option<Checksum> {
        let digest = |hex: &Option<String>, wrap: fn(HashCode) -> Checksum| {
            hex.as_deref()
                .map(HashCode::from_hex)
                .filter(|code| !code.is_empty())
                .map(wrap)
        };

        digest(&self.sha256, Checksum::Sha256)
            .or_else(|| digest(&self.sha1, Checksum::Sha1))
            .or_else(|| digest(&self.md5, Checksum::Md5))
            .or_else(|| self.fingerprint.map(Checksum::Fingerprint))
    }

    pub fn is_for(&self, side: Side) -> bool {
        match side {
            Side::Client => self.client,
            Side::Server => self.server,
        }
    }

    /// Fails when `path` or `file` would leave the instance root.
    pub fn check_paths(&self) -> InstallerResult<()> {
        let file = Path::new(&self.file);
        if self.file.is_empty() || !fs::is_contained(file) || !fs::is_contained(Path::new(&self.path)) {
            return Err(InstallerError::ManifestResolution(format!(
                "{} has an unsafe install path {:?}/{:?}",
                self.name, self.path, self.file
            )));
        }
        Ok(())
    }

    /// Install location relative to the instance root.
    pub fn relative_path(&self) -> PathBuf {
        let mut path: PathBuf = self
            .path
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .collect();
        path.push(&self.file);
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strongest_hash_wins() {
        let mut m = Mod {
            md5: Some("0cbc6611f5540bd0809a388dc95a615b".into()),
            fingerprint: Some(42),
            ..Default::default()
        };
        assert!(matches!(m.checksum(), Some(Checksum::Md5(_))));

        m.sha1 = Some("640ab2bae07bedc4c163f679a746f7ab7fb5d1fa".into());
        assert!(matches!(m.checksum(), Some(Checksum::Sha1(_))));

        m.md5 = None;
        m.sha1 = None;
        assert_eq!(m.checksum(), Some(Checksum::Fingerprint(42)));
    }

    #[test]
    fn relative_path_normalizes_dot_prefixes() {
        let m = Mod {
            path: "./mods/".into(),
            file: "jei.jar".into(),
            ..Default::default()
        };
        assert_eq!(m.relative_path(), PathBuf::from("mods/jei.jar"));
    }

    #[test]
    fn paths_leaving_the_root_are_rejected() {
        let ok = Mod {
            name: "jei".into(),
            path: "mods".into(),
            file: "jei.jar".into(),
            ..Default::default()
        };
        assert!(ok.check_paths().is_ok());

        for (path, file) in [("../../outside", "evil.jar"), ("mods", "../evil.jar"), ("/tmp", "evil.jar"), ("mods", "")] {
            let m = Mod {
                path: path.into(),
                file: file.into(),
                ..ok.clone()
            };
            assert!(
                matches!(m.check_paths(), Err(InstallerError::ManifestResolution(_))),
                "{path}/{file}"
            );
        }
    }

    #[test]
    fn directory_classification() {
        assert_eq!(ModType::from_dir("resourcepacks"), ModType::ResourcePack);
        assert_eq!(ModType::from_dir("config/jei"), ModType::Root);
        assert_eq!(ModType::Worlds.default_dir(), "saves");
    }
}
