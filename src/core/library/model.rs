use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::downloader::Download;
use crate::core::hashing::Checksum;

// ─── Declarations (Mojang-style library entries) ───

/// A library as declared by a pack manifest or a loader profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryDeclaration {
    /// Maven coordinate.
    pub name: String,
    /// Repository base URL, used when no explicit artifact download is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    /// OS name → classifier template (may contain `${arch}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactDownload>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub classifiers: HashMap<String, ArtifactDownload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactDownload {
    pub path: String,
    /// Empty for artifacts that only ship inside an installer.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

// ─── Platform ───

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Osx,
    Linux,
}

impl Os {
    /// Name used by library rules and `natives` maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::Osx => "osx",
            Os::Linux => "linux",
        }
    }
}

/// Target OS and architecture that rules and natives are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    /// Rule-style architecture name: `x86`, `x86_64`, `arm64`.
    pub arch: String,
}

impl Platform {
    pub fn new(os: Os, arch: impl Into<String>) -> Self {
        Self {
            os,
            arch: arch.into(),
        }
    }

    pub fn current() -> Self {
        let os = if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Osx
        } else {
            Os::Linux
        };
        let arch = match std::env::consts::ARCH {
            "x86" => "x86",
            "aarch64" => "arm64",
            other => other,
        };
        Self::new(os, arch)
    }

    /// Replacement for `${arch}` in natives classifiers.
    pub fn bitness(&self) -> &'static str {
        if self.arch == "x86" {
            "32"
        } else {
            "64"
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch)
    }
}

// ─── Resolved library ───

/// A library artifact with its destination resolved, ready to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    /// Relative to the libraries directory.
    pub path: PathBuf,
    pub url: Option<String>,
    #[serde(skip)]
    pub checksum: Option<Checksum>,
    pub size: Option<u64>,
    pub natives: bool,
}

impl Library {
    pub fn absolute_path(&self, libraries_dir: &Path) -> PathBuf {
        libraries_dir.join(&self.path)
    }

    /// Build the transfer for this library, or `None` for local-only artifacts.
    pub fn download(&self, libraries_dir: &Path) -> Option<Download> {
        let url = self.url.as_ref()?;
        Some(
            Download::prepare(
                url.clone(),
                self.absolute_path(libraries_dir),
                self.checksum.clone(),
                self.size,
            )
            .named(self.name.clone()),
        )
    }
}
