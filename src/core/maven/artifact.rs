use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::error::{InstallerError, InstallerResult};

/// A parsed Maven coordinate: `group:artifact:version[:classifier][@extension]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MavenArtifact {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
    /// File extension, `jar` unless overridden with `@ext`.
    pub extension: String,
}

impl MavenArtifact {
    pub fn parse(coord: &str) -> InstallerResult<Self> {
        let (body, extension) = match coord.trim().split_once('@') {
            Some((body, ext)) if !ext.is_empty() => (body, ext),
            Some(_) => return Err(InstallerError::InvalidMavenCoordinate(coord.to_string())),
            None => (coord.trim(), "jar"),
        };

        let mut parts = body.split(':');
        let (Some(group), Some(artifact), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(InstallerError::InvalidMavenCoordinate(coord.to_string()));
        };
        let classifier = parts.next().map(str::to_string);

        if parts.next().is_some() || [group, artifact, version].iter().any(|p| p.is_empty()) {
            return Err(InstallerError::InvalidMavenCoordinate(coord.to_string()));
        }

        Ok(Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
            classifier,
            extension: extension.to_string(),
        })
    }

    pub fn with_classifier(&self, classifier: &str) -> Self {
        Self {
            classifier: Some(classifier.to_string()),
            ..self.clone()
        }
    }

    pub fn filename(&self) -> String {
        let mut name = format!("{}-{}", self.artifact, self.version);
        if let Some(classifier) = &self.classifier {
            name.push('-');
            name.push_str(classifier);
        }
        name.push('.');
        name.push_str(&self.extension);
        name
    }

    /// Repository-relative path, always with forward slashes.
    pub fn repo_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.filename()
        )
    }

    /// Path relative to a libraries directory.
    pub fn local_path(&self) -> PathBuf {
        self.repo_path().split('/').collect()
    }

    pub fn path_in(&self, libraries_dir: &Path) -> PathBuf {
        libraries_dir.join(self.local_path())
    }

    pub fn url(&self, repository: &str) -> String {
        format!("{}/{}", repository.trim_end_matches('/'), self.repo_path())
    }
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        if self.extension != "jar" {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_classified_coordinates() {
        let plain = MavenArtifact::parse("net.fabricmc:fabric-loader:0.15.11").unwrap();
        assert_eq!(plain.group, "net.fabricmc");
        assert_eq!(plain.classifier, None);
        assert_eq!(plain.extension, "jar");

        let classified = MavenArtifact::parse("de.oceanlabs.mcp:mcp_config:1.20.1-20230612.114412@zip")
            .unwrap();
        assert_eq!(classified.extension, "zip");

        let natives = MavenArtifact::parse("org.lwjgl:lwjgl:3.3.1:natives-linux").unwrap();
        assert_eq!(natives.classifier.as_deref(), Some("natives-linux"));
    }

    #[test]
    fn rejects_malformed_coordinates() {
        for bad in ["", "a:b", "a::c", "a:b:c:d:e", "a:b:c@"] {
            assert!(
                matches!(MavenArtifact::parse(bad), Err(InstallerError::InvalidMavenCoordinate(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn layout_matches_maven_repository() {
        let a = MavenArtifact::parse("net.minecraftforge:forge:1.20.1-47.2.0:universal").unwrap();
        assert_eq!(
            a.url("https://maven.minecraftforge.net/"),
            "https://maven.minecraftforge.net/net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-universal.jar"
        );
        assert_eq!(
            a.local_path(),
            PathBuf::from("net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-universal.jar")
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        let coord = "de.oceanlabs.mcp:mcp_config:1.20.1:mappings@txt";
        let a = MavenArtifact::parse(coord).unwrap();
        assert_eq!(a.to_string(), coord);
        assert_eq!(a.with_classifier("srg").filename(), "mcp_config-1.20.1-srg.txt");
    }
}
