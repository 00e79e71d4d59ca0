use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::model::{ArtifactDownload, Library, LibraryDeclaration, Platform, RuleAction};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::fs;
use crate::core::hashing::Checksum;
use crate::core::maven::{MavenArtifact, MOJANG_LIBRARIES};

impl LibraryDeclaration {
    /// Evaluate the declaration's rules for `platform`.
    ///
    /// No rules means allowed. Otherwise rules are applied top to bottom,
    /// starting disallowed; each matching rule sets the result.
    pub fn is_allowed_on(&self, platform: &Platform) -> bool {
        let Some(rules) = &self.rules else {
            return true;
        };

        let mut allowed = false;
        for rule in rules {
            let matches = match &rule.os {
                None => true,
                Some(os) => {
                    let name_ok = os.name.as_deref().map_or(true, |n| n == platform.os.as_str());
                    let arch_ok = os.arch.as_deref().map_or(true, |a| a == platform.arch);
                    name_ok && arch_ok
                }
            };
            if matches {
                allowed = rule.action == RuleAction::Allow;
            }
        }
        allowed
    }

    pub fn native_classifier(&self, platform: &Platform) -> Option<String> {
        self.natives
            .as_ref()?
            .get(platform.os.as_str())
            .map(|template| template.replace("${arch}", platform.bitness()))
    }
}

/// Produces the platform-filtered, path-deduplicated library set for a run.
pub struct LibraryResolver<'a> {
    libraries_dir: &'a Path,
    platform: &'a Platform,
}

impl<'a> LibraryResolver<'a> {
    pub fn new(libraries_dir: &'a Path, platform: &'a Platform) -> Self {
        Self {
            libraries_dir,
            platform,
        }
    }

    /// Resolve manifest libraries first, then loader libraries.
    ///
    /// When two entries land on the same relative path the first one wins,
    /// which lets a pack pin a different build of a loader dependency.
    pub fn resolve(
        &self,
        manifest: &[LibraryDeclaration],
        loader: &[LibraryDeclaration],
    ) -> InstallerResult<Vec<Library>> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut resolved = Vec::new();

        for declaration in manifest.iter().chain(loader) {
            if !declaration.is_allowed_on(self.platform) {
                debug!("Skipping library (OS rule): {}", declaration.name);
                continue;
            }

            for library in self.expand(declaration)? {
                if seen.insert(library.path.clone()) {
                    resolved.push(library);
                } else {
                    debug!("Dropping duplicate library path: {:?}", library.path);
                }
            }
        }

        Ok(resolved)
    }

    /// The main artifact (if any) plus the natives artifact for this platform.
    fn expand(&self, declaration: &LibraryDeclaration) -> InstallerResult<Vec<Library>> {
        let mut out = Vec::new();
        let downloads = declaration.downloads.as_ref();

        let natives_only = declaration.natives.is_some()
            && downloads.map_or(false, |d| d.artifact.is_none());

        if let Some(artifact) = downloads.and_then(|d| d.artifact.as_ref()) {
            out.push(self.from_artifact(&declaration.name, artifact, false)?);
        } else if !natives_only {
            out.push(self.from_coordinate(declaration, None)?);
        }

        if let Some(classifier) = declaration.native_classifier(self.platform) {
            let explicit = downloads.and_then(|d| d.classifiers.get(&classifier));
            let native = match explicit {
                Some(artifact) => self.from_artifact(&declaration.name, artifact, true)?,
                None => self.from_coordinate(declaration, Some(&classifier))?,
            };
            out.push(native);
        }

        Ok(out)
    }

    fn from_artifact(
        &self,
        name: &str,
        artifact: &ArtifactDownload,
        natives: bool,
    ) -> InstallerResult<Library> {
        let path: PathBuf = artifact.path.split('/').collect();
        if !fs::is_contained(&path) {
            return Err(InstallerError::ManifestResolution(format!(
                "library {name} has an unsafe path {:?}",
                artifact.path
            )));
        }
        let url = Some(artifact.url.clone()).filter(|u| !u.is_empty());

        if url.is_none() && !self.libraries_dir.join(&path).exists() {
            return Err(InstallerError::ManifestResolution(format!(
                "library {name} has no download URL and is not present at {:?}",
                path
            )));
        }

        Ok(Library {
            name: name.to_string(),
            path,
            url,
            checksum: artifact.sha1.as_deref().and_then(Checksum::parse_hex),
            size: artifact.size.filter(|s| *s > 0),
            natives,
        })
    }

    fn from_coordinate(
        &self,
        declaration: &LibraryDeclaration,
        classifier: Option<&str>,
    ) -> InstallerResult<Library> {
        let mut artifact = MavenArtifact::parse(&declaration.name).map_err(|_| {
            InstallerError::ManifestResolution(format!(
                "library {} has an invalid coordinate",
                declaration.name
            ))
        })?;
        if let Some(classifier) = classifier {
            artifact = artifact.with_classifier(classifier);
        }

        let repository = declaration.url.as_deref().unwrap_or(MOJANG_LIBRARIES);
        Ok(Library {
            name: artifact.to_string(),
            path: artifact.local_path(),
            url: Some(artifact.url(repository)),
            checksum: None,
            size: None,
            natives: classifier.is_some(),
        })
    }
}
