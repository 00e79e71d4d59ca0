use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::model::{InstanceMetadata, METADATA_FILE};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::fs;
use crate::core::mods::ModType;

/// Reads and writes the metadata file of one instance directory.
pub struct InstanceStore {
    root: PathBuf,
}

impl InstanceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn exists(&self) -> bool {
        self.metadata_path().is_file()
    }

    pub async fn save(&self, metadata: &InstanceMetadata) -> InstallerResult<()> {
        let json = serde_json::to_string_pretty(metadata)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| InstallerError::io(&self.root, e))?;

        // Written beside the target, then renamed into place.
        let path = self.metadata_path();
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| InstallerError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| InstallerError::io(&path, e))?;

        info!("Saved instance metadata for '{}'", metadata.name);
        Ok(())
    }

    /// `None` for a fresh directory.
    pub async fn load(&self) -> InstallerResult<Option<InstanceMetadata>> {
        let path = self.metadata_path();
        if !path.is_file() {
            return Ok(None);
        }

        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| InstallerError::io(&path, e))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Delete the files a previous install placed, so mods dropped from the
    /// pack do not linger. Extracted archives are left alone since their
    /// contents are not tracked.
    pub async fn remove_installed_mods(&self, previous: &InstanceMetadata) -> InstallerResult<usize> {
        let paths = previous
            .mods
            .iter()
            .filter(|installed| installed.mod_type != ModType::Extract)
            .map(|installed| self.resolve(&installed.file))
            .collect::<InstallerResult<Vec<_>>>()?;

        let mut removed = 0;
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Removed old {:?}", path);
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(InstallerError::io(&path, e)),
            }
        }
        Ok(removed)
    }

    fn resolve(&self, relative: &Path) -> InstallerResult<PathBuf> {
        if relative.as_os_str().is_empty() || !fs::is_contained(relative) {
            return Err(InstallerError::ManifestResolution(format!(
                "{:?} in {} points outside the instance",
                relative, METADATA_FILE
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::installer::Side;
    use crate::core::instance::InstalledMod;
    use crate::core::loaders::{LoaderType, LoaderVersion};

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = InstanceStore::new(dir.path());
        assert!(store.load().await.unwrap().is_none());

        let mut metadata = InstanceMetadata::new("All the Mods", "1.20.1", Side::Client);
        metadata.loader = Some(LoaderVersion::new("47.2.0", LoaderType::Forge));
        metadata.mods.push(InstalledMod {
            name: "jei".into(),
            version: "15.2.0.27".into(),
            file: "mods/jei.jar".into(),
            mod_type: ModType::Mods,
            optional: false,
        });
        store.save(&metadata).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.minecraft_version, "1.20.1");
        assert_eq!(loaded.loader.unwrap().version, "47.2.0");
        assert_eq!(loaded.mods, metadata.mods);
        assert!(!dir.path().join("instance.json.tmp").exists());
    }

    #[tokio::test]
    async fn old_mod_files_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mods")).unwrap();
        std::fs::write(dir.path().join("mods/old.jar"), b"old").unwrap();
        std::fs::write(dir.path().join("mods/user.jar"), b"user").unwrap();

        let mut previous = InstanceMetadata::new("pack", "1.20.1", Side::Client);
        for file in ["mods/old.jar", "mods/gone.jar"] {
            previous.mods.push(InstalledMod {
                name: file.into(),
                version: String::new(),
                file: file.into(),
                mod_type: ModType::Mods,
                optional: false,
            });
        }

        let removed = InstanceStore::new(dir.path())
            .remove_installed_mods(&previous)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join("mods/old.jar").exists());
        assert!(dir.path().join("mods/user.jar").exists());
    }

    #[tokio::test]
    async fn escaping_metadata_paths_delete_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("instance");
        std::fs::create_dir_all(&root).unwrap();
        let victim = dir.path().join("victim.txt");
        std::fs::write(&victim, b"keep").unwrap();

        let mut previous = InstanceMetadata::new("pack", "1.20.1", Side::Client);
        previous.mods.push(InstalledMod {
            name: "evil".into(),
            version: String::new(),
            file: "../victim.txt".into(),
            mod_type: ModType::Mods,
            optional: false,
        });

        let err = InstanceStore::new(&root)
            .remove_installed_mods(&previous)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallerError::ManifestResolution(_)));
        assert!(victim.exists());
    }
}
