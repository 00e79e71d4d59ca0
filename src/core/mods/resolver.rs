use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::curseforge::{self, CurseForgeFile, CurseForgeProject};
use super::model::{DownloadType, Mod};
use super::modpacksch::{self, ModpacksChFile};
use super::modrinth::{self, ModrinthFile};
use super::technic::{self, TechnicMod};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::installer::Side;

/// One mod entry as it appears in a pack manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ManifestMod {
    CurseForge {
        project: CurseForgeProject,
        file: CurseForgeFile,
    },
    Modrinth(ModrinthFile),
    ModpacksCh(ModpacksChFile),
    Technic(TechnicMod),
    /// Already normalized.
    Native(Mod),
}

/// Which optional mods the user picked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptionalSelection {
    #[default]
    All,
    None,
    Named(HashSet<String>),
}

impl OptionalSelection {
    fn includes(&self, name: &str) -> bool {
        match self {
            OptionalSelection::All => true,
            OptionalSelection::None => false,
            OptionalSelection::Named(names) => names.contains(name),
        }
    }
}

/// Normalizes manifest entries into the mod set for one side.
pub struct ModResolver {
    browser_downloads_dir: Option<PathBuf>,
}

impl ModResolver {
    pub fn new(browser_downloads_dir: Option<PathBuf>) -> Self {
        Self {
            browser_downloads_dir,
        }
    }

    pub fn normalize(entry: &ManifestMod, side: Side) -> Option<Mod> {
        match entry {
            ManifestMod::CurseForge { project, file } => Some(curseforge::convert(project, file)),
            ManifestMod::Modrinth(file) => modrinth::convert(file, side),
            ManifestMod::ModpacksCh(file) => Some(modpacksch::convert(file)),
            ManifestMod::Technic(entry) => Some(technic::convert(entry)),
            ManifestMod::Native(m) => Some(m.clone()),
        }
    }

    /// Where a browser-only file is expected to have been saved.
    pub fn browser_file(&self, m: &Mod) -> Option<PathBuf> {
        self.browser_downloads_dir.as_ref().map(|dir| dir.join(&m.file))
    }

    /// Mods installed for `side` under `selection`.
    ///
    /// Linked mods follow the mod they name. Every dependency of a picked mod
    /// must itself be picked; nothing is fetched to satisfy it.
    pub fn resolve(
        &self,
        entries: &[ManifestMod],
        side: Side,
        selection: &OptionalSelection,
    ) -> InstallerResult<Vec<Mod>> {
        let candidates: Vec<Mod> = entries
            .iter()
            .filter_map(|entry| Self::normalize(entry, side))
            .filter(|m| {
                let keep = m.is_for(side);
                if !keep {
                    debug!("Skipping {} (not for {})", m.name, side.as_str());
                }
                keep
            })
            .collect();
        for m in &candidates {
            m.check_paths()?;
        }

        let mut picked: Vec<bool> = candidates
            .iter()
            .map(|m| !m.optional || selection.includes(&m.name))
            .collect();
        loop {
            let names = picked_names(&candidates, &picked);
            let mut changed = false;
            for (i, m) in candidates.iter().enumerate() {
                let follows = m
                    .linked
                    .as_ref()
                    .is_some_and(|parent| names.contains(&parent.to_lowercase()));
                if !picked[i] && follows {
                    debug!("Including {} (linked to {:?})", m.name, m.linked);
                    picked[i] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let names = picked_names(&candidates, &picked);
        let mut mods = Vec::new();
        let mut groups: HashMap<String, String> = HashMap::new();

        for (m, picked) in candidates.into_iter().zip(picked) {
            if !picked {
                debug!("Skipping optional {}", m.name);
                continue;
            }

            if let Some(group) = &m.group {
                if let Some(other) = groups.insert(group.clone(), m.name.clone()) {
                    return Err(InstallerError::ManifestResolution(format!(
                        "{} and {} are both selected but belong to group {}",
                        other, m.name, group
                    )));
                }
            }

            if let Some(missing) = m.depends.iter().find(|d| !names.contains(&d.to_lowercase())) {
                return Err(InstallerError::ManifestResolution(format!(
                    "{} depends on {}, which is not selected",
                    m.name, missing
                )));
            }

            if m.download_type == DownloadType::Browser {
                let present = self.browser_file(&m).map_or(false, |p| p.is_file());
                if !present {
                    return Err(InstallerError::BrowserDownloadRequired {
                        name: m.name.clone(),
                        url: m.url.clone(),
                    });
                }
            }

            mods.push(m);
        }

        Ok(mods)
    }
}

/// Lowercased names of the picked mods; names compare case-insensitively.
fn picked_names(candidates: &[Mod], picked: &[bool]) -> HashSet<String> {
    candidates
        .iter()
        .zip(picked)
        .filter(|(_, picked)| **picked)
        .map(|(m, _)| m.name.to_lowercase())
        .collect()
}
