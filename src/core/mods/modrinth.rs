use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::model::{DownloadType, Mod, ModType};
use crate::core::installer::Side;

/// A `files[]` entry of `modrinth.index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModrinthFile {
    /// Install path relative to the instance root, e.g. `mods/sodium.jar`.
    pub path: String,
    #[serde(default)]
    pub hashes: HashMap<String, String>,
    #[serde(default)]
    pub env: Option<ModrinthEnv>,
    pub downloads: Vec<String>,
    #[serde(default)]
    pub file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModrinthEnv {
    pub client: EnvSupport,
    pub server: EnvSupport,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvSupport {
    Required,
    Optional,
    Unsupported,
}

/// Convert a pack file for `side`. Files unsupported on that side yield `None`;
/// `optional` reflects only the side being installed.
pub fn convert(file: &ModrinthFile, side: Side) -> Option<Mod> {
    let (client, server) = match &file.env {
        Some(env) => (env.client, env.server),
        None => (EnvSupport::Required, EnvSupport::Required),
    };
    let on_side = match side {
        Side::Client => client,
        Side::Server => server,
    };
    if on_side == EnvSupport::Unsupported {
        return None;
    }

    let (dir, name) = match file.path.rsplit_once('/') {
        Some((dir, name)) => (dir.to_string(), name.to_string()),
        None => (String::new(), file.path.clone()),
    };

    Some(Mod {
        name: name.clone(),
        version: String::new(),
        url: file.downloads.first().cloned().unwrap_or_default(),
        mod_type: ModType::from_dir(&dir),
        path: dir,
        file: name,
        md5: None,
        sha1: file.hashes.get("sha1").cloned(),
        sha256: None,
        fingerprint: None,
        filesize: Some(file.file_size).filter(|s| *s > 0),
        download_type: DownloadType::Direct,
        client: client != EnvSupport::Unsupported,
        server: server != EnvSupport::Unsupported,
        optional: on_side == EnvSupport::Optional,
        depends: Vec::new(),
        linked: None,
        group: None,
        description: None,
    })
}
