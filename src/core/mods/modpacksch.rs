use serde::{Deserialize, Serialize};

use super::model::{DownloadType, Mod, ModType};

/// A `files[]` entry of a Modpacks.ch (FTB) pack version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModpacksChFile {
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Directory such as `./mods/`.
    pub path: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub clientonly: bool,
    #[serde(default)]
    pub serveronly: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, rename = "type")]
    pub kind: String,
}

pub fn convert(file: &ModpacksChFile) -> Mod {
    let path = file
        .path
        .trim_start_matches("./")
        .trim_start_matches('/')
        .trim_end_matches('/')
        .to_string();

    let mod_type = match file.kind.as_str() {
        "resource" => ModType::ResourcePack,
        "mod" if path == "mods" => ModType::Mods,
        _ => ModType::from_dir(&path),
    };

    Mod {
        name: file.name.clone(),
        version: file.version.clone(),
        url: file.url.clone(),
        path,
        file: file.name.clone(),
        md5: None,
        sha1: file.sha1.clone().filter(|s| !s.is_empty()),
        sha256: None,
        fingerprint: None,
        filesize: Some(file.size).filter(|s| *s > 0),
        download_type: DownloadType::Direct,
        mod_type,
        client: !file.serveronly,
        server: !file.clientonly,
        optional: file.optional,
        depends: Vec::new(),
        linked: None,
        group: None,
        description: None,
    }
}
