use serde::{Deserialize, Serialize};

use super::model::{DownloadType, Mod, ModType};

pub const CLASS_MODS: u32 = 6;
pub const CLASS_RESOURCE_PACKS: u32 = 12;
pub const CLASS_WORLDS: u32 = 17;
pub const CLASS_SHADER_PACKS: u32 = 6552;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeProject {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub class_id: Option<u32>,
    #[serde(default)]
    pub website_url: Option<String>,
}

impl CurseForgeProject {
    pub fn mod_type(&self) -> ModType {
        match self.class_id {
            Some(CLASS_RESOURCE_PACKS) => ModType::ResourcePack,
            Some(CLASS_WORLDS) => ModType::Worlds,
            Some(CLASS_SHADER_PACKS) => ModType::ShaderPack,
            _ => ModType::Mods,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeFile {
    pub id: u32,
    pub display_name: String,
    pub file_name: String,
    #[serde(default)]
    pub file_length: u64,
    #[serde(default)]
    pub release_type: u8,
    /// Absent when the author disabled third-party distribution.
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub package_fingerprint: u32,
    #[serde(default)]
    pub hashes: Vec<CurseForgeHash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurseForgeHash {
    pub value: String,
    /// 1 = SHA-1, 2 = MD5.
    pub algo: u8,
}

/// Display label for a file's release channel.
pub fn release_type_label(release_type: u8) -> &'static str {
    match release_type {
        1 => "release",
        2 => "beta",
        _ => "alpha",
    }
}

pub fn convert(project: &CurseForgeProject, file: &CurseForgeFile) -> Mod {
    let hash = |algo: u8| {
        file.hashes
            .iter()
            .find(|h| h.algo == algo)
            .map(|h| h.value.clone())
    };
    let mod_type = project.mod_type();

    let (url, download_type) = match &file.download_url {
        Some(url) if !url.is_empty() => (url.clone(), DownloadType::Direct),
        _ => (
            format!(
                "https://www.curseforge.com/minecraft/{}/{}/download/{}",
                category_slug(mod_type),
                project.slug,
                file.id
            ),
            DownloadType::Browser,
        ),
    };

    Mod {
        name: project.name.clone(),
        version: file.display_name.clone(),
        url,
        path: mod_type.default_dir().to_string(),
        file: file.file_name.clone(),
        md5: hash(2),
        sha1: hash(1),
        sha256: None,
        fingerprint: Some(file.package_fingerprint).filter(|f| *f != 0),
        filesize: Some(file.file_length).filter(|s| *s > 0),
        download_type,
        mod_type,
        client: true,
        server: true,
        optional: false,
        depends: Vec::new(),
        linked: None,
        group: None,
        description: project.summary.clone(),
    }
}

fn category_slug(mod_type: ModType) -> &'static str {
    match mod_type {
        ModType::ResourcePack => "texture-packs",
        ModType::Worlds => "worlds",
        ModType::ShaderPack => "shaders",
        _ => "mc-mods",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hashing::Checksum;

    fn project(class_id: u32) -> CurseForgeProject {
        CurseForgeProject {
            id: 238222,
            name: "Just Enough Items".into(),
            slug: "jei".into(),
            summary: Some("View items and recipes".into()),
            class_id: Some(class_id),
            website_url: None,
        }
    }

    fn file() -> CurseForgeFile {
        CurseForgeFile {
            id: 4712866,
            display_name: "jei-1.20.1-forge-15.2.0.27".into(),
            file_name: "jei-1.20.1-forge-15.2.0.27.jar".into(),
            file_length: 1_204_000,
            release_type: 2,
            download_url: Some("https://edge.forgecdn.net/files/4712/866/jei.jar".into()),
            package_fingerprint: 3_156_664_781,
            hashes: vec![CurseForgeHash {
                value: "640ab2bae07bedc4c163f679a746f7ab7fb5d1fa".into(),
                algo: 1,
            }],
        }
    }

    #[test]
    fn converts_direct_file() {
        let m = convert(&project(CLASS_MODS), &file());
        assert_eq!(m.download_type, DownloadType::Direct);
        assert_eq!(m.path, "mods");
        assert_eq!(m.fingerprint, Some(3_156_664_781));
        assert_eq!(m.filesize, Some(1_204_000));
        assert!(matches!(m.checksum(), Some(Checksum::Sha1(_))));
        assert!(m.client && m.server && !m.optional);
    }

    #[test]
    fn class_ids_pick_the_target_directory() {
        assert_eq!(convert(&project(CLASS_RESOURCE_PACKS), &file()).path, "resourcepacks");
        assert_eq!(convert(&project(CLASS_WORLDS), &file()).path, "saves");
        assert_eq!(convert(&project(CLASS_SHADER_PACKS), &file()).path, "shaderpacks");
    }

    #[test]
    fn files_without_url_need_a_browser() {
        let mut f = file();
        f.download_url = None;
        let m = convert(&project(CLASS_MODS), &f);
        assert_eq!(m.download_type, DownloadType::Browser);
        assert_eq!(
            m.url,
            "https://www.curseforge.com/minecraft/mc-mods/jei/download/4712866"
        );
    }

    #[test]
    fn release_labels() {
        assert_eq!(release_type_label(1), "release");
        assert_eq!(release_type_label(2), "beta");
        assert_eq!(release_type_label(3), "alpha");
        assert_eq!(release_type_label(0), "alpha");
    }
}
