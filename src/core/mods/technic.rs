use serde::{Deserialize, Serialize};

use super::model::{DownloadType, Mod, ModType};

/// A mod entry from a Technic Solder build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicMod {
    pub name: String,
    pub version: String,
    pub url: String,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
}

/// Solder entries are zip archives overlaid on the instance root. They have no
/// side or optional distinction.
pub fn convert(entry: &TechnicMod) -> Mod {
    let file = entry
        .url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-{}.zip", entry.name, entry.version));

    Mod {
        name: entry.name.clone(),
        version: entry.version.clone(),
        url: entry.url.clone(),
        path: String::new(),
        file,
        md5: entry.md5.clone().filter(|s| !s.is_empty()),
        sha1: None,
        sha256: None,
        fingerprint: None,
        filesize: entry.filesize.filter(|s| *s > 0),
        download_type: DownloadType::Direct,
        mod_type: ModType::Extract,
        client: true,
        server: true,
        optional: false,
        depends: Vec::new(),
        linked: None,
        group: None,
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn technic_entries_are_required_everywhere() {
        let m = convert(&TechnicMod {
            name: "tinkers".into(),
            version: "1.12.2-2.13.0".into(),
            url: "https://solder.example/mods/tinkers/tinkers-1.12.2-2.13.0.zip".into(),
            md5: Some("0cbc6611f5540bd0809a388dc95a615b".into()),
            filesize: None,
        });

        assert_eq!(m.mod_type, ModType::Extract);
        assert_eq!(m.file, "tinkers-1.12.2-2.13.0.zip");
        assert!(m.client && m.server && !m.optional);
    }
}
