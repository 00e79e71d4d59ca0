use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{InstallerError, InstallerResult};
use crate::core::hashing::Checksum;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    NotStarted,
    InProgress,
    Verified,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The destination already held the right bytes; no request was made.
    CacheHit,
    Fetched { bytes: u64 },
}

/// A single staged transfer.
#[derive(Debug, Clone)]
pub struct Download {
    pub url: String,
    pub dest: PathBuf,
    /// Secondary location that receives a copy once the bytes are verified.
    pub copy_to: Option<PathBuf>,
    pub checksum: Option<Checksum>,
    pub size: Option<u64>,
    pub requires_auth: bool,
    name: Option<String>,
    state: DownloadState,
}

impl Download {
    /// Pure configuration; touches neither disk nor network.
    pub fn prepare(
        url: impl Into<String>,
        dest: impl Into<PathBuf>,
        checksum: Option<Checksum>,
        size: Option<u64>,
    ) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            copy_to: None,
            checksum,
            size: size.filter(|s| *s > 0),
            requires_auth: false,
            name: None,
            state: DownloadState::NotStarted,
        }
    }

    pub fn copy_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.copy_to = Some(path.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the download as needing the gated-mirror access token.
    pub fn authorized(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: DownloadState) {
        self.state = state;
    }

    /// Name shown in progress events.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.url.clone())
    }

    pub(crate) fn part_path(&self) -> PathBuf {
        let mut name = self
            .dest
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        self.dest.with_file_name(name)
    }

    /// Whether the destination is missing or does not hold the expected bytes.
    ///
    /// Only stats the file and, when a checksum is set, hashes it.
    pub async fn needs_download(&self) -> InstallerResult<bool> {
        file_needs_download(&self.dest, self.size, self.checksum.as_ref()).await
    }
}

pub(crate) async fn file_needs_download(
    path: &Path,
    size: Option<u64>,
    checksum: Option<&Checksum>,
) -> InstallerResult<bool> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(InstallerError::io(path, e)),
    };

    if let Some(expected) = size {
        if metadata.len() != expected {
            debug!(
                "Size mismatch for {:?}: {} != {}",
                path,
                metadata.len(),
                expected
            );
            return Ok(true);
        }
    }

    if let Some(checksum) = checksum {
        return Ok(!checksum.matches_file(path).await?);
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hashing::{hash_bytes, HashAlgorithm};

    #[tokio::test]
    async fn missing_file_needs_download() {
        let dir = tempfile::tempdir().unwrap();
        let dl = Download::prepare("https://example.com/a", dir.path().join("a"), None, None);
        assert!(dl.needs_download().await.unwrap());
    }

    #[tokio::test]
    async fn matching_size_and_hash_is_a_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jar");
        tokio::fs::write(&dest, b"payload").await.unwrap();

        let sha1 = Checksum::Sha1(hash_bytes(b"payload", HashAlgorithm::Sha1));
        let dl = Download::prepare("https://example.com/a.jar", &dest, Some(sha1), Some(7));
        assert!(!dl.needs_download().await.unwrap());
    }

    #[tokio::test]
    async fn wrong_size_or_hash_needs_download() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jar");
        tokio::fs::write(&dest, b"payload").await.unwrap();

        let sized = Download::prepare("https://example.com/a.jar", &dest, None, Some(99));
        assert!(sized.needs_download().await.unwrap());

        let wrong = Checksum::Md5(hash_bytes(b"other", HashAlgorithm::Md5));
        let hashed = Download::prepare("https://example.com/a.jar", &dest, Some(wrong), None);
        assert!(hashed.needs_download().await.unwrap());
    }

    #[test]
    fn part_file_sits_next_to_destination() {
        let dl = Download::prepare("u", "/tmp/libs/a-1.0.jar", None, None);
        assert_eq!(dl.part_path(), PathBuf::from("/tmp/libs/a-1.0.jar.part"));
    }
}
