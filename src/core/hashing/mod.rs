// ─── Content hashing ───
// Digests used to decide whether a file on disk is already correct.

mod fingerprint;

use std::fmt;
use std::io::Read;
use std::path::Path;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tokio::io::AsyncReadExt;

use crate::core::error::{InstallerError, InstallerResult};

pub use fingerprint::{fingerprint_bytes, fingerprint_file};

const BUFFER_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Infer the algorithm from the length of a hex digest.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(Self::Md5),
            40 => Some(Self::Sha1),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// A raw digest. `HashCode::EMPTY` means "no verification requested".
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HashCode {
    bytes: Vec<u8>,
}

impl HashCode {
    pub const EMPTY: HashCode = HashCode { bytes: Vec::new() };

    /// Parse a hex digest, ignoring case. Anything unparsable is `EMPTY`.
    pub fn from_hex(hex_str: &str) -> Self {
        let trimmed = hex_str.trim();
        if trimmed.len() < 2 || trimmed.len() % 2 != 0 {
            return Self::EMPTY;
        }
        match hex::decode(trimmed.to_ascii_lowercase()) {
            Ok(bytes) => Self { bytes },
            Err(_) => Self::EMPTY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for HashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.bytes))
    }
}

impl fmt::Debug for HashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashCode({})", self)
    }
}

enum DigestState {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Self::Md5(Md5::new()),
            HashAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Md5(h) => h.update(chunk),
            Self::Sha1(h) => h.update(chunk),
            Self::Sha256(h) => h.update(chunk),
        }
    }

    fn finish(self) -> HashCode {
        let bytes = match self {
            Self::Md5(h) => h.finalize().to_vec(),
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
        };
        HashCode { bytes }
    }
}

pub fn hash_bytes(bytes: &[u8], algorithm: HashAlgorithm) -> HashCode {
    let mut state = DigestState::new(algorithm);
    state.update(bytes);
    state.finish()
}

/// Hash a blocking reader with a fixed-size buffer.
pub fn hash_reader<R: Read>(mut reader: R, algorithm: HashAlgorithm) -> std::io::Result<HashCode> {
    let mut state = DigestState::new(algorithm);
    let mut buffer = [0u8; BUFFER_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        state.update(&buffer[..read]);
    }
    Ok(state.finish())
}

/// Hash a file without loading it into memory.
pub async fn hash_file(path: &Path, algorithm: HashAlgorithm) -> InstallerResult<HashCode> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| InstallerError::io(path, e))?;

    let mut state = DigestState::new(algorithm);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| InstallerError::io(path, e))?;
        if read == 0 {
            break;
        }
        state.update(&buffer[..read]);
    }
    Ok(state.finish())
}

/// An expected integrity value for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checksum {
    Md5(HashCode),
    Sha1(HashCode),
    Sha256(HashCode),
    /// CurseForge package fingerprint, compared for equality only.
    Fingerprint(u32),
}

impl Checksum {
    /// Build a digest checksum from hex, inferring the algorithm from its length.
    /// Returns `None` for empty or unrecognised input.
    pub fn parse_hex(hex_str: &str) -> Option<Self> {
        let algorithm = HashAlgorithm::from_hex_len(hex_str.trim().len())?;
        let code = HashCode::from_hex(hex_str);
        if code.is_empty() {
            return None;
        }
        Some(Self::from_code(algorithm, code))
    }

    pub fn from_code(algorithm: HashAlgorithm, code: HashCode) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Self::Md5(code),
            HashAlgorithm::Sha1 => Self::Sha1(code),
            HashAlgorithm::Sha256 => Self::Sha256(code),
        }
    }

    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        match self {
            Self::Md5(_) => Some(HashAlgorithm::Md5),
            Self::Sha1(_) => Some(HashAlgorithm::Sha1),
            Self::Sha256(_) => Some(HashAlgorithm::Sha256),
            Self::Fingerprint(_) => None,
        }
    }

    /// Compute the same kind of checksum for `path`.
    pub async fn compute_same_kind(&self, path: &Path) -> InstallerResult<Checksum> {
        match self.algorithm() {
            Some(algorithm) => Ok(Self::from_code(algorithm, hash_file(path, algorithm).await?)),
            None => {
                let path = path.to_path_buf();
                let value = tokio::task::spawn_blocking(move || fingerprint_file(&path)).await??;
                Ok(Self::Fingerprint(value))
            }
        }
    }

    pub async fn matches_file(&self, path: &Path) -> InstallerResult<bool> {
        Ok(&self.compute_same_kind(path).await? == self)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5(code) => write!(f, "md5:{}", code),
            Self::Sha1(code) => write!(f, "sha1:{}", code),
            Self::Sha256(code) => write!(f, "sha256:{}", code),
            Self::Fingerprint(value) => write!(f, "fingerprint:{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests_of_test_string() {
        assert_eq!(
            hash_bytes(b"Test", HashAlgorithm::Md5).to_string(),
            "0cbc6611f5540bd0809a388dc95a615b"
        );
        assert_eq!(
            hash_bytes(b"Test", HashAlgorithm::Sha1).to_string(),
            "640ab2bae07bedc4c163f679a746f7ab7fb5d1fa"
        );
        assert_eq!(
            hash_bytes(b"Test", HashAlgorithm::Sha256).to_string(),
            "532eaabd9574880dbf76b9b8cc00832c20a6ec113d682299550d7a6e0f345e25"
        );
    }

    #[test]
    fn hex_comparison_ignores_case() {
        let lower = HashCode::from_hex("0cbc6611f5540bd0809a388dc95a615b");
        let upper = HashCode::from_hex("0CBC6611F5540BD0809A388DC95A615B");
        assert_eq!(lower, upper);
    }

    #[test]
    fn malformed_hex_is_empty_sentinel() {
        assert_eq!(HashCode::from_hex(""), HashCode::EMPTY);
        assert_eq!(HashCode::from_hex("abc"), HashCode::EMPTY);
        assert_eq!(HashCode::from_hex("zz"), HashCode::EMPTY);
    }

    #[test]
    fn checksum_kind_follows_hex_length() {
        assert!(matches!(
            Checksum::parse_hex("0cbc6611f5540bd0809a388dc95a615b"),
            Some(Checksum::Md5(_))
        ));
        assert!(matches!(
            Checksum::parse_hex("640ab2bae07bedc4c163f679a746f7ab7fb5d1fa"),
            Some(Checksum::Sha1(_))
        ));
        assert!(Checksum::parse_hex("1234").is_none());
    }

    #[test]
    fn reader_hash_matches_one_shot_hash_across_buffer_boundaries() {
        let data: Vec<u8> = (0..(BUFFER_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = hash_reader(std::io::Cursor::new(&data), HashAlgorithm::Sha1).unwrap();
        assert_eq!(streamed, hash_bytes(&data, HashAlgorithm::Sha1));
    }

    #[tokio::test]
    async fn file_checksum_matches_and_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TestSHA1.txt");
        tokio::fs::write(&path, b"Test").await.unwrap();

        let expected = Checksum::parse_hex("640ab2bae07bedc4c163f679a746f7ab7fb5d1fa").unwrap();
        assert!(expected.matches_file(&path).await.unwrap());

        let missing = dir.path().join("absent.txt");
        assert!(matches!(
            expected.matches_file(&missing).await,
            Err(InstallerError::Io { .. })
        ));
    }
}
