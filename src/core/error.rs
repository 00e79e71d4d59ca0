use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installer pipeline.
/// Every module returns `Result<T, InstallerError>`.
#[derive(Debug, Error)]
pub enum InstallerError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Network error for {url} after {attempts} attempt(s): {message}")]
    Network {
        url: String,
        attempts: u32,
        message: String,
    },

    // ── Integrity ───────────────────────────────────────
    #[error("Hash mismatch for {path:?} from {url}: expected {expected}, got {actual}")]
    Integrity {
        url: String,
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Loader processors ───────────────────────────────
    #[error("Processor {jar} failed (code {code:?})\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    Processor {
        jar: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    // ── Resolution ──────────────────────────────────────
    #[error("Manifest resolution failed: {0}")]
    ManifestResolution(String),

    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    #[error("{name} must be downloaded manually from {url}")]
    BrowserDownloadRequired { name: String, url: String },

    // ── Cancellation ────────────────────────────────────
    #[error("Install cancelled")]
    Cancelled,

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type InstallerResult<T> = Result<T, InstallerError>;

impl InstallerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallerError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the downloader may retry the operation that produced this error.
    ///
    /// Only transport failures, timeouts and server-side statuses qualify.
    /// A hash mismatch is a corrupt source and is never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            InstallerError::Http(e) => {
                if let Some(status) = e.status() {
                    return is_transient_status(status.as_u16());
                }
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            InstallerError::HttpStatus { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, InstallerError::Cancelled)
    }

    /// The URL, file or jar this error is about, if any.
    pub fn subject(&self) -> Option<String> {
        match self {
            InstallerError::Io { path, .. } => Some(path.display().to_string()),
            InstallerError::Http(e) => e.url().map(|u| u.to_string()),
            InstallerError::HttpStatus { url, .. } | InstallerError::Network { url, .. } => {
                Some(url.clone())
            }
            InstallerError::Integrity { url, .. } => Some(url.clone()),
            InstallerError::Processor { jar, .. } => Some(jar.clone()),
            InstallerError::BrowserDownloadRequired { url, .. } => Some(url.clone()),
            _ => None,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

impl From<std::io::Error> for InstallerError {
    fn from(source: std::io::Error) -> Self {
        InstallerError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for InstallerError {
    fn from(e: tokio::task::JoinError) -> Self {
        InstallerError::Other(format!("background task failed: {e}"))
    }
}
