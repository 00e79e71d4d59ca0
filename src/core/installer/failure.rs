use std::fmt;

use serde::Serialize;

use super::state::InstallState;
use crate::core::error::InstallerError;

/// Terminal error of a run, tagged with the phase it happened in.
#[derive(Debug)]
pub struct InstallFailure {
    pub phase: InstallState,
    pub error: InstallerError,
}

/// Display-ready digest of an `InstallFailure`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailureSummary {
    pub phase: InstallState,
    pub cause: String,
    /// Affected URL, file or processor jar.
    pub subject: Option<String>,
}

impl InstallFailure {
    pub fn is_cancelled(&self) -> bool {
        self.error.is_cancelled()
    }

    /// `Cancelled` for a user abort, `Failed` otherwise.
    pub fn final_state(&self) -> InstallState {
        if self.is_cancelled() {
            InstallState::Cancelled
        } else {
            InstallState::Failed
        }
    }

    pub fn summary(&self) -> FailureSummary {
        let cause = match &self.error {
            InstallerError::Network { attempts, .. } => {
                format!("network failure after {attempts} attempt(s)")
            }
            InstallerError::HttpStatus { status, .. } => format!("server answered HTTP {status}"),
            InstallerError::Integrity { .. } => {
                "downloaded file does not match its expected hash".to_string()
            }
            InstallerError::Processor { code, .. } => match code {
                Some(code) => format!("loader processor exited with code {code}"),
                None => "loader processor was terminated".to_string(),
            },
            InstallerError::Cancelled => "cancelled by the user".to_string(),
            // Only the first line: processor output and nested sources stay out of the summary.
            other => other
                .to_string()
                .lines()
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        FailureSummary {
            phase: self.phase,
            cause,
            subject: self.error.subject(),
        }
    }
}

impl fmt::Display for InstallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary();
        write!(f, "install failed while {}: {}", summary.phase, summary.cause)?;
        if let Some(subject) = summary.subject {
            write!(f, " ({subject})")?;
        }
        Ok(())
    }
}

impl std::error::Error for InstallFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
