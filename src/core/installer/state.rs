use std::fmt;

use serde::{Deserialize, Serialize};

/// Phases of one install run, in the order they are entered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    Created,
    BackingUp,
    Resolving,
    Downloading,
    InstallingLoader,
    Finalizing,
    Completed,
    Failed,
    Cancelled,
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallState::Completed | InstallState::Failed | InstallState::Cancelled
        )
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstallState::Created => "created",
            InstallState::BackingUp => "backing up",
            InstallState::Resolving => "resolving",
            InstallState::Downloading => "downloading",
            InstallState::InstallingLoader => "installing loader",
            InstallState::Finalizing => "finalizing",
            InstallState::Completed => "completed",
            InstallState::Failed => "failed",
            InstallState::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}
