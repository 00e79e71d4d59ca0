// ─── Modpack Installer Core ───
// Installs a modpack (mods, loader, libraries) into an instance directory.
//
// Architecture:
//   core/
//     error/       Crate-wide error enum
//     config/      Installer settings + shared data directories
//     http/        Shared reqwest client + credential collaborator
//     fs/          Blocking copy/move/unzip helpers
//     hashing/     MD5 / SHA-1 / SHA-256 + CurseForge fingerprint
//     progress/    Push-only progress reporting
//     downloader/  Concurrent, retried, hash-verified downloads
//     maven/       Artifact coordinate parsing + repository layout
//     library/     OS rules, natives and library de-duplication
//     loaders/     Forge, NeoForge, Fabric, Legacy Fabric, Quilt, Paper, Purpur
//     mods/        Manifest adapters + mod selection
//     backup/      User file backups around a reinstall
//     instance/    Persisted instance metadata
//     installer/   The install state machine

pub mod backup;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fs;
pub mod hashing;
pub mod http;
pub mod installer;
pub mod instance;
pub mod library;
pub mod loaders;
pub mod maven;
pub mod mods;
pub mod progress;
