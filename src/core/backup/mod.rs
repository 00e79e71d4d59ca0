// ─── Backups ───
// Files the user (or a mod at runtime) changes inside an instance. They are
// stashed in the run's temp dir before a reinstall and put back afterwards.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::InstallerResult;
use crate::core::fs::{copy_dir_recursive, copy_file};
use crate::core::installer::InstallerPaths;

/// A stateless backup strategy. Both directions are idempotent and a missing
/// source is a no-op.
pub trait BackupMethod: Send + Sync {
    fn name(&self) -> &'static str;

    fn backup(&self, paths: &InstallerPaths) -> InstallerResult<()>;

    fn restore(&self, paths: &InstallerPaths) -> InstallerResult<()>;
}

/// Backs up a whole directory, stored as `<backup>/<dirname>`.
pub struct DirectoryBackup {
    name: &'static str,
    relative: &'static str,
}

/// Backs up a single file, stored as `<backup>/<filename>`.
pub struct FileBackup {
    name: &'static str,
    relative: &'static str,
}

fn staged(paths: &InstallerPaths, relative: &str) -> PathBuf {
    let leaf = Path::new(relative)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(relative));
    paths.backup.join(leaf)
}

impl BackupMethod for DirectoryBackup {
    fn name(&self) -> &'static str {
        self.name
    }

    fn backup(&self, paths: &InstallerPaths) -> InstallerResult<()> {
        let source = paths.root.join(self.relative);
        if !source.is_dir() {
            return Ok(());
        }
        debug!("Backing up {} from {:?}", self.name, source);
        copy_dir_recursive(&source, &staged(paths, self.relative))
    }

    fn restore(&self, paths: &InstallerPaths) -> InstallerResult<()> {
        let stash = staged(paths, self.relative);
        if !stash.is_dir() {
            return Ok(());
        }
        debug!("Restoring {}", self.name);
        copy_dir_recursive(&stash, &paths.root.join(self.relative))
    }
}

impl BackupMethod for FileBackup {
    fn name(&self) -> &'static str {
        self.name
    }

    fn backup(&self, paths: &InstallerPaths) -> InstallerResult<()> {
        let source = paths.root.join(self.relative);
        if !source.is_file() {
            return Ok(());
        }
        debug!("Backing up {} from {:?}", self.name, source);
        copy_file(&source, &staged(paths, self.relative))
    }

    fn restore(&self, paths: &InstallerPaths) -> InstallerResult<()> {
        let stash = staged(paths, self.relative);
        if !stash.is_file() {
            return Ok(());
        }
        debug!("Restoring {}", self.name);
        copy_file(&stash, &paths.root.join(self.relative))
    }
}

pub static BACKUP_METHODS: [&dyn BackupMethod; 6] = [
    &DirectoryBackup {
        name: "reis_minimap",
        relative: "mods/rei_minimap",
    },
    &DirectoryBackup {
        name: "zans_minimap",
        relative: "mods/VoxelMods",
    },
    &FileBackup {
        name: "nei",
        relative: "config/NEI.cfg",
    },
    &FileBackup {
        name: "options",
        relative: "options.txt",
    },
    &FileBackup {
        name: "servers",
        relative: "servers.dat",
    },
    &FileBackup {
        name: "portal_gun_sounds",
        relative: "mods/PortalGunSounds.pak",
    },
];

pub fn backup_all(paths: &InstallerPaths) -> InstallerResult<()> {
    for method in BACKUP_METHODS.iter() {
        method.backup(paths)?;
    }
    Ok(())
}

pub fn restore_all(paths: &InstallerPaths) -> InstallerResult<()> {
    for method in BACKUP_METHODS.iter() {
        method.restore(paths)?;
    }
    Ok(())
}
