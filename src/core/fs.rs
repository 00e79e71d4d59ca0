// Blocking filesystem helpers. Callers in async code run these on
// `tokio::task::spawn_blocking`.

use std::fs;
use std::path::{Component, Path};

use tracing::{debug, warn};

use crate::core::error::{InstallerError, InstallerResult};

/// Recursively copy the contents of `source` into `destination`, overwriting files.
pub fn copy_dir_recursive(source: &Path, destination: &Path) -> InstallerResult<()> {
    fs::create_dir_all(destination).map_err(|e| InstallerError::io(destination, e))?;

    for entry in fs::read_dir(source).map_err(|e| InstallerError::io(source, e))? {
        let entry = entry.map_err(|e| InstallerError::io(source, e))?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| InstallerError::io(&src_path, e))?;

        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            copy_file(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

/// Copy a single file, creating parent directories and replacing any existing target.
pub fn copy_file(source: &Path, destination: &Path) -> InstallerResult<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
    }
    if destination.exists() {
        fs::remove_file(destination).map_err(|e| InstallerError::io(destination, e))?;
    }
    fs::copy(source, destination).map_err(|e| InstallerError::io(destination, e))?;
    Ok(())
}

/// Move every entry under `source` into `destination`, merging directories.
///
/// Tries a rename first and falls back to copy + delete across filesystems.
pub fn move_dir_contents(source: &Path, destination: &Path) -> InstallerResult<()> {
    fs::create_dir_all(destination).map_err(|e| InstallerError::io(destination, e))?;

    for entry in fs::read_dir(source).map_err(|e| InstallerError::io(source, e))? {
        let entry = entry.map_err(|e| InstallerError::io(source, e))?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| InstallerError::io(&src_path, e))?;

        if file_type.is_dir() {
            move_dir_contents(&src_path, &dst_path)?;
            let _ = fs::remove_dir(&src_path);
        } else {
            if dst_path.is_file() {
                fs::remove_file(&dst_path).map_err(|e| InstallerError::io(&dst_path, e))?;
            }
            if fs::rename(&src_path, &dst_path).is_err() {
                copy_file(&src_path, &dst_path)?;
                fs::remove_file(&src_path).map_err(|e| InstallerError::io(&src_path, e))?;
            }
        }
    }

    Ok(())
}

/// Delete a directory tree, logging instead of failing.
pub fn remove_dir_best_effort(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(path) {
        warn!("Failed to clean up {:?}: {}", path, e);
    }
}

/// Whether `path` stays below any directory it is joined onto.
///
/// Rejects `..`, root and drive-prefix components.
pub fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Unpack a zip archive into `destination`.
pub fn unzip(archive: &Path, destination: &Path) -> InstallerResult<()> {
    let file = fs::File::open(archive).map_err(|e| InstallerError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)?;
    fs::create_dir_all(destination).map_err(|e| InstallerError::io(destination, e))?;
    zip.extract(destination)?;
    Ok(())
}

/// Copy the top-level `.dll`/`.so`/`.dylib`/`.jnilib` entries of a natives
/// jar into `destination`. Returns how many were written.
pub fn extract_natives(jar: &Path, destination: &Path) -> InstallerResult<usize> {
    let file = fs::File::open(jar).map_err(|e| InstallerError::io(jar, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    fs::create_dir_all(destination).map_err(|e| InstallerError::io(destination, e))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if name.contains("META-INF") || name.contains('/') || name.contains('\\') {
            continue;
        }

        let is_native = name.ends_with(".dll")
            || name.ends_with(".so")
            || name.ends_with(".dylib")
            || name.ends_with(".jnilib");
        if !is_native {
            continue;
        }

        let dest = destination.join(&name);
        let mut out = fs::File::create(&dest).map_err(|e| InstallerError::io(&dest, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| InstallerError::io(&dest, e))?;
        debug!("Extracted native: {}", name);
        extracted += 1;
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_merges_into_existing_tree() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("staging");
        let dst = dir.path().join("root");
        fs::create_dir_all(src.join("mods")).unwrap();
        fs::create_dir_all(dst.join("mods")).unwrap();
        fs::write(src.join("mods/new.jar"), b"new").unwrap();
        fs::write(dst.join("mods/keep.jar"), b"keep").unwrap();

        move_dir_contents(&src, &dst).unwrap();

        assert_eq!(fs::read(dst.join("mods/new.jar")).unwrap(), b"new");
        assert_eq!(fs::read(dst.join("mods/keep.jar")).unwrap(), b"keep");
        assert!(!src.join("mods/new.jar").exists());
    }

    #[test]
    fn escaping_paths_are_not_contained() {
        assert!(is_contained(Path::new("mods/jei.jar")));
        assert!(is_contained(Path::new("./config")));
        assert!(!is_contained(Path::new("../outside")));
        assert!(!is_contained(Path::new("mods/../../outside")));
        assert!(!is_contained(Path::new("/etc/passwd")));
    }

    #[test]
    fn natives_skip_metadata_and_nested_entries() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lwjgl-natives-linux.jar");
        let mut zip = zip::ZipWriter::new(fs::File::create(&jar).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        for name in ["liblwjgl.so", "META-INF/MANIFEST.MF", "linux/x64/libglfw.so", "README.txt"] {
            zip.start_file(name, options).unwrap();
            zip.write_all(name.as_bytes()).unwrap();
        }
        zip.finish().unwrap();

        let natives = dir.path().join("natives");
        assert_eq!(extract_natives(&jar, &natives).unwrap(), 1);
        assert_eq!(fs::read(natives.join("liblwjgl.so")).unwrap(), b"liblwjgl.so");
        assert!(!natives.join("README.txt").exists());
    }

    #[test]
    fn copy_dir_overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::create_dir_all(dst.join("nested")).unwrap();
        fs::write(src.join("nested/x.txt"), b"fresh").unwrap();
        fs::write(dst.join("nested/x.txt"), b"stale").unwrap();

        copy_dir_recursive(&src, &dst).unwrap();

        assert_eq!(fs::read(dst.join("nested/x.txt")).unwrap(), b"fresh");
    }
}
