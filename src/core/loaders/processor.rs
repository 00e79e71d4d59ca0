// ─── Installer processors ───
// Post-install steps declared by Forge-style install profiles. Each one is an
// external jar run with templated arguments, strictly one after another.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::context::LoaderContext;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::hashing::{hash_file, HashAlgorithm};
use crate::core::installer::Side;
use crate::core::maven::MavenArtifact;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Processor {
    pub jar: String,
    #[serde(default)]
    pub classpath: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Output path template → expected SHA-1 template.
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    /// Missing means both sides.
    #[serde(default)]
    pub sides: Option<Vec<String>>,
}

impl Processor {
    pub fn applies_to(&self, side: Side) -> bool {
        self.sides
            .as_ref()
            .map_or(true, |sides| sides.iter().any(|s| s == side.as_str()))
    }
}

/// One `data` entry of an install profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEntry {
    pub client: String,
    pub server: String,
}

/// Variables available to processor arguments.
pub struct ProcessorVariables {
    /// Values from the profile, still in template form.
    data: HashMap<String, String>,
    /// Already-resolved values supplied by the installer.
    builtins: HashMap<String, String>,
    extracted_dir: PathBuf,
    libraries_dir: PathBuf,
}

impl ProcessorVariables {
    pub fn new(
        data: &HashMap<String, DataEntry>,
        ctx: &LoaderContext,
        installer_jar: &Path,
    ) -> Self {
        let data = data
            .iter()
            .map(|(key, entry)| {
                let value = match ctx.side {
                    Side::Client => entry.client.clone(),
                    Side::Server => entry.server.clone(),
                };
                (key.clone(), value)
            })
            .collect();

        let libraries_dir = ctx.libraries_dir();
        let builtins = HashMap::from([
            ("SIDE".to_string(), ctx.side.as_str().to_string()),
            ("MINECRAFT_JAR".to_string(), display(&ctx.minecraft_jar())),
            ("MINECRAFT_VERSION".to_string(), ctx.minecraft_version.clone()),
            ("ROOT".to_string(), display(&ctx.root)),
            ("INSTALLER".to_string(), display(installer_jar)),
            ("LIBRARY_DIR".to_string(), display(&libraries_dir)),
        ]);

        Self {
            data,
            builtins,
            extracted_dir: ctx.installer_dir(),
            libraries_dir,
        }
    }

    fn lookup(&self, key: &str) -> InstallerResult<String> {
        if let Some(value) = self.builtins.get(key) {
            return Ok(value.clone());
        }
        let raw = self.data.get(key).ok_or_else(|| {
            InstallerError::ManifestResolution(format!("processor data key {key} is not defined"))
        })?;
        self.resolve_data_value(raw)
    }

    fn resolve_data_value(&self, raw: &str) -> InstallerResult<String> {
        if let Some(coord) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return self.library_path(coord);
        }
        if let Some(literal) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            return Ok(literal.to_string());
        }
        if let Some(relative) = raw.strip_prefix('/') {
            return Ok(display(&self.extracted_dir.join(relative)));
        }
        Ok(raw.to_string())
    }

    fn library_path(&self, coord: &str) -> InstallerResult<String> {
        Ok(display(&MavenArtifact::parse(coord)?.path_in(&self.libraries_dir)))
    }

    /// Resolve one processor argument.
    ///
    /// `{KEY}` is a variable, `[coord]` a library path; anything else is used
    /// as-is after substituting embedded `{KEY}` references.
    pub fn resolve(&self, arg: &str) -> InstallerResult<String> {
        if let Some(key) = arg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            return self.lookup(key);
        }
        if let Some(coord) = arg.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return self.library_path(coord);
        }

        let mut out = arg.to_string();
        for (key, value) in &self.builtins {
            out = out.replace(&format!("{{{}}}", key), value);
        }
        Ok(out)
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// A processor can be skipped when every declared output exists with the
/// expected SHA-1. Outputs that exist but mismatch are deleted.
pub async fn needs_to_run(
    processor: &Processor,
    vars: &ProcessorVariables,
) -> InstallerResult<bool> {
    if processor.outputs.is_empty() {
        return Ok(true);
    }

    let mut needed = false;
    for (path_template, hash_template) in &processor.outputs {
        let path = PathBuf::from(vars.resolve(path_template)?);
        let expected = vars.resolve(hash_template)?;
        let expected = expected.trim_matches('\'');

        if !path.is_file() {
            needed = true;
            continue;
        }

        let actual = hash_file(&path, HashAlgorithm::Sha1).await?.to_string();
        if !actual.eq_ignore_ascii_case(expected) {
            debug!("Processor output {:?} is stale, removing", path);
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| InstallerError::io(&path, e))?;
            needed = true;
        }
    }

    Ok(needed)
}

/// Run the processors for the context's side, in declaration order.
pub async fn run_all(
    processors: &[Processor],
    vars: &ProcessorVariables,
    ctx: &LoaderContext,
) -> InstallerResult<()> {
    let libraries_dir = ctx.libraries_dir();

    for processor in processors.iter().filter(|p| p.applies_to(ctx.side)) {
        if ctx.cancel.is_cancelled() {
            return Err(InstallerError::Cancelled);
        }

        if !needs_to_run(processor, vars).await? {
            debug!("Skipping processor {}: outputs up to date", processor.jar);
            continue;
        }

        let jar_path = MavenArtifact::parse(&processor.jar)?.path_in(&libraries_dir);
        if !jar_path.is_file() {
            return Err(InstallerError::ManifestResolution(format!(
                "processor jar {} is missing at {:?}",
                processor.jar, jar_path
            )));
        }

        let mut classpath = vec![jar_path.clone()];
        for entry in &processor.classpath {
            let path = MavenArtifact::parse(entry)?.path_in(&libraries_dir);
            if !path.is_file() {
                return Err(InstallerError::ManifestResolution(format!(
                    "processor classpath entry {} is missing at {:?}",
                    entry, path
                )));
            }
            classpath.push(path);
        }

        let main_class = {
            let jar = jar_path.clone();
            tokio::task::spawn_blocking(move || read_main_class_from_jar(&jar)).await??
        };

        let args = processor
            .args
            .iter()
            .map(|arg| vars.resolve(arg))
            .collect::<InstallerResult<Vec<_>>>()?;

        info!(
            "Running processor {} with main class {}",
            processor.jar, main_class
        );
        ctx.progress.file(processor.jar.clone());

        let classpath = std::env::join_paths(&classpath)
            .map_err(|e| InstallerError::Other(format!("invalid processor classpath: {e}")))?;

        let output = tokio::process::Command::new(&ctx.config.java_path)
            .arg("-cp")
            .arg(&classpath)
            .arg(&main_class)
            .args(&args)
            .current_dir(ctx.installer_dir())
            .output()
            .await
            .map_err(|e| InstallerError::Processor {
                jar: processor.jar.clone(),
                code: None,
                stdout: String::new(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(InstallerError::Processor {
                jar: processor.jar.clone(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
    }

    Ok(())
}

/// Read `Main-Class` from a jar manifest, following continuation lines.
pub fn read_main_class_from_jar(path: &Path) -> InstallerResult<String> {
    let file = std::fs::File::open(path).map_err(|e| InstallerError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut manifest = archive.by_name("META-INF/MANIFEST.MF")?;

    let mut text = String::new();
    manifest
        .read_to_string(&mut text)
        .map_err(|e| InstallerError::io(path, e))?;

    let mut main_class: Option<String> = None;
    let mut in_main_class = false;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(' ') {
            if in_main_class {
                if let Some(value) = main_class.as_mut() {
                    value.push_str(rest.trim_end());
                }
            }
            continue;
        }

        in_main_class = false;
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == "Main-Class" {
                main_class = Some(value.trim().to_string());
                in_main_class = true;
            }
        }
    }

    main_class.filter(|m| !m.is_empty()).ok_or_else(|| {
        InstallerError::ManifestResolution(format!("Main-Class missing in {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::InstallerConfig;
    use crate::core::downloader::Downloader;
    use crate::core::progress::{NoopProgress, ProgressReporter};
    use std::io::Write;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn context(data_dir: &Path, side: Side) -> LoaderContext {
        let config = InstallerConfig::with_data_dir(data_dir);
        LoaderContext {
            downloader: Arc::new(Downloader::new(&config).unwrap()),
            config: Arc::new(config),
            progress: Arc::new(ProgressReporter::new(Arc::new(NoopProgress))),
            cancel: CancellationToken::new(),
            side,
            minecraft_version: "1.20.1".into(),
            root: data_dir.join("instance"),
            temp_dir: data_dir.join("temp/run"),
            staging_dir: data_dir.join("temp/run/staging"),
        }
    }

    fn data(entries: &[(&str, &str, &str)]) -> HashMap<String, DataEntry> {
        entries
            .iter()
            .map(|(k, c, s)| {
                (
                    k.to_string(),
                    DataEntry {
                        client: c.to_string(),
                        server: s.to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn arguments_resolve_data_libraries_and_literals() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Side::Client);
        let vars = ProcessorVariables::new(
            &data(&[
                ("BINPATCH", "/data/client.lzma", "/data/server.lzma"),
                ("MAPPINGS", "[de.oceanlabs.mcp:mcp_config:1.20.1:mappings@txt]", "x"),
                ("MC_SHA", "'abc123'", "'def456'"),
            ]),
            &ctx,
            &dir.path().join("installer.jar"),
        );

        assert_eq!(
            vars.resolve("{BINPATCH}").unwrap(),
            display(&ctx.installer_dir().join("data/client.lzma"))
        );
        assert!(vars
            .resolve("{MAPPINGS}")
            .unwrap()
            .ends_with("mcp_config-1.20.1-mappings.txt"));
        assert_eq!(vars.resolve("{MC_SHA}").unwrap(), "abc123");
        assert_eq!(vars.resolve("{SIDE}").unwrap(), "client");
        assert_eq!(vars.resolve("--task").unwrap(), "--task");
        assert!(vars.resolve("{UNKNOWN}").is_err());
    }

    #[test]
    fn server_side_picks_server_values() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Side::Server);
        let vars = ProcessorVariables::new(
            &data(&[("MC_SHA", "'abc'", "'def'")]),
            &ctx,
            &dir.path().join("installer.jar"),
        );
        assert_eq!(vars.resolve("{MC_SHA}").unwrap(), "def");
        assert_eq!(vars.resolve("{SIDE}").unwrap(), "server");
    }

    #[test]
    fn sides_filter() {
        let p = Processor {
            jar: "a:b:1".into(),
            classpath: vec![],
            args: vec![],
            outputs: HashMap::new(),
            sides: Some(vec!["server".into()]),
        };
        assert!(p.applies_to(Side::Server));
        assert!(!p.applies_to(Side::Client));
    }

    #[tokio::test]
    async fn matching_outputs_skip_and_stale_outputs_are_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Side::Client);
        let out = MavenArtifact::parse("net.minecraft:client:1.20.1:srg")
            .unwrap()
            .path_in(&ctx.libraries_dir());
        std::fs::create_dir_all(out.parent().unwrap()).unwrap();
        std::fs::write(&out, b"Test").unwrap();

        let vars = ProcessorVariables::new(
            &data(&[
                ("PATCHED", "[net.minecraft:client:1.20.1:srg]", ""),
                ("PATCHED_SHA", "'640ab2bae07bedc4c163f679a746f7ab7fb5d1fa'", ""),
                ("WRONG_SHA", "'0000000000000000000000000000000000000000'", ""),
            ]),
            &ctx,
            &dir.path().join("installer.jar"),
        );

        let mut processor = Processor {
            jar: "a:b:1".into(),
            classpath: vec![],
            args: vec![],
            outputs: HashMap::from([("{PATCHED}".to_string(), "{PATCHED_SHA}".to_string())]),
            sides: None,
        };
        assert!(!needs_to_run(&processor, &vars).await.unwrap());
        assert!(out.exists());

        processor.outputs = HashMap::from([("{PATCHED}".to_string(), "{WRONG_SHA}".to_string())]);
        assert!(needs_to_run(&processor, &vars).await.unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn main_class_is_read_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("tool.jar");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&jar).unwrap());
        writer
            .start_file("META-INF/MANIFEST.MF", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(b"Manifest-Version: 1.0\r\nMain-Class: net.minecraftforge.install\r\n er.Main\r\n\r\n")
            .unwrap();
        writer.finish().unwrap();

        assert_eq!(
            read_main_class_from_jar(&jar).unwrap(),
            "net.minecraftforge.installer.Main"
        );
    }
}
