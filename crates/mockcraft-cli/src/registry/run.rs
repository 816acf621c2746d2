use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use mockcraft_seed::SeedOptions;

use super::{RegistryError, RegistryResult};

/// JSON config written to each run directory.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub command: String,
    pub schema_path: Option<PathBuf>,
    pub driver: String,
    /// DSN with credentials masked.
    pub connection: String,
    pub options: SeedOptions,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Clone, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub report_path: PathBuf,
    pub logs_path: PathBuf,
}

/// Create `{run_dir}/{run_id}/` with `config.json` and an empty log file.
pub fn start_run(run_dir: &Path, config: &RunConfig) -> RegistryResult<RunPaths> {
    let root = run_dir.join(&config.run_id);
    create_dir_all(&root)?;

    let paths = RunPaths {
        config_path: root.join("config.json"),
        report_path: root.join("report.json"),
        logs_path: root.join("logs.ndjson"),
        root,
    };
    write_json_atomic(&paths.config_path, config)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.logs_path)?;
    Ok(paths)
}

pub fn write_report<T: Serialize>(paths: &RunPaths, report: &T) -> RegistryResult<()> {
    write_json_atomic(&paths.report_path, report)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

/// Write to a sibling `.tmp` file, sync, then rename over `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let data = serde_json::to_vec_pretty(value)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| RegistryError::InvalidPath(path.display().to_string()))?;
    let tmp_path = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    std::fs::rename(&tmp_path, path)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        sync_dir(parent)?;
    }
    Ok(())
}

fn sync_dir(path: &Path) -> io::Result<()> {
    OpenOptions::new().read(true).open(path)?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_run_writes_config_and_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = RunConfig {
            run_id: "2024-06-01__seed_abcd1234".to_string(),
            started_at: "2024-06-01T00:00:00Z".to_string(),
            command: "seed".to_string(),
            schema_path: Some(PathBuf::from("schema.yaml")),
            driver: "memory".to_string(),
            connection: "memory://dry-run".to_string(),
            options: SeedOptions::default(),
            git: GitInfo {
                commit: None,
                dirty: None,
            },
        };
        let paths = start_run(dir.path(), &config).expect("start run");
        assert!(paths.logs_path.exists());

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&paths.config_path).expect("config"))
                .expect("json");
        assert_eq!(written["run_id"], "2024-06-01__seed_abcd1234");
        assert_eq!(written["options"]["batch_size"], 1000);

        write_report(&paths, &serde_json::json!({ "rows": 3 })).expect("report");
        assert!(paths.report_path.exists());
        assert!(!paths.root.join("report.json.tmp").exists());
    }
}
