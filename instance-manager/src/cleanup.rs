//! Removes stale `*.rdb` files left behind by a crashed `BGSAVE`, grounded
//! in `original_source/cmd/instance/cleanup/cmd.go` and the startup-cleanup
//! step of `original_source/cmd/instance/run/cmd.go`.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub bytes_freed: u64,
    pub dry_run: bool,
}

/// Deletes every `*.rdb` file in `data_dir` except `db_filename`. A missing
/// `data_dir` is not an error: a pod's volume may not be provisioned yet.
pub fn run_cleanup(data_dir: &Path, db_filename: &str, dry_run: bool) -> Result<CleanupReport> {
    let mut report = CleanupReport { removed: Vec::new(), bytes_freed: 0, dry_run };

    let to_dir_err = |source: std::io::Error| Error::DataDir { path: data_dir.display().to_string(), source };

    let metadata = match fs::metadata(data_dir) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(dir = %data_dir.display(), "data directory does not exist, skipping cleanup");
            return Ok(report);
        }
        Err(err) => return Err(to_dir_err(err)),
    };
    if !metadata.is_dir() {
        return Err(Error::NotADirectory { path: data_dir.display().to_string() });
    }

    for entry in fs::read_dir(data_dir).map_err(to_dir_err)? {
        let entry = entry.map_err(to_dir_err)?;
        if entry.file_type().map_err(to_dir_err)?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(".rdb") || name == db_filename {
            continue;
        }

        let path = entry.path();
        let size = entry.metadata().map_err(to_dir_err)?.len();
        if dry_run {
            tracing::info!(file = %path.display(), size, "would delete stale rdb file");
        } else if let Err(err) = fs::remove_file(&path) {
            tracing::warn!(file = %path.display(), %err, "failed to remove stale rdb file");
            continue;
        } else {
            tracing::info!(file = %path.display(), size, "deleted stale rdb file");
        }
        report.removed.push(name.to_string());
        report.bytes_freed += size;
    }

    Ok(report)
}
