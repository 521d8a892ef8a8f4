use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

pub const GLOBAL_INDEX_FILE: &str = "global_video_index.json";
pub const LIST_STATUS_FILE: &str = "playlist_metadata.json";
pub const HTML_INDEX_FILE: &str = "index.html";
pub const LOCK_FILE: &str = ".tubevault.lock";
const DEFAULT_OUTPUT_DIR: &str = "./downloads";

#[derive(Debug, Clone)]
pub struct VaultPaths {
    pub archive_root: PathBuf,
    pub index_file: PathBuf,
    pub lock_file: PathBuf,
    pub logs_dir: PathBuf,
    pub log_file: PathBuf,
    pub audit_file: PathBuf,
    pub ytdlp_bin: PathBuf,
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

impl VaultPaths {
    pub fn under(archive_root: PathBuf, ytdlp_bin: PathBuf) -> Self {
        let logs_dir = archive_root.join("logs");
        Self {
            index_file: archive_root.join(GLOBAL_INDEX_FILE),
            lock_file: archive_root.join(LOCK_FILE),
            log_file: logs_dir.join("tubevault.log"),
            audit_file: logs_dir.join("audit.log"),
            logs_dir,
            archive_root,
            ytdlp_bin,
        }
    }

    pub fn list_dir(&self, dir_name: &str) -> PathBuf {
        self.archive_root.join(dir_name)
    }
}

/// Resolve the archive layout. The output directory argument wins over
/// `TUBEVAULT_OUTPUT_DIR`; paths are made absolute so index entries stay
/// valid regardless of the working directory of later runs.
pub fn resolve_paths(output_dir: Option<&Path>) -> Result<VaultPaths> {
    let root = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => env_or_default_path("TUBEVAULT_OUTPUT_DIR", PathBuf::from(DEFAULT_OUTPUT_DIR)),
    };
    let archive_root = std::path::absolute(&root)
        .with_context(|| format!("failed to resolve {}", root.display()))?;
    let ytdlp_bin = env_or_default_path("TUBEVAULT_YTDLP_BIN", PathBuf::from("yt-dlp"));

    let mut paths = VaultPaths::under(archive_root, ytdlp_bin);
    paths.logs_dir = env_or_default_path("TUBEVAULT_LOGS_DIR", paths.logs_dir);
    paths.log_file = paths.logs_dir.join("tubevault.log");
    paths.audit_file = paths.logs_dir.join("audit.log");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_hangs_off_archive_root() {
        let paths = VaultPaths::under(PathBuf::from("/srv/vault"), PathBuf::from("yt-dlp"));
        assert_eq!(
            paths.index_file,
            PathBuf::from("/srv/vault/global_video_index.json")
        );
        assert_eq!(paths.lock_file, PathBuf::from("/srv/vault/.tubevault.lock"));
        assert_eq!(paths.log_file, PathBuf::from("/srv/vault/logs/tubevault.log"));
        assert_eq!(paths.list_dir("Mix"), PathBuf::from("/srv/vault/Mix"));
    }

    #[test]
    fn explicit_output_dir_is_made_absolute() {
        let paths = resolve_paths(Some(Path::new("relative/out"))).expect("paths");
        assert!(paths.archive_root.is_absolute());
        assert!(paths.archive_root.ends_with("relative/out"));
    }
}
