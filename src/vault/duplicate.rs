use crate::error::ArchiveError;
use crate::logging::Logger;
use crate::vault::fetcher::PRIMARY_MEDIA_EXTENSIONS;
use crate::vault::index::GlobalIndex;
use crate::vault::warn::{self, WarnEvent};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicated {
    pub source: PathBuf,
    pub copy: PathBuf,
    pub sidecars: usize,
}

fn is_primary_media(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            PRIMARY_MEDIA_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Files next to `primary` named `<stem>.*` that are not media assets
/// (subtitles, thumbnails, ...).
fn sidecars_of(primary: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(stem)) = (
        primary.parent(),
        primary.file_stem().and_then(|s| s.to_str()),
    ) else {
        return Vec::new();
    };
    let prefix = format!("{stem}.");
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut out = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.as_path() != primary && !is_primary_media(path))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix))
        })
        .collect::<Vec<_>>();
    out.sort();
    out
}

/// Materialize an already-archived item in `target_dir` by copying the
/// first recorded file and its sidecars. The index is not modified; the
/// caller registers the copy.
pub fn duplicate(
    index: &GlobalIndex,
    item_id: &str,
    target_dir: &Path,
    logger: &Logger,
) -> Result<Duplicated, ArchiveError> {
    let failure = |path: &Path, reason: String| ArchiveError::DuplicationFailure {
        item_id: item_id.to_string(),
        path: path.to_path_buf(),
        reason,
    };

    let Some(source) = index.candidate_file(item_id) else {
        return Err(failure(Path::new(""), "no file on record".to_string()));
    };
    if !source.is_file() {
        logger.warn(format!("Source file not found: {}", source.display()));
        return Err(failure(source, "recorded file is missing".to_string()));
    }
    let Some(file_name) = source.file_name() else {
        return Err(failure(source, "recorded path has no file name".to_string()));
    };

    let copy = target_dir.join(file_name);
    if copy == source {
        return Ok(Duplicated {
            source: source.to_path_buf(),
            copy,
            sidecars: 0,
        });
    }

    fs::create_dir_all(target_dir)
        .and_then(|_| fs::copy(source, &copy))
        .map_err(|err| failure(source, err.to_string()))?;
    logger.info(format!(
        "Copied video from {} to {}",
        source.display(),
        copy.display()
    ));

    let mut sidecars = 0usize;
    for sidecar in sidecars_of(source) {
        let Some(name) = sidecar.file_name() else {
            continue;
        };
        match fs::copy(&sidecar, target_dir.join(name)) {
            Ok(_) => sidecars += 1,
            Err(err) => {
                let partial = ArchiveError::PartialWriteFailure {
                    item_id: item_id.to_string(),
                    reason: format!("sidecar {}: {err}", sidecar.display()),
                };
                warn::emit(
                    logger,
                    WarnEvent {
                        code: partial.code().as_str(),
                        stage: "duplicate",
                        action: "copy-sidecar",
                        list: &target_dir.display().to_string(),
                        item: item_id,
                        retry: "none",
                        reason: "sidecar-copy-failed",
                        err: &partial.to_string(),
                    },
                );
            }
        }
    }

    Ok(Duplicated {
        source: source.to_path_buf(),
        copy,
        sidecars,
    })
}
