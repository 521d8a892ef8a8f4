use crate::vault::config::FetchConfig;
use crate::vault::source::{FetchReport, ItemDescriptor, ListDescriptor, SourceConnector};
use crate::vault::util::run_command_with_optional_timeout;
use anyhow::{Context, Result};
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const YOUTUBE: &str = "https://www.youtube.com";
const DISCOVERY_TIMEOUT_SECS: u64 = 300;

/// Source connector backed by the `yt-dlp` command line tool.
#[derive(Debug, Clone)]
pub struct YtDlpConnector {
    bin: PathBuf,
    fetch: FetchConfig,
}

pub fn resolve_ytdlp_bin(bin: &Path) -> Result<PathBuf> {
    if bin.is_file() {
        return Ok(bin.to_path_buf());
    }
    let found = which::which(bin)
        .with_context(|| format!("yt-dlp binary not found: {}", bin.display()))?;
    Ok(found)
}

/// Turn a handle, channel id or URL into the URL of the account's playlists.
pub fn normalize_account(account: &str) -> String {
    let trimmed = account.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    if trimmed.starts_with('@') {
        return format!("{YOUTUBE}/{trimmed}/playlists");
    }
    if trimmed.starts_with("UC") && trimmed.len() == 24 {
        return format!("{YOUTUBE}/channel/{trimmed}/playlists");
    }
    format!("{YOUTUBE}/@{trimmed}/playlists")
}

fn str_field<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn entries(root: &Value) -> impl Iterator<Item = &Value> {
    root.get("entries")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

pub fn playlists_from(root: &Value) -> Vec<ListDescriptor> {
    entries(root)
        .filter(|entry| !entry.is_null())
        .filter(|entry| {
            str_field(entry, "_type") == Some("playlist")
                || str_field(entry, "url").is_some_and(|u| u.contains("list="))
        })
        .filter_map(|entry| {
            let id = str_field(entry, "id")?;
            Some(ListDescriptor {
                id: id.to_string(),
                title: str_field(entry, "title").unwrap_or(id).to_string(),
                url: str_field(entry, "url")
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(|| format!("{YOUTUBE}/playlist?list={id}")),
            })
        })
        .collect()
}

/// Items in source order. `position` counts null entries too so positions
/// match the source's own numbering.
pub fn items_from(root: &Value) -> Vec<ItemDescriptor> {
    entries(root)
        .enumerate()
        .filter(|(_, entry)| !entry.is_null())
        .map(|(position, entry)| {
            let id = str_field(entry, "id").map(ToOwned::to_owned);
            let url = str_field(entry, "url")
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| {
                    format!("{YOUTUBE}/watch?v={}", id.as_deref().unwrap_or_default())
                });
            ItemDescriptor {
                id,
                title: str_field(entry, "title").map(ToOwned::to_owned),
                url,
                position,
            }
        })
        .collect()
}

/// Last non-empty stdout line is the final path printed after post-processing.
pub fn printed_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(PathBuf::from)
}

impl YtDlpConnector {
    pub fn new(bin: &Path, fetch: FetchConfig) -> Result<Self> {
        Ok(Self {
            bin: resolve_ytdlp_bin(bin)?,
            fetch,
        })
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    fn run(&self, args: &[OsString], timeout_secs: u64) -> Result<Output> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        let out = run_command_with_optional_timeout(&mut cmd, Some(timeout_secs))
            .with_context(|| format!("failed to run `{}`", self.bin.display()))?;
        if out.status.success() {
            return Ok(out);
        }
        anyhow::bail!(
            "yt-dlp exited with {}\nstderr: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        )
    }

    fn extract_flat(&self, url: &str) -> Result<Value> {
        let args = ["--flat-playlist", "-J", "--no-warnings", url]
            .into_iter()
            .map(OsString::from)
            .collect::<Vec<_>>();
        let out = self.run(&args, DISCOVERY_TIMEOUT_SECS)?;
        serde_json::from_slice(&out.stdout)
            .with_context(|| format!("invalid JSON from yt-dlp for {url}"))
    }

    pub fn fetch_args(&self, item_url: &str, target_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            self.fetch.format.clone().into(),
            "--merge-output-format".into(),
            self.fetch.merge_format.clone().into(),
            "-o".into(),
            target_dir.join("%(title)s.%(ext)s").into_os_string(),
        ];
        if self.fetch.write_subtitles {
            args.push("--write-subs".into());
            args.push("--write-auto-subs".into());
            args.push("--sub-langs".into());
            args.push(self.fetch.subtitle_langs.join(",").into());
        }
        if self.fetch.write_thumbnail {
            args.push("--write-thumbnail".into());
        }
        for flag in ["--no-progress", "--no-simulate", "--print", "after_move:filepath"] {
            args.push(flag.into());
        }
        args.push(item_url.into());
        args
    }
}

impl SourceConnector for YtDlpConnector {
    fn enumerate_lists(&self, account: &str) -> Result<Vec<ListDescriptor>> {
        let url = normalize_account(account);
        let root = self.extract_flat(&url)?;
        let lists = playlists_from(&root);
        if !lists.is_empty() {
            return Ok(lists);
        }

        let Some(channel_id) = str_field(&root, "channel_id").or_else(|| {
            str_field(&root, "id").filter(|id| id.starts_with("UC"))
        }) else {
            return Ok(lists);
        };
        let fallback = format!("{YOUTUBE}/channel/{channel_id}/playlists");
        if fallback == url {
            return Ok(lists);
        }
        let root = self.extract_flat(&fallback)?;
        Ok(playlists_from(&root))
    }

    fn enumerate_items(&self, list: &ListDescriptor) -> Result<Vec<ItemDescriptor>> {
        let root = self.extract_flat(&list.url)?;
        Ok(items_from(&root))
    }

    fn fetch_item(&self, item_url: &str, target_dir: &Path) -> Result<FetchReport> {
        let args = self.fetch_args(item_url, target_dir);
        let out = self.run(&args, self.fetch.timeout_secs)?;
        Ok(FetchReport {
            primary_hint: printed_path(&String::from_utf8_lossy(&out.stdout)),
        })
    }
}
