use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_retries: u32,
    /// Wait after failed attempt `n` is `backoff_unit_ms * 2^n`.
    pub backoff_unit_ms: u64,
    pub format: String,
    pub merge_format: String,
    pub write_subtitles: bool,
    pub subtitle_langs: Vec<String>,
    pub write_thumbnail: bool,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_unit_ms: 1000,
            format: "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
            merge_format: "mp4".to_string(),
            write_subtitles: true,
            subtitle_langs: vec!["en".to_string()],
            write_thumbnail: true,
            timeout_secs: 3600,
        }
    }
}

impl FetchConfig {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub poll_interval_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 6 * 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultConfig {
    pub fetch: FetchConfig,
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialVaultConfig {
    fetch: Option<FetchConfig>,
    watcher: Option<WatcherConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    match env::var(var) {
        Ok(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();
            if out.is_empty() {
                fallback.to_vec()
            } else {
                out
            }
        }
        Err(_) => fallback.to_vec(),
    }
}

fn validate(cfg: &VaultConfig) -> Result<()> {
    if cfg.fetch.max_retries == 0 {
        return Err(anyhow!("invalid fetch max retries: must be >= 1"));
    }
    if cfg.fetch.max_retries > 16 {
        return Err(anyhow!("invalid fetch max retries: must be <= 16"));
    }
    if cfg.fetch.format.trim().is_empty() {
        return Err(anyhow!("invalid fetch format: cannot be empty"));
    }
    if cfg.fetch.timeout_secs == 0 {
        return Err(anyhow!("invalid fetch timeout: must be >= 1 second"));
    }
    if cfg.watcher.poll_interval_secs == 0 {
        return Err(anyhow!(
            "invalid watcher poll interval: must be >= 1 second"
        ));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("TUBEVAULT_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("tubevault").join("config.toml"))
}

fn merge_file_config(base: &mut VaultConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialVaultConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse tubevault config {}: {err}", path.display()))?;
    if let Some(fetch) = parsed.fetch {
        base.fetch = fetch;
    }
    if let Some(watcher) = parsed.watcher {
        base.watcher = watcher;
    }
    Ok(())
}

pub fn load_config() -> Result<VaultConfig> {
    let mut cfg = VaultConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.fetch.max_retries = env_or_u32("TUBEVAULT_MAX_RETRIES", cfg.fetch.max_retries);
    cfg.fetch.backoff_unit_ms = env_or_u64("TUBEVAULT_BACKOFF_UNIT_MS", cfg.fetch.backoff_unit_ms);
    cfg.fetch.format = env_or_string("TUBEVAULT_FORMAT", &cfg.fetch.format);
    cfg.fetch.merge_format = env_or_string("TUBEVAULT_MERGE_FORMAT", &cfg.fetch.merge_format);
    cfg.fetch.write_subtitles =
        env_or_bool("TUBEVAULT_WRITE_SUBTITLES", cfg.fetch.write_subtitles);
    cfg.fetch.subtitle_langs = env_or_csv("TUBEVAULT_SUBTITLE_LANGS", &cfg.fetch.subtitle_langs);
    cfg.fetch.write_thumbnail =
        env_or_bool("TUBEVAULT_WRITE_THUMBNAIL", cfg.fetch.write_thumbnail);
    cfg.fetch.timeout_secs = env_or_u64("TUBEVAULT_FETCH_TIMEOUT_SECS", cfg.fetch.timeout_secs);
    cfg.watcher.poll_interval_secs = env_or_u64(
        "TUBEVAULT_POLL_INTERVAL_SECS",
        cfg.watcher.poll_interval_secs,
    );

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_retry_policy() {
        let cfg = VaultConfig::default();
        assert_eq!(cfg.fetch.max_retries, 3);
        assert_eq!(cfg.fetch.backoff_unit(), Duration::from_secs(1));
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn partial_toml_keeps_missing_sections() {
        let parsed: PartialVaultConfig = toml::from_str(
            r#"
            [fetch]
            max_retries = 5
            subtitle_langs = ["en", "de"]
            "#,
        )
        .expect("parse");
        let fetch = parsed.fetch.expect("fetch section");
        assert_eq!(fetch.max_retries, 5);
        assert_eq!(fetch.subtitle_langs, vec!["en", "de"]);
        assert!(fetch.write_thumbnail);
        assert!(parsed.watcher.is_none());
    }

    #[test]
    fn zero_retries_is_rejected() {
        let mut cfg = VaultConfig::default();
        cfg.fetch.max_retries = 0;
        assert!(validate(&cfg).is_err());
    }
}
