use std::env;
use std::path::PathBuf;

include!(concat!(env!("OUT_DIR"), "/tubevault_env_allowlist.rs"));

fn fallback_dotenv_path(config_dir: Option<PathBuf>) -> Option<PathBuf> {
    Some(config_dir?.join("tubevault/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let Some(path) = fallback_dotenv_path(dirs::config_dir()) else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

/// `TUBEVAULT_*` keys that nothing in this binary reads; usually typos.
pub fn unknown_env_keys(keys: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out = keys
        .into_iter()
        .filter(|key| key.starts_with("TUBEVAULT_"))
        .filter(|key| !GENERATED_TUBEVAULT_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect::<Vec<_>>();
    out.sort();
    out
}
