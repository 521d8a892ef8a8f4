use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::SystemTime;

const ENV_PREFIX: &str = "TUBEVAULT_";

fn rust_sources(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Every `TUBEVAULT_<NAME>` literal in `source`.
fn env_keys_in(source: &str) -> impl Iterator<Item = &str> {
    source.match_indices(ENV_PREFIX).filter_map(move |(start, _)| {
        let rest = &source[start + ENV_PREFIX.len()..];
        let len = rest
            .bytes()
            .take_while(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
            .count();
        (len > 0).then(|| &source[start..start + ENV_PREFIX.len() + len])
    })
}

fn render_allowlist(keys: &BTreeSet<String>) -> String {
    let mut out = String::from("pub const GENERATED_TUBEVAULT_ENV_ALLOWLIST: &[&str] = &[\n");
    for key in keys {
        out.push_str(&format!("    {key:?},\n"));
    }
    out.push_str("];\n");
    out
}

/// `<version>-<unix secs>-<nanos>-<pid>`, distinct for every build.
fn build_id() -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "{}-{}-{:09}-{}",
        env::var("CARGO_PKG_VERSION").unwrap_or_default(),
        now.as_secs(),
        now.subsec_nanos(),
        process::id()
    )
}

fn main() {
    let mut keys = BTreeSet::new();
    for file in rust_sources(Path::new("src")).expect("failed to scan src/") {
        if let Ok(content) = fs::read_to_string(&file) {
            keys.extend(env_keys_in(&content).map(ToOwned::to_owned));
        }
    }

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(
        Path::new(&out_dir).join("tubevault_env_allowlist.rs"),
        render_allowlist(&keys),
    )
    .expect("failed to write env allowlist");

    println!("cargo:rustc-env=BUILD_UUID={}", build_id());
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
}
