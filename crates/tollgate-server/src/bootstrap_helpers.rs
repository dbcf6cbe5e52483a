use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout carries MCP frames only.
pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// `.env*` files in `dir`, with `.env` first and the rest alphabetical.
pub(crate) fn dotenv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let listing =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in listing {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_file = entry.file_type().map(|kind| kind.is_file()).unwrap_or(false);
        if is_file && name.starts_with(".env") {
            files.push(entry.path());
        }
    }
    files.sort_by_key(|path| {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        (name != ".env", name)
    });
    Ok(files)
}

/// Collects assignments from every `.env*` file in `dir`. The first file to
/// define a key wins.
pub(crate) fn collect_dotenv_vars(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut seen = BTreeSet::new();
    let mut vars = Vec::new();
    for path in dotenv_files(dir)? {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        for (key, value) in tollgate_audit::parse_dotenv(&text) {
            if seen.insert(key.clone()) {
                vars.push((key, value));
            }
        }
    }
    Ok(vars)
}

/// Exports dotenv assignments from `dir` into the process environment
/// without overriding variables that are already set. Returns the number of
/// variables exported.
pub(crate) fn load_dotenv(dir: &Path) -> Result<usize> {
    let mut exported = 0usize;
    for (key, value) in collect_dotenv_vars(dir)? {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
            exported += 1;
        }
    }
    Ok(exported)
}
