use std::path::{Path, PathBuf};

use crate::formats::is_dotenv_name;

/// Sibling files tried, in order, when a dotenv-family baseline is absent.
pub const DOTENV_VARIANTS: [&str; 4] = [".env", ".env.local", ".env.example", ".env.production"];

/// Returns the baseline path to read, or `None` when nothing exists.
///
/// A missing dotenv-family path falls back to the first existing entry of
/// [`DOTENV_VARIANTS`] in the same directory.
pub fn resolve_baseline_path(locator: &Path) -> Option<PathBuf> {
    if locator.is_file() {
        return Some(locator.to_path_buf());
    }
    let file_name = locator.file_name()?.to_string_lossy();
    if !is_dotenv_name(&file_name) {
        return None;
    }
    let directory = match locator.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    DOTENV_VARIANTS
        .iter()
        .map(|variant| directory.join(variant))
        .find(|candidate| candidate.is_file())
}
