use crate::metadata::Place;
use crate::sanitize::{sanitize_part, sanitize_stem, truncate_to_bytes};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Everything that goes into a new name, before sanitizing.
#[derive(Debug, Clone, Default)]
pub struct NameParts<'a> {
    pub place: Option<&'a Place>,
    pub timestamp: Option<DateTime<Local>>,
    pub original_stem: &'a str,
    pub extension: &'a str,
}

/// Builds `{place}_{city}_{state}_{country}_{timestamp}_{original}` without
/// the extension. Empty parts are skipped. The result plus `extension` fits in
/// `limit` bytes.
pub fn build_stem(parts: &NameParts<'_>, limit: usize) -> String {
    let mut prefix: Vec<String> = parts
        .place
        .map(|place| {
            place
                .parts()
                .iter()
                .flatten()
                .map(|part| sanitize_part(part))
                .filter(|part| !part.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if let Some(timestamp) = parts.timestamp {
        prefix.push(timestamp.format(TIMESTAMP_FORMAT).to_string());
    }

    let original = sanitize_stem(parts.original_stem);
    let budget = limit.saturating_sub(parts.extension.len());
    fit_stem(&prefix.join("_"), &original, budget)
}

/// Shrinks the original-name segment first; if the prefix alone is already
/// over budget, cuts the whole stem.
fn fit_stem(prefix: &str, original: &str, budget: usize) -> String {
    if prefix.is_empty() {
        return truncate_to_bytes(original, budget).to_string();
    }

    let full = format!("{prefix}_{original}");
    if full.len() <= budget {
        return full;
    }

    let room = budget.saturating_sub(prefix.len() + 1);
    let shortened = truncate_to_bytes(original, room).trim_end_matches(['_', '-', ' ', '.']);
    if !shortened.is_empty() {
        return format!("{prefix}_{shortened}");
    }

    truncate_to_bytes(prefix, budget)
        .trim_end_matches(['_', '-', ' ', '.'])
        .to_string()
}

pub fn extension_with_dot(path: &Path) -> String {
    path.extension()
        .map(|v| format!(".{}", sanitize_part(&v.to_string_lossy())))
        .filter(|v| v.len() > 1)
        .unwrap_or_default()
}

/// Picks `base + extension` in the original's directory, or the first free
/// `base_NNN + extension`. Claimed names go into `planned_paths` so later
/// files in the same batch cannot take them.
pub fn resolve_collision(
    original_path: &Path,
    base: &str,
    extension: &str,
    planned_paths: &mut HashSet<PathBuf>,
    max_len: usize,
) -> Result<PathBuf> {
    let parent = original_path
        .parent()
        .context("親ディレクトリを取得できませんでした")?;

    let candidate = parent.join(format!("{}{}", base, extension));
    if is_available(&candidate, original_path, planned_paths) {
        planned_paths.insert(candidate.clone());
        return Ok(candidate);
    }

    let mut n = 1usize;
    loop {
        let suffix = format!("_{:03}", n);
        let room = max_len.saturating_sub(extension.len() + suffix.len());
        let trimmed = truncate_to_bytes(base, room);
        let candidate = parent.join(format!("{}{}{}", trimmed, suffix, extension));
        if is_available(&candidate, original_path, planned_paths) {
            planned_paths.insert(candidate.clone());
            return Ok(candidate);
        }
        n += 1;
    }
}

fn is_available(candidate: &Path, original_path: &Path, planned_paths: &HashSet<PathBuf>) -> bool {
    if planned_paths.contains(candidate) {
        return false;
    }
    if candidate == original_path {
        return true;
    }
    !candidate.exists()
}
