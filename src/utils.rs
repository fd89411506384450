//! Utility functions for artifact paths and target normalization

use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use url::Url;

/// Maximum number of suffixes tried when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// A target with its scheme filled in
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedTarget {
    /// URL to request
    pub url: String,
    /// Lower-cased `host[:port]`, for file names and reports
    pub host: String,
}

/// Give a raw target a scheme and lower-case its host
///
/// Targets without `://` are treated as `http://`. Targets that still do not
/// parse are kept verbatim so the request itself reports the problem.
///
/// ```
/// use geoprobe::utils::normalize_url;
///
/// let target = normalize_url("Example.COM/path");
/// assert_eq!(target.url, "http://example.com/path");
/// assert_eq!(target.host, "example.com");
/// ```
pub fn normalize_url(raw: &str) -> NormalizedTarget {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    match Url::parse(&with_scheme) {
        Ok(url) => {
            let host = match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}:{port}", host.to_lowercase()),
                (Some(host), None) => host.to_lowercase(),
                (None, _) => raw.to_lowercase(),
            };
            NormalizedTarget {
                url: url.to_string(),
                host,
            }
        }
        Err(_) => NormalizedTarget {
            url: with_scheme,
            host: raw.to_lowercase(),
        },
    }
}

/// Replace everything outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_file_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "target".to_string()
    } else {
        cleaned
    }
}

/// Artifact base name: `HH-MM-SS_<host>`
pub fn artifact_base_name(at: DateTime<Local>, host: &str) -> String {
    format!("{}_{}", at.format("%H-%M-%S"), sanitize_file_component(host))
}

/// `<logs_dir>/<YYYY-MM-DD>` for the given moment
pub fn day_dir(logs_dir: &Path, at: DateTime<Local>) -> PathBuf {
    logs_dir.join(at.format("%Y-%m-%d").to_string())
}

/// Create (if needed) and return today's artifact directory
pub async fn ensure_day_dir(logs_dir: &Path) -> Result<PathBuf> {
    let dir = day_dir(logs_dir, Local::now());
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// First free path among `name.ext`, `name-2.ext`, `name-3.ext`, …
///
/// ```
/// use geoprobe::utils::unique_file_path;
///
/// let dir = tempfile::tempdir().unwrap();
/// let first = unique_file_path(dir.path(), "12-00-00_example.com", "md").unwrap();
/// assert!(first.ends_with("12-00-00_example.com.md"));
/// ```
pub fn unique_file_path(dir: &Path, name: &str, ext: &str) -> Result<PathBuf> {
    candidates(dir, name, ext)
        .find(|path| !path.exists())
        .ok_or_else(|| collision_error(dir, name, ext))
}

/// Like [`unique_file_path`], but atomically creates the file so concurrent
/// writers never share a name
pub async fn create_unique_file(dir: &Path, name: &str, ext: &str) -> Result<(PathBuf, File)> {
    for path in candidates(dir, name, ext) {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(collision_error(dir, name, ext))
}

fn candidates<'a>(dir: &'a Path, name: &'a str, ext: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    std::iter::once(dir.join(format!("{name}.{ext}"))).chain(
        (2..=MAX_RENAME_ATTEMPTS).map(move |i| dir.join(format!("{name}-{i}.{ext}"))),
    )
}

fn collision_error(dir: &Path, name: &str, ext: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!(
            "no free file name for {name}.{ext} in {} after {MAX_RENAME_ATTEMPTS} attempts",
            dir.display()
        ),
    ))
}

/// `path` relative to `root` with `/` separators; falls back to the file name
pub fn relative_path(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// Split raw submissions into trimmed, non-empty targets
///
/// Each item may hold several newline-separated targets. With `dedupe`,
/// repeated targets keep only their first occurrence; otherwise duplicates
/// are kept and will be checked independently.
pub fn normalize_targets<I, S>(raw: I, dedupe: bool) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for item in raw {
        for line in item.as_ref().lines() {
            let target = line.trim();
            if target.is_empty() {
                continue;
            }
            if dedupe && !seen.insert(target.to_string()) {
                continue;
            }
            targets.push(target.to_string());
        }
    }
    targets
}
