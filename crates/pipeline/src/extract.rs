//! Best-effort extraction of the redirect target of a shortcut upload.
//!
//! Browsers save links as small HTML redirect pages or `.url`
//! InternetShortcut files. The target is recovered by pattern matching;
//! failure is never an error.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio::io::AsyncReadExt;

/// Upper bound on how much of a staged shortcut file is read.
pub const MAX_SHORTCUT_BYTES: u64 = 1024 * 1024;

static SCRIPT_ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:window\.)?location(?:\.href)?\s*=\s*["']([^"']+)["']"#)
        .expect("valid regex")
});

static SCRIPT_REPLACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)location\.(?:replace|assign)\(\s*["']([^"']+)["']\s*\)"#)
        .expect("valid regex")
});

static META_REFRESH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)content\s*=\s*["']\s*\d*\s*;\s*url\s*=\s*['"]?([^"'>\s]+)"#)
        .expect("valid regex")
});

static SHORTCUT_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*URL\s*=\s*(\S+)\s*$").expect("valid regex"));

/// Finds a redirect target in the text of a shortcut payload.
pub trait LinkExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Option<String>;
}

/// Tries, in order: a script redirect (`location.href = "..."`,
/// `location.replace("...")`), a meta-refresh `url=`, and an
/// InternetShortcut `URL=` line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectPatternExtractor;

impl LinkExtractor for RedirectPatternExtractor {
    fn extract(&self, text: &str) -> Option<String> {
        [
            &SCRIPT_ASSIGN_RE,
            &SCRIPT_REPLACE_RE,
            &META_REFRESH_RE,
            &SHORTCUT_URL_RE,
        ]
        .into_iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| !url.is_empty())
    }
}

/// Read up to [`MAX_SHORTCUT_BYTES`] of `path` as lossy UTF-8 and run the
/// extractor over it. Any read failure yields `None`.
pub async fn extract_from_file(extractor: &dyn LinkExtractor, path: &Path) -> Option<String> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Shortcut file unreadable");
            return None;
        }
    };

    let mut bytes = Vec::new();
    if let Err(e) = file.take(MAX_SHORTCUT_BYTES).read_to_end(&mut bytes).await {
        tracing::debug!(path = %path.display(), error = %e, "Shortcut file read failed");
        return None;
    }

    extractor.extract(&String::from_utf8_lossy(&bytes))
}
