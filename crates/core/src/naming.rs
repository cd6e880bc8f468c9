//! Filename normalisation for staged uploads, remote objects and archive
//! entries.
//!
//! User-supplied names arrive with accents, spaces and punctuation. Every
//! name that reaches the remote provider or a zip entry passes through
//! [`sanitize_filename`] first.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalise a user-supplied filename into `[A-Za-z0-9_-]` plus its
/// original extension.
///
/// The last `.extension` segment is split off and reattached unchanged. The
/// remainder is NFD-decomposed, stripped of combining marks, has whitespace
/// runs collapsed into a single `_`, and loses every other character outside
/// the safe set.
///
/// ```
/// use sgpi_core::naming::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Relatório Final.pdf"), "Relatorio_Final.pdf");
/// assert_eq!(sanitize_filename("Atenção! 🚀"), "Atencao_");
/// assert_eq!(sanitize_filename(""), "");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let (stem, extension) = split_extension(name);

    let decomposed: String = stem.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let underscored = WHITESPACE_RE.replace_all(&decomposed, "_");
    let clean: String = underscored
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    format!("{clean}{extension}")
}

/// Split `name` into `(stem, ".ext")`. A name without a dot has no
/// extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    }
}

/// Download filename for a package archive.
///
/// Every character outside `[A-Za-z0-9]` becomes `_`.
pub fn archive_file_name(title: &str) -> String {
    let base: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let base = if base.is_empty() { "pacote".to_string() } else { base };
    format!("{base}.zip")
}

/// Unique filename for a file written into the local staging area.
///
/// Convention: `{unix_millis}-{uuid}-{sanitized original}`.
pub fn staged_file_name(original: &str, unix_millis: i64) -> String {
    let id = uuid::Uuid::new_v4().simple();
    format!("{unix_millis}-{id}-{}", sanitize_filename(original))
}

/// Return `name`, or `name` with a `_2`, `_3`, ... suffix before the
/// extension if it is already in `taken`. The returned name is inserted into
/// `taken`.
pub fn unique_entry_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };

    let mut n = 2u32;
    loop {
        let candidate = format!("{stem}_{n}{extension}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
