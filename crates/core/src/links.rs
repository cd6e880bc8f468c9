//! External link documents and shortcut payloads.

use crate::error::CoreError;

/// Extension given to link documents so they open as shortcuts.
pub const LINK_EXTENSION: &str = ".url";

/// Validate a user-supplied link target.
pub fn validate_link_url(url: &str) -> Result<(), CoreError> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(CoreError::Validation(
            "URL must start with http:// or https://".to_string(),
        ))
    }
}

/// Document name for a link titled `title`, always ending in `.url`.
pub fn link_document_name(title: &str) -> String {
    let title = title.trim();
    if title.ends_with(LINK_EXTENSION) {
        title.to_string()
    } else {
        format!("{title}{LINK_EXTENSION}")
    }
}

/// Contents of the pointer file emitted for a link in a package archive.
pub fn shortcut_payload(url: &str) -> String {
    format!("[InternetShortcut]\r\nURL={url}\r\n")
}
