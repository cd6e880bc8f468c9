//! Document lifecycle model shared by the ledger, the upload worker and the
//! archive assembler.
//!
//! The persisted row keeps the historical sentinel strings in
//! `remote_object_id`; Rust code only ever sees [`DocumentPayload`].

use serde::Serialize;

/// Placeholder object id for a document that has not reached the remote
/// provider yet.
pub const SENTINEL_PENDING: &str = "temp_pending";

/// Placeholder object id for a pure link document (nothing to upload).
pub const SENTINEL_LINK: &str = "LINK_EXTERNO";

/// Upload attempts allowed before a document is dead-lettered.
pub const MAX_UPLOAD_ATTEMPTS: i32 = 3;

/// MIME type of redirect-shortcut payloads (`.url` files and link documents).
pub const SHORTCUT_MIME_TYPE: &str = "application/internet-shortcut";

/// Other MIME types browsers and OSes use for the same shortcut payloads.
const SHORTCUT_MIME_ALIASES: &[&str] = &[
    "application/x-mswinurl",
    "application/x-url",
    "text/x-uri",
];

/// Whether documents of this MIME type are redirect shortcuts whose target
/// link should be extracted.
pub fn is_shortcut_mime(mime: &str) -> bool {
    let mime = mime.trim().to_ascii_lowercase();
    mime == SHORTCUT_MIME_TYPE || SHORTCUT_MIME_ALIASES.contains(&mime.as_str())
}

/// Upload lifecycle of a document.
///
/// ```text
/// Pending --begin--> Uploading --success--> Completed
///                    Uploading --failure--> Error
/// Error (retry_count < 3) --retry--> Uploading
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Pending,
    Uploading,
    Completed,
    Error,
}

impl DocumentStatus {
    /// Whether a document in this status with `retry_count` failed attempts
    /// may be picked up by the worker.
    pub fn is_eligible(self, retry_count: i32) -> bool {
        match self {
            Self::Pending => true,
            Self::Error => retry_count < MAX_UPLOAD_ATTEMPTS,
            Self::Uploading | Self::Completed => false,
        }
    }

    /// An `Error` document that has used up its attempts.
    pub fn is_dead_letter(self, retry_count: i32) -> bool {
        self == Self::Error && retry_count >= MAX_UPLOAD_ATTEMPTS
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Uploading => "UPLOADING",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        }
    }
}

/// Where the bytes of a document live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DocumentPayload {
    /// Still staged locally; no remote object yet.
    Unresolved,
    /// Durable on the remote provider under this object id.
    RemoteObject(String),
    /// A pure link with no bytes of its own.
    ExternalLink(String),
}

impl DocumentPayload {
    /// Build the payload from the persisted `remote_object_id` column and,
    /// for links, the stored target URL.
    pub fn from_columns(remote_object_id: &str, link_target: Option<&str>) -> Self {
        match remote_object_id {
            SENTINEL_PENDING | "" => Self::Unresolved,
            SENTINEL_LINK => Self::ExternalLink(link_target.unwrap_or_default().to_string()),
            id => Self::RemoteObject(id.to_string()),
        }
    }

    /// Value to persist in the `remote_object_id` column.
    pub fn column_value(&self) -> &str {
        match self {
            Self::Unresolved => SENTINEL_PENDING,
            Self::RemoteObject(id) => id,
            Self::ExternalLink(_) => SENTINEL_LINK,
        }
    }

    /// The remote object id, if the document has one.
    pub fn remote_object_id(&self) -> Option<&str> {
        match self {
            Self::RemoteObject(id) => Some(id),
            _ => None,
        }
    }
}
