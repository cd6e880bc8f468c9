/// Errors from a remote storage provider.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Storage provider error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Exchanging the refresh token for an access token failed.
    #[error("Storage provider authentication failed: {0}")]
    Auth(String),

    /// Local file I/O failed (staged file, local provider directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No live object or container with this id.
    #[error("Remote object not found: {0}")]
    NotFound(String),

    /// The provider answered with something we could not interpret.
    #[error("Malformed storage provider response: {0}")]
    Malformed(String),
}

impl StorageError {
    /// Whether the provider reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { status, .. } => *status == 404,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
