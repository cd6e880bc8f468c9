//! Google Drive v3 adapter.
//!
//! Talks to the Drive REST API with [`reqwest`], authenticating through the
//! OAuth2 refresh-token flow. The access token is cached until shortly
//! before it expires.

use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::StorageError;
use crate::storage::{ObjectReader, RemoteContainer, RemoteStorage, UploadedObject};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Refresh the access token this long before it actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// OAuth2 client credentials plus a long-lived refresh token.
#[derive(Debug, Clone)]
pub struct DriveCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    web_view_link: Option<String>,
    web_content_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// [`RemoteStorage`] backed by Google Drive.
pub struct GoogleDriveStorage {
    client: reqwest::Client,
    credentials: DriveCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleDriveStorage {
    pub fn new(credentials: DriveCredentials) -> Self {
        Self::with_client(reqwest::Client::new(), credentials)
    }

    /// Create an adapter reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, credentials: DriveCredentials) -> Self {
        Self {
            client,
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Current access token, refreshing it when missing or about to expire.
    async fn access_token(&self) -> Result<String, StorageError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StorageError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        let expires_at = Instant::now() + Duration::from_secs(token.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at,
        });
        tracing::debug!("Refreshed storage provider access token");
        Ok(token.access_token)
    }

    async fn patch_file(&self, id: &str, body: serde_json::Value) -> Result<(), StorageError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .patch(format!("{FILES_URL}/{id}"))
            .bearer_auth(token)
            .query(&[("supportsAllDrives", "true")])
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStorage for GoogleDriveStorage {
    async fn find_container(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        let token = self.access_token().await?;
        let query = folder_query(name, parent);
        let response = self
            .client
            .get(FILES_URL)
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id)"),
                ("pageSize", "1"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;

        let list: FileList = parse_response(response).await?;
        Ok(list.files.into_iter().next().map(|file| file.id))
    }

    async fn create_container(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<RemoteContainer, StorageError> {
        let token = self.access_token().await?;
        let body = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent.unwrap_or("root")],
        });
        let response = self
            .client
            .post(FILES_URL)
            .bearer_auth(token)
            .query(&[("fields", "id,webViewLink"), ("supportsAllDrives", "true")])
            .json(&body)
            .send()
            .await?;

        let file: DriveFile = parse_response(response).await?;
        tracing::info!(container_id = %file.id, name, "Created remote container");
        Ok(RemoteContainer {
            id: file.id,
            view_link: file.web_view_link,
        })
    }

    /// Resumable upload: open a session, then stream the file from disk in
    /// a single PUT so the staged file is never held in memory.
    async fn upload_object(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        container_id: &str,
    ) -> Result<UploadedObject, StorageError> {
        let size = tokio::fs::metadata(path).await?.len();
        let token = self.access_token().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [container_id],
        });
        let response = self
            .client
            .post(UPLOAD_URL)
            .bearer_auth(&token)
            .query(&[
                ("uploadType", "resumable"),
                ("fields", "id,webViewLink,webContentLink"),
                ("supportsAllDrives", "true"),
            ])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", size)
            .json(&metadata)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let session_url = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                StorageError::Malformed("resumable session without Location header".to_string())
            })?
            .to_string();

        let file = tokio::fs::File::open(path).await?;
        let response = self
            .client
            .put(session_url)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, mime_type)
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;

        let file: DriveFile = parse_response(response).await?;
        Ok(UploadedObject {
            id: file.id,
            view_link: file.web_view_link,
            download_link: file.web_content_link,
        })
    }

    async fn open_read_stream(&self, object_id: &str) -> Result<ObjectReader, StorageError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{FILES_URL}/{object_id}"))
            .bearer_auth(token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let stream = response.bytes_stream().map_err(io::Error::other);
        Ok(Box::pin(StreamReader::new(stream)))
    }

    async fn rename_object(&self, id: &str, new_name: &str) -> Result<(), StorageError> {
        self.patch_file(id, serde_json::json!({ "name": new_name })).await
    }

    async fn soft_delete(&self, id: &str) -> Result<(), StorageError> {
        self.patch_file(id, serde_json::json!({ "trashed": true })).await
    }

    fn view_link_for(&self, object_id: &str) -> String {
        format!("https://drive.google.com/file/d/{object_id}/view")
    }

    fn download_link_for(&self, object_id: &str) -> String {
        format!("https://drive.google.com/uc?id={object_id}&export=download")
    }
}

// ---- private helpers ----

/// Drive `q` expression matching a live folder by exact name under a parent.
fn folder_query(name: &str, parent: Option<&str>) -> String {
    format!(
        "mimeType = '{FOLDER_MIME_TYPE}' and name = '{}' and '{}' in parents and trashed = false",
        escape_query_literal(name),
        escape_query_literal(parent.unwrap_or("root")),
    )
}

/// Escape a value for a single-quoted literal in a Drive query.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Return the response unchanged on success, or [`StorageError::Api`] with
/// the status and body text on failure.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(StorageError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StorageError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}
