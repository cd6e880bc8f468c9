use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sgpi_cloud::drive::DriveCredentials;

/// Read `key` from the environment, falling back to `default`.
///
/// Panics if the variable is set but does not parse; misconfiguration
/// should fail at startup.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid value: {e}")),
        Err(_) => default,
    }
}

fn env_required(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("{key} must be set"))
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks (default: `30`).
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port: env_or("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote storage
// ---------------------------------------------------------------------------

/// Which remote provider backs the document store.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// Directory on local disk (development and tests).
    Local { root: PathBuf },
    /// Google Drive v3.
    Drive(DriveCredentials),
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Container under which semester roots are created (`DRIVE_ID_ACADEMIC`).
    pub academic_root: Option<String>,
}

impl StorageConfig {
    /// | Env Var                | Default     |
    /// |------------------------|-------------|
    /// | `STORAGE_BACKEND`      | `local`     |
    /// | `LOCAL_STORAGE_ROOT`   | `./storage` |
    /// | `GOOGLE_CLIENT_ID`     | required for `drive` |
    /// | `GOOGLE_CLIENT_SECRET` | required for `drive` |
    /// | `GOOGLE_REFRESH_TOKEN` | required for `drive` |
    /// | `DRIVE_ID_ACADEMIC`    | unset       |
    pub fn from_env() -> Self {
        let kind = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".into());

        let backend = match kind.trim().to_ascii_lowercase().as_str() {
            "local" => StorageBackend::Local {
                root: env_or("LOCAL_STORAGE_ROOT", PathBuf::from("./storage")),
            },
            "drive" => StorageBackend::Drive(DriveCredentials {
                client_id: env_required("GOOGLE_CLIENT_ID"),
                client_secret: env_required("GOOGLE_CLIENT_SECRET"),
                refresh_token: env_required("GOOGLE_REFRESH_TOKEN"),
            }),
            other => panic!("STORAGE_BACKEND must be 'local' or 'drive', got '{other}'"),
        };

        let academic_root = std::env::var("DRIVE_ID_ACADEMIC")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            backend,
            academic_root,
        }
    }
}

// ---------------------------------------------------------------------------
// Ingestion pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where uploads are staged before the worker relocates them.
    pub staging_dir: PathBuf,
    /// Per-file upload limit in bytes.
    pub max_upload_bytes: u64,
    /// UPLOADING rows older than this are requeued at startup.
    pub stale_upload_secs: u64,
    /// Unreferenced staged files older than this are swept.
    pub staging_max_age_secs: u64,
    pub staging_sweep_interval_secs: u64,
    pub semester_check_interval_secs: u64,
}

impl PipelineConfig {
    /// | Env Var                        | Default     |
    /// |--------------------------------|-------------|
    /// | `STAGING_DIR`                  | `./uploads` |
    /// | `MAX_UPLOAD_BYTES`             | `52428800`  |
    /// | `STALE_UPLOAD_SECS`            | `900`       |
    /// | `STAGING_MAX_AGE_SECS`         | `3600`      |
    /// | `STAGING_SWEEP_INTERVAL_SECS`  | `86400`     |
    /// | `SEMESTER_CHECK_INTERVAL_SECS` | `86400`     |
    pub fn from_env() -> Self {
        Self {
            staging_dir: env_or("STAGING_DIR", PathBuf::from("./uploads")),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 50 * 1024 * 1024),
            stale_upload_secs: env_or("STALE_UPLOAD_SECS", 900),
            staging_max_age_secs: env_or("STAGING_MAX_AGE_SECS", 3600),
            staging_sweep_interval_secs: env_or("STAGING_SWEEP_INTERVAL_SECS", 86_400),
            semester_check_interval_secs: env_or("SEMESTER_CHECK_INTERVAL_SECS", 86_400),
        }
    }

    pub fn stale_upload_after(&self) -> Duration {
        Duration::from_secs(self.stale_upload_secs)
    }

    pub fn staging_max_age(&self) -> Duration {
        Duration::from_secs(self.staging_max_age_secs)
    }
}
