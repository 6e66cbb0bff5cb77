//! Errors raised while resolving and downloading files from the hub.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::types::Repo;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid repository ID format (expected 'owner/name'): {repo_id}")]
    InvalidRepoId { repo_id: String },

    #[error("Repository not found: {repo}")]
    RepoNotFound { repo: String },

    #[error("Revision {revision} not found in {repo}")]
    RevisionNotFound { repo: String, revision: String },

    #[error("File not found in {repo}: {file}")]
    EntryNotFound { repo: String, file: String },

    #[error("Access to {repo} denied: {message}")]
    Unauthorized { repo: String, message: String },

    #[error("Rate limited by the hub, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Hub server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected HTTP {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Response from {url} is missing the {header} header")]
    MissingMetadata { url: String, header: &'static str },

    #[error("Response from {url} has an unusable {header} header: {value}")]
    InvalidMetadata {
        url: String,
        header: &'static str,
        value: String,
    },

    #[error("Server rejected resuming {url} at byte {offset}")]
    RangeNotSatisfiable { url: String, offset: u64 },

    #[error("Corrupt file at {path}: expected SHA256 {expected}, got {actual}")]
    CorruptFile {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Size mismatch for {path}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("{file} from {repo} is not cached and offline mode is enabled")]
    OfflineCacheMiss { repo: String, file: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Transient failures worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. }
            | Self::Server { .. }
            | Self::SizeMismatch { .. }
            | Self::RangeNotSatisfiable { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body() || e.is_request(),
            _ => false,
        }
    }

    /// Delay the hub asked for, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// A non-success answer from the hub, before it is mapped to a [`FetchError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubResponseError {
    pub status: StatusCode,
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub retry_after: Option<Duration>,
}

impl HubResponseError {
    pub fn from_parts(status: StatusCode, headers: &HeaderMap, body: &str) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let message = header("x-error-message").or_else(|| {
            serde_json::from_str::<ErrorBody>(body)
                .ok()
                .map(|b| b.error)
        });
        let retry_after = header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        Self {
            status,
            error_code: header("x-error-code"),
            message,
            retry_after,
        }
    }

    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Self::from_parts(status, &headers, &body)
    }

    pub fn into_fetch_error(self, repo: &Repo, filename: &str, url: &str) -> FetchError {
        let repo_name = repo.url_path();
        let message = self
            .message
            .unwrap_or_else(|| self.status.canonical_reason().unwrap_or("").to_string());

        match self.error_code.as_deref() {
            Some("RepoNotFound") => return FetchError::RepoNotFound { repo: repo_name },
            Some("RevisionNotFound") => {
                return FetchError::RevisionNotFound {
                    repo: repo_name,
                    revision: repo.revision().to_string(),
                }
            }
            Some("EntryNotFound") => {
                return FetchError::EntryNotFound {
                    repo: repo_name,
                    file: filename.to_string(),
                }
            }
            Some("GatedRepo") => {
                return FetchError::Unauthorized {
                    repo: repo_name,
                    message,
                }
            }
            _ => {}
        }

        match self.status {
            StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited {
                retry_after: self.retry_after,
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized {
                repo: repo_name,
                message,
            },
            StatusCode::NOT_FOUND => FetchError::EntryNotFound {
                repo: repo_name,
                file: filename.to_string(),
            },
            status if status.is_server_error() => FetchError::Server {
                status: status.as_u16(),
                message,
            },
            status => FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            },
        }
    }
}
