use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{FetchError, Result};

pub const DEFAULT_REVISION: &str = "main";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    #[default]
    Model,
    Dataset,
    Space,
}

impl RepoType {
    /// Path segment placed before the repo id in hub URLs.
    pub fn url_prefix(&self) -> &'static str {
        match self {
            RepoType::Model => "",
            RepoType::Dataset => "datasets/",
            RepoType::Space => "spaces/",
        }
    }

    /// Prefix of the repo folder inside a cache root.
    pub fn folder_prefix(&self) -> &'static str {
        match self {
            RepoType::Model => "models",
            RepoType::Dataset => "datasets",
            RepoType::Space => "spaces",
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepoType::Model => "model",
            RepoType::Dataset => "dataset",
            RepoType::Space => "space",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Repo {
    repo_id: String,
    repo_type: RepoType,
    revision: String,
}

impl Repo {
    pub fn new(repo_id: impl Into<String>, repo_type: RepoType) -> Self {
        Self::with_revision(repo_id, repo_type, DEFAULT_REVISION)
    }

    pub fn model(repo_id: impl Into<String>) -> Self {
        Self::new(repo_id, RepoType::Model)
    }

    pub fn with_revision(
        repo_id: impl Into<String>,
        repo_type: RepoType,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            repo_id: repo_id.into(),
            repo_type,
            revision: revision.into(),
        }
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn repo_type(&self) -> RepoType {
        self.repo_type
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Repo ids are `owner/name` with both halves non-empty.
    pub fn validate(&self) -> Result<()> {
        match self.repo_id.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(())
            }
            _ => Err(FetchError::InvalidRepoId {
                repo_id: self.repo_id.clone(),
            }),
        }
    }

    /// `models--Qwen--Qwen3-0.6B-GGUF`
    pub fn folder_name(&self) -> String {
        format!(
            "{}--{}",
            self.repo_type.folder_prefix(),
            self.repo_id.replace('/', "--")
        )
    }

    /// Path of the repo on the hub, relative to the endpoint.
    pub fn url_path(&self) -> String {
        format!("{}{}", self.repo_type.url_prefix(), self.repo_id)
    }

    /// Revision as it appears inside a `resolve` URL.
    pub fn url_revision(&self) -> String {
        self.revision.replace('/', "%2F")
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.url_path(), self.revision)
    }
}

/// What the hub reports about a file before it is downloaded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileMetadata {
    pub commit_hash: String,
    pub etag: String,
    pub size: Option<u64>,
    /// Absolute download URL when the hub redirected to a storage backend.
    pub location: Option<String>,
}

impl FileMetadata {
    /// LFS files carry their SHA-256 as etag.
    pub fn sha256(&self) -> Option<&str> {
        is_sha256(&self.etag).then_some(self.etag.as_str())
    }
}

pub fn is_commit_hash(value: &str) -> bool {
    value.len() == 40 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn is_sha256(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Strips the weak marker and the quotes from an `ETag` header value.
pub fn normalize_etag(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    raw.trim_matches('"').to_string()
}
