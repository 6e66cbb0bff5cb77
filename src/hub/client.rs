use futures_util::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT_ENCODING, AUTHORIZATION, LOCATION, RANGE};
use reqwest::{redirect, Client, RequestBuilder, StatusCode};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::cache::{CacheRepo, HubCache};
use super::error::{FetchError, HubResponseError, Result};
use super::progress::{download_bar, Progress};
use super::types::{is_commit_hash, normalize_etag, FileMetadata, Repo};
use crate::config::HubConfig;

const MAX_RELATIVE_REDIRECTS: usize = 5;

/// Resolves, downloads and caches files from a Hugging Face compatible hub.
pub struct HubClient {
    config: HubConfig,
    cache: HubCache,
    /// Metadata requests; redirects are inspected, not followed.
    api: Client,
    client: Client,
}

impl HubClient {
    pub fn new(config: HubConfig) -> Result<Self> {
        let api = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout())
            .redirect(redirect::Policy::none())
            .build()?;
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            cache: HubCache::new(&config.cache_dir),
            config,
            api,
            client,
        })
    }

    /// Environment-driven client writing into `cache_dir`.
    pub fn from_env(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(HubConfig::from_env().with_cache_dir(cache_dir))
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn cache(&self) -> &HubCache {
        &self.cache
    }

    /// Local path of `filename` if it is already cached; never touches the network.
    pub fn cached_path(&self, repo: &Repo, filename: &str) -> Option<PathBuf> {
        self.cache.repo(repo).get(filename)
    }

    /// Returns the local path of `filename`, downloading it when it is not cached.
    pub async fn get(&self, repo: &Repo, filename: &str) -> Result<PathBuf> {
        repo.validate()?;

        if let Some(path) = self.cached_path(repo, filename) {
            debug!("Cache hit for {} in {}: {}", filename, repo, path.display());
            return Ok(path);
        }

        if self.config.offline {
            return Err(FetchError::OfflineCacheMiss {
                repo: repo.url_path(),
                file: filename.to_string(),
            });
        }

        let bar = download_bar(filename, self.config.show_progress);
        let mut attempt = 0;
        loop {
            match self.download_with_progress(repo, filename, &bar).await {
                Ok(path) => return Ok(path),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = e.retry_after().unwrap_or_else(|| self.backoff(attempt));
                    attempt += 1;
                    warn!(
                        "Fetching {} from {} failed ({}), retry {}/{} in {:?}",
                        filename, repo, e, attempt, self.config.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    bar.abandon();
                    return Err(e);
                }
            }
        }
    }

    /// One resolve-and-download attempt, reporting bytes to `bar`.
    pub async fn download_with_progress(
        &self,
        repo: &Repo,
        filename: &str,
        bar: &impl Progress,
    ) -> Result<PathBuf> {
        let metadata = self.metadata(repo, filename).await?;
        let cache_repo = self.cache.repo(repo);
        let blob_path = cache_repo.blob_path(&metadata.etag);

        if blob_path.exists() {
            debug!("Blob {} already present, skipping transfer", metadata.etag);
            bar.clear();
        } else {
            info!(
                "Downloading {} from {} to: {}",
                filename,
                repo,
                cache_repo.path().display()
            );
            self.download_blob(repo, filename, &metadata, &cache_repo, bar)
                .await?;
            info!("Downloaded {}", filename);
        }

        // The ref goes first so a failure here cannot strand a snapshot pointer.
        if repo.revision() != metadata.commit_hash {
            cache_repo.write_ref(&metadata.commit_hash)?;
        }
        let pointer = cache_repo.create_pointer(&metadata.etag, &metadata.commit_hash, filename)?;

        Ok(pointer)
    }

    /// Asks the hub which commit, etag and size `filename` resolves to.
    pub async fn metadata(&self, repo: &Repo, filename: &str) -> Result<FileMetadata> {
        let mut url = self.resolve_url(repo, filename);

        for _ in 0..=MAX_RELATIVE_REDIRECTS {
            let response = self
                .authorize(self.api.head(&url), &url)
                .header(ACCEPT_ENCODING, "identity")
                .send()
                .await?;
            let status = response.status();

            if !status.is_success() && !status.is_redirection() {
                return Err(HubResponseError::from_response(response)
                    .await
                    .into_fetch_error(repo, filename, &url));
            }

            let headers = response.headers();
            let location = header_str(headers, LOCATION.as_str());

            // Relative redirects stay on the hub; metadata comes from the final response.
            if status.is_redirection() {
                if let Some(path) = location.filter(|l| l.starts_with('/')) {
                    debug!("Following relative redirect to {}", path);
                    url = format!("{}{}", self.config.endpoint, path);
                    continue;
                }
            }

            let metadata = parse_metadata(headers, &url, status)?;
            debug!(
                "Resolved {} in {} to commit {} etag {} ({:?} bytes)",
                filename, repo, metadata.commit_hash, metadata.etag, metadata.size
            );
            return Ok(metadata);
        }

        Err(FetchError::UnexpectedStatus {
            status: StatusCode::MOVED_PERMANENTLY.as_u16(),
            url,
        })
    }

    fn resolve_url(&self, repo: &Repo, filename: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.config.endpoint,
            repo.url_path(),
            repo.url_revision(),
            filename
        )
    }

    /// Credentials only go to the configured endpoint, never to storage backends.
    fn authorize(&self, rb: RequestBuilder, url: &str) -> RequestBuilder {
        match &self.config.token {
            Some(token) if url.starts_with(&self.config.endpoint) => {
                rb.header(AUTHORIZATION, format!("Bearer {token}"))
            }
            _ => rb,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.retry_base_delay() * 2u32.saturating_pow(attempt)
    }

    async fn download_blob(
        &self,
        repo: &Repo,
        filename: &str,
        metadata: &FileMetadata,
        cache_repo: &CacheRepo,
        bar: &impl Progress,
    ) -> Result<()> {
        let incomplete = cache_repo.incomplete_path(&metadata.etag);
        if let Some(parent) = incomplete.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut existing_size = match tokio::fs::metadata(&incomplete).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        if metadata.size.is_some_and(|size| existing_size > size) {
            existing_size = 0;
        }

        let already_complete = existing_size > 0 && metadata.size == Some(existing_size);
        if !already_complete {
            let url = metadata
                .location
                .clone()
                .unwrap_or_else(|| self.resolve_url(repo, filename));

            let mut rb = self.authorize(self.client.get(&url), &url);
            if existing_size > 0 {
                debug!("Resuming {} at byte {}", filename, existing_size);
                rb = rb.header(RANGE, format!("bytes={existing_size}-"));
            }

            let response = rb.send().await?;
            let status = response.status();
            if status == StatusCode::RANGE_NOT_SATISFIABLE {
                tokio::fs::remove_file(&incomplete).await?;
                return Err(FetchError::RangeNotSatisfiable {
                    url,
                    offset: existing_size,
                });
            }
            if !status.is_success() {
                return Err(HubResponseError::from_response(response)
                    .await
                    .into_fetch_error(repo, filename, &url));
            }

            // Anything but 206 means the server ignored the range and sent everything.
            if status != StatusCode::PARTIAL_CONTENT {
                existing_size = 0;
            }

            let mut file = if existing_size > 0 {
                OpenOptions::new().append(true).open(&incomplete).await?
            } else {
                File::create(&incomplete).await?
            };

            let total = metadata
                .size
                .or_else(|| response.content_length().map(|len| len + existing_size))
                .unwrap_or(0);
            bar.set_length(total);
            bar.set_position(existing_size);

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                bar.inc(chunk.len() as u64);
            }

            file.flush().await?;
            drop(file);
        }

        verify_blob(&incomplete, metadata).await?;

        tokio::fs::rename(&incomplete, cache_repo.blob_path(&metadata.etag)).await?;
        bar.finish();

        Ok(())
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Reads commit, etag, size and redirect target from a `resolve` HEAD response.
pub fn parse_metadata(headers: &HeaderMap, url: &str, status: StatusCode) -> Result<FileMetadata> {
    let commit_hash = header_str(headers, "x-repo-commit").ok_or_else(|| {
        FetchError::MissingMetadata {
            url: url.to_string(),
            header: "X-Repo-Commit",
        }
    })?;
    // Both values become path segments under the cache root.
    if !is_commit_hash(&commit_hash) {
        return Err(FetchError::InvalidMetadata {
            url: url.to_string(),
            header: "X-Repo-Commit",
            value: commit_hash,
        });
    }

    let etag = header_str(headers, "x-linked-etag")
        .or_else(|| header_str(headers, "etag"))
        .map(|raw| normalize_etag(&raw))
        .filter(|etag| !etag.is_empty())
        .ok_or_else(|| FetchError::MissingMetadata {
            url: url.to_string(),
            header: "ETag",
        })?;
    if !is_safe_etag(&etag) {
        return Err(FetchError::InvalidMetadata {
            url: url.to_string(),
            header: "ETag",
            value: etag,
        });
    }

    let size = header_str(headers, "x-linked-size")
        .or_else(|| header_str(headers, "content-length"))
        .and_then(|v| v.trim().parse::<u64>().ok());

    let location = if status.is_redirection() {
        header_str(headers, LOCATION.as_str())
    } else {
        None
    };

    Ok(FileMetadata {
        commit_hash,
        etag,
        size,
        location,
    })
}

fn is_safe_etag(etag: &str) -> bool {
    !etag.contains(['/', '\\']) && !etag.contains("..")
}

/// Checks a finished download against the etag or the announced size.
async fn verify_blob(path: &Path, metadata: &FileMetadata) -> Result<()> {
    if let Some(expected) = metadata.sha256() {
        let actual = sha256_file(path).await?;
        if !actual.eq_ignore_ascii_case(expected) {
            tokio::fs::remove_file(path).await?;
            return Err(FetchError::CorruptFile {
                path: path.to_path_buf(),
                expected: expected.to_string(),
                actual,
            });
        }
        return Ok(());
    }

    if let Some(expected) = metadata.size {
        let actual = tokio::fs::metadata(path).await?.len();
        if actual != expected {
            tokio::fs::remove_file(path).await?;
            return Err(FetchError::SizeMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }
    }

    Ok(())
}

pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
