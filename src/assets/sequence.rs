use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::registry::{AssetDescriptor, QWEN3_ASSETS};
use crate::hub::{HubClient, Repo, RepoType};

/// An asset that is now present under the cache root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedAsset {
    pub descriptor: AssetDescriptor,
    pub path: PathBuf,
}

impl FetchedAsset {
    /// `Saved weights to <path>`, for announced assets only.
    pub fn confirmation(&self) -> Option<String> {
        self.descriptor
            .announce
            .then(|| format!("Saved {} to {}", self.descriptor.label, self.path.display()))
    }
}

/// Fetches a fixed list of assets one after the other.
pub struct FetchSequence {
    client: HubClient,
    assets: Vec<AssetDescriptor>,
}

impl FetchSequence {
    pub fn new(client: HubClient, assets: &[AssetDescriptor]) -> Self {
        Self {
            client,
            assets: assets.to_vec(),
        }
    }

    /// The Qwen3 weights, tokenizer and merges, cached under `cache_root`.
    pub fn qwen3(cache_root: impl Into<PathBuf>) -> Result<Self> {
        let client = HubClient::from_env(cache_root).context("Failed to initialize hub client")?;
        Ok(Self::new(client, &QWEN3_ASSETS))
    }

    pub fn client(&self) -> &HubClient {
        &self.client
    }

    pub fn assets(&self) -> &[AssetDescriptor] {
        &self.assets
    }

    pub async fn run(&self) -> Result<Vec<FetchedAsset>> {
        self.run_with(|_| {}).await
    }

    /// Stops at the first failure; assets fetched before it stay on disk.
    pub async fn run_with<F>(&self, mut on_fetched: F) -> Result<Vec<FetchedAsset>>
    where
        F: FnMut(&FetchedAsset),
    {
        let mut fetched = Vec::with_capacity(self.assets.len());

        for descriptor in &self.assets {
            let path = self
                .client
                .get(&descriptor.repo(), descriptor.filename)
                .await
                .with_context(|| {
                    format!(
                        "Failed to fetch {} ({}/{})",
                        descriptor.label, descriptor.repo_id, descriptor.filename
                    )
                })?;

            debug!("Fetched {} at {}", descriptor.label, path.display());
            let asset = FetchedAsset {
                descriptor: *descriptor,
                path,
            };
            on_fetched(&asset);
            fetched.push(asset);
        }

        Ok(fetched)
    }
}

/// Single download-by-identifier call into `cache_root`.
pub async fn fetch(
    repo_id: &str,
    filename: &str,
    kind: RepoType,
    cache_root: impl AsRef<Path>,
) -> Result<PathBuf> {
    let client = HubClient::from_env(cache_root.as_ref())?;
    let path = client.get(&Repo::new(repo_id, kind), filename).await?;
    Ok(path)
}
