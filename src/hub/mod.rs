//! Client for Hugging Face compatible model hubs.
//!
//! Files are resolved through the hub's `resolve` endpoint and stored in the
//! same `blobs/`, `snapshots/` and `refs/` layout the Python tooling uses, so
//! a cache root can be shared between both.

pub mod cache;
pub mod client;
pub mod error;
pub mod progress;
pub mod types;

pub use cache::{CacheRepo, HubCache};
pub use client::HubClient;
pub use error::{FetchError, Result};
pub use progress::Progress;
pub use types::{FileMetadata, Repo, RepoType};
