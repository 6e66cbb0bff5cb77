use crate::hub::{Repo, RepoType};

/// Where the Qwen3 assets land, relative to the working directory.
pub const CACHE_ROOT: &str = "public/models/qwen-0.6b";

/// One remote file the fetch sequence makes available locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub label: &'static str,
    pub repo_id: &'static str,
    pub filename: &'static str,
    pub repo_type: RepoType,
    /// Whether a confirmation line is printed once the asset is fetched.
    pub announce: bool,
}

impl AssetDescriptor {
    pub fn repo(&self) -> Repo {
        Repo::new(self.repo_id, self.repo_type)
    }
}

// Quantized GGUF weights
pub const QWEN3_WEIGHTS: AssetDescriptor = AssetDescriptor {
    label: "weights",
    repo_id: "Qwen/Qwen3-0.6B-GGUF",
    filename: "Qwen3-0.6B-Q8_0.gguf",
    repo_type: RepoType::Model,
    announce: true,
};

// Tokenizer files come from the base model repo
pub const QWEN3_TOKENIZER: AssetDescriptor = AssetDescriptor {
    label: "tokenizer",
    repo_id: "Qwen/Qwen3-0.6B-Base",
    filename: "tokenizer.json",
    repo_type: RepoType::Model,
    announce: true,
};

pub const QWEN3_MERGES: AssetDescriptor = AssetDescriptor {
    label: "merges",
    repo_id: "Qwen/Qwen3-0.6B-Base",
    filename: "merges.txt",
    repo_type: RepoType::Model,
    announce: false,
};

/// Fetch order: weights, tokenizer, merges.
pub const QWEN3_ASSETS: [AssetDescriptor; 3] = [QWEN3_WEIGHTS, QWEN3_TOKENIZER, QWEN3_MERGES];
