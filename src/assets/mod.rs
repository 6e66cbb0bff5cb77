pub mod registry;
pub mod sequence;

pub use registry::{AssetDescriptor, CACHE_ROOT, QWEN3_ASSETS, QWEN3_MERGES, QWEN3_TOKENIZER, QWEN3_WEIGHTS};
pub use sequence::{fetch, FetchSequence, FetchedAsset};
