use anyhow::Result;
use qwen_fetch::assets::{FetchSequence, CACHE_ROOT};
use qwen_fetch::logging;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let sequence = FetchSequence::qwen3(CACHE_ROOT)?;
    debug!("Hub configuration: {:?}", sequence.client().config());

    sequence
        .run_with(|asset| match asset.confirmation() {
            Some(line) => println!("{line}"),
            None => info!("Cached {} at {}", asset.descriptor.label, asset.path.display()),
        })
        .await?;

    Ok(())
}
