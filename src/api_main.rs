use std::sync::Arc;

use refguard::api::{server, AppContext};
use refguard::config::AppConfig;
use refguard::loaders::build_loader;
use refguard::logging;
use refguard::rules::RuleLoader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging(false);

    let config = Arc::new(AppConfig::load(None)?);
    let loader = build_loader(&config).await?;
    let rules = Arc::new(RuleLoader::new(config.rules_dir()));

    // Pre-load cacheable datasets without delaying the listener.
    let warm = loader.clone();
    tokio::spawn(async move { warm.warm_up().await });

    let state = Arc::new(AppContext::new(config, loader, rules));
    server::run(state).await?;
    Ok(())
}
