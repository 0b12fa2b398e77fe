use std::sync::Arc;

use vcb_core::{config::Config, store::CatalogStore};
use vcb_store::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), vcb_core::Error> {
    vcb_core::logging::init("vcb")?;

    let cfg = Arc::new(Config::load()?);

    let sqlite = SqliteStore::connect(&cfg.database_path).await?;
    let store: Arc<dyn CatalogStore> = Arc::new(sqlite.clone());

    let result = vcb_telegram::router::run_polling(cfg, store)
        .await
        .map_err(|e| vcb_core::Error::External(format!("telegram bot failed: {e}")));

    sqlite.close().await;
    result
}
