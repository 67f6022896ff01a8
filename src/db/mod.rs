use std::sync::Arc;

use rocket::fairing::AdHoc;

use crate::config::Config;
use crate::marketplace::Marketplace;
use crate::store::{MongoStore, StoreResult};

pub fn init() -> AdHoc {
    AdHoc::try_on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(store) => {
                log::info!("✓ MongoDB connected successfully");
                let market = Marketplace::new(Arc::new(store), Config::write_retries());
                Ok(rocket.manage(market))
            }
            Err(e) => {
                log::error!("✗ Failed to connect to MongoDB: {}", e);
                Err(rocket)
            }
        }
    })
}

async fn connect() -> StoreResult<MongoStore> {
    let store = MongoStore::connect(&Config::mongodb_uri(), &Config::database_name()).await?;
    store.ensure_indexes().await?;
    Ok(store)
}
