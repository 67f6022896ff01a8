//! The request, bid, assignment and rating lifecycle.
//!
//! Every operation takes a resolved [`Actor`](crate::models::Actor) and runs
//! against an [`EntityStore`]. Contended writes are retried a bounded number
//! of times; everything else fails fast.

mod assignment;
mod bids;
mod error;
mod rating;
mod requests;
mod reviews;

use std::sync::Arc;
use std::time::Duration;

use mongodb::bson::oid::ObjectId;

use crate::models::Request;
use crate::store::EntityStore;

pub use error::{MarketError, MarketResult};

pub struct Marketplace {
    store: Arc<dyn EntityStore>,
    write_retries: u32,
}

impl Marketplace {
    pub fn new(store: Arc<dyn EntityStore>, write_retries: u32) -> Self {
        Marketplace {
            store,
            write_retries: write_retries.max(1),
        }
    }

    async fn load_request(&self, id: &ObjectId) -> MarketResult<Request> {
        self.store
            .find_request(id)
            .await?
            .ok_or_else(|| MarketError::not_found("Request not found"))
    }

    async fn backoff(attempt: u32) {
        tokio::time::sleep(Duration::from_millis(u64::from(attempt) * 2)).await;
    }
}
