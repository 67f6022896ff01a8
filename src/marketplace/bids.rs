use mongodb::bson::{oid::ObjectId, DateTime};

use super::{MarketError, MarketResult, Marketplace};
use crate::models::{Actor, Bid, BidStatus, RequestStatus};
use crate::store::{StoreError, WriteOutcome};

impl Marketplace {
    pub async fn submit_bid(
        &self,
        request_id: &ObjectId,
        actor: &Actor,
        amount: f64,
    ) -> MarketResult<Bid> {
        let Actor::Worker(worker_id) = *actor else {
            return Err(MarketError::unauthorized("Only workers can place bids"));
        };
        if !amount.is_finite() || amount <= 0.0 {
            return Err(MarketError::invalid_argument("Bid amount must be greater than zero"));
        }

        for attempt in 1..=self.write_retries {
            let request = self.load_request(request_id).await?;
            if request.status != RequestStatus::Pending {
                return Err(MarketError::invalid_state("Request is no longer open for bids"));
            }

            let now = DateTime::now();
            let bid = Bid {
                id: ObjectId::new(),
                request_id: *request_id,
                worker_id,
                amount,
                status: BidStatus::Pending,
                created_at: now,
                updated_at: now,
            };

            match self.store.insert_bid(&bid).await {
                Ok(WriteOutcome::Applied) => {
                    log::info!("bid {} on request {} by worker {}", bid.id, request_id, worker_id);
                    return Ok(bid);
                }
                // Assigned or deleted meanwhile; the re-read reports which.
                Ok(WriteOutcome::Stale) => {
                    log::debug!("bid on request {} raced a state change", request_id);
                }
                Err(StoreError::Duplicate) => {
                    return Err(MarketError::conflict(
                        "You have already placed a bid on this request",
                    ));
                }
                Err(StoreError::Contention) => Self::backoff(attempt).await,
                Err(e) => return Err(e.into()),
            }
        }

        Err(MarketError::invalid_state("Request is changing concurrently, try again"))
    }

    pub async fn get_bid(&self, bid_id: &ObjectId) -> MarketResult<Bid> {
        self.store
            .find_bid(bid_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Bid not found"))
    }

    /// Bids for one request, newest first. Callers decide who may see them.
    pub async fn list_bids(&self, request_id: &ObjectId) -> MarketResult<Vec<Bid>> {
        Ok(self.store.list_bids_for_request(request_id).await?)
    }

    pub async fn list_worker_bids(&self, worker_id: &ObjectId) -> MarketResult<Vec<Bid>> {
        Ok(self.store.list_bids_by_worker(worker_id).await?)
    }
}
