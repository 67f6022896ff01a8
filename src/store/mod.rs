//! Entity Store: durable records for requests, bids, reviews and rating
//! aggregates.
//!
//! Plain inserts rely on uniqueness constraints. State changes are
//! conditional writes that report `WriteOutcome::Stale` when the expected
//! prior state no longer holds, so callers can re-read and decide.

#[cfg(test)]
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

use crate::models::{Bid, BidStatus, RatingAggregate, Request, RequestFilter, RequestStatus, Review};

#[cfg(test)]
pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key")]
    Duplicate,
    #[error("write contention")]
    Contention,
    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The guarded precondition did not hold; nothing was written.
    Stale,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn insert_request(&self, request: &Request) -> StoreResult<()>;

    async fn find_request(&self, id: &ObjectId) -> StoreResult<Option<Request>>;

    /// Newest first.
    async fn list_requests(&self, filter: RequestFilter) -> StoreResult<Vec<Request>>;

    /// Deletes the request and its bids if the request is still pending.
    async fn delete_pending_request(&self, id: &ObjectId) -> StoreResult<WriteOutcome>;

    /// Inserts the bid only while its request exists and is pending.
    /// Fails with `Duplicate` when the worker already bid on the request.
    async fn insert_bid(&self, bid: &Bid) -> StoreResult<WriteOutcome>;

    async fn find_bid(&self, id: &ObjectId) -> StoreResult<Option<Bid>>;

    /// Newest first.
    async fn list_bids_for_request(&self, request_id: &ObjectId) -> StoreResult<Vec<Bid>>;

    /// Newest first.
    async fn list_bids_by_worker(&self, worker_id: &ObjectId) -> StoreResult<Vec<Bid>>;

    /// Moves a bid from `from` to `to` only while its request is still
    /// pending.
    async fn update_bid_status(
        &self,
        request_id: &ObjectId,
        bid_id: &ObjectId,
        from: BidStatus,
        to: BidStatus,
    ) -> StoreResult<WriteOutcome>;

    /// Atomically accepts `bid_id` and assigns its worker, guarded on the
    /// request and the bid both being pending.
    async fn commit_assignment(
        &self,
        request_id: &ObjectId,
        bid_id: &ObjectId,
        worker_id: &ObjectId,
    ) -> StoreResult<WriteOutcome>;

    async fn transition_request(
        &self,
        request_id: &ObjectId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> StoreResult<WriteOutcome>;

    async fn find_review(
        &self,
        request_id: &ObjectId,
        reviewer_id: &ObjectId,
    ) -> StoreResult<Option<Review>>;

    /// Newest first.
    async fn list_reviews_for_user(&self, reviewee_id: &ObjectId) -> StoreResult<Vec<Review>>;

    /// Newest first.
    async fn list_reviews_for_request(&self, request_id: &ObjectId) -> StoreResult<Vec<Review>>;

    /// Current aggregate, or an empty one if the user was never rated.
    async fn find_rating(&self, user_id: &ObjectId) -> StoreResult<RatingAggregate>;

    /// Inserts the review and swaps the reviewee's aggregate from
    /// `expected` to `next` as one unit. `Duplicate` if the reviewer already
    /// reviewed the request; `Stale` if the aggregate moved since it was read.
    async fn commit_review(
        &self,
        review: &Review,
        expected: &RatingAggregate,
        next: &RatingAggregate,
    ) -> StoreResult<WriteOutcome>;
}
