//! In-memory Entity Store for tests.
//!
//! One lock guards every collection, so each trait call is atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};
use tokio::sync::RwLock;

use super::{EntityStore, StoreError, StoreResult, WriteOutcome};
use crate::models::{Bid, BidStatus, RatingAggregate, Request, RequestFilter, RequestStatus, Review};

#[derive(Default)]
struct Tables {
    requests: HashMap<ObjectId, Request>,
    bids: HashMap<ObjectId, Bid>,
    reviews: HashMap<ObjectId, Review>,
    ratings: HashMap<ObjectId, RatingAggregate>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime, ObjectId)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert_request(&self, request: &Request) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.requests.contains_key(&request.id) {
            return Err(StoreError::Duplicate);
        }
        tables.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_request(&self, id: &ObjectId) -> StoreResult<Option<Request>> {
        Ok(self.tables.read().await.requests.get(id).cloned())
    }

    async fn list_requests(&self, filter: RequestFilter) -> StoreResult<Vec<Request>> {
        let tables = self.tables.read().await;
        let mut requests: Vec<Request> = tables
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        newest_first(&mut requests, |r| (r.created_at, r.id));
        Ok(requests)
    }

    async fn delete_pending_request(&self, id: &ObjectId) -> StoreResult<WriteOutcome> {
        let mut tables = self.tables.write().await;
        match tables.requests.get(id) {
            Some(r) if r.status == RequestStatus::Pending => {
                tables.requests.remove(id);
                tables.bids.retain(|_, b| b.request_id != *id);
                Ok(WriteOutcome::Applied)
            }
            _ => Ok(WriteOutcome::Stale),
        }
    }

    async fn insert_bid(&self, bid: &Bid) -> StoreResult<WriteOutcome> {
        let mut tables = self.tables.write().await;
        let open = tables
            .requests
            .get(&bid.request_id)
            .is_some_and(|r| r.status == RequestStatus::Pending);
        if !open {
            return Ok(WriteOutcome::Stale);
        }
        let taken = tables
            .bids
            .values()
            .any(|b| b.request_id == bid.request_id && b.worker_id == bid.worker_id);
        if taken {
            return Err(StoreError::Duplicate);
        }
        tables.bids.insert(bid.id, bid.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn find_bid(&self, id: &ObjectId) -> StoreResult<Option<Bid>> {
        Ok(self.tables.read().await.bids.get(id).cloned())
    }

    async fn list_bids_for_request(&self, request_id: &ObjectId) -> StoreResult<Vec<Bid>> {
        let tables = self.tables.read().await;
        let mut bids: Vec<Bid> = tables
            .bids
            .values()
            .filter(|b| b.request_id == *request_id)
            .cloned()
            .collect();
        newest_first(&mut bids, |b| (b.created_at, b.id));
        Ok(bids)
    }

    async fn list_bids_by_worker(&self, worker_id: &ObjectId) -> StoreResult<Vec<Bid>> {
        let tables = self.tables.read().await;
        let mut bids: Vec<Bid> = tables
            .bids
            .values()
            .filter(|b| b.worker_id == *worker_id)
            .cloned()
            .collect();
        newest_first(&mut bids, |b| (b.created_at, b.id));
        Ok(bids)
    }

    async fn update_bid_status(
        &self,
        request_id: &ObjectId,
        bid_id: &ObjectId,
        from: BidStatus,
        to: BidStatus,
    ) -> StoreResult<WriteOutcome> {
        let mut tables = self.tables.write().await;
        let open = tables
            .requests
            .get(request_id)
            .is_some_and(|r| r.status == RequestStatus::Pending);
        match tables.bids.get_mut(bid_id) {
            Some(bid) if open && bid.request_id == *request_id && bid.status == from => {
                bid.status = to;
                bid.updated_at = DateTime::now();
                Ok(WriteOutcome::Applied)
            }
            _ => Ok(WriteOutcome::Stale),
        }
    }

    async fn commit_assignment(
        &self,
        request_id: &ObjectId,
        bid_id: &ObjectId,
        worker_id: &ObjectId,
    ) -> StoreResult<WriteOutcome> {
        let mut tables = self.tables.write().await;
        let request_open = tables
            .requests
            .get(request_id)
            .is_some_and(|r| r.status == RequestStatus::Pending);
        let bid_open = tables
            .bids
            .get(bid_id)
            .is_some_and(|b| b.request_id == *request_id && b.status == BidStatus::Pending);
        if !(request_open && bid_open) {
            return Ok(WriteOutcome::Stale);
        }

        let now = DateTime::now();
        if let Some(request) = tables.requests.get_mut(request_id) {
            request.status = RequestStatus::InProgress;
            request.assigned_worker_id = Some(*worker_id);
            request.updated_at = now;
        }
        if let Some(bid) = tables.bids.get_mut(bid_id) {
            bid.status = BidStatus::Accepted;
            bid.updated_at = now;
        }
        Ok(WriteOutcome::Applied)
    }

    async fn transition_request(
        &self,
        request_id: &ObjectId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> StoreResult<WriteOutcome> {
        let mut tables = self.tables.write().await;
        match tables.requests.get_mut(request_id) {
            Some(request) if request.status == from => {
                request.status = to;
                request.updated_at = DateTime::now();
                Ok(WriteOutcome::Applied)
            }
            _ => Ok(WriteOutcome::Stale),
        }
    }

    async fn find_review(
        &self,
        request_id: &ObjectId,
        reviewer_id: &ObjectId,
    ) -> StoreResult<Option<Review>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .values()
            .find(|r| r.request_id == *request_id && r.reviewer_id == *reviewer_id)
            .cloned())
    }

    async fn list_reviews_for_user(&self, reviewee_id: &ObjectId) -> StoreResult<Vec<Review>> {
        let tables = self.tables.read().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| r.reviewee_id == *reviewee_id)
            .cloned()
            .collect();
        newest_first(&mut reviews, |r| (r.created_at, r.id));
        Ok(reviews)
    }

    async fn list_reviews_for_request(&self, request_id: &ObjectId) -> StoreResult<Vec<Review>> {
        let tables = self.tables.read().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| r.request_id == *request_id)
            .cloned()
            .collect();
        newest_first(&mut reviews, |r| (r.created_at, r.id));
        Ok(reviews)
    }

    async fn find_rating(&self, user_id: &ObjectId) -> StoreResult<RatingAggregate> {
        let tables = self.tables.read().await;
        Ok(tables
            .ratings
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| RatingAggregate::empty(*user_id)))
    }

    async fn commit_review(
        &self,
        review: &Review,
        expected: &RatingAggregate,
        next: &RatingAggregate,
    ) -> StoreResult<WriteOutcome> {
        let mut tables = self.tables.write().await;
        let duplicate = tables
            .reviews
            .values()
            .any(|r| r.request_id == review.request_id && r.reviewer_id == review.reviewer_id);
        if duplicate {
            return Err(StoreError::Duplicate);
        }
        let current = tables
            .ratings
            .get(&review.reviewee_id)
            .map(|a| a.review_count)
            .unwrap_or(0);
        if current != expected.review_count {
            return Ok(WriteOutcome::Stale);
        }
        tables.reviews.insert(review.id, review.clone());
        tables.ratings.insert(review.reviewee_id, next.clone());
        Ok(WriteOutcome::Applied)
    }
}
