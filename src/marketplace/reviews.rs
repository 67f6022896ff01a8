use mongodb::bson::{oid::ObjectId, DateTime};

use super::{MarketError, MarketResult, Marketplace};
use crate::models::{Actor, RatingAggregate, RequestStatus, Review};

impl Marketplace {
    /// Files `actor`'s review of the other participant of a completed
    /// request and updates the reviewee's rating in the same write.
    pub async fn submit_review(
        &self,
        request_id: &ObjectId,
        actor: &Actor,
        reviewee_id: &ObjectId,
        rating: i32,
        comment: Option<String>,
    ) -> MarketResult<(Review, RatingAggregate)> {
        if !(1..=5).contains(&rating) {
            return Err(MarketError::invalid_argument("Rating must be between 1 and 5"));
        }

        let request = self.load_request(request_id).await?;
        if request.status != RequestStatus::Completed {
            return Err(MarketError::invalid_state("Only completed requests can be reviewed"));
        }
        if request.assigned_worker_id.is_none() {
            return Err(MarketError::invalid_state("Request has no assigned worker"));
        }

        let counterpart = request.counterpart_of(actor).ok_or_else(|| {
            MarketError::unauthorized("Only the requester and the assigned worker can review")
        })?;
        if counterpart != *reviewee_id {
            return Err(MarketError::unauthorized(
                "You can only review the other participant of this request",
            ));
        }

        let reviewer_id = actor.user_id();
        if self.store.find_review(request_id, &reviewer_id).await?.is_some() {
            return Err(MarketError::conflict("You have already reviewed this request"));
        }

        let review = Review {
            id: ObjectId::new(),
            request_id: *request_id,
            reviewer_id,
            reviewee_id: *reviewee_id,
            rating,
            comment: comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            role: actor.role(),
            created_at: DateTime::now(),
        };

        let aggregate = self.apply_rating(&review).await?;
        log::info!(
            "review {} of {} filed on request {}",
            review.id,
            review.reviewee_id,
            request_id
        );
        Ok((review, aggregate))
    }

    /// Reviews received by `user_id`, newest first.
    pub async fn list_reviews_for(&self, user_id: &ObjectId) -> MarketResult<Vec<Review>> {
        Ok(self.store.list_reviews_for_user(user_id).await?)
    }

    pub async fn list_request_reviews(&self, request_id: &ObjectId) -> MarketResult<Vec<Review>> {
        Ok(self.store.list_reviews_for_request(request_id).await?)
    }
}
