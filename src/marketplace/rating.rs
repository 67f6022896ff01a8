use mongodb::bson::oid::ObjectId;

use super::{MarketError, MarketResult, Marketplace};
use crate::models::{RatingAggregate, Review};
use crate::store::{StoreError, WriteOutcome};

impl Marketplace {
    /// Stores `review` and folds its rating into the reviewee's aggregate in
    /// one write. The write is conditioned on the review count it was
    /// computed from, so concurrent ratings retry instead of overwriting
    /// each other.
    pub(super) async fn apply_rating(&self, review: &Review) -> MarketResult<RatingAggregate> {
        for attempt in 1..=self.write_retries {
            let current = self.store.find_rating(&review.reviewee_id).await?;
            let next = current.with_rating(review.rating);

            match self.store.commit_review(review, &current, &next).await {
                Ok(WriteOutcome::Applied) => {
                    log::info!(
                        "rating of {} is now {:.2} over {} reviews",
                        review.reviewee_id,
                        next.average_rating,
                        next.review_count
                    );
                    return Ok(next);
                }
                Ok(WriteOutcome::Stale) | Err(StoreError::Contention) => {
                    log::debug!(
                        "rating of {} moved underneath review {} (attempt {})",
                        review.reviewee_id,
                        review.id,
                        attempt
                    );
                    Self::backoff(attempt).await;
                }
                Err(StoreError::Duplicate) => {
                    return Err(MarketError::conflict("You have already reviewed this request"));
                }
                Err(e) => return Err(e.into()),
            }
        }

        log::warn!(
            "rating update for {} gave up after {} attempts",
            review.reviewee_id,
            self.write_retries
        );
        Err(MarketError::conflict("Rating is being updated concurrently, try again"))
    }

    pub async fn get_rating(&self, user_id: &ObjectId) -> MarketResult<RatingAggregate> {
        Ok(self.store.find_rating(user_id).await?)
    }
}
