use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;

/// Running rating of a reviewee. The integer sum is kept alongside the
/// average so the average is always exactly `rating_sum / review_count`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RatingAggregate {
    #[serde(rename = "_id")]
    pub user_id: ObjectId,
    pub average_rating: f64,
    pub review_count: i64,
    pub rating_sum: i64,
    pub updated_at: DateTime,
}

impl RatingAggregate {
    pub fn empty(user_id: ObjectId) -> Self {
        RatingAggregate {
            user_id,
            average_rating: 0.0,
            review_count: 0,
            rating_sum: 0,
            updated_at: DateTime::now(),
        }
    }

    /// The aggregate after one more rating.
    pub fn with_rating(&self, rating: i32) -> Self {
        let review_count = self.review_count + 1;
        let rating_sum = self.rating_sum + i64::from(rating);
        RatingAggregate {
            user_id: self.user_id,
            average_rating: rating_sum as f64 / review_count as f64,
            review_count,
            rating_sum,
            updated_at: DateTime::now(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingResponse {
    pub user_id: String,
    pub average_rating: f64,
    pub review_count: i64,
}

impl From<RatingAggregate> for RatingResponse {
    fn from(aggregate: RatingAggregate) -> Self {
        RatingResponse {
            user_id: aggregate.user_id.to_hex(),
            average_rating: aggregate.average_rating,
            review_count: aggregate.review_count,
        }
    }
}
