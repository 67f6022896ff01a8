use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

use super::{RatingResponse, Role};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub request_id: ObjectId,
    pub reviewer_id: ObjectId,
    pub reviewee_id: ObjectId,
    pub rating: i32, // 1-5
    pub comment: Option<String>,
    pub role: Role,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewDto {
    #[validate(length(equal = 24, message = "Invalid request ID"))]
    pub request_id: String,
    #[validate(length(equal = 24, message = "Invalid reviewee ID"))]
    pub reviewee_id: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 1000, message = "Comment is too long"))]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: String,
    pub request_id: String,
    pub reviewer_id: String,
    pub reviewee_id: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub role: Role,
    pub created_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        ReviewResponse {
            id: review.id.to_hex(),
            request_id: review.request_id.to_hex(),
            reviewer_id: review.reviewer_id.to_hex(),
            reviewee_id: review.reviewee_id.to_hex(),
            rating: review.rating,
            comment: review.comment,
            role: review.role,
            created_at: review.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReviewReceipt {
    pub review: ReviewResponse,
    pub rating: RatingResponse,
}
