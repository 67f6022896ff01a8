use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

use super::RequestResponse;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Pending => "pending",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
        }
    }

    /// A bid is decided exactly once.
    pub fn can_transition_to(&self, to: BidStatus) -> bool {
        matches!(
            (self, to),
            (BidStatus::Pending, BidStatus::Accepted) | (BidStatus::Pending, BidStatus::Rejected)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Bid {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub request_id: ObjectId,
    pub worker_id: ObjectId,
    pub amount: f64,
    pub status: BidStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBidDto {
    #[validate(length(equal = 24, message = "Invalid request ID"))]
    pub request_id: String,
    pub amount: f64,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BidResponse {
    pub id: String,
    pub request_id: String,
    pub worker_id: String,
    pub amount: f64,
    pub status: BidStatus,
    pub created_at: String,
}

impl From<Bid> for BidResponse {
    fn from(bid: Bid) -> Self {
        BidResponse {
            id: bid.id.to_hex(),
            request_id: bid.request_id.to_hex(),
            worker_id: bid.worker_id.to_hex(),
            amount: bid.amount,
            status: bid.status,
            created_at: bid.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AssignmentResponse {
    pub request: RequestResponse,
    pub bid: BidResponse,
}
