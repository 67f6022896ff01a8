use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::{Validate, ValidationError};

use super::Actor;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
        }
    }

    /// The only legal successor of each state. Transitions never skip a
    /// state and never go backwards.
    pub fn next(&self) -> Option<RequestStatus> {
        match self {
            RequestStatus::Pending => Some(RequestStatus::InProgress),
            RequestStatus::InProgress => Some(RequestStatus::Completed),
            RequestStatus::Completed => None,
        }
    }

    pub fn can_transition_to(&self, to: RequestStatus) -> bool {
        self.next() == Some(to)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Request {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub service_type: String,
    pub description: String,
    pub location: String,
    pub scheduled_date: String,
    pub scheduled_time: String,
    pub phone: String,
    pub budget: Option<f64>,
    pub status: RequestStatus,
    pub requester_id: ObjectId,
    pub assigned_worker_id: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Request {
    /// True for the owning requester and for the assigned worker, each
    /// acting in their own role.
    pub fn admits(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Requester(id) => self.requester_id == *id,
            Actor::Worker(id) => self.assigned_worker_id.as_ref() == Some(id),
        }
    }

    /// The participant on the other side of `actor`, if `actor` is one.
    pub fn counterpart_of(&self, actor: &Actor) -> Option<ObjectId> {
        if !self.admits(actor) {
            return None;
        }
        match actor {
            Actor::Requester(_) => self.assigned_worker_id,
            Actor::Worker(_) => Some(self.requester_id),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    #[validate(custom(function = "not_blank", message = "serviceType is required"))]
    pub service_type: String,
    #[validate(
        custom(function = "not_blank", message = "description is required"),
        length(max = 2000, message = "description is too long (max 2000 chars)")
    )]
    pub description: String,
    #[validate(custom(function = "not_blank", message = "location is required"))]
    pub location: String,
    #[validate(custom(function = "not_blank", message = "scheduledDate is required"))]
    pub scheduled_date: String,
    #[validate(custom(function = "not_blank", message = "scheduledTime is required"))]
    pub scheduled_time: String,
    #[validate(custom(function = "not_blank", message = "phone is required"))]
    pub phone: String,
    #[validate(custom(function = "positive", message = "budget must be positive"))]
    pub budget: Option<f64>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn positive(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new("not_positive"))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateRequestStatusDto {
    pub status: RequestStatus,
}

/// Selects which requests a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFilter {
    Open,
    PostedBy(ObjectId),
    AssignedTo(ObjectId),
}

impl RequestFilter {
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            RequestFilter::Open => request.status == RequestStatus::Pending,
            RequestFilter::PostedBy(id) => request.requester_id == *id,
            RequestFilter::AssignedTo(id) => request.assigned_worker_id.as_ref() == Some(id),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub id: String,
    pub service_type: String,
    pub description: String,
    pub location: String,
    pub scheduled_date: String,
    pub scheduled_time: String,
    pub phone: String,
    pub budget: Option<f64>,
    pub status: RequestStatus,
    pub requester_id: String,
    pub assigned_worker_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Request> for RequestResponse {
    fn from(request: Request) -> Self {
        RequestResponse {
            id: request.id.to_hex(),
            service_type: request.service_type,
            description: request.description,
            location: request.location,
            scheduled_date: request.scheduled_date,
            scheduled_time: request.scheduled_time,
            phone: request.phone,
            budget: request.budget,
            status: request.status,
            requester_id: request.requester_id.to_hex(),
            assigned_worker_id: request.assigned_worker_id.map(|id| id.to_hex()),
            created_at: request.created_at.try_to_rfc3339_string().unwrap_or_default(),
            updated_at: request.updated_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}
