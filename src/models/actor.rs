use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Requester,
    Worker,
}

/// Resolved identity of the caller. Authentication happens upstream; the
/// core only ever sees one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Requester(ObjectId),
    Worker(ObjectId),
}

impl Actor {
    pub fn new(user_id: ObjectId, role: Role) -> Self {
        match role {
            Role::Requester => Actor::Requester(user_id),
            Role::Worker => Actor::Worker(user_id),
        }
    }

    pub fn user_id(&self) -> ObjectId {
        match self {
            Actor::Requester(id) | Actor::Worker(id) => *id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Requester(_) => Role::Requester,
            Actor::Worker(_) => Role::Worker,
        }
    }
}
