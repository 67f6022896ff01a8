use mongodb::bson::{oid::ObjectId, DateTime};
use validator::Validate;

use super::{MarketError, MarketResult, Marketplace};
use crate::models::{Actor, NewRequest, Request, RequestFilter, RequestStatus};
use crate::store::WriteOutcome;

impl Marketplace {
    pub async fn create_request(&self, actor: &Actor, new: NewRequest) -> MarketResult<Request> {
        let Actor::Requester(requester_id) = *actor else {
            return Err(MarketError::unauthorized("Only requesters can post requests"));
        };
        new.validate()
            .map_err(|e| MarketError::invalid_argument(e.to_string()))?;

        let now = DateTime::now();
        let request = Request {
            id: ObjectId::new(),
            service_type: new.service_type.trim().to_string(),
            description: new.description,
            location: new.location,
            scheduled_date: new.scheduled_date,
            scheduled_time: new.scheduled_time,
            phone: new.phone,
            budget: new.budget,
            status: RequestStatus::Pending,
            requester_id,
            assigned_worker_id: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_request(&request).await?;

        log::info!("request {} posted by {}", request.id, requester_id);
        Ok(request)
    }

    pub async fn get_request(&self, id: &ObjectId) -> MarketResult<Request> {
        self.load_request(id).await
    }

    pub async fn list_requests(&self, filter: RequestFilter) -> MarketResult<Vec<Request>> {
        Ok(self.store.list_requests(filter).await?)
    }

    /// Only an unassigned request can be withdrawn; its bids go with it.
    pub async fn delete_request(&self, id: &ObjectId, actor: &Actor) -> MarketResult<()> {
        let request = self.load_request(id).await?;
        if !matches!(actor, Actor::Requester(uid) if *uid == request.requester_id) {
            return Err(MarketError::unauthorized("Only the requester can delete this request"));
        }
        if request.status != RequestStatus::Pending {
            return Err(MarketError::invalid_state(
                "Assigned or completed requests cannot be deleted",
            ));
        }

        match self.store.delete_pending_request(id).await? {
            WriteOutcome::Applied => {
                log::info!("request {} deleted", id);
                Ok(())
            }
            WriteOutcome::Stale => Err(MarketError::invalid_state(
                "Request was assigned before it could be deleted",
            )),
        }
    }
}
