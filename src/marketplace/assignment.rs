use mongodb::bson::oid::ObjectId;

use super::{MarketError, MarketResult, Marketplace};
use crate::models::{Actor, Bid, BidStatus, Request, RequestStatus};
use crate::store::{StoreError, WriteOutcome};

/// Every request status change goes through here.
fn ensure_transition(request: &Request, to: RequestStatus) -> MarketResult<()> {
    if request.status.can_transition_to(to) {
        return Ok(());
    }
    let message = match (request.status, to) {
        (RequestStatus::Pending, RequestStatus::Completed) => "Request has not been assigned yet",
        (RequestStatus::Completed, RequestStatus::Completed) => "Request is already completed",
        (_, RequestStatus::InProgress) => "Request is no longer open for bids",
        _ => "Request cannot move to that status",
    };
    Err(MarketError::invalid_state(message))
}

fn ensure_requester(request: &Request, actor: &Actor) -> MarketResult<()> {
    match actor {
        Actor::Requester(id) if *id == request.requester_id => Ok(()),
        _ => Err(MarketError::unauthorized("Only the requester can decide on bids")),
    }
}

impl Marketplace {
    async fn load_bid_of(&self, request_id: &ObjectId, bid_id: &ObjectId) -> MarketResult<Bid> {
        self.store
            .find_bid(bid_id)
            .await?
            .filter(|bid| bid.request_id == *request_id)
            .ok_or_else(|| MarketError::not_found("Bid not found for this request"))
    }

    /// Accepts one bid and assigns its worker. The request's pending status
    /// is the gate: of any number of racing accepts, one wins and the rest
    /// see `InvalidState`. Other pending bids are left as they are.
    pub async fn accept_bid(
        &self,
        request_id: &ObjectId,
        bid_id: &ObjectId,
        actor: &Actor,
    ) -> MarketResult<(Request, Bid)> {
        for attempt in 1..=self.write_retries {
            let request = self.load_request(request_id).await?;
            ensure_requester(&request, actor)?;
            let bid = self.load_bid_of(request_id, bid_id).await?;
            ensure_transition(&request, RequestStatus::InProgress)?;
            if !bid.status.can_transition_to(BidStatus::Accepted) {
                return Err(MarketError::invalid_state("Bid has already been decided"));
            }

            match self
                .store
                .commit_assignment(request_id, bid_id, &bid.worker_id)
                .await
            {
                Ok(WriteOutcome::Applied) => {
                    // Return what was stored, timestamps included.
                    let request = self.load_request(request_id).await?;
                    let bid = self.load_bid_of(request_id, bid_id).await?;
                    log::info!(
                        "request {} assigned to worker {} via bid {}",
                        request_id,
                        bid.worker_id,
                        bid_id
                    );
                    return Ok((request, bid));
                }
                // Re-read; the checks above report what changed.
                Ok(WriteOutcome::Stale) => {
                    log::debug!("accept of bid {} lost a race, re-checking", bid_id);
                }
                Err(StoreError::Contention) => {
                    log::debug!("accept of bid {} contended (attempt {})", bid_id, attempt);
                    Self::backoff(attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        log::warn!("accept of bid {} gave up after {} attempts", bid_id, self.write_retries);
        Err(MarketError::invalid_state("Request is being assigned concurrently, try again"))
    }

    /// Declines a pending bid while the request is still open.
    pub async fn reject_bid(
        &self,
        request_id: &ObjectId,
        bid_id: &ObjectId,
        actor: &Actor,
    ) -> MarketResult<Bid> {
        for attempt in 1..=self.write_retries {
            let request = self.load_request(request_id).await?;
            ensure_requester(&request, actor)?;
            let bid = self.load_bid_of(request_id, bid_id).await?;
            if request.status != RequestStatus::Pending {
                return Err(MarketError::invalid_state("Request is no longer open for bids"));
            }
            if !bid.status.can_transition_to(BidStatus::Rejected) {
                return Err(MarketError::invalid_state("Bid has already been decided"));
            }

            match self
                .store
                .update_bid_status(request_id, bid_id, BidStatus::Pending, BidStatus::Rejected)
                .await
            {
                Ok(WriteOutcome::Applied) => {
                    let bid = self.load_bid_of(request_id, bid_id).await?;
                    log::info!("bid {} on request {} rejected", bid_id, request_id);
                    return Ok(bid);
                }
                Ok(WriteOutcome::Stale) => {}
                Err(StoreError::Contention) => Self::backoff(attempt).await,
                Err(e) => return Err(e.into()),
            }
        }

        Err(MarketError::invalid_state("Bid is being decided concurrently, try again"))
    }

    /// Either participant may mark an in-progress request completed.
    pub async fn complete_request(
        &self,
        request_id: &ObjectId,
        actor: &Actor,
    ) -> MarketResult<Request> {
        let request = self.load_request(request_id).await?;
        if !request.admits(actor) {
            return Err(MarketError::unauthorized(
                "Only the requester or the assigned worker can complete this request",
            ));
        }
        ensure_transition(&request, RequestStatus::Completed)?;

        match self
            .store
            .transition_request(request_id, RequestStatus::InProgress, RequestStatus::Completed)
            .await?
        {
            WriteOutcome::Applied => {
                let request = self.load_request(request_id).await?;
                log::info!("request {} completed by {}", request_id, actor.user_id());
                Ok(request)
            }
            WriteOutcome::Stale => Err(MarketError::invalid_state("Request is already completed")),
        }
    }
}
