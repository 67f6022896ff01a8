use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::error::{
    Error as MongoError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
    UNKNOWN_TRANSACTION_COMMIT_RESULT,
};
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use rocket::futures::TryStreamExt;

use super::{EntityStore, StoreError, StoreResult, WriteOutcome};
use crate::models::{Bid, BidStatus, RatingAggregate, Request, RequestFilter, RequestStatus, Review};

const DUPLICATE_KEY: i32 = 11000;
const COMMIT_ATTEMPTS: usize = 3;

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

impl From<MongoError> for StoreError {
    fn from(err: MongoError) -> Self {
        if is_duplicate_key(&err) {
            StoreError::Duplicate
        } else if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
            StoreError::Contention
        } else {
            StoreError::Database(err.to_string())
        }
    }
}

fn newest_first() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .build()
}

fn request_filter(filter: RequestFilter) -> Document {
    match filter {
        RequestFilter::Open => doc! { "status": RequestStatus::Pending.as_str() },
        RequestFilter::PostedBy(id) => doc! { "requester_id": id },
        RequestFilter::AssignedTo(id) => doc! { "assigned_worker_id": id },
    }
}

async fn commit(session: &mut ClientSession) -> StoreResult<()> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < COMMIT_ATTEMPTS && e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn abort(session: &mut ClientSession) {
    if let Err(e) = session.abort_transaction().await {
        log::debug!("abort_transaction failed: {}", e);
    }
}

/// MongoDB-backed store. Multi-document units run in transactions, which
/// requires the server to be a replica set member.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;

        // Test connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;

        let db = client.database(database);
        Ok(MongoStore { client, db })
    }

    fn requests(&self) -> Collection<Request> {
        self.db.collection("requests")
    }

    fn bids(&self) -> Collection<Bid> {
        self.db.collection("bids")
    }

    fn reviews(&self) -> Collection<Review> {
        self.db.collection("reviews")
    }

    fn ratings(&self) -> Collection<RatingAggregate> {
        self.db.collection("rating_aggregates")
    }

    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.bids()
            .create_indexes(
                vec![
                    IndexModel::builder()
                        .keys(doc! { "request_id": 1, "worker_id": 1 })
                        .options(unique())
                        .build(),
                    IndexModel::builder()
                        .keys(doc! { "worker_id": 1, "created_at": -1 })
                        .build(),
                ],
                None,
            )
            .await?;

        self.reviews()
            .create_indexes(
                vec![
                    IndexModel::builder()
                        .keys(doc! { "request_id": 1, "reviewer_id": 1 })
                        .options(unique())
                        .build(),
                    IndexModel::builder()
                        .keys(doc! { "reviewee_id": 1, "created_at": -1 })
                        .build(),
                ],
                None,
            )
            .await?;

        self.requests()
            .create_indexes(
                vec![
                    IndexModel::builder()
                        .keys(doc! { "status": 1, "created_at": -1 })
                        .build(),
                    IndexModel::builder()
                        .keys(doc! { "requester_id": 1, "created_at": -1 })
                        .build(),
                    IndexModel::builder()
                        .keys(doc! { "assigned_worker_id": 1, "created_at": -1 })
                        .build(),
                ],
                None,
            )
            .await?;

        // Transactions cannot create collections on older servers.
        if !self
            .db
            .list_collection_names(doc! { "name": "rating_aggregates" })
            .await?
            .iter()
            .any(|n| n == "rating_aggregates")
        {
            self.db.create_collection("rating_aggregates", None).await?;
        }

        Ok(())
    }

    async fn start_transaction(&self) -> StoreResult<ClientSession> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }
}

#[async_trait]
impl EntityStore for MongoStore {
    async fn insert_request(&self, request: &Request) -> StoreResult<()> {
        self.requests().insert_one(request, None).await?;
        Ok(())
    }

    async fn find_request(&self, id: &ObjectId) -> StoreResult<Option<Request>> {
        Ok(self.requests().find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_requests(&self, filter: RequestFilter) -> StoreResult<Vec<Request>> {
        let cursor = self
            .requests()
            .find(request_filter(filter), newest_first())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_pending_request(&self, id: &ObjectId) -> StoreResult<WriteOutcome> {
        let mut session = self.start_transaction().await?;

        let deleted = self
            .requests()
            .delete_one_with_session(
                doc! { "_id": id, "status": RequestStatus::Pending.as_str() },
                None,
                &mut session,
            )
            .await?;
        if deleted.deleted_count == 0 {
            abort(&mut session).await;
            return Ok(WriteOutcome::Stale);
        }

        self.bids()
            .delete_many_with_session(doc! { "request_id": id }, None, &mut session)
            .await?;

        commit(&mut session).await?;
        Ok(WriteOutcome::Applied)
    }

    async fn insert_bid(&self, bid: &Bid) -> StoreResult<WriteOutcome> {
        let mut session = self.start_transaction().await?;

        // Touching the request orders this insert against a concurrent
        // assignment or delete of the same request.
        let request = self
            .requests()
            .update_one_with_session(
                doc! { "_id": bid.request_id, "status": RequestStatus::Pending.as_str() },
                doc! { "$set": { "updated_at": DateTime::now() } },
                None,
                &mut session,
            )
            .await?;
        if request.matched_count == 0 {
            abort(&mut session).await;
            return Ok(WriteOutcome::Stale);
        }

        if let Err(e) = self
            .bids()
            .insert_one_with_session(bid, None, &mut session)
            .await
        {
            abort(&mut session).await;
            return Err(e.into());
        }

        commit(&mut session).await?;
        Ok(WriteOutcome::Applied)
    }

    async fn find_bid(&self, id: &ObjectId) -> StoreResult<Option<Bid>> {
        Ok(self.bids().find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_bids_for_request(&self, request_id: &ObjectId) -> StoreResult<Vec<Bid>> {
        let cursor = self
            .bids()
            .find(doc! { "request_id": request_id }, newest_first())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_bids_by_worker(&self, worker_id: &ObjectId) -> StoreResult<Vec<Bid>> {
        let cursor = self
            .bids()
            .find(doc! { "worker_id": worker_id }, newest_first())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_bid_status(
        &self,
        request_id: &ObjectId,
        bid_id: &ObjectId,
        from: BidStatus,
        to: BidStatus,
    ) -> StoreResult<WriteOutcome> {
        let now = DateTime::now();
        let mut session = self.start_transaction().await?;

        // Writing the request document makes a concurrent assignment
        // conflict with this transaction instead of interleaving with it.
        let request = self
            .requests()
            .update_one_with_session(
                doc! { "_id": request_id, "status": RequestStatus::Pending.as_str() },
                doc! { "$set": { "updated_at": now } },
                None,
                &mut session,
            )
            .await?;
        if request.matched_count == 0 {
            abort(&mut session).await;
            return Ok(WriteOutcome::Stale);
        }

        let bid = self
            .bids()
            .update_one_with_session(
                doc! { "_id": bid_id, "request_id": request_id, "status": from.as_str() },
                doc! { "$set": { "status": to.as_str(), "updated_at": now } },
                None,
                &mut session,
            )
            .await?;
        if bid.matched_count == 0 {
            abort(&mut session).await;
            return Ok(WriteOutcome::Stale);
        }

        commit(&mut session).await?;
        Ok(WriteOutcome::Applied)
    }

    async fn commit_assignment(
        &self,
        request_id: &ObjectId,
        bid_id: &ObjectId,
        worker_id: &ObjectId,
    ) -> StoreResult<WriteOutcome> {
        let now = DateTime::now();
        let mut session = self.start_transaction().await?;

        let request = self
            .requests()
            .update_one_with_session(
                doc! { "_id": request_id, "status": RequestStatus::Pending.as_str() },
                doc! {
                    "$set": {
                        "status": RequestStatus::InProgress.as_str(),
                        "assigned_worker_id": worker_id,
                        "updated_at": now,
                    }
                },
                None,
                &mut session,
            )
            .await?;
        if request.matched_count == 0 {
            abort(&mut session).await;
            return Ok(WriteOutcome::Stale);
        }

        let bid = self
            .bids()
            .update_one_with_session(
                doc! {
                    "_id": bid_id,
                    "request_id": request_id,
                    "status": BidStatus::Pending.as_str(),
                },
                doc! {
                    "$set": { "status": BidStatus::Accepted.as_str(), "updated_at": now }
                },
                None,
                &mut session,
            )
            .await?;
        if bid.matched_count == 0 {
            abort(&mut session).await;
            return Ok(WriteOutcome::Stale);
        }

        commit(&mut session).await?;
        Ok(WriteOutcome::Applied)
    }

    async fn transition_request(
        &self,
        request_id: &ObjectId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> StoreResult<WriteOutcome> {
        let result = self
            .requests()
            .update_one(
                doc! { "_id": request_id, "status": from.as_str() },
                doc! { "$set": { "status": to.as_str(), "updated_at": DateTime::now() } },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            Ok(WriteOutcome::Stale)
        } else {
            Ok(WriteOutcome::Applied)
        }
    }

    async fn find_review(
        &self,
        request_id: &ObjectId,
        reviewer_id: &ObjectId,
    ) -> StoreResult<Option<Review>> {
        Ok(self
            .reviews()
            .find_one(
                doc! { "request_id": request_id, "reviewer_id": reviewer_id },
                None,
            )
            .await?)
    }

    async fn list_reviews_for_user(&self, reviewee_id: &ObjectId) -> StoreResult<Vec<Review>> {
        let cursor = self
            .reviews()
            .find(doc! { "reviewee_id": reviewee_id }, newest_first())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_reviews_for_request(&self, request_id: &ObjectId) -> StoreResult<Vec<Review>> {
        let cursor = self
            .reviews()
            .find(doc! { "request_id": request_id }, newest_first())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_rating(&self, user_id: &ObjectId) -> StoreResult<RatingAggregate> {
        Ok(self
            .ratings()
            .find_one(doc! { "_id": user_id }, None)
            .await?
            .unwrap_or_else(|| RatingAggregate::empty(*user_id)))
    }

    async fn commit_review(
        &self,
        review: &Review,
        expected: &RatingAggregate,
        next: &RatingAggregate,
    ) -> StoreResult<WriteOutcome> {
        let mut session = self.start_transaction().await?;

        if let Err(e) = self
            .reviews()
            .insert_one_with_session(review, None, &mut session)
            .await
        {
            abort(&mut session).await;
            return Err(e.into());
        }

        // A first rating creates the document; any later one must find the
        // count it was computed from.
        let options = UpdateOptions::builder()
            .upsert(expected.review_count == 0)
            .build();
        let swapped = self
            .ratings()
            .update_one_with_session(
                doc! { "_id": review.reviewee_id, "review_count": expected.review_count },
                doc! {
                    "$set": {
                        "average_rating": next.average_rating,
                        "review_count": next.review_count,
                        "rating_sum": next.rating_sum,
                        "updated_at": next.updated_at,
                    }
                },
                options,
                &mut session,
            )
            .await;

        match swapped {
            Ok(result) if result.matched_count == 0 && result.upserted_id.is_none() => {
                abort(&mut session).await;
                return Ok(WriteOutcome::Stale);
            }
            Ok(_) => {}
            // The upsert collided with an aggregate created meanwhile.
            Err(e) if is_duplicate_key(&e) => {
                abort(&mut session).await;
                return Ok(WriteOutcome::Stale);
            }
            Err(e) => {
                abort(&mut session).await;
                return Err(e.into());
            }
        }

        commit(&mut session).await?;
        Ok(WriteOutcome::Applied)
    }
}
