use std::sync::Arc;

use mongodb::bson::oid::ObjectId;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use serde_json::{json, Value};

use crate::marketplace::Marketplace;
use crate::models::Role;
use crate::services::JwtService;
use crate::store::MemoryStore;

struct User {
    id: ObjectId,
    token: String,
}

impl User {
    fn new(role: Role) -> Self {
        let id = ObjectId::new();
        let token = JwtService::issue_for_tests(&id, role, 600);
        User { id, token }
    }

    fn bearer(&self) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", self.token))
    }
}

async fn client() -> Client {
    let market = Marketplace::new(Arc::new(MemoryStore::new()), 8);
    Client::tracked(crate::app().manage(market))
        .await
        .expect("valid rocket instance")
}

async fn body(response: LocalResponse<'_>) -> Value {
    response.into_json::<Value>().await.expect("json body")
}

async fn post_request(client: &Client, owner: &User) -> String {
    let response = client
        .post("/api/v1/requests")
        .header(ContentType::JSON)
        .header(owner.bearer())
        .body(
            json!({
                "serviceType": "electrical",
                "description": "Replace two ceiling fans",
                "location": "Flat 4B, MG Road",
                "scheduledDate": "2026-11-05",
                "scheduledTime": "14:00",
                "phone": "9123456780",
                "budget": 2000.0
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let value = body(response).await;
    assert_eq!(value["data"]["status"], "pending");
    value["data"]["id"].as_str().unwrap().to_string()
}

async fn bid<'c>(
    client: &'c Client,
    worker: &User,
    request_id: &str,
    amount: f64,
) -> LocalResponse<'c> {
    client
        .post("/api/v1/bids")
        .header(ContentType::JSON)
        .header(worker.bearer())
        .body(json!({ "requestId": request_id, "amount": amount }).to_string())
        .dispatch()
        .await
}

#[rocket::async_test]
async fn requests_need_a_token() {
    let client = client().await;
    let response = client.get("/api/v1/requests/open").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn full_lifecycle_over_http() {
    let client = client().await;
    let owner = User::new(Role::Requester);
    let (a, b) = (User::new(Role::Worker), User::new(Role::Worker));

    let request_id = post_request(&client, &owner).await;

    let bid_a = body(bid(&client, &a, &request_id, 1000.0).await).await;
    let bid_a = bid_a["data"]["id"].as_str().unwrap().to_string();
    let bid_b = body(bid(&client, &b, &request_id, 1200.0).await).await;
    let bid_b = bid_b["data"]["id"].as_str().unwrap().to_string();

    let duplicate = bid(&client, &a, &request_id, 900.0).await;
    assert_eq!(duplicate.status(), Status::Conflict);

    let listed = client
        .get(format!("/api/v1/bids/{}", request_id))
        .header(owner.bearer())
        .dispatch()
        .await;
    assert_eq!(listed.status(), Status::Ok);
    assert_eq!(body(listed).await["data"].as_array().unwrap().len(), 2);

    let accepted = client
        .put(format!("/api/v1/bids/{}/accept", bid_a))
        .header(owner.bearer())
        .dispatch()
        .await;
    assert_eq!(accepted.status(), Status::Ok);
    let accepted = body(accepted).await;
    assert_eq!(accepted["data"]["request"]["status"], "in_progress");
    assert_eq!(accepted["data"]["request"]["assignedWorkerId"], a.id.to_hex());
    assert_eq!(accepted["data"]["bid"]["status"], "accepted");

    let second = client
        .put(format!("/api/v1/bids/{}/accept", bid_b))
        .header(owner.bearer())
        .dispatch()
        .await;
    assert_eq!(second.status(), Status::Conflict);

    let completed = client
        .put(format!("/api/v1/requests/{}", request_id))
        .header(ContentType::JSON)
        .header(a.bearer())
        .body(json!({ "status": "completed" }).to_string())
        .dispatch()
        .await;
    assert_eq!(completed.status(), Status::Ok);

    let review = client
        .post("/api/v1/reviews")
        .header(ContentType::JSON)
        .header(owner.bearer())
        .body(
            json!({
                "requestId": request_id,
                "revieweeId": a.id.to_hex(),
                "rating": 5,
                "comment": "On time and tidy"
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(review.status(), Status::Ok);
    let review = body(review).await;
    assert_eq!(review["data"]["rating"]["reviewCount"], 1);
    assert_eq!(review["data"]["rating"]["averageRating"], 5.0);

    let rating = client
        .get(format!("/api/v1/ratings/{}", a.id.to_hex()))
        .dispatch()
        .await;
    let rating = body(rating).await;
    assert_eq!(rating["data"]["averageRating"], 5.0);
    assert_eq!(rating["data"]["reviewCount"], 1);
}

#[rocket::async_test]
async fn workers_cannot_see_or_accept_bids() {
    let client = client().await;
    let owner = User::new(Role::Requester);
    let w = User::new(Role::Worker);
    let request_id = post_request(&client, &owner).await;
    let placed = body(bid(&client, &w, &request_id, 300.0).await).await;
    let bid_id = placed["data"]["id"].as_str().unwrap().to_string();

    let listed = client
        .get(format!("/api/v1/bids/{}", request_id))
        .header(w.bearer())
        .dispatch()
        .await;
    assert_eq!(listed.status(), Status::Forbidden);

    let accepted = client
        .put(format!("/api/v1/bids/{}/accept", bid_id))
        .header(w.bearer())
        .dispatch()
        .await;
    assert_eq!(accepted.status(), Status::Forbidden);
}

#[rocket::async_test]
async fn invalid_input_is_a_bad_request() {
    let client = client().await;
    let owner = User::new(Role::Requester);
    let w = User::new(Role::Worker);
    let request_id = post_request(&client, &owner).await;

    let response = bid(&client, &w, &request_id, 0.0).await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = bid(&client, &w, "not-an-id", 10.0).await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = client
        .put(format!("/api/v1/requests/{}", request_id))
        .header(ContentType::JSON)
        .header(owner.bearer())
        .body(json!({ "status": "in_progress" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn deleting_assigned_request_conflicts() {
    let client = client().await;
    let owner = User::new(Role::Requester);
    let w = User::new(Role::Worker);
    let request_id = post_request(&client, &owner).await;
    let placed = body(bid(&client, &w, &request_id, 300.0).await).await;
    let bid_id = placed["data"]["id"].as_str().unwrap().to_string();
    client
        .put(format!("/api/v1/bids/{}/accept", bid_id))
        .header(owner.bearer())
        .dispatch()
        .await;

    let response = client
        .delete(format!("/api/v1/requests/{}", request_id))
        .header(owner.bearer())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);
}
