use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use validator::Validate;

use crate::guards::AuthGuard;
use crate::marketplace::Marketplace;
use crate::models::{Actor, AssignmentResponse, BidResponse, CreateBidDto};
use crate::utils::{parse_id, ApiError, ApiResponse};

#[openapi(tag = "Bid")]
#[post("/bids", data = "<dto>")]
pub async fn submit_bid(
    market: &State<Marketplace>,
    auth: AuthGuard,
    dto: Json<CreateBidDto>,
) -> Result<Json<ApiResponse<BidResponse>>, ApiError> {
    dto.validate()?;
    let request_id = parse_id(&dto.request_id, "request")?;

    let bid = market.submit_bid(&request_id, &auth.actor, dto.amount).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Bid placed successfully".to_string(),
        bid.into(),
    )))
}

#[openapi(tag = "Bid")]
#[get("/bids/mine")]
pub async fn list_my_bids(
    market: &State<Marketplace>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<BidResponse>>>, ApiError> {
    let bids = market.list_worker_bids(&auth.actor.user_id()).await?;
    Ok(Json(ApiResponse::success(
        bids.into_iter().map(BidResponse::from).collect(),
    )))
}

/// All bids on a request, newest first. Visible to the request's owner only.
#[openapi(tag = "Bid")]
#[get("/bids/<request_id>")]
pub async fn list_bids(
    market: &State<Marketplace>,
    auth: AuthGuard,
    request_id: String,
) -> Result<Json<ApiResponse<Vec<BidResponse>>>, ApiError> {
    let request_id = parse_id(&request_id, "request")?;
    let request = market.get_request(&request_id).await?;
    if !matches!(auth.actor, Actor::Requester(id) if id == request.requester_id) {
        return Err(ApiError::forbidden("Only the requester can view these bids"));
    }

    let bids = market.list_bids(&request_id).await?;
    Ok(Json(ApiResponse::success(
        bids.into_iter().map(BidResponse::from).collect(),
    )))
}

#[openapi(tag = "Bid")]
#[put("/bids/<bid_id>/accept")]
pub async fn accept_bid(
    market: &State<Marketplace>,
    auth: AuthGuard,
    bid_id: String,
) -> Result<Json<ApiResponse<AssignmentResponse>>, ApiError> {
    let bid_id = parse_id(&bid_id, "bid")?;
    let bid = market.get_bid(&bid_id).await?;

    let (request, bid) = market.accept_bid(&bid.request_id, &bid_id, &auth.actor).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Bid accepted, worker assigned".to_string(),
        AssignmentResponse {
            request: request.into(),
            bid: bid.into(),
        },
    )))
}

#[openapi(tag = "Bid")]
#[put("/bids/<bid_id>/reject")]
pub async fn reject_bid(
    market: &State<Marketplace>,
    auth: AuthGuard,
    bid_id: String,
) -> Result<Json<ApiResponse<BidResponse>>, ApiError> {
    let bid_id = parse_id(&bid_id, "bid")?;
    let bid = market.get_bid(&bid_id).await?;

    let bid = market.reject_bid(&bid.request_id, &bid_id, &auth.actor).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Bid rejected".to_string(),
        bid.into(),
    )))
}
