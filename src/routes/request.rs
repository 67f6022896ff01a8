use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::guards::AuthGuard;
use crate::marketplace::Marketplace;
use crate::models::{NewRequest, RequestFilter, RequestResponse, RequestStatus, UpdateRequestStatusDto};
use crate::utils::{parse_id, ApiError, ApiResponse};

#[openapi(tag = "Request")]
#[post("/requests", data = "<dto>")]
pub async fn create_request(
    market: &State<Marketplace>,
    auth: AuthGuard,
    dto: Json<NewRequest>,
) -> Result<Json<ApiResponse<RequestResponse>>, ApiError> {
    let request = market.create_request(&auth.actor, dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Request posted successfully".to_string(),
        request.into(),
    )))
}

async fn list(
    market: &Marketplace,
    filter: RequestFilter,
) -> Result<Json<ApiResponse<Vec<RequestResponse>>>, ApiError> {
    let requests = market.list_requests(filter).await?;
    Ok(Json(ApiResponse::success(
        requests.into_iter().map(RequestResponse::from).collect(),
    )))
}

/// Requests still accepting bids.
#[openapi(tag = "Request")]
#[get("/requests/open")]
pub async fn list_open_requests(
    market: &State<Marketplace>,
    _auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<RequestResponse>>>, ApiError> {
    list(market, RequestFilter::Open).await
}

#[openapi(tag = "Request")]
#[get("/requests/mine")]
pub async fn list_my_requests(
    market: &State<Marketplace>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<RequestResponse>>>, ApiError> {
    list(market, RequestFilter::PostedBy(auth.actor.user_id())).await
}

#[openapi(tag = "Request")]
#[get("/requests/assigned")]
pub async fn list_assigned_requests(
    market: &State<Marketplace>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<RequestResponse>>>, ApiError> {
    list(market, RequestFilter::AssignedTo(auth.actor.user_id())).await
}

#[openapi(tag = "Request")]
#[get("/requests/<id>")]
pub async fn get_request(
    market: &State<Marketplace>,
    _auth: AuthGuard,
    id: String,
) -> Result<Json<ApiResponse<RequestResponse>>, ApiError> {
    let request_id = parse_id(&id, "request")?;
    let request = market.get_request(&request_id).await?;
    Ok(Json(ApiResponse::success(request.into())))
}

/// Status updates from clients; only completion is driven this way.
#[openapi(tag = "Request")]
#[put("/requests/<id>", data = "<dto>")]
pub async fn update_request_status(
    market: &State<Marketplace>,
    auth: AuthGuard,
    id: String,
    dto: Json<UpdateRequestStatusDto>,
) -> Result<Json<ApiResponse<RequestResponse>>, ApiError> {
    let request_id = parse_id(&id, "request")?;
    if dto.status != RequestStatus::Completed {
        return Err(ApiError::bad_request(
            "Only 'completed' can be set here; assignment happens by accepting a bid",
        ));
    }

    let request = market.complete_request(&request_id, &auth.actor).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Request marked as completed".to_string(),
        request.into(),
    )))
}

#[openapi(tag = "Request")]
#[delete("/requests/<id>")]
pub async fn delete_request(
    market: &State<Marketplace>,
    auth: AuthGuard,
    id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let request_id = parse_id(&id, "request")?;
    market.delete_request(&request_id, &auth.actor).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Request deleted successfully".to_string(),
        serde_json::json!({ "requestId": id }),
    )))
}
