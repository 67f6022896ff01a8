use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::marketplace::Marketplace;
use crate::models::RatingResponse;
use crate::utils::{parse_id, ApiError, ApiResponse};

#[openapi(tag = "Rating")]
#[get("/ratings/<user_id>")]
pub async fn get_rating(
    market: &State<Marketplace>,
    user_id: String,
) -> Result<Json<ApiResponse<RatingResponse>>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let rating = market.get_rating(&user_id).await?;
    Ok(Json(ApiResponse::success(rating.into())))
}
