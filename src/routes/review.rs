use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use validator::Validate;

use crate::guards::AuthGuard;
use crate::marketplace::Marketplace;
use crate::models::{CreateReviewDto, ReviewReceipt, ReviewResponse};
use crate::utils::{parse_id, ApiError, ApiResponse};

#[openapi(tag = "Review")]
#[post("/reviews", data = "<dto>")]
pub async fn create_review(
    market: &State<Marketplace>,
    auth: AuthGuard,
    dto: Json<CreateReviewDto>,
) -> Result<Json<ApiResponse<ReviewReceipt>>, ApiError> {
    dto.validate()?;
    let dto = dto.into_inner();
    let request_id = parse_id(&dto.request_id, "request")?;
    let reviewee_id = parse_id(&dto.reviewee_id, "reviewee")?;

    let (review, rating) = market
        .submit_review(&request_id, &auth.actor, &reviewee_id, dto.rating, dto.comment)
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        "Review submitted successfully".to_string(),
        ReviewReceipt {
            review: review.into(),
            rating: rating.into(),
        },
    )))
}

#[openapi(tag = "Review")]
#[get("/reviews/user/<user_id>")]
pub async fn get_user_reviews(
    market: &State<Marketplace>,
    user_id: String,
) -> Result<Json<ApiResponse<Vec<ReviewResponse>>>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let reviews = market.list_reviews_for(&user_id).await?;
    Ok(Json(ApiResponse::success(
        reviews.into_iter().map(ReviewResponse::from).collect(),
    )))
}

#[openapi(tag = "Review")]
#[get("/reviews/request/<request_id>")]
pub async fn get_request_reviews(
    market: &State<Marketplace>,
    request_id: String,
) -> Result<Json<ApiResponse<Vec<ReviewResponse>>>, ApiError> {
    let request_id = parse_id(&request_id, "request")?;
    let reviews = market.list_request_reviews(&request_id).await?;
    Ok(Json(ApiResponse::success(
        reviews.into_iter().map(ReviewResponse::from).collect(),
    )))
}
