use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;
use mongodb::bson::oid::ObjectId;

// === OpenAPI (compatible with rocket_okapi 0.8.0 / 0.8.1) ===
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

use crate::models::Actor;

/// JWT-based authentication guard. Resolves the bearer token into the
/// caller's id and role; nothing downstream looks at credentials.
pub struct AuthGuard {
    pub actor: Actor,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Some(header) = req.headers().get_one("Authorization") else {
            return Outcome::Error((Status::Unauthorized, ()));
        };
        let token = header.trim_start_matches("Bearer ");

        match crate::services::JwtService::verify_token(token) {
            Ok(claims) => match ObjectId::parse_str(&claims.sub) {
                Ok(user_id) => Outcome::Success(AuthGuard {
                    actor: Actor::new(user_id, claims.role),
                }),
                Err(_) => Outcome::Error((Status::Unauthorized, ())),
            },
            Err(e) => {
                log::debug!("rejected bearer token: {}", e);
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for AuthGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
