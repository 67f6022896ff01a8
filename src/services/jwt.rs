use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::models::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Tokens are issued by the identity service; this side only verifies them.
pub struct JwtService;

impl JwtService {
    pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let secret = crate::config::Config::jwt_secret();

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    #[cfg(test)]
    pub fn issue_for_tests(
        user_id: &mongodb::bson::oid::ObjectId,
        role: Role,
        ttl_secs: i64,
    ) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_hex(),
            role,
            exp: now + ttl_secs,
            iat: now,
        };
        let secret = crate::config::Config::jwt_secret();
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }
}
