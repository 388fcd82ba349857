pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

/// Caller identity carried by the bearer token. Handlers take this as an
/// extractor argument; a missing or invalid token rejects with 401 before
/// the handler body runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: uuid::Uuid,
    pub username: String,
    pub full_name: String,
    pub role: String,
}

impl From<jwt::Claims> for AuthenticatedUser {
    fn from(claims: jwt::Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            full_name: claims.name,
            role: claims.role,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        state
            .jwt
            .verify_token(bearer.token())
            .map(AuthenticatedUser::from)
            .map_err(|_| AppError::unauthorized())
    }
}
