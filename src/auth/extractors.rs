use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{claims::Identity, jwt::JwtKeys};
use crate::error::AppError;

/// Extracts and validates the bearer token, yielding the caller's identity.
/// Trusts the signature alone; the user table is never consulted.
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AppError::MissingToken)?;

        // Expect "Bearer <token>"
        let token = header
            .to_str()
            .ok()
            .and_then(bearer_token)
            .ok_or(AppError::InvalidToken)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::InvalidToken
        })?;

        let identity = claims.identity();
        tracing::Span::current().record("user_id", identity.user_id);
        Ok(AuthUser(identity))
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
