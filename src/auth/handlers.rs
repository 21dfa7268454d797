use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse},
        services::Authenticator,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

#[instrument(skip(auth, payload))]
pub async fn login(
    State(auth): State<Authenticator>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload?;
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    let session = auth.login(&email, &password).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        user: session.user,
    }))
}
