use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{provided, truthy, CreateUserRequest, ListUsersQuery, MessageResponse, PublicUser, UpdateUserRequest},
    repo_types::UserChanges,
};
use crate::{
    auth::{
        password::hash_password,
        services::{is_valid_email, normalize_email},
        Action, AuthUser, Authenticator,
    },
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(auth, payload))]
pub async fn create_user(
    State(auth): State<Authenticator>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let Json(payload) = payload?;
    let is_teacher = truthy(payload.is_teacher.as_ref());
    let user = auth
        .register(
            payload.name.as_deref().unwrap_or_default(),
            payload.email.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
            is_teacher,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, who))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Query(q): Query<ListUsersQuery>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    state.policy.authorize(&who, Action::ListUsers)?;

    let filter = q.is_teacher.map(|v| v == "true");
    let users = state.users.list_users(filter).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, who, id))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<PublicUser>, AppError> {
    let Path(id) = id?;
    state.policy.authorize(&who, Action::ReadUser(id))?;

    let user = state
        .users
        .find_user(id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, who, id, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<PublicUser>, AppError> {
    let Path(id) = id?;
    state.policy.authorize(&who, Action::UpdateUser(id))?;
    let Json(payload) = payload?;

    let email = provided(payload.email).map(|e| normalize_email(&e));
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(AppError::invalid_input("Invalid email"));
        }
    }
    let password_hash = match provided(payload.password) {
        Some(plain) => Some(hash_password(&plain)?),
        None => None,
    };
    let changes = UserChanges {
        name: provided(payload.name).map(|n| n.trim().to_string()),
        email,
        password_hash,
    };

    let user = if changes.is_empty() {
        state.users.find_user(id).await?
    } else {
        state.users.update_user(id, changes).await?
    };
    let user = user.ok_or(AppError::NotFound("User"))?;

    info!(user_id = id, by = who.user_id, "user updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state, who, id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id?;
    state.policy.authorize(&who, Action::DeleteUser(id))?;

    if !state.users.delete_user(id).await? {
        return Err(AppError::NotFound("User"));
    }
    info!(user_id = id, by = who.user_id, "user deleted");
    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
