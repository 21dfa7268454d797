use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{PostRequest, PostResponse},
    repo_types::{NewPost, PostChanges},
};
use crate::{
    auth::{Action, AuthUser},
    error::AppError,
    state::AppState,
    store::StoreError,
    users::dto::{provided, MessageResponse},
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
}

#[instrument(skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<PostResponse>>, AppError> {
    let posts = state.posts.list_posts().await?;
    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}

#[instrument(skip(state, id))]
pub async fn get_post(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<PostResponse>, AppError> {
    let Path(id) = id?;
    let post = state
        .posts
        .find_post(id)
        .await?
        .ok_or(AppError::NotFound("Post"))?;
    Ok(Json(post.into()))
}

#[instrument(skip(state, who, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    payload: Result<Json<PostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    state.policy.authorize(&who, Action::CreatePost)?;
    let Json(payload) = payload?;

    let (Some(title), Some(content)) = (provided(payload.title), provided(payload.content)) else {
        return Err(AppError::invalid_input("Title and content are required."));
    };

    let post = state
        .posts
        .create_post(NewPost {
            title,
            content,
            author_id: who.user_id,
        })
        .await
        .map_err(|e| match e {
            StoreError::MissingReference => AppError::invalid_input("Author no longer exists."),
            other => other.into(),
        })?;

    info!(post_id = post.post_id, author_id = who.user_id, "post created");
    Ok((StatusCode::CREATED, Json(post.into())))
}

#[instrument(skip(state, who, id, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<PostRequest>, JsonRejection>,
) -> Result<Json<PostResponse>, AppError> {
    let Path(id) = id?;
    state.policy.authorize(&who, Action::UpdatePost(id))?;
    let Json(payload) = payload?;

    let changes = PostChanges {
        title: provided(payload.title),
        content: provided(payload.content),
    };
    let post = state
        .posts
        .update_post(id, changes)
        .await?
        .ok_or(AppError::NotFound("Post"))?;

    info!(post_id = id, by = who.user_id, "post updated");
    Ok(Json(post.into()))
}

#[instrument(skip(state, who, id))]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id?;
    state.policy.authorize(&who, Action::DeletePost(id))?;

    if !state.posts.delete_post(id).await? {
        return Err(AppError::NotFound("Post"));
    }
    info!(post_id = id, by = who.user_id, "post deleted");
    Ok(Json(MessageResponse {
        message: "Post deleted successfully.",
    }))
}
