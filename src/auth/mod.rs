use crate::state::AppState;
use axum::Router;

pub mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod policy;
pub mod services;

pub use claims::Identity;
pub use extractors::AuthUser;
pub use jwt::JwtKeys;
pub use policy::{Action, Policy, TeacherOnly};
pub use services::{AuthError, Authenticator};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
