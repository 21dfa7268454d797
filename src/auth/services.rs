use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::{
    claims::Identity,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
};
use crate::{
    state::AppState,
    store::{StoreError, UserStore},
    users::{dto::PublicUser, repo_types::NewUser},
};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email and wrong password are deliberately the same value.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already registered")]
    EmailTaken,

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AuthError::EmailTaken,
            other => AuthError::Internal(other.into()),
        }
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

lazy_static! {
    // Verified against when the email is unknown, so both login failures cost one Argon2 run.
    static ref DUMMY_HASH: Option<String> = hash_password("schoolblog-dummy-password").ok();
}

/// Result of a successful login.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

/// Checks credentials against the user store and issues session tokens.
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for Authenticator {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.keys.clone())
    }
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "email and password are required".into(),
            ));
        }

        let Some(user) = self.users.find_user_by_email(&email).await? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            warn!("login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash) {
            warn!(user_id = user.user_id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let identity = Identity {
            user_id: user.user_id,
            email: user.email.clone(),
            is_teacher: user.is_teacher,
        };
        let token = self.keys.sign(&identity)?;

        info!(user_id = user.user_id, "user logged in");
        Ok(Session {
            token,
            user: PublicUser::from(user),
        })
    }

    /// Creates an account. No token is issued; the caller logs in separately.
    #[instrument(skip(self, name, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        is_teacher: bool,
    ) -> Result<PublicUser, AuthError> {
        let name = name.trim();
        let email = normalize_email(email);
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "name, email and password are required".into(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidInput("Invalid email".into()));
        }

        // Early exit only; the unique index decides races.
        if self.users.find_user_by_email(&email).await?.is_some() {
            warn!("email already registered");
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create_user(NewUser {
                name: name.to_string(),
                email,
                password_hash,
                is_teacher,
            })
            .await?;

        info!(user_id = user.user_id, is_teacher, "user registered");
        Ok(PublicUser::from(user))
    }
}
