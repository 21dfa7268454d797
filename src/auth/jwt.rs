use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, Identity};
use crate::{config::JwtConfig, state::AppState};

/// Any verification failure. Bad signature, malformed structure, wrong
/// issuer and expiry all collapse into this one value.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid token")]
pub struct InvalidToken;

/// HMAC keys plus the issuing parameters, built once from config.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: cfg.ttl,
        }
    }

    pub fn sign(&self, identity: &Identity) -> anyhow::Result<String> {
        self.sign_at(identity, OffsetDateTime::now_utc())
    }

    /// Signs a token as if issued at `issued_at`; expiry is `issued_at + ttl`.
    pub fn sign_at(&self, identity: &Identity, issued_at: OffsetDateTime) -> anyhow::Result<String> {
        let secs = i64::try_from(self.ttl.as_secs()).context("token lifetime out of range")?;
        let exp = issued_at
            .checked_add(TimeDuration::seconds(secs))
            .context("token expiry out of range")?;
        let claims = Claims {
            user_id: identity.user_id,
            email: identity.email.clone(),
            is_teacher: identity.is_teacher,
            iat: issued_at.unix_timestamp().max(0) as u64,
            exp: exp.unix_timestamp().max(0) as u64,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = identity.user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, InvalidToken> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation()).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            InvalidToken
        })?;
        debug!(user_id = data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation
    }
}
