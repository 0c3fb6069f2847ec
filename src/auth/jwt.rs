use std::sync::Arc;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::{claims::Claims, roles::Role};
use crate::{config::JwtConfig, state::AppState};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is invalid")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Signing material and claim settings, built once at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: TimeDuration,
}

impl FromRef<AppState> for Arc<JwtKeys> {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: TimeDuration::seconds(cfg.ttl_minutes.max(0).saturating_mul(60)),
        }
    }

    fn issue_at(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let exp = now
            .checked_add(self.ttl)
            .ok_or_else(|| TokenError::Signing("token expiry out of range".into()))?;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(user_id, %role, jti = %claims.jti, "jwt signed");
        Ok(token)
    }

    pub fn issue(&self, user_id: i64, email: &str, role: Role) -> Result<String, TokenError> {
        self.issue_at(user_id, email, role, OffsetDateTime::now_utc())
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        debug!(sub = %data.claims.sub, role = %data.claims.role, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) fn issue_expired(keys: &JwtKeys, user_id: i64, email: &str, role: Role) -> String {
    let long_ago = OffsetDateTime::now_utc() - TimeDuration::hours(48);
    keys.issue_at(user_id, email, role, long_ago)
        .expect("sign expired token")
}
