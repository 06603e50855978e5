use std::collections::HashMap;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{
        claims::{Claims, UserSnapshot},
        repo_types::User,
    },
    config::JwtConfig,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token revoked")]
    Revoked,
    #[error("invalid token")]
    Invalid,
}

/// Holds JWT signing and verification keys. Built once at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        self.issue_with_ttl(user, self.ttl)
    }

    pub(crate) fn issue_with_ttl(&self, user: &User, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + ttl;
        let claims = Claims {
            sub: user.id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
            user: UserSnapshot::from(user),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, jti = %claims.jti, "jwt signed");
        Ok(token)
    }

    /// Verifies signature, issuer, audience and expiry. Never yields a
    /// default identity on failure.
    pub fn resolve(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        if data.claims.sub != data.claims.user.id {
            return Err(TokenError::Invalid);
        }
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

/// Token ids invalidated by logout, kept until their own expiry passes.
#[derive(Default)]
pub struct RevokedTokens {
    entries: RwLock<HashMap<Uuid, usize>>,
}

impl RevokedTokens {
    pub async fn revoke(&self, claims: &Claims) {
        let now = OffsetDateTime::now_utc().unix_timestamp().max(0) as usize;
        let mut entries = self.entries.write().await;
        entries.retain(|_, exp| *exp >= now);
        entries.insert(claims.jti, claims.exp);
    }

    pub async fn is_revoked(&self, jti: &Uuid) -> bool {
        self.entries.read().await.contains_key(jti)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}


#[cfg(test)]
pub(crate) use tests::sample_user;
