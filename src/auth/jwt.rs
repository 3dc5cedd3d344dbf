use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{auth::claims::Claims, config::JwtConfig, users::repo_types::Role};

/// Signing and verification keys derived once from the configured secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: config.expires_in,
        }
    }

    pub fn sign(&self, user_id: i64, role: Role) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| anyhow::anyhow!("token ttl out of range"))?;
        let exp = now
            .checked_add(TimeDuration::seconds(ttl))
            .ok_or_else(|| anyhow::anyhow!("token expiry out of range"))?;
        let claims = Claims {
            id: user_id,
            role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, role = %role, "jwt signed");
        Ok(token)
    }

    /// Checks signature and expiry against the same secret used by `sign`.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        debug!(user_id = data.claims.id, "jwt verified");
        Ok(data.claims)
    }
}
