use anyhow::Context;
use serde::Deserialize;

const DEFAULT_AI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Attributes shared by every cookie that carries or clears the session token.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub max_age_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub ai: AiConfig,
    pub rate_limit: RateLimitConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "grievance-portal".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "grievance-portal-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24),
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");

        // The cookie lives exactly as long as the token it carries.
        let cookie = CookieConfig {
            name: std::env::var("COOKIE_NAME").unwrap_or_else(|_| "token".into()),
            secure: env_or("COOKIE_SECURE", true),
            max_age_minutes: jwt.ttl_minutes,
        };

        let ai = AiConfig {
            endpoint: std::env::var("AI_ENDPOINT").unwrap_or_else(|_| DEFAULT_AI_ENDPOINT.into()),
            api_key: std::env::var("AI_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_secs: env_or("AI_TIMEOUT_SECS", 20),
        };

        let rate_limit = RateLimitConfig {
            capacity: env_or("RATE_LIMIT_CAPACITY", 20.0),
            refill_per_sec: env_or("RATE_LIMIT_REFILL_PER_SEC", 0.5),
        };

        Ok(Self {
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            cookie,
            ai,
            rate_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_missing_or_unparsable() {
        assert_eq!(env_or("GRIEVANCE_PORTAL_UNSET_VAR", 7u32), 7);
        std::env::set_var("GRIEVANCE_PORTAL_BAD_NUMBER", "seven");
        assert_eq!(env_or("GRIEVANCE_PORTAL_BAD_NUMBER", 7u32), 7);
        std::env::set_var("GRIEVANCE_PORTAL_GOOD_BOOL", "false");
        assert!(!env_or("GRIEVANCE_PORTAL_GOOD_BOOL", true));
    }
}
