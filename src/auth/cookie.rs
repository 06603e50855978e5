use axum_extra::extract::cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};

use crate::config::CookieConfig;

/// Every cookie carrying the session token is built here so that setting,
/// refreshing and clearing it always agree on attributes.
pub fn session_cookie(cfg: &CookieConfig, token: String) -> Cookie<'static> {
    let mut cookie = base(cfg, token);
    cookie.set_max_age(Duration::minutes(cfg.max_age_minutes));
    cookie
}

pub fn removal_cookie(cfg: &CookieConfig) -> Cookie<'static> {
    let mut cookie = base(cfg, String::new());
    cookie.set_max_age(Duration::ZERO);
    cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
    cookie
}

fn base(cfg: &CookieConfig, value: String) -> Cookie<'static> {
    Cookie::build((cfg.name.clone(), value))
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::None)
        .path("/")
        .build()
}
