use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{ProfilePatch, User};

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Mutable profile fields. The citizen form posts `mobile` and `district`.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub gender: Option<String>,
    #[serde(alias = "mobile")]
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(alias = "district")]
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
}

/// Trims an optional form field; blank input counts as absent.
pub(crate) fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl From<ProfileUpdateRequest> for ProfilePatch {
    fn from(r: ProfileUpdateRequest) -> Self {
        Self {
            name: non_blank(r.name),
            gender: non_blank(r.gender),
            phone: non_blank(r.phone),
            address: non_blank(r.address),
            city: non_blank(r.city),
            state: non_blank(r.state),
            pincode: non_blank(r.pincode),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdateResponse {
    pub message: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            gender: u.gender,
            phone: u.phone,
            address: u.address,
            city: u.city,
            state: u.state,
            pincode: u.pincode,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
