use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Profile fields carried inside the session token. Any change to the
/// underlying user must be followed by re-issuing the token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSnapshot {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
}

impl From<&User> for UserSnapshot {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            gender: u.gender.clone(),
            phone: u.phone.clone(),
            address: u.address.clone(),
            city: u.city.clone(),
            state: u.state.clone(),
            pincode: u.pincode.clone(),
        }
    }
}

/// JWT payload used for session cookies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,          // user ID
    pub iat: usize,         // issued at (unix timestamp)
    pub exp: usize,         // expires at (unix timestamp)
    pub iss: String,        // issuer
    pub aud: String,        // audience
    pub jti: Uuid,          // token ID, used for logout revocation
    pub user: UserSnapshot, // denormalized profile
}
