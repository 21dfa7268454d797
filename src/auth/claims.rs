use serde::{Deserialize, Serialize};

/// Who the bearer of a verified token is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i32,
    pub email: String,
    pub is_teacher: bool,
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i32,     // user ID
    pub email: String,    // login handle at issue time
    pub is_teacher: bool, // role flag
    pub iat: u64,         // issued at (unix timestamp)
    pub exp: u64,         // expires at (unix timestamp)
    pub iss: String,      // issuer
    pub aud: String,      // audience
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            email: self.email.clone(),
            is_teacher: self.is_teacher,
        }
    }
}
