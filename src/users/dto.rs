use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::repo_types::User;

/// Public part of the user returned to the client. The only user shape that
/// is ever serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub is_teacher: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            name: u.name,
            email: u.email,
            is_teacher: u.is_teacher,
            created_at: u.created_at,
        }
    }
}

/// Request body for registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Any JSON value; coerced with [`truthy`].
    #[serde(default)]
    pub is_teacher: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(rename = "isTeacher")]
    pub is_teacher: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Loose boolean coercion for the role flag on registration.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Blank strings count as "not provided" in partial updates.
pub(crate) fn provided(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}
