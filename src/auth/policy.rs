use tracing::warn;

use super::claims::Identity;
use crate::error::AppError;

/// Operations gated behind the role policy, with the record they touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreatePost,
    UpdatePost(i32),
    DeletePost(i32),
    ListUsers,
    ReadUser(i32),
    UpdateUser(i32),
    DeleteUser(i32),
}

impl Action {
    fn denial(self) -> &'static str {
        match self {
            Action::CreatePost => "Only teachers can create posts.",
            Action::UpdatePost(_) => "Only teachers can edit posts.",
            Action::DeletePost(_) => "Only teachers can delete posts.",
            Action::ListUsers | Action::ReadUser(_) | Action::UpdateUser(_) | Action::DeleteUser(_) => {
                "Access denied"
            }
        }
    }
}

/// Decides whether an authenticated identity may perform an action.
/// Runs after the access guard, inline in each handler.
pub trait Policy: Send + Sync {
    fn allows(&self, who: &Identity, action: Action) -> bool;

    fn authorize(&self, who: &Identity, action: Action) -> Result<(), AppError> {
        if self.allows(who, action) {
            Ok(())
        } else {
            warn!(user_id = who.user_id, ?action, "forbidden");
            Err(AppError::Forbidden(action.denial()))
        }
    }
}

/// Any teacher may manage any post or user; ownership is not consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeacherOnly;

impl Policy for TeacherOnly {
    fn allows(&self, who: &Identity, _action: Action) -> bool {
        who.is_teacher
    }
}
