use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::Post;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub post_id: i32,
    pub title: String,
    pub author: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_date: OffsetDateTime,
}

impl From<Post> for PostResponse {
    fn from(p: Post) -> Self {
        Self {
            post_id: p.post_id,
            title: p.title,
            author: p.author,
            content: p.content,
            creation_date: p.creation_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}
