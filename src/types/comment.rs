use serde::{Deserialize, Serialize};

use super::{target::TargetType, user::UserId};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: TargetType,
    pub type_id: String,
    pub author_id: UserId,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct CommentId(pub String);

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: TargetType,
    pub type_id: String,
    pub author_id: UserId,
}

impl From<NewComment> for Comment {
    fn from(c: NewComment) -> Self {
        Comment {
            content: c.content,
            kind: c.kind,
            type_id: c.type_id,
            author_id: c.author_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommentRef {
    pub comment_id: CommentId,
}
