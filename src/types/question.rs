use serde::{Deserialize, Serialize};

use super::{
    answer::{Answer, AnswerId},
    comment::Comment,
    document::Document,
    user::UserId,
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_answer_id: Option<AnswerId>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct QuestionId(pub String);

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    #[serde(default)]
    pub tags: Vec<String>,
    pub attachment_id: Option<String>,
}

/// Tags are a set; keep first occurrence order.
fn unique_tags(raw: Vec<String>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

impl From<NewQuestion> for Question {
    fn from(new_question: NewQuestion) -> Self {
        Question {
            title: new_question.title,
            content: new_question.content,
            author_id: new_question.author_id,
            tags: unique_tags(new_question.tags),
            attachment_id: new_question.attachment_id,
            best_answer_id: None,
        }
    }
}

/// Edit of an existing question. Author and best answer never change here;
/// leaving `attachmentId` out keeps the current attachment.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionUpdate {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
}

impl QuestionUpdate {
    pub fn normalized(self) -> Self {
        QuestionUpdate {
            tags: unique_tags(self.tags),
            ..self
        }
    }
}

/// Everything the question page shows in one response.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDetails {
    #[serde(flatten)]
    pub question: Document<Question>,
    pub vote_result: i64,
    pub solved: bool,
    pub comments: Vec<Document<Comment>>,
    pub answers: Vec<AnswerDetails>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDetails {
    #[serde(flatten)]
    pub answer: Document<Answer>,
    pub vote_result: i64,
    pub is_best: bool,
    pub comments: Vec<Document<Comment>>,
}
