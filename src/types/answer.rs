use serde::{Deserialize, Serialize};

use super::{question::QuestionId, user::UserId};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub content: String,
    pub question_id: QuestionId,
    pub author_id: UserId,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct AnswerId(pub String);

impl std::fmt::Display for AnswerId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewAnswer {
    pub question_id: QuestionId,
    pub answer: String,
    pub author_id: UserId,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRef {
    pub answer_id: AnswerId,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Solve {
    pub question_id: QuestionId,
    pub answer_id: AnswerId,
}
