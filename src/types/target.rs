use serde::{Deserialize, Serialize};

/// What a vote or comment hangs off.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Question,
    Answer,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Question => "question",
            TargetType::Answer => "answer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub kind: TargetType,
    pub id: String,
}

impl Target {
    pub fn question(id: impl Into<String>) -> Self {
        Target {
            kind: TargetType::Question,
            id: id.into(),
        }
    }

    pub fn answer(id: impl Into<String>) -> Self {
        Target {
            kind: TargetType::Answer,
            id: id.into(),
        }
    }
}
