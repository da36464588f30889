use serde::{Deserialize, Serialize};

use super::{
    document::Document,
    target::{Target, TargetType},
    user::UserId,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    Upvoted,
    Downvoted,
}

impl VoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteStatus::Upvoted => "upvoted",
            VoteStatus::Downvoted => "downvoted",
        }
    }

    /// Contribution of one vote to the score.
    pub fn weight(&self) -> i64 {
        match self {
            VoteStatus::Upvoted => 1,
            VoteStatus::Downvoted => -1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    #[serde(rename = "type")]
    pub kind: TargetType,
    pub type_id: String,
    pub vote_status: VoteStatus,
    pub voted_by_id: UserId,
}

/// Body of `POST /api/vote`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub voted_by_id: UserId,
    pub vote_status: VoteStatus,
    #[serde(rename = "type")]
    pub kind: TargetType,
    pub type_id: String,
}

impl Ballot {
    pub fn target(&self) -> Target {
        Target {
            kind: self.kind,
            id: self.type_id.clone(),
        }
    }
}

impl From<&Ballot> for Vote {
    fn from(ballot: &Ballot) -> Self {
        Vote {
            kind: ballot.kind,
            type_id: ballot.type_id.clone(),
            vote_status: ballot.vote_status,
            voted_by_id: ballot.voted_by_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub vote_result: i64,
    pub document: Option<Document<Vote>>,
}
