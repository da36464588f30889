use handle_errors::Error;
use serde_json::json;
use tracing::{event, instrument, Level};
use warp::{http::StatusCode, Rejection, Reply};

use crate::routes::authentication::Session;
use crate::store::Store;
use crate::types::{
    answer::AnswerId,
    question::QuestionId,
    target::{Target, TargetType},
    user::UserId,
    vote::{Ballot, Vote, VoteOutcome, VoteStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Create,
    Withdraw,
    Switch,
}

impl VoteAction {
    fn message(&self) -> &'static str {
        match self {
            VoteAction::Create => "Voted",
            VoteAction::Withdraw => "Vote Withdrawn",
            VoteAction::Switch => "Vote Status Updated",
        }
    }
}

/// Toggle semantics: same direction withdraws, opposite direction switches.
pub fn decide(existing: Option<VoteStatus>, requested: VoteStatus) -> VoteAction {
    match existing {
        None => VoteAction::Create,
        Some(status) if status == requested => VoteAction::Withdraw,
        Some(_) => VoteAction::Switch,
    }
}

/// Change to the target author's reputation for `action`.
pub fn reputation_delta(action: VoteAction, requested: VoteStatus) -> i64 {
    match action {
        VoteAction::Create => requested.weight(),
        VoteAction::Withdraw => -requested.weight(),
        VoteAction::Switch => 2 * requested.weight(),
    }
}

async fn target_author(store: &Store, target: &Target) -> Result<UserId, Error> {
    Ok(match target.kind {
        TargetType::Question => {
            store
                .get_question(&QuestionId(target.id.clone()))
                .await?
                .data
                .author_id
        }
        TargetType::Answer => {
            store
                .get_answer(&AnswerId(target.id.clone()))
                .await?
                .data
                .author_id
        }
    })
}

/// Applies one toggle and returns the new score with the voter's current vote.
///
/// The reads and writes here are separate platform calls. Two concurrent
/// toggles by the same voter can both see no vote and both create one.
pub async fn toggle_vote(store: &Store, ballot: &Ballot) -> Result<(VoteAction, VoteOutcome), Error> {
    let target = ballot.target();
    let author = target_author(store, &target).await?;
    let existing = store.find_vote(&ballot.voted_by_id, &target).await?;
    let action = decide(
        existing.as_ref().map(|vote| vote.data.vote_status),
        ballot.vote_status,
    );

    let document = match (action, existing) {
        (VoteAction::Withdraw, Some(vote)) => {
            store.delete_vote(&vote.id).await?;
            None
        }
        (VoteAction::Switch, Some(vote)) => {
            Some(store.update_vote_status(&vote.id, ballot.vote_status).await?)
        }
        _ => Some(store.add_vote(Vote::from(ballot)).await?),
    };

    store
        .adjust_reputation(&author, reputation_delta(action, ballot.vote_status))
        .await?;

    let vote_result = store.score(&target).await?;
    event!(
        Level::INFO,
        voter = %ballot.voted_by_id,
        target = %target.id,
        ?action,
        vote_result,
        "vote reconciled"
    );
    Ok((
        action,
        VoteOutcome {
            vote_result,
            document,
        },
    ))
}

#[instrument(skip(store))]
pub async fn vote(session: Session, store: Store, ballot: Ballot) -> Result<impl Reply, Rejection> {
    session
        .ensure_is(&ballot.voted_by_id)
        .map_err(warp::reject::custom)?;
    match toggle_vote(&store, &ballot).await {
        Ok((action, outcome)) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({
                "message": action.message(),
                "data": outcome,
            })),
            StatusCode::OK,
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
