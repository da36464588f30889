use handle_errors::Error;
use serde_json::json;
use tracing::instrument;
use warp::{http::StatusCode, Rejection, Reply};

use crate::routes::authentication::Session;
use crate::store::Store;
use crate::types::{
    answer::AnswerId,
    comment::{Comment, CommentRef, NewComment},
    question::QuestionId,
    target::TargetType,
};

async fn ensure_parent_exists(store: &Store, comment: &NewComment) -> Result<(), Error> {
    match comment.kind {
        TargetType::Question => store
            .get_question(&QuestionId(comment.type_id.clone()))
            .await
            .map(|_| ()),
        TargetType::Answer => store
            .get_answer(&AnswerId(comment.type_id.clone()))
            .await
            .map(|_| ()),
    }
}

#[instrument(skip(store))]
pub async fn add_comment(
    session: Session,
    store: Store,
    new_comment: NewComment,
) -> Result<impl Reply, Rejection> {
    session
        .ensure_is(&new_comment.author_id)
        .map_err(warp::reject::custom)?;
    ensure_parent_exists(&store, &new_comment)
        .await
        .map_err(warp::reject::custom)?;

    match store.add_comment(Comment::from(new_comment)).await {
        Ok(comment) => Ok(warp::reply::with_status(
            warp::reply::json(&comment),
            StatusCode::CREATED,
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

#[instrument(skip(store))]
pub async fn delete_comment(
    session: Session,
    store: Store,
    comment_ref: CommentRef,
) -> Result<impl Reply, Rejection> {
    let comment = store
        .get_comment(&comment_ref.comment_id)
        .await
        .map_err(warp::reject::custom)?;
    session
        .ensure_is(&comment.data.author_id)
        .map_err(warp::reject::custom)?;

    match store.delete_comment(&comment_ref.comment_id).await {
        Ok(_) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "data": comment })),
            StatusCode::OK,
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
