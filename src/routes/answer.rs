use handle_errors::Error;
use serde_json::json;
use tracing::{event, instrument, Level};
use warp::{http::StatusCode, Rejection, Reply};

use crate::routes::authentication::Session;
use crate::store::Store;
use crate::types::{
    answer::{Answer, AnswerRef, NewAnswer, Solve},
    document::Document,
    question::Question,
};

#[instrument(skip(store))]
pub async fn add_answer(
    session: Session,
    store: Store,
    new_answer: NewAnswer,
) -> Result<impl Reply, Rejection> {
    session
        .ensure_is(&new_answer.author_id)
        .map_err(warp::reject::custom)?;

    // The question has to exist before anything can hang off it.
    store
        .get_question(&new_answer.question_id)
        .await
        .map_err(warp::reject::custom)?;

    let answer = Answer {
        content: new_answer.answer,
        question_id: new_answer.question_id,
        author_id: new_answer.author_id,
    };

    match store.add_answer(answer).await {
        Ok(answer) => Ok(warp::reply::with_status(
            warp::reply::json(&answer),
            StatusCode::CREATED,
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// Removes an answer. A question whose best answer this was keeps pointing at it.
#[instrument(skip(store))]
pub async fn delete_answer(
    session: Session,
    store: Store,
    answer_ref: AnswerRef,
) -> Result<impl Reply, Rejection> {
    let answer = store
        .get_answer(&answer_ref.answer_id)
        .await
        .map_err(warp::reject::custom)?;
    session
        .ensure_is(&answer.data.author_id)
        .map_err(warp::reject::custom)?;

    match store.delete_answer(&answer_ref.answer_id).await {
        Ok(_) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "data": answer })),
            StatusCode::OK,
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// Marks the best answer, then credits its author.
///
/// The two writes are independent: if crediting fails the question stays
/// solved. Solving again credits the author again.
pub async fn mark_solved(
    store: &Store,
    session: &Session,
    solve: &Solve,
) -> Result<Document<Question>, Error> {
    let question = store.get_question(&solve.question_id).await?;
    session.ensure_is(&question.data.author_id)?;

    let updated = store
        .set_best_answer(&solve.question_id, &solve.answer_id)
        .await?;

    let answer = store.get_answer(&solve.answer_id).await?;
    let reputation = store.adjust_reputation(&answer.data.author_id, 1).await?;
    event!(
        Level::INFO,
        question = %solve.question_id,
        answer = %solve.answer_id,
        author = %answer.data.author_id,
        reputation,
        "answer marked as best"
    );
    Ok(updated)
}

#[instrument(skip(store))]
pub async fn solve_answer(
    session: Session,
    store: Store,
    solve: Solve,
) -> Result<impl Reply, Rejection> {
    match mark_solved(&store, &session, &solve).await {
        Ok(question) => Ok(warp::reply::with_status(
            warp::reply::json(&question),
            StatusCode::OK,
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
