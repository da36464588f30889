use std::collections::HashMap;

use handle_errors::Error;
use tracing::{event, instrument, Level};
use warp::{http::StatusCode, Rejection, Reply};

use crate::routes::authentication::Session;
use crate::store::Store;
use crate::types::{
    pagination::{extract_pagination, Pagination},
    document::Document,
    question::{AnswerDetails, NewQuestion, Question, QuestionDetails, QuestionId, QuestionUpdate},
    target::Target,
};

#[instrument(skip(store))]
pub async fn get_questions(
    params: HashMap<String, String>,
    store: Store,
) -> Result<impl Reply, Rejection> {
    event!(Level::INFO, "querying questions");
    let mut params = params;
    let tag = params.remove("tag");
    let mut pagination = Pagination::default();

    if !params.is_empty() {
        event!(Level::INFO, pagination = true);
        pagination = extract_pagination(&params).map_err(warp::reject::custom)?;
    }

    match store.list_questions(pagination, tag.as_deref()).await {
        Ok(questions) => Ok(warp::reply::json(&questions)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

#[instrument(skip(store))]
pub async fn add_question(
    session: Session,
    store: Store,
    new_question: NewQuestion,
) -> Result<impl Reply, Rejection> {
    session
        .ensure_is(&new_question.author_id)
        .map_err(warp::reject::custom)?;
    if let Some(attachment_id) = &new_question.attachment_id {
        store
            .get_attachment(attachment_id)
            .await
            .map_err(warp::reject::custom)?;
    }

    match store.add_question(Question::from(new_question)).await {
        Ok(question) => Ok(warp::reply::with_status(
            warp::reply::json(&question),
            StatusCode::CREATED,
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// Applies an author's edit. A new attachment has to be uploaded already;
/// the one it replaces is removed from the bucket afterwards.
pub async fn edit_question(
    store: &Store,
    session: &Session,
    id: &QuestionId,
    update: QuestionUpdate,
) -> Result<Document<Question>, Error> {
    let question = store.get_question(id).await?;
    session.ensure_is(&question.data.author_id)?;

    let replaced = match (&update.attachment_id, &question.data.attachment_id) {
        (Some(new), old) if old.as_ref() != Some(new) => {
            store.get_attachment(new).await?;
            old.clone()
        }
        _ => None,
    };

    let updated = store.update_question(id, &update.normalized()).await?;

    if let Some(old) = replaced {
        match store.delete_attachment(&old).await {
            Ok(()) => event!(Level::INFO, question = %id, attachment = %old, "attachment replaced"),
            Err(e) => event!(Level::WARN, question = %id, attachment = %old, "old attachment kept: {}", e),
        }
    }
    Ok(updated)
}

#[instrument(skip(store))]
pub async fn update_question(
    id: String,
    session: Session,
    store: Store,
    update: QuestionUpdate,
) -> Result<impl Reply, Rejection> {
    match edit_question(&store, &session, &QuestionId(id), update).await {
        Ok(question) => Ok(warp::reply::json(&question)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// Question with its score, comments and scored answers.
pub async fn question_details(store: &Store, id: &QuestionId) -> Result<QuestionDetails, Error> {
    let question = store.get_question(id).await?;
    let target = Target::question(question.id.clone());
    let (vote_result, comments, answers) = tokio::try_join!(
        store.score(&target),
        store.comments_for(&target),
        store.answers_for(id),
    )?;

    let mut details = Vec::with_capacity(answers.documents.len());
    for answer in answers.documents {
        let target = Target::answer(answer.id.clone());
        let (vote_result, comments) =
            tokio::try_join!(store.score(&target), store.comments_for(&target))?;
        let is_best = question
            .data
            .best_answer_id
            .as_ref()
            .is_some_and(|best| best.0 == answer.id);
        details.push(AnswerDetails {
            answer,
            vote_result,
            is_best,
            comments: comments.documents,
        });
    }

    Ok(QuestionDetails {
        solved: question.data.best_answer_id.is_some(),
        question,
        vote_result,
        comments: comments.documents,
        answers: details,
    })
}

#[instrument(skip(store))]
pub async fn get_question(id: String, store: Store) -> Result<impl Reply, Rejection> {
    match question_details(&store, &QuestionId(id)).await {
        Ok(details) => Ok(warp::reply::json(&details)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

#[cfg(test)]
mod question_tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use crate::types::{
        answer::{Answer, AnswerId},
        user::UserId,
    };
    use std::sync::Arc;

    fn session(id: &str) -> Session {
        Session {
            user_id: UserId(id.to_string()),
            name: id.to_string(),
        }
    }

    async fn store() -> Store {
        let backend = Arc::new(MemoryBackend::default());
        crate::schema::bootstrap(&*backend).await.unwrap();
        Store::new(backend)
    }

    async fn ask(store: &Store, attachment_id: Option<String>) -> QuestionId {
        let question = store
            .add_question(Question {
                title: "Pinning futures".to_string(),
                content: "...".to_string(),
                author_id: UserId("asker".to_string()),
                tags: vec!["async".to_string()],
                attachment_id,
                best_answer_id: None,
            })
            .await
            .unwrap();
        QuestionId(question.id)
    }

    fn update(attachment_id: Option<String>) -> QuestionUpdate {
        QuestionUpdate {
            title: "Pinning futures, again".to_string(),
            content: "Edited.".to_string(),
            tags: vec!["async".to_string(), "pin".to_string(), "pin".to_string()],
            attachment_id,
        }
    }

    #[tokio::test]
    async fn author_edit_replaces_attachment() {
        let store = store().await;
        let old = store.add_attachment("before.png", vec![1]).await.unwrap();
        let new = store.add_attachment("after.webp", vec![2]).await.unwrap();
        let id = ask(&store, Some(old.id.clone())).await;

        let edited = edit_question(&store, &session("asker"), &id, update(Some(new.id.clone())))
            .await
            .unwrap();
        assert_eq!(edited.data.title, "Pinning futures, again");
        assert_eq!(edited.data.tags, vec!["async", "pin"]);
        assert_eq!(edited.data.attachment_id, Some(new.id.clone()));
        assert!(store.get_attachment(&old.id).await.unwrap_err().is_not_found());
        assert!(store.get_attachment(&new.id).await.is_ok());
    }

    #[tokio::test]
    async fn edit_without_attachment_keeps_current_one() {
        let store = store().await;
        let file = store.add_attachment("keep.gif", vec![1]).await.unwrap();
        let id = ask(&store, Some(file.id.clone())).await;

        let edited = edit_question(&store, &session("asker"), &id, update(None))
            .await
            .unwrap();
        assert_eq!(edited.data.attachment_id, Some(file.id.clone()));
        assert!(store.get_attachment(&file.id).await.is_ok());
    }

    #[tokio::test]
    async fn only_the_author_edits() {
        let store = store().await;
        let id = ask(&store, None).await;
        let err = edit_question(&store, &session("someone"), &id, update(None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden));
        assert_eq!(store.get_question(&id).await.unwrap().data.title, "Pinning futures");
    }

    #[tokio::test]
    async fn unknown_attachment_is_rejected_before_writing() {
        let store = store().await;
        let id = ask(&store, None).await;
        let err = edit_question(
            &store,
            &session("asker"),
            &id,
            update(Some("missing".to_string())),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.get_question(&id).await.unwrap().data.attachment_id, None);
    }

    #[tokio::test]
    async fn details_include_every_answer() {
        let store = store().await;
        let id = ask(&store, None).await;
        let mut first = None;
        for i in 0..30 {
            let answer = store
                .add_answer(Answer {
                    content: format!("take {}", i),
                    question_id: id.clone(),
                    author_id: UserId("author".to_string()),
                })
                .await
                .unwrap();
            first.get_or_insert(answer.id);
        }
        let best = AnswerId(first.unwrap());
        store.set_best_answer(&id, &best).await.unwrap();

        let details = question_details(&store, &id).await.unwrap();
        assert_eq!(details.answers.len(), 30);
        assert!(details
            .answers
            .iter()
            .any(|a| a.is_best && a.answer.id == best.0));
    }
}
