#![warn(clippy::all)]
pub use handle_errors;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::{oneshot, oneshot::Sender};
use tracing_subscriber::fmt::format::FmtSpan;
use warp::{http::Method, Filter, Reply};

pub mod config;
pub mod routes;
pub mod schema;
pub mod store;
pub mod types;

use config::BackendKind;
use routes::answer::{add_answer, delete_answer, solve_answer};
use routes::attachment::{add_attachment, MAX_ATTACHMENT_BYTES};
use routes::authentication::{get_session, session};
use routes::comment::{add_comment, delete_comment};
use routes::question::{add_question, get_question, get_questions, update_question};
use routes::user::get_user;
use routes::vote::vote;
use store::{appwrite::AppwriteBackend, memory::MemoryBackend, Backend, Store};

pub struct OneshotHandler {
    pub sender: Sender<i32>,
}

pub async fn build_routes(store: Store) -> impl Filter<Extract = impl Reply> + Clone {
    let store_filter = {
        let store = store.clone();
        warp::any().map(move || store.clone())
    };
    let session_filter = session(store);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(&[Method::PUT, Method::DELETE, Method::GET, Method::POST]);

    let get_questions = warp::get()
        .and(warp::path("api"))
        .and(warp::path("questions"))
        .and(warp::path::end())
        .and(warp::query())
        .and(store_filter.clone())
        .and_then(get_questions)
        .with(warp::trace(|info| {
            tracing::info_span!(
                "get_questions_request",
                method = %info.method(),
                path = %info.path(),
                id = %uuid::Uuid::new_v4(),
            )
        }));

    let get_question = warp::get()
        .and(warp::path("api"))
        .and(warp::path("questions"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(store_filter.clone())
        .and_then(get_question);

    let add_question = warp::post()
        .and(warp::path("api"))
        .and(warp::path("question"))
        .and(warp::path::end())
        .and(session_filter.clone())
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(add_question);

    let update_question = warp::put()
        .and(warp::path("api"))
        .and(warp::path("questions"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(session_filter.clone())
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(update_question);

    let add_attachment = warp::post()
        .and(warp::path("api"))
        .and(warp::path("attachments"))
        .and(warp::path::end())
        .and(warp::query())
        .and(session_filter.clone())
        .and(store_filter.clone())
        .and(warp::body::content_length_limit(MAX_ATTACHMENT_BYTES))
        .and(warp::body::bytes())
        .and_then(add_attachment);

    let solve_answer = warp::post()
        .and(warp::path("api"))
        .and(warp::path("answer"))
        .and(warp::path("solve"))
        .and(warp::path::end())
        .and(session_filter.clone())
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(solve_answer);

    let add_answer = warp::post()
        .and(warp::path("api"))
        .and(warp::path("answer"))
        .and(warp::path::end())
        .and(session_filter.clone())
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(add_answer);

    let delete_answer = warp::delete()
        .and(warp::path("api"))
        .and(warp::path("answer"))
        .and(warp::path::end())
        .and(session_filter.clone())
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(delete_answer);

    let add_comment = warp::post()
        .and(warp::path("api"))
        .and(warp::path("comment"))
        .and(warp::path::end())
        .and(session_filter.clone())
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(add_comment);

    let delete_comment = warp::delete()
        .and(warp::path("api"))
        .and(warp::path("comment"))
        .and(warp::path::end())
        .and(session_filter.clone())
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(delete_comment);

    let vote = warp::post()
        .and(warp::path("api"))
        .and(warp::path("vote"))
        .and(warp::path::end())
        .and(session_filter.clone())
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(vote)
        .with(warp::trace(|info| {
            tracing::info_span!(
                "vote_request",
                method = %info.method(),
                path = %info.path(),
                id = %uuid::Uuid::new_v4(),
            )
        }));

    let get_user = warp::get()
        .and(warp::path("api"))
        .and(warp::path("users"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(store_filter.clone())
        .and_then(get_user);

    let get_session = warp::get()
        .and(warp::path("api"))
        .and(warp::path("session"))
        .and(warp::path::end())
        .and(session_filter)
        .and(store_filter)
        .and_then(get_session);

    get_questions
        .or(get_question)
        .or(add_question)
        .or(update_question)
        .or(add_attachment)
        .or(solve_answer)
        .or(add_answer)
        .or(delete_answer)
        .or(add_comment)
        .or(delete_comment)
        .or(vote)
        .or(get_user)
        .or(get_session)
        .with(cors)
        .with(warp::trace::request())
        .recover(handle_errors::return_error)
}

fn init_tracing(log_level: &str) {
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        format!(
            "handle_errors={},stackflow={},warp={}",
            log_level, log_level, log_level
        )
    });

    tracing_subscriber::fmt()
        // Use the filter we built above to determine which traces to record.
        .with_env_filter(log_filter)
        // Record an event when each span closes.
        // This can be used to time our
        // routes' durations!
        .with_span_events(FmtSpan::CLOSE)
        .init();
}

/// Memory mode gets one user so the write endpoints can be tried out.
async fn seeded_memory_backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::default());
    backend.add_user("demo", "Demo User").await;
    backend.add_session("demo", "demo").await;
    tracing::info!("memory backend: use `Authorization: Bearer demo` to act as user `demo`");
    backend
}

pub async fn setup_store(config: &config::Config) -> Result<Store, handle_errors::Error> {
    init_tracing(&config.log_level);

    let backend: Arc<dyn Backend> = match config.backend {
        BackendKind::Appwrite => {
            let api_key = config.appwrite_api_key.as_deref().ok_or_else(|| {
                handle_errors::Error::ConfigError("APPWRITE_API_KEY not set".to_string())
            })?;
            Arc::new(AppwriteBackend::new(
                &config.appwrite_endpoint,
                &config.appwrite_project_id,
                api_key,
                &config.database_id,
            )?)
        }
        BackendKind::Memory => seeded_memory_backend().await,
    };

    // Startup continues without a complete schema; requests then surface the
    // platform's own errors.
    if let Err(e) = schema::bootstrap(&*backend).await {
        tracing::error!("schema bootstrap failed: {}", e);
    }

    Ok(Store::new(backend))
}

pub async fn run(config: config::Config, store: Store) {
    let routes = build_routes(store).await;
    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;
}

pub async fn oneshot(store: Store, socket: SocketAddr) -> OneshotHandler {
    let routes = build_routes(store).await;
    let (tx, rx) = oneshot::channel::<i32>();

    let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(socket, async {
        rx.await.ok();
    });

    tokio::task::spawn(server);

    OneshotHandler { sender: tx }
}

#[cfg(test)]
mod routes_tests {
    use super::*;
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    async fn store() -> Store {
        let backend = Arc::new(MemoryBackend::default());
        schema::bootstrap(&*backend).await.unwrap();
        for (id, jwt) in [("asker", "jwt-asker"), ("author", "jwt-author"), ("voter", "jwt-voter")] {
            backend.add_user(id, id).await;
            backend.add_session(jwt, id).await;
        }
        Store::new(backend)
    }

    async fn post<F>(routes: &F, path: &str, jwt: Option<&str>, body: Value) -> (StatusCode, Value)
    where
        F: Filter + 'static,
        F::Extract: Reply + Send,
    {
        send(routes, "POST", path, jwt, body).await
    }

    async fn send<F>(
        routes: &F,
        method: &str,
        path: &str,
        jwt: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value)
    where
        F: Filter + 'static,
        F::Extract: Reply + Send,
    {
        let mut request = warp::test::request().method(method).path(path).json(&body);
        if let Some(jwt) = jwt {
            request = request.header("authorization", format!("Bearer {}", jwt));
        }
        let res = request.reply(routes).await;
        let body = serde_json::from_slice(res.body()).unwrap_or(Value::Null);
        (res.status(), body)
    }

    async fn get<F>(routes: &F, path: &str) -> (StatusCode, Value)
    where
        F: Filter + 'static,
        F::Extract: Reply + Send,
    {
        let res = warp::test::request().method("GET").path(path).reply(routes).await;
        let body = serde_json::from_slice(res.body()).unwrap_or(Value::Null);
        (res.status(), body)
    }

    async fn question_with_answer<F>(routes: &F) -> (String, String)
    where
        F: Filter + 'static,
        F::Extract: Reply + Send,
    {
        let (status, question) = post(
            routes,
            "/api/question",
            Some("jwt-asker"),
            json!({
                "title": "How do I share state between warp handlers?",
                "content": "...",
                "authorId": "asker",
                "tags": ["rust", "warp"],
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let question_id = question["$id"].as_str().unwrap().to_string();

        let (status, answer) = post(
            routes,
            "/api/answer",
            Some("jwt-author"),
            json!({ "questionId": question_id, "answer": "Clone an Arc.", "authorId": "author" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (question_id, answer["$id"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn vote_returns_score_and_document() {
        let routes = build_routes(store().await).await;
        let (_, answer_id) = question_with_answer(&routes).await;
        let ballot = |status: &str| {
            json!({
                "votedById": "voter",
                "voteStatus": status,
                "type": "answer",
                "typeId": answer_id,
            })
        };

        let (status, body) = post(&routes, "/api/vote", Some("jwt-voter"), ballot("upvoted")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["voteResult"], 1);
        assert_eq!(body["data"]["document"]["voteStatus"], "upvoted");

        let (_, body) = post(&routes, "/api/vote", Some("jwt-voter"), ballot("upvoted")).await;
        assert_eq!(body["data"]["voteResult"], 0);
        assert_eq!(body["data"]["document"], Value::Null);

        let (_, body) = post(&routes, "/api/vote", Some("jwt-voter"), ballot("downvoted")).await;
        assert_eq!(body["data"]["voteResult"], -1);
    }

    #[tokio::test]
    async fn vote_requires_matching_session() {
        let routes = build_routes(store().await).await;
        let (_, answer_id) = question_with_answer(&routes).await;
        let ballot = json!({
            "votedById": "voter",
            "voteStatus": "upvoted",
            "type": "answer",
            "typeId": answer_id,
        });

        let (status, body) = post(&routes, "/api/vote", None, ballot.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = post(&routes, "/api/vote", Some("jwt-author"), ballot).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn solve_returns_question_and_bumps_reputation() {
        let routes = build_routes(store().await).await;
        let (question_id, answer_id) = question_with_answer(&routes).await;

        let (status, body) = post(
            &routes,
            "/api/answer/solve",
            Some("jwt-asker"),
            json!({ "questionId": question_id, "answerId": answer_id }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bestAnswerId"], answer_id.as_str());

        let (_, profile) = get(&routes, "/api/users/author").await;
        assert_eq!(profile["reputation"], 1);
    }

    #[tokio::test]
    async fn solve_unknown_question_forwards_upstream_status() {
        let routes = build_routes(store().await).await;
        let (status, body) = post(
            &routes,
            "/api/answer/solve",
            Some("jwt-asker"),
            json!({ "questionId": "nope", "answerId": "nope" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("could not be found"));
    }

    #[tokio::test]
    async fn answers_are_deleted_by_their_author_only() {
        let routes = build_routes(store().await).await;
        let (_, answer_id) = question_with_answer(&routes).await;
        let body = json!({ "answerId": answer_id });

        let (status, _) = send(&routes, "DELETE", "/api/answer", Some("jwt-voter"), body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, deleted) = send(&routes, "DELETE", "/api/answer", Some("jwt-author"), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["data"]["$id"], answer_id.as_str());
    }

    #[tokio::test]
    async fn comments_attach_to_answers_and_show_in_details() {
        let routes = build_routes(store().await).await;
        let (question_id, answer_id) = question_with_answer(&routes).await;

        let (status, comment) = post(
            &routes,
            "/api/comment",
            Some("jwt-voter"),
            json!({
                "content": "Or use a OnceCell.",
                "type": "answer",
                "typeId": answer_id,
                "authorId": "voter",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, details) = get(&routes, &format!("/api/questions/{}", question_id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(details["solved"], false);
        assert_eq!(details["answers"][0]["comments"][0]["content"], "Or use a OnceCell.");

        let (status, _) = send(
            &routes,
            "DELETE",
            "/api/comment",
            Some("jwt-voter"),
            json!({ "commentId": comment["$id"] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, details) = get(&routes, &format!("/api/questions/{}", question_id)).await;
        assert_eq!(details["answers"][0]["comments"], json!([]));
    }

    #[tokio::test]
    async fn comment_on_missing_parent_is_rejected() {
        let routes = build_routes(store().await).await;
        let (status, _) = post(
            &routes,
            "/api/comment",
            Some("jwt-voter"),
            json!({ "content": "?", "type": "question", "typeId": "nope", "authorId": "voter" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn question_listing_supports_pagination_and_tags() {
        let routes = build_routes(store().await).await;
        question_with_answer(&routes).await;

        let (status, list) = get(&routes, "/api/questions?tag=warp").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["total"], 1);

        let (_, list) = get(&routes, "/api/questions?tag=go").await;
        assert_eq!(list["total"], 0);

        let (status, _) = get(&routes, "/api/questions?limit=1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, list) = get(&routes, "/api/questions?limit=1&offset=0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["documents"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn session_endpoint_reports_profile() {
        let routes = build_routes(store().await).await;
        let res = warp::test::request()
            .method("GET")
            .path("/api/session")
            .header("authorization", "jwt-voter")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let profile: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(profile["$id"], "voter");
        assert_eq!(profile["reputation"], 0);
    }

    #[tokio::test]
    async fn author_edits_question_with_new_attachment() {
        let routes = build_routes(store().await).await;
        let (question_id, _) = question_with_answer(&routes).await;

        let upload = |name: &str| {
            warp::test::request()
                .method("POST")
                .path(&format!("/api/attachments?name={}", name))
                .header("authorization", "Bearer jwt-asker")
                .body("image-bytes")
        };
        let res = upload("screenshot.png").reply(&routes).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let file: Value = serde_json::from_slice(res.body()).unwrap();
        let file_id = file["$id"].as_str().unwrap().to_string();

        let res = upload("notes.txt").reply(&routes).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let edit = json!({
            "title": "How do I share state between warp filters?",
            "content": "Edited.",
            "tags": ["rust", "warp"],
            "attachmentId": file_id,
        });
        let path = format!("/api/questions/{}", question_id);

        let (status, _) = send(&routes, "PUT", &path, Some("jwt-author"), edit.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, question) = send(&routes, "PUT", &path, Some("jwt-asker"), edit).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(question["attachmentId"], file_id.as_str());
        assert_eq!(question["authorId"], "asker");

        let (_, details) = get(&routes, &path).await;
        assert_eq!(details["title"], "How do I share state between warp filters?");
    }

    #[tokio::test]
    async fn malformed_body_is_unprocessable() {
        let routes = build_routes(store().await).await;
        let (status, _) = post(
            &routes,
            "/api/vote",
            Some("jwt-voter"),
            json!({ "votedById": "voter", "voteStatus": "sideways", "type": "answer", "typeId": "a" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
