use std::collections::HashMap;

use handle_errors::Error;
use tracing::{event, instrument, Level};
use warp::{http::StatusCode, hyper::body::Bytes, Rejection, Reply};

use crate::routes::authentication::Session;
use crate::store::Store;

/// Largest upload accepted by `POST /api/attachments`.
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Stores the raw request body under the `name` query parameter. The returned
/// `$id` goes into a question's `attachmentId`.
#[instrument(skip(store, body), fields(size = body.len()))]
pub async fn add_attachment(
    params: HashMap<String, String>,
    session: Session,
    store: Store,
    body: Bytes,
) -> Result<impl Reply, Rejection> {
    let name = params
        .get("name")
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| warp::reject::custom(Error::MissingParameters))?;

    match store.add_attachment(name, body.to_vec()).await {
        Ok(file) => {
            event!(Level::INFO, user = %session.user_id, id = %file.id, "attachment uploaded");
            Ok(warp::reply::with_status(
                warp::reply::json(&file),
                StatusCode::CREATED,
            ))
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}
