use tracing::instrument;
use warp::{Rejection, Reply};

use crate::store::Store;
use crate::types::user::{Profile, UserId};

#[instrument(skip(store))]
pub async fn get_user(id: String, store: Store) -> Result<impl Reply, Rejection> {
    match store.get_user(&UserId(id)).await {
        Ok(account) => Ok(warp::reply::json(&Profile::from(account))),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
