use handle_errors::{APILayerError, Error};
use tracing::{event, instrument, Level};
use warp::{Filter, Rejection};

use crate::store::Store;
use crate::types::user::{Account, Profile, UserId};

/// Who is making the request, resolved once per request and handed to
/// every handler that mutates data.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: UserId,
    pub name: String,
}

impl From<Account> for Session {
    fn from(account: Account) -> Self {
        Session {
            user_id: account.id,
            name: account.name,
        }
    }
}

impl Session {
    /// Rejects unless the session belongs to `owner`.
    pub fn ensure_is(&self, owner: &UserId) -> Result<(), Error> {
        if &self.user_id == owner {
            Ok(())
        } else {
            event!(
                Level::WARN,
                user = %self.user_id,
                owner = %owner,
                "acting on behalf of another user"
            );
            Err(Error::Forbidden)
        }
    }
}

fn bearer_token(header: &str) -> &str {
    header
        .strip_prefix("Bearer ")
        .unwrap_or(header)
        .trim()
}

pub async fn resolve_session(store: &Store, header: Option<String>) -> Result<Session, Error> {
    let header = header.ok_or(Error::Unauthenticated)?;
    let token = bearer_token(&header);
    if token.is_empty() {
        return Err(Error::Unauthenticated);
    }
    match store.account_from_jwt(token).await {
        Ok(account) => Ok(Session::from(account)),
        Err(Error::ClientError(APILayerError { status: 401, .. })) => Err(Error::Unauthenticated),
        Err(e) => Err(e),
    }
}

pub fn session(store: Store) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
    warp::header::optional::<String>("Authorization").and_then(move |header: Option<String>| {
        let store = store.clone();
        async move {
            resolve_session(&store, header)
                .await
                .map_err(warp::reject::custom)
        }
    })
}

#[instrument(skip(store))]
pub async fn get_session(session: Session, store: Store) -> Result<impl warp::Reply, Rejection> {
    match store.get_user(&session.user_id).await {
        Ok(account) => Ok(warp::reply::json(&Profile::from(account))),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
