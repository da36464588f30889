use reqwest::Error as ReqwestError;
use serde_json::json;
use tracing::{event, instrument, Level};
use warp::{
    filters::{body::BodyDeserializeError, cors::CorsForbidden},
    http::StatusCode,
    reject::Reject,
    Rejection, Reply,
};

#[instrument]
pub async fn return_error(r: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(crate::Error::ClientError(e)) = r.find() {
        event!(Level::ERROR, "{}", e);
        let status = StatusCode::from_u16(e.status).unwrap_or(StatusCode::BAD_REQUEST);
        Ok(error_reply(e.message.clone(), status))
    } else if let Some(crate::Error::ServerError(e)) = r.find() {
        event!(Level::ERROR, "{}", e);
        Ok(error_reply(
            e.message.clone(),
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    } else if let Some(crate::Error::ExternalAPIError(e)) = r.find() {
        event!(Level::ERROR, "{}", e);
        Ok(error_reply(
            "Internal Server Error".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    } else if let Some(crate::Error::InvalidDocument(e)) = r.find() {
        event!(Level::ERROR, "{}", e);
        Ok(error_reply(
            "Internal Server Error".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    } else if let Some(crate::Error::Unauthenticated) = r.find() {
        event!(Level::WARN, "request without a valid session");
        Ok(error_reply(
            crate::Error::Unauthenticated.to_string(),
            StatusCode::UNAUTHORIZED,
        ))
    } else if let Some(crate::Error::Forbidden) = r.find() {
        event!(Level::WARN, "caller not allowed to act on resource");
        Ok(error_reply(
            crate::Error::Forbidden.to_string(),
            StatusCode::FORBIDDEN,
        ))
    } else if let Some(error @ crate::Error::ConfigError(_)) = r.find() {
        event!(Level::ERROR, "{}", error);
        Ok(error_reply(
            error.to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    } else if let Some(error) = r.find::<CorsForbidden>() {
        Ok(error_reply(error.to_string(), StatusCode::FORBIDDEN))
    } else if let Some(error) = r.find::<BodyDeserializeError>() {
        Ok(error_reply(
            error.to_string(),
            StatusCode::UNPROCESSABLE_ENTITY,
        ))
    } else if let Some(error) = r.find::<Error>() {
        Ok(error_reply(error.to_string(), StatusCode::BAD_REQUEST))
    } else {
        Ok(error_reply(
            "Route not found".to_string(),
            StatusCode::NOT_FOUND,
        ))
    }
}

fn error_reply(message: String, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
}

#[derive(Debug)]
pub enum Error {
    ParseError(std::num::ParseIntError),
    MissingParameters,
    ConfigError(String),
    ExternalAPIError(ReqwestError),
    ClientError(APILayerError),
    ServerError(APILayerError),
    InvalidDocument(serde_json::Error),
    Unauthenticated,
    Forbidden,
}

/// Non-2xx answer from the backend platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct APILayerError {
    pub status: u16,
    pub message: String,
}

impl APILayerError {
    pub fn not_found(message: impl Into<String>) -> Self {
        APILayerError {
            status: 404,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        APILayerError {
            status: 409,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for APILayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Status: {}, Message: {}", self.status, self.message)
    }
}

impl Error {
    /// Sorts a platform failure into client or server error by status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let err = APILayerError {
            status,
            message: message.into(),
        };
        if status >= 500 {
            Error::ServerError(err)
        } else {
            Error::ClientError(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ClientError(e) if e.status == 404)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::ParseError(err) => {
                write!(f, "Cannot parse parameter: {}", err)
            }
            Error::MissingParameters => write!(f, "Missing parameter"),
            Error::ConfigError(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::ExternalAPIError(err) => {
                write!(f, "Cannot execute: {}", err)
            }
            Error::ClientError(err) => {
                write!(f, "External Client error: {}", err)
            }
            Error::ServerError(err) => {
                write!(f, "External Server error: {}", err)
            }
            Error::InvalidDocument(err) => {
                write!(f, "Cannot decode document: {}", err)
            }
            Error::Unauthenticated => write!(f, "No valid session"),
            Error::Forbidden => write!(f, "Not allowed"),
        }
    }
}

impl std::error::Error for Error {}

impl Reject for Error {}
impl Reject for APILayerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_picks_client_or_server_variant() {
        assert!(matches!(
            Error::from_status(404, "missing"),
            Error::ClientError(APILayerError { status: 404, .. })
        ));
        assert!(matches!(
            Error::from_status(503, "down"),
            Error::ServerError(APILayerError { status: 503, .. })
        ));
        assert!(Error::from_status(404, "missing").is_not_found());
        assert!(!Error::from_status(409, "exists").is_not_found());
    }

    #[tokio::test]
    async fn rejection_carries_upstream_status() {
        let rejection = warp::reject::custom(Error::from_status(404, "Document not found"));
        let reply = return_error(rejection).await.unwrap().into_response();
        assert_eq!(reply.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn forbidden_maps_to_403() {
        let reply = return_error(warp::reject::custom(Error::Forbidden))
            .await
            .unwrap()
            .into_response();
        assert_eq!(reply.status(), StatusCode::FORBIDDEN);
    }
}
