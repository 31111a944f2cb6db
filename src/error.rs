use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot reach {service}: {source}")]
    UpstreamUnavailable {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} rejected the request ({code}): {message}")]
    UpstreamRejected {
        service: &'static str,
        code: i64,
        message: String,
    },

    #[error("room {0} is not monitored")]
    RecordNotFound(String),

    #[error("missing required parameter: {0}")]
    InvalidRequest(&'static str),

    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::RecordNotFound(_) => StatusCode::NOT_FOUND,
            Error::UpstreamRejected { .. } => StatusCode::BAD_REQUEST,
            Error::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        log::error!("request failed: {}", self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
