//! Error types and their HTTP response mapping.
//!
//! `ApiError` is the only error type handlers return; its `Responder` impl
//! turns each kind into the documented status code and machine-readable
//! JSON body. Storage details are logged server-side and never leak into
//! response bodies.

use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::rate_limit::Decision;
use crate::server::fairings::RequestId;

/// Startup configuration failure. Always fatal: the process exits non-zero.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("environment variable {0} has invalid value: {1}")]
    InvalidEnvVar(String, String),
}

/// Document-store failure.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(#[from] mobc::Error<rusqlite::Error>),

    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    /// A unique index rejected the insert. Handlers translate this into
    /// the endpoint's 409 conflict.
    #[error("duplicate record")]
    Duplicate,

    #[error("document serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &err {
            if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                return StoreError::Duplicate;
            }
        }
        StoreError::Sqlite(err)
    }
}

/// Handler-level error with a fixed HTTP mapping.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 400 with the offending field names.
    #[error("validation failed: {0:?}")]
    Validation(Vec<String>),

    /// 400 with a machine code and human message (admin-delete misuse,
    /// malformed JSON, oversize payloads re-coded by catchers).
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },

    /// 409; carries the existing record id where safe to disclose.
    #[error("conflict: {code}")]
    Conflict {
        code: &'static str,
        id_field: &'static str,
        existing_id: Option<String>,
    },

    /// 429 with retry hints from the limiter decision.
    #[error("rate limited")]
    RateLimited(Decision),

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    /// 503 with `Retry-After: 5`; the store exceeded the handler deadline.
    #[error("upstream timeout")]
    UpstreamTimeout,

    /// 500 `{error:"internal"}`; details were already logged.
    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn validation(fields: Vec<String>) -> Self {
        ApiError::Validation(fields)
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code,
            message: message.into(),
        }
    }

    fn status(&self) -> Status {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest { .. } => Status::BadRequest,
            ApiError::Conflict { .. } => Status::Conflict,
            ApiError::RateLimited(_) => Status::TooManyRequests,
            ApiError::NotFound => Status::NotFound,
            ApiError::MethodNotAllowed => Status::MethodNotAllowed,
            ApiError::UpstreamTimeout => Status::ServiceUnavailable,
            ApiError::Internal => Status::InternalServerError,
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::Validation(fields) => json!({
                "error": "validation_failed",
                "message": "one or more fields failed validation",
                "fields": fields,
            }),
            ApiError::BadRequest { code, message } => json!({
                "error": code,
                "message": message,
            }),
            ApiError::Conflict {
                code,
                id_field,
                existing_id,
            } => {
                let mut body = json!({ "error": code });
                if let Some(id) = existing_id {
                    body[*id_field] = json!(id);
                }
                body
            }
            ApiError::RateLimited(decision) => json!({
                "error": "rate_limited",
                "message": "too many requests, slow down",
                "retry_after": decision.retry_after_secs,
            }),
            ApiError::NotFound => json!({ "error": "not_found" }),
            ApiError::MethodNotAllowed => json!({ "error": "method_not_allowed" }),
            ApiError::UpstreamTimeout => json!({ "error": "upstream_timeout" }),
            ApiError::Internal => json!({ "error": "internal" }),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => ApiError::Conflict {
                code: "conflict",
                id_field: "id",
                existing_id: None,
            },
            other => {
                error!("storage failure: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let request_id = req.local_cache(RequestId::unknown);
        match &self {
            ApiError::Internal => {
                error!(correlation_id = %request_id.0, "request failed with internal error");
            }
            ApiError::UpstreamTimeout => {
                warn!(correlation_id = %request_id.0, "store call exceeded handler deadline");
            }
            _ => {}
        }

        let status = self.status();
        let retry_after = match &self {
            ApiError::RateLimited(decision) => Some(decision.retry_after_secs),
            ApiError::UpstreamTimeout => Some(5),
            _ => None,
        };

        let mut response = (status, Json(self.body())).respond_to(req)?;
        if let Some(seconds) = retry_after {
            response.set_raw_header("Retry-After", seconds.to_string());
        }
        Ok(response)
    }
}
