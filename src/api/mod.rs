//! One module per endpoint. Every handler follows the same shape: parse
//! the typed body, validate, compute any derived values, persist under
//! the store deadline, fire the notifier, return the JSON envelope.

use std::future::Future;
use std::time::Duration;

use crate::error::{ApiError, StoreError};

pub mod admin;
pub mod assessment;
pub mod consultation;
pub mod contact;
pub mod newsletter;
pub mod roi;

/// Hard per-handler deadline on store I/O.
pub const STORE_DEADLINE: Duration = Duration::from_secs(10);

/// Runs a store call under the handler deadline; an overrun becomes the
/// 503 `upstream_timeout` response.
pub(crate) async fn with_deadline<T, F>(fut: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(STORE_DEADLINE, fut).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(_) => Err(ApiError::UpstreamTimeout),
    }
}

/// Lowercased, trimmed email for storage and lookup.
pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
