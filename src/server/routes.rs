//! Service routes that are not lead endpoints: liveness, the API index,
//! CORS preflight, and explicit 405 fallbacks for known paths hit with
//! the wrong method.

use rocket::serde::json::Json;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::store::now_utc_string;

pub const SERVICE_NAME: &str = "lead-intake-api";

pub mod health {
    use super::*;
    use rocket::get;

    /// Intentionally cheap: no store probe, just process liveness.
    #[get("/health")]
    pub async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": now_utc_string(),
        }))
    }

    #[get("/")]
    pub async fn index() -> Json<Value> {
        Json(json!({
            "name": "Lead Intake API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Lead capture and admin aggregation for the marketing site",
            "endpoints": {
                "health": "/api/health",
                "newsletter": "/api/newsletter",
                "contact": "/api/contact",
                "ai_assessment": "/api/ai-assessment",
                "roi_calculator": "/api/roi-calculator",
                "consultation": "/api/consultation",
                "admin": "/api/admin",
                "admin_delete": "/api/admin-delete"
            }
        }))
    }
}

pub mod preflight {
    use rocket::http::Status;
    use rocket::options;
    use std::path::PathBuf;

    /// CORS preflight for any path. The CORS fairing adds the
    /// allow-methods/headers on the way out.
    #[options("/<_path..>")]
    pub async fn preflight(_path: PathBuf) -> Status {
        Status::NoContent
    }
}

/// Known paths answered with 405 for any verb they do not serve. Rocket
/// would otherwise fall through to the 404 catcher.
pub mod method_fallbacks {
    use super::*;
    use rocket::http::Method;
    use rocket::route::{Handler, Outcome, Route};
    use rocket::{Data, Request};

    #[derive(Clone)]
    struct Fallback;

    #[rocket::async_trait]
    impl Handler for Fallback {
        async fn handle<'r>(&self, req: &'r Request<'_>, _data: Data<'r>) -> Outcome<'r> {
            Outcome::from(req, ApiError::MethodNotAllowed)
        }
    }

    const VERBS: [Method; 5] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
    ];

    /// Each known path and the verbs its real routes serve.
    const KNOWN_PATHS: [(&str, &[Method]); 9] = [
        ("/", &[Method::Get]),
        ("/health", &[Method::Get]),
        ("/newsletter", &[Method::Post]),
        ("/contact", &[Method::Post]),
        ("/ai-assessment", &[Method::Post]),
        ("/roi-calculator", &[Method::Post]),
        ("/consultation", &[Method::Post]),
        ("/admin", &[Method::Get]),
        ("/admin-delete", &[Method::Delete]),
    ];

    /// Low-rank 405 routes for every unserved verb on a known path.
    pub fn routes() -> Vec<Route> {
        let mut table = Vec::new();
        for (path, served) in KNOWN_PATHS {
            for verb in VERBS {
                if !served.contains(&verb) {
                    table.push(Route::ranked(9, verb, path, Fallback));
                }
            }
        }
        table
    }
}

/// Catchers for errors raised outside handler bodies. Parse failures are
/// re-coded to the documented 400 bodies.
pub mod catchers {
    use super::*;
    use crate::rate_limit;
    use rocket::catch;
    use rocket::request::Request;

    #[catch(400)]
    pub fn bad_request() -> ApiError {
        ApiError::bad_request("invalid_json", "request body could not be read")
    }

    #[catch(404)]
    pub fn not_found() -> ApiError {
        ApiError::NotFound
    }

    #[catch(405)]
    pub fn method_not_allowed() -> ApiError {
        ApiError::MethodNotAllowed
    }

    #[catch(413)]
    pub fn payload_too_large() -> ApiError {
        ApiError::bad_request("payload_too_large", "request body exceeds 256 KiB")
    }

    #[catch(422)]
    pub fn unprocessable() -> ApiError {
        ApiError::bad_request(
            "invalid_json",
            "request body is not valid JSON for this endpoint",
        )
    }

    #[catch(429)]
    pub fn rate_limited(req: &Request<'_>) -> ApiError {
        let decision =
            rate_limit::cached_decision(req).unwrap_or_else(rate_limit::Decision::denied_unknown);
        ApiError::RateLimited(decision)
    }

    #[catch(500)]
    pub fn internal() -> ApiError {
        ApiError::Internal
    }

    #[catch(503)]
    pub fn unavailable() -> ApiError {
        ApiError::UpstreamTimeout
    }
}
