//! Cross-cutting HTTP concerns: correlation ids, CORS, security headers,
//! and cache-busting. Applied to every response through Rocket fairings.

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::request::Request;
use rocket::{Data, Response};
use uuid::Uuid;

use crate::server::ServerState;

/// Per-request correlation id, echoed as `X-Request-Id` and attached to
/// WARN/ERROR logs for support.
pub struct RequestId(pub String);

impl RequestId {
    pub fn unknown() -> Self {
        RequestId("unknown".to_string())
    }
}

pub struct RequestIdFairing;

#[rocket::async_trait]
impl Fairing for RequestIdFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request correlation id",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        req.local_cache(|| RequestId(Uuid::new_v4().to_string()));
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = req.local_cache(RequestId::unknown);
        res.set_header(Header::new("X-Request-Id", id.0.clone()));
    }
}

/// Sets `Access-Control-Allow-Origin` on every response: `*` without an
/// allow-list, or an echo of the request origin when it is allow-listed.
/// The preflight verbs/headers ride along on OPTIONS responses; the 204
/// itself comes from the catch-all preflight route.
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let allow_origin = match req.rocket().state::<ServerState>() {
            Some(state) if state.config.allowed_origins.is_some() => {
                res.set_header(Header::new("Vary", "Origin"));
                match req.headers().get_one("Origin") {
                    Some(origin) if state.config.origin_allowed(origin) => {
                        Some(origin.to_string())
                    }
                    _ => None,
                }
            }
            _ => Some("*".to_string()),
        };

        if let Some(origin) = allow_origin {
            res.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        if req.method() == rocket::http::Method::Options {
            res.set_header(Header::new(
                "Access-Control-Allow-Methods",
                "GET, POST, DELETE, OPTIONS",
            ));
            res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type"));
            res.set_header(Header::new("Access-Control-Max-Age", "86400"));
        }
    }
}

/// Security headers on every response, plus cache-control: admin reads
/// have shown user-visible staleness behind CDNs, so those force the full
/// no-store triplet; everything else defaults to `no-store`.
pub struct SecurityHeaders;

const STATIC_HEADERS: [(&str, &str); 8] = [
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("X-XSS-Protection", "1; mode=block"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
    ("Content-Security-Policy", "default-src 'self'"),
    (
        "Permissions-Policy",
        "geolocation=(), microphone=(), camera=(), payment=()",
    ),
    ("Cross-Origin-Opener-Policy", "same-origin"),
    ("Cross-Origin-Resource-Policy", "same-origin"),
];

#[rocket::async_trait]
impl Fairing for SecurityHeaders {
    fn info(&self) -> Info {
        Info {
            name: "Security and cache headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        for (name, value) in STATIC_HEADERS {
            res.set_header(Header::new(name, value));
        }

        if req.rocket().config().tls_enabled() {
            res.set_header(Header::new(
                "Strict-Transport-Security",
                "max-age=31536000; includeSubDomains",
            ));
        }

        if req.uri().path().starts_with("/api/admin") {
            res.set_header(Header::new(
                "Cache-Control",
                "no-store, no-cache, must-revalidate",
            ));
            res.set_header(Header::new("Pragma", "no-cache"));
            res.set_header(Header::new("Expires", "0"));
        } else {
            res.set_header(Header::new("Cache-Control", "no-store"));
        }
    }
}
