//! Sliding-window rate limiting, keyed by client IP and endpoint class.
//!
//! Route handlers opt in through the request guards below; a denied guard
//! routes to the 429 catcher. The limiter decision is stashed in the
//! request's local cache so the header fairing can emit `X-RateLimit-*`
//! on every limited response.

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::Response;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::server::ServerState;

pub const WINDOW_SECS: u64 = 15 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    PublicWrite,
    AdminRead,
    AdminDelete,
}

impl EndpointClass {
    pub fn limit(&self) -> usize {
        match self {
            EndpointClass::PublicWrite => 30,
            EndpointClass::AdminRead => 60,
            EndpointClass::AdminDelete => 10,
        }
    }
}

/// Outcome of one limiter check; everything the retry headers need.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    /// Unix seconds at which the oldest counted request leaves the window.
    pub reset_at: u64,
    pub retry_after_secs: u64,
}

impl Decision {
    /// Fallback for the 429 catcher when no decision was cached.
    pub fn denied_unknown() -> Self {
        Decision {
            allowed: false,
            limit: 0,
            remaining: 0,
            reset_at: unix_now() + WINDOW_SECS,
            retry_after_secs: WINDOW_SECS,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// In-memory sliding-window counter. Single-process semantics by design;
/// multi-instance deployments need this state in a shared store with the
/// same `check` contract.
///
/// Keys come from `X-Forwarded-For`, so the map must not grow with the
/// number of distinct addresses ever seen: a sweep drops every key that
/// has been idle for a full window, bounding the map to clients active
/// within the last window.
pub struct SlidingWindowLimiter {
    inner: Mutex<Windows>,
}

struct Windows {
    map: HashMap<(String, EndpointClass), VecDeque<u64>>,
    last_sweep: u64,
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Windows {
                map: HashMap::new(),
                last_sweep: 0,
            }),
        }
    }

    pub fn check(&self, key: &str, class: EndpointClass) -> Decision {
        self.check_at(key, class, unix_now())
    }

    fn check_at(&self, key: &str, class: EndpointClass, now: u64) -> Decision {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // At most one full scan per window: an entry whose newest
        // timestamp has left the window counts for nothing and is dropped.
        if now.saturating_sub(inner.last_sweep) >= WINDOW_SECS {
            inner
                .map
                .retain(|_, window| window.back().is_some_and(|&t| t + WINDOW_SECS > now));
            inner.last_sweep = now;
        }

        let window = inner.map.entry((key.to_string(), class)).or_default();

        while window
            .front()
            .is_some_and(|&started| started + WINDOW_SECS <= now)
        {
            window.pop_front();
        }

        let limit = class.limit();
        if window.len() >= limit {
            let oldest = window.front().copied().unwrap_or(now);
            let reset_at = oldest + WINDOW_SECS;
            info!(key, class = ?class, "rate limit exceeded");
            return Decision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at,
                retry_after_secs: reset_at.saturating_sub(now).max(1),
            };
        }

        window.push_back(now);
        let oldest = window.front().copied().unwrap_or(now);
        Decision {
            allowed: true,
            limit,
            remaining: limit - window.len(),
            reset_at: oldest + WINDOW_SECS,
            retry_after_secs: 0,
        }
    }

    #[cfg(test)]
    fn tracked_entries(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .map
            .len()
    }
}

/// Client key: first `X-Forwarded-For` entry when present, else the
/// transport peer address.
pub fn client_key(req: &Request<'_>) -> String {
    if let Some(forwarded) = req.headers().get_one("X-Forwarded-For") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    req.client_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn enforce(req: &Request<'_>, class: EndpointClass) -> Outcome<(), ()> {
    let Some(state) = req.rocket().state::<ServerState>() else {
        // No managed state means we are not fully assembled; let the
        // request through rather than failing closed in tests.
        return Outcome::Success(());
    };
    let decision: &Option<Decision> =
        req.local_cache(|| Some(state.limiter.check(&client_key(req), class)));
    match decision {
        Some(d) if d.allowed => Outcome::Success(()),
        _ => Outcome::Error((Status::TooManyRequests, ())),
    }
}

/// Reads the decision a guard cached for this request, if any.
pub fn cached_decision(req: &Request<'_>) -> Option<Decision> {
    *req.local_cache(|| Option::<Decision>::None)
}

macro_rules! limit_guard {
    ($name:ident, $class:expr) => {
        pub struct $name;

        #[rocket::async_trait]
        impl<'r> FromRequest<'r> for $name {
            type Error = ();

            async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
                match enforce(req, $class) {
                    Outcome::Success(()) => Outcome::Success($name),
                    Outcome::Error(e) => Outcome::Error(e),
                    Outcome::Forward(f) => Outcome::Forward(f),
                }
            }
        }
    };
}

limit_guard!(PublicWriteLimit, EndpointClass::PublicWrite);
limit_guard!(AdminReadLimit, EndpointClass::AdminRead);
limit_guard!(AdminDeleteLimit, EndpointClass::AdminDelete);

/// Emits `X-RateLimit-*` on every response whose route consulted the
/// limiter, and `Retry-After` when the request was refused.
pub struct RateLimitHeaders;

#[rocket::async_trait]
impl Fairing for RateLimitHeaders {
    fn info(&self) -> Info {
        Info {
            name: "Rate limit headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        if let Some(decision) = cached_decision(req) {
            res.set_raw_header("X-RateLimit-Limit", decision.limit.to_string());
            res.set_raw_header("X-RateLimit-Remaining", decision.remaining.to_string());
            res.set_raw_header("X-RateLimit-Reset", decision.reset_at.to_string());
            if !decision.allowed {
                res.set_raw_header("Retry-After", decision.retry_after_secs.to_string());
            }
        }
    }
}
