//! Rocket assembly: shared state, figment overrides, fairings, the route
//! table, and catchers.

use rocket::data::{ByteUnit, Limits};
use rocket::{catchers, routes, Build, Rocket};
use std::sync::Arc;

use crate::api;
use crate::config::Config;
use crate::notifier::Notifier;
use crate::rate_limit::{RateLimitHeaders, SlidingWindowLimiter};
use crate::store::Store;

pub mod fairings;
pub mod routes;

/// Hard cap on request bodies.
pub const BODY_LIMIT_KIB: u64 = 256;

pub struct ServerState {
    pub config: Config,
    pub store: Store,
    pub notifier: Arc<dyn Notifier>,
    pub limiter: SlidingWindowLimiter,
}

pub fn build_rocket(config: Config, store: Store, notifier: Arc<dyn Notifier>) -> Rocket<Build> {
    let limits = Limits::default()
        .limit("json", ByteUnit::Kibibyte(BODY_LIMIT_KIB))
        .limit("string", ByteUnit::Kibibyte(BODY_LIMIT_KIB));
    let figment = rocket::Config::figment()
        .merge(("address", "0.0.0.0"))
        .merge(("port", config.port))
        .merge(("limits", limits));

    let state = ServerState {
        config,
        store,
        notifier,
        limiter: SlidingWindowLimiter::new(),
    };

    rocket::custom(figment)
        .manage(state)
        .attach(fairings::RequestIdFairing)
        .attach(fairings::Cors)
        .attach(fairings::SecurityHeaders)
        .attach(RateLimitHeaders)
        .mount(
            "/api",
            routes![
                // Health and info endpoints
                routes::health::health_check,
                routes::health::index,
                // Public lead capture
                api::newsletter::subscribe,
                api::contact::submit_contact,
                api::assessment::submit_assessment,
                api::roi::calculate_roi,
                api::consultation::request_consultation,
                // Admin surface
                api::admin::admin_overview,
                api::admin::admin_delete,
                // CORS preflight
                routes::preflight::preflight,
            ],
        )
        .mount("/api", routes::method_fallbacks::routes())
        .register(
            "/",
            catchers![
                routes::catchers::bad_request,
                routes::catchers::not_found,
                routes::catchers::method_not_allowed,
                routes::catchers::payload_too_large,
                routes::catchers::unprocessable,
                routes::catchers::rate_limited,
                routes::catchers::internal,
                routes::catchers::unavailable,
            ],
        )
}
