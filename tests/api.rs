//! End-to-end tests over the assembled Rocket instance with a throwaway
//! SQLite database per test.

use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use lead_intake::config::Config;
use lead_intake::notifier::LogNotifier;
use lead_intake::server;
use lead_intake::store::{self, Store};

fn test_config() -> Config {
    Config {
        db_url: std::env::temp_dir().to_string_lossy().into_owned(),
        db_name: format!("lead-intake-it-{}", Uuid::new_v4()),
        port: 0,
        allowed_origins: None,
        notify_webhook_url: None,
    }
}

async fn spawn_client_with(config: Config) -> Client {
    let pool = store::create_db_pool(&config.database_path())
        .await
        .expect("pool");
    let store = Store::new(pool);
    let rocket = server::build_rocket(config, store, Arc::new(LogNotifier));
    Client::tracked(rocket).await.expect("client")
}

async fn spawn_client() -> Client {
    spawn_client_with(test_config()).await
}

async fn post_json<'c>(
    client: &'c Client,
    path: &'c str,
    body: Value,
) -> rocket::local::asynchronous::LocalResponse<'c> {
    client
        .post(path)
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .await
}

// ---------------------------------------------------------------------------
// Health and cross-cutting headers
// ---------------------------------------------------------------------------

#[rocket::async_test]
async fn health_reports_service_metadata() {
    let client = spawn_client().await;
    let response = client.get("/api/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "lead-intake-api");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["timestamp"].as_str().expect("timestamp").ends_with('Z'));
}

#[rocket::async_test]
async fn every_response_carries_security_headers_and_request_id() {
    let client = spawn_client().await;
    let response = client.get("/api/health").dispatch().await;

    let headers = response.headers();
    assert_eq!(headers.get_one("X-Content-Type-Options"), Some("nosniff"));
    assert_eq!(headers.get_one("X-Frame-Options"), Some("DENY"));
    assert_eq!(
        headers.get_one("Content-Security-Policy"),
        Some("default-src 'self'")
    );
    assert_eq!(
        headers.get_one("Referrer-Policy"),
        Some("strict-origin-when-cross-origin")
    );
    assert_eq!(
        headers.get_one("Cross-Origin-Opener-Policy"),
        Some("same-origin")
    );
    assert_eq!(headers.get_one("Cache-Control"), Some("no-store"));
    assert_eq!(headers.get_one("Access-Control-Allow-Origin"), Some("*"));

    let first_id = headers.get_one("X-Request-Id").expect("request id").to_string();
    assert!(!first_id.is_empty());

    let second = client.get("/api/health").dispatch().await;
    let second_id = second.headers().get_one("X-Request-Id").expect("request id");
    assert_ne!(first_id, second_id);
}

#[rocket::async_test]
async fn preflight_answers_204_with_cors_verbs() {
    let client = spawn_client().await;
    let response = client.options("/api/newsletter").dispatch().await;
    assert_eq!(response.status(), Status::NoContent);

    let headers = response.headers();
    assert_eq!(headers.get_one("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(
        headers.get_one("Access-Control-Allow-Methods"),
        Some("GET, POST, DELETE, OPTIONS")
    );
    assert_eq!(
        headers.get_one("Access-Control-Allow-Headers"),
        Some("Content-Type")
    );
}

#[rocket::async_test]
async fn cors_allow_list_echoes_only_known_origins() {
    let config = Config {
        allowed_origins: Some(vec!["https://ok.example".to_string()]),
        ..test_config()
    };
    let client = spawn_client_with(config).await;

    let allowed = client
        .get("/api/health")
        .header(Header::new("Origin", "https://ok.example"))
        .dispatch()
        .await;
    assert_eq!(
        allowed.headers().get_one("Access-Control-Allow-Origin"),
        Some("https://ok.example")
    );
    assert_eq!(allowed.headers().get_one("Vary"), Some("Origin"));

    let refused = client
        .get("/api/health")
        .header(Header::new("Origin", "https://evil.example"))
        .dispatch()
        .await;
    assert_eq!(
        refused.headers().get_one("Access-Control-Allow-Origin"),
        None
    );
}

// ---------------------------------------------------------------------------
// Newsletter
// ---------------------------------------------------------------------------

#[rocket::async_test]
async fn newsletter_happy_path_then_conflict() {
    let client = spawn_client().await;

    let response = post_json(
        &client,
        "/api/newsletter",
        json!({"email": "A@B.co", "first_name": "A"}),
    )
    .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json");
    assert_eq!(body["email"], "a@b.co");
    assert_eq!(body["status"], "active");
    let subscription_id = body["subscription_id"].as_str().expect("id").to_string();
    assert!(!subscription_id.is_empty());

    // Same address in different case: one subscription only.
    let repeat = post_json(&client, "/api/newsletter", json!({"email": "a@B.CO"})).await;
    assert_eq!(repeat.status(), Status::Conflict);
    let conflict: Value = repeat.into_json().await.expect("json");
    assert_eq!(conflict["error"], "already_subscribed");
    assert_eq!(conflict["subscription_id"], subscription_id.as_str());
}

#[rocket::async_test]
async fn newsletter_rejects_malformed_email() {
    let client = spawn_client().await;
    for bad in ["a@b", "a b@c.d", ""] {
        let response = post_json(&client, "/api/newsletter", json!({"email": bad})).await;
        assert_eq!(response.status(), Status::BadRequest, "email {:?}", bad);
        let body: Value = response.into_json().await.expect("json");
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["fields"][0], "email");
    }
}

#[rocket::async_test]
async fn malformed_json_body_is_a_400() {
    let client = spawn_client().await;
    let response = client
        .post("/api/newsletter")
        .header(ContentType::JSON)
        .body("{not json")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json");
    assert_eq!(body["error"], "invalid_json");
}

#[rocket::async_test]
async fn unknown_body_fields_are_ignored() {
    let client = spawn_client().await;
    let response = post_json(
        &client,
        "/api/newsletter",
        json!({"email": "x@y.co", "utm_campaign": "spring", "hcaptcha": "token"}),
    )
    .await;
    assert_eq!(response.status(), Status::Ok);
}

// ---------------------------------------------------------------------------
// Contact + admin listing
// ---------------------------------------------------------------------------

#[rocket::async_test]
async fn contact_persists_and_shows_in_admin_listing() {
    let client = spawn_client().await;

    let response = post_json(
        &client,
        "/api/contact",
        json!({"name": "J", "email": "j@x.co", "message": "hi"}),
    )
    .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json");
    let id = body["id"].as_str().expect("id").to_string();
    assert!(!id.is_empty());

    let admin = client.get("/api/admin").dispatch().await;
    assert_eq!(admin.status(), Status::Ok);
    assert_eq!(
        admin.headers().get_one("Cache-Control"),
        Some("no-store, no-cache, must-revalidate")
    );
    assert_eq!(admin.headers().get_one("Pragma"), Some("no-cache"));
    assert_eq!(admin.headers().get_one("Expires"), Some("0"));

    let overview: Value = admin.into_json().await.expect("json");
    assert_eq!(overview["success"], true);
    assert!(overview["summary"]["breakdown"]["contact_messages"].as_i64().expect("count") >= 1);
    assert_eq!(overview["data"]["contact_messages"][0]["id"], id.as_str());

    // total_leads is the sum of the breakdown.
    let breakdown = overview["summary"]["breakdown"].as_object().expect("breakdown");
    let sum: i64 = breakdown.values().map(|v| v.as_i64().expect("count")).sum();
    assert_eq!(overview["summary"]["total_leads"].as_i64(), Some(sum));
}

#[rocket::async_test]
async fn contact_requires_name_email_and_message() {
    let client = spawn_client().await;
    let response = post_json(&client, "/api/contact", json!({"email": "j@x.co"})).await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .expect("fields")
        .iter()
        .map(|f| f.as_str().expect("field"))
        .collect();
    assert_eq!(fields, vec!["name", "message"]);
}

// ---------------------------------------------------------------------------
// AI assessment
// ---------------------------------------------------------------------------

#[rocket::async_test]
async fn assessment_medium_band_scores_sixty() {
    let client = spawn_client().await;
    let response = post_json(
        &client,
        "/api/ai-assessment",
        json!({
            "user_info": {"name": "U", "email": "u@x.co"},
            "responses": {"q1": 3, "q2": 3, "q3": 3, "q4": 3, "q5": 3, "q6": 3},
        }),
    )
    .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json");
    assert_eq!(body["maturity_score"], 60);
    assert_eq!(body["maturity_band"], "Intermediate");
    assert_eq!(body["recommendations"].as_array().expect("recs").len(), 4);
    assert!(!body["assessment_id"].as_str().expect("id").is_empty());

    // Derived values are persisted with the inputs.
    let admin = client.get("/api/admin").dispatch().await;
    let overview: Value = admin.into_json().await.expect("json");
    let lead = &overview["data"]["ai_assessment_leads"][0];
    assert_eq!(lead["maturity_score"], 60);
    assert_eq!(lead["responses"]["q4"], 3);
}

#[rocket::async_test]
async fn assessment_requires_non_empty_responses() {
    let client = spawn_client().await;
    let response = post_json(
        &client,
        "/api/ai-assessment",
        json!({"user_info": {"name": "U", "email": "u@x.co"}, "responses": {}}),
    )
    .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json");
    assert_eq!(body["fields"][0], "responses");
}

// ---------------------------------------------------------------------------
// ROI calculator
// ---------------------------------------------------------------------------

#[rocket::async_test]
async fn roi_small_business_scenario() {
    let client = spawn_client().await;
    let response = post_json(
        &client,
        "/api/roi-calculator",
        json!({
            "company_name": "Acme",
            "email": "cfo@acme.co",
            "annual_revenue": 2_000_000,
            "employee_count": "11-50",
            "current_pm_costs": 5_000,
            "tech_budget": 50_000,
            "implementation_timeline": "3-6 months",
            "user_region": "US",
        }),
    )
    .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json");
    assert_eq!(body["potential_savings"], 12_000);
    assert_eq!(body["implementation_cost"], 50_000);
    assert_eq!(body["roi_percentage"], -76);
    assert_eq!(body["payback_period_months"], 50);
    assert!(!body["calculation_id"].as_str().expect("id").is_empty());
}

#[rocket::async_test]
async fn roi_zero_costs_short_circuit() {
    let client = spawn_client().await;
    let response = post_json(
        &client,
        "/api/roi-calculator",
        json!({
            "company_name": "Acme",
            "email": "cfo@acme.co",
            "employee_count": "1-10",
            "current_pm_costs": 0,
            "tech_budget": 10_000,
        }),
    )
    .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json");
    assert_eq!(body["potential_savings"], 0);
    assert_eq!(body["roi_percentage"], 0);
    assert_eq!(body["payback_period_months"], Value::Null);
}

#[rocket::async_test]
async fn roi_validates_enums_and_ranges() {
    let client = spawn_client().await;
    let response = post_json(
        &client,
        "/api/roi-calculator",
        json!({
            "company_name": "Acme",
            "email": "cfo@acme.co",
            "annual_revenue": -5,
            "employee_count": "lots",
        }),
    )
    .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json");
    let fields = body["fields"].as_array().expect("fields");
    assert!(fields.iter().any(|f| f == "annual_revenue"));
    assert!(fields.iter().any(|f| f == "employee_count"));
}

// ---------------------------------------------------------------------------
// Consultation
// ---------------------------------------------------------------------------

#[rocket::async_test]
async fn consultation_duplicate_slot_conflicts() {
    let client = spawn_client().await;
    let booking = json!({
        "full_name": "Jane Doe",
        "email": "jane@x.co",
        "consultation_type": "discovery",
        "preferred_date": "2026-09-01",
        "preferred_time": "10:00",
    });

    let first = post_json(&client, "/api/consultation", booking.clone()).await;
    assert_eq!(first.status(), Status::Ok);
    let body: Value = first.into_json().await.expect("json");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["next_steps"].as_array().expect("steps").len(), 3);

    let second = post_json(&client, "/api/consultation", booking).await;
    assert_eq!(second.status(), Status::Conflict);
    let conflict: Value = second.into_json().await.expect("json");
    assert_eq!(conflict["error"], "already_booked");
}

#[rocket::async_test]
async fn consultation_validates_date_and_time_formats() {
    let client = spawn_client().await;
    let response = post_json(
        &client,
        "/api/consultation",
        json!({
            "full_name": "Jane Doe",
            "email": "jane@x.co",
            "consultation_type": "discovery",
            "preferred_date": "tomorrow",
            "preferred_time": "10am",
        }),
    )
    .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json");
    let fields = body["fields"].as_array().expect("fields");
    assert!(fields.iter().any(|f| f == "preferred_date"));
    assert!(fields.iter().any(|f| f == "preferred_time"));
}

// ---------------------------------------------------------------------------
// Admin delete
// ---------------------------------------------------------------------------

async fn seed_one_lead_per_collection(client: &Client) {
    let requests = [
        ("/api/newsletter", json!({"email": "n@x.co"})),
        (
            "/api/contact",
            json!({"name": "J", "email": "j@x.co", "message": "hi"}),
        ),
        (
            "/api/ai-assessment",
            json!({"user_info": {"name": "U", "email": "u@x.co"}, "responses": {"q1": 3}}),
        ),
        (
            "/api/roi-calculator",
            json!({
                "company_name": "Acme",
                "email": "cfo@acme.co",
                "employee_count": "11-50",
                "current_pm_costs": 1000,
                "tech_budget": 5000,
            }),
        ),
        (
            "/api/consultation",
            json!({"full_name": "Jane", "email": "jane@x.co", "consultation_type": "discovery"}),
        ),
    ];
    for (path, body) in requests {
        let response = post_json(client, path, body).await;
        assert_eq!(response.status(), Status::Ok, "seeding {}", path);
    }
}

#[rocket::async_test]
async fn admin_delete_all_wipes_every_collection() {
    let client = spawn_client().await;
    seed_one_lead_per_collection(&client).await;

    let response = client
        .delete("/api/admin-delete?deleteType=all")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json");
    assert_eq!(body["operation"], "all");
    assert_eq!(body["deletedCount"], 5);
    let breakdown = body["breakdown"].as_object().expect("breakdown");
    assert_eq!(breakdown.len(), 5);
    assert!(breakdown.values().all(|count| count == 1));

    let admin = client.get("/api/admin").dispatch().await;
    let overview: Value = admin.into_json().await.expect("json");
    assert_eq!(overview["summary"]["total_leads"], 0);
}

#[rocket::async_test]
async fn admin_delete_collection_then_listing_reports_zero() {
    let client = spawn_client().await;
    seed_one_lead_per_collection(&client).await;

    let response = client
        .delete("/api/admin-delete?deleteType=collection&collection=contact_messages")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json");
    assert_eq!(body["operation"], "collection");
    assert_eq!(body["deletedCount"], 1);

    let admin = client.get("/api/admin").dispatch().await;
    let overview: Value = admin.into_json().await.expect("json");
    assert_eq!(overview["summary"]["breakdown"]["contact_messages"], 0);
    assert_eq!(overview["summary"]["total_leads"], 4);
}

#[rocket::async_test]
async fn admin_delete_single_is_idempotent() {
    let client = spawn_client().await;
    let created = post_json(
        &client,
        "/api/contact",
        json!({"name": "J", "email": "j@x.co", "message": "hi"}),
    )
    .await;
    let body: Value = created.into_json().await.expect("json");
    let id = body["id"].as_str().expect("id").to_string();

    let uri = format!(
        "/api/admin-delete?deleteType=single&collection=contact_messages&leadId={}",
        id
    );
    let first = client.delete(uri.clone()).dispatch().await;
    assert_eq!(first.status(), Status::Ok);
    let first_body: Value = first.into_json().await.expect("json");
    assert_eq!(first_body["deletedCount"], 1);
    assert_eq!(first_body["leadId"], id.as_str());

    let second = client.delete(uri).dispatch().await;
    assert_eq!(second.status(), Status::Ok);
    let second_body: Value = second.into_json().await.expect("json");
    assert_eq!(second_body["deletedCount"], 0);
}

#[rocket::async_test]
async fn admin_delete_refuses_bad_parameters() {
    let client = spawn_client().await;

    let missing_type = client.delete("/api/admin-delete").dispatch().await;
    assert_eq!(missing_type.status(), Status::BadRequest);
    let body: Value = missing_type.into_json().await.expect("json");
    assert_eq!(body["error"], "invalid_delete_type");

    let bad_collection = client
        .delete("/api/admin-delete?deleteType=collection&collection=users")
        .dispatch()
        .await;
    assert_eq!(bad_collection.status(), Status::BadRequest);
    let body: Value = bad_collection.into_json().await.expect("json");
    assert_eq!(body["error"], "invalid_collection");

    let missing_id = client
        .delete("/api/admin-delete?deleteType=single&collection=contact_messages")
        .dispatch()
        .await;
    assert_eq!(missing_id.status(), Status::BadRequest);
    let body: Value = missing_id.into_json().await.expect("json");
    assert_eq!(body["error"], "missing_lead_id");
}

// ---------------------------------------------------------------------------
// Routing and rate limiting
// ---------------------------------------------------------------------------

#[rocket::async_test]
async fn unknown_route_is_404() {
    let client = spawn_client().await;
    let response = client.get("/api/nope").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    let body: Value = response.into_json().await.expect("json");
    assert_eq!(body["error"], "not_found");
}

#[rocket::async_test]
async fn wrong_method_on_known_path_is_405() {
    let client = spawn_client().await;

    let get_newsletter = client.get("/api/newsletter").dispatch().await;
    assert_eq!(get_newsletter.status(), Status::MethodNotAllowed);

    let put_contact = client.put("/api/contact").dispatch().await;
    assert_eq!(put_contact.status(), Status::MethodNotAllowed);

    let patch_newsletter = client.patch("/api/newsletter").dispatch().await;
    assert_eq!(patch_newsletter.status(), Status::MethodNotAllowed);

    let put_admin = client.put("/api/admin").dispatch().await;
    assert_eq!(put_admin.status(), Status::MethodNotAllowed);

    let post_admin_delete = client.post("/api/admin-delete").dispatch().await;
    assert_eq!(post_admin_delete.status(), Status::MethodNotAllowed);
    let body: Value = post_admin_delete.into_json().await.expect("json");
    assert_eq!(body["error"], "method_not_allowed");
}

#[rocket::async_test]
async fn body_is_read_regardless_of_content_type() {
    let client = spawn_client().await;

    // No Content-Type header at all: valid JSON still subscribes.
    let response = client
        .post("/api/newsletter")
        .body(json!({"email": "plain@x.co"}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    // Non-JSON body under a text content type is a body error, not a 404.
    let garbage = client
        .post("/api/newsletter")
        .header(ContentType::Text)
        .body("hello")
        .dispatch()
        .await;
    assert_eq!(garbage.status(), Status::BadRequest);
    let body: Value = garbage.into_json().await.expect("json");
    assert_eq!(body["error"], "invalid_json");
}

#[rocket::async_test]
async fn concurrent_identical_subscriptions_resolve_to_one_winner() {
    let client = spawn_client().await;
    let body = json!({"email": "race@x.co"});

    let pending: Vec<_> = (0..8)
        .map(|_| post_json(&client, "/api/newsletter", body.clone()))
        .collect();
    let responses = rocket::futures::future::join_all(pending).await;

    let mut winner_ids = Vec::new();
    let mut conflict_ids = Vec::new();
    for response in responses {
        let status = response.status();
        if status == Status::Ok {
            let body: Value = response.into_json().await.expect("json");
            winner_ids.push(body["subscription_id"].as_str().expect("id").to_string());
        } else if status == Status::Conflict {
            let body: Value = response.into_json().await.expect("json");
            assert_eq!(body["error"], "already_subscribed");
            conflict_ids.push(body["subscription_id"].as_str().expect("id").to_string());
        } else {
            panic!("unexpected status {}", status);
        }
    }

    assert_eq!(winner_ids.len(), 1);
    assert_eq!(conflict_ids.len(), 7);
    for id in conflict_ids {
        assert_eq!(id, winner_ids[0]);
    }
}

#[rocket::async_test]
async fn admin_delete_rate_limit_trips_at_ten() {
    let client = spawn_client().await;
    let forwarded = Header::new("X-Forwarded-For", "198.51.100.7");

    for i in 0..10 {
        let response = client
            .delete("/api/admin-delete?deleteType=single&collection=contact_messages&leadId=missing")
            .header(forwarded.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok, "request {} within limit", i);
    }

    let refused = client
        .delete("/api/admin-delete?deleteType=single&collection=contact_messages&leadId=missing")
        .header(forwarded)
        .dispatch()
        .await;
    assert_eq!(refused.status(), Status::TooManyRequests);

    let headers = refused.headers();
    assert_eq!(headers.get_one("X-RateLimit-Limit"), Some("10"));
    assert_eq!(headers.get_one("X-RateLimit-Remaining"), Some("0"));
    assert!(headers.get_one("X-RateLimit-Reset").is_some());
    let retry_after: u64 = headers
        .get_one("Retry-After")
        .expect("retry header")
        .parse()
        .expect("seconds");
    assert!(retry_after >= 1);

    let body: Value = refused.into_json().await.expect("json");
    assert_eq!(body["error"], "rate_limited");
}

#[rocket::async_test]
async fn rate_limit_headers_present_on_allowed_requests() {
    let client = spawn_client().await;
    let response = post_json(&client, "/api/newsletter", json!({"email": "h@x.co"})).await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.headers().get_one("X-RateLimit-Limit"), Some("30"));
    assert_eq!(
        response.headers().get_one("X-RateLimit-Remaining"),
        Some("29")
    );
}

#[rocket::async_test]
async fn oversize_payload_is_rejected() {
    let client = spawn_client().await;
    let huge = "x".repeat(300 * 1024);
    let response = post_json(
        &client,
        "/api/contact",
        json!({"name": "J", "email": "j@x.co", "message": huge}),
    )
    .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json");
    assert_eq!(body["error"], "payload_too_large");
}
