use rocket::serde::json::Json;
use rocket::{post, State};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::{normalize_email, with_deadline};
use crate::error::ApiError;
use crate::notifier;
use crate::rate_limit::PublicWriteLimit;
use crate::server::ServerState;
use crate::store::{now_utc_string, Collection};
use crate::validator::Validator;

#[derive(Debug, Deserialize)]
pub struct NewsletterRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub name: Option<String>,
    pub lead_type: Option<String>,
    pub source: Option<String>,
}

/// Subscribes an address. The unique index on the stored email turns a
/// repeat submission into a 409 with the existing subscription id, even
/// under concurrent identical posts.
#[post("/newsletter", data = "<body>")]
pub async fn subscribe(
    _limit: PublicWriteLimit,
    state: &State<ServerState>,
    body: Json<NewsletterRequest>,
) -> Result<Json<Value>, ApiError> {
    let req = body.into_inner();

    let mut checks = Validator::new();
    checks.email("email", req.email.as_deref());
    checks.finish().map_err(ApiError::validation)?;

    let email = normalize_email(req.email.as_deref().unwrap_or_default());

    let mut document = Map::new();
    document.insert("email".into(), json!(email));
    document.insert("first_name".into(), json!(req.first_name));
    document.insert("name".into(), json!(req.name));
    document.insert(
        "lead_type".into(),
        json!(req.lead_type.unwrap_or_else(|| "newsletter".to_string())),
    );
    document.insert("status".into(), json!("active"));
    document.insert(
        "source".into(),
        json!(req.source.unwrap_or_else(|| "website".to_string())),
    );

    match with_deadline(state.store.insert(Collection::NewsletterSubscriptions, document)).await {
        Ok(stored) => {
            notifier::dispatch(
                state.notifier.clone(),
                "welcome-newsletter",
                json!({ "email": email, "first_name": stored["first_name"] }),
            );
            Ok(Json(json!({
                "success": true,
                "subscription_id": stored["id"],
                "email": stored["email"],
                "status": stored["status"],
                "timestamp": now_utc_string(),
            })))
        }
        Err(ApiError::Conflict { .. }) => {
            let existing = with_deadline(state.store.find_one(
                Collection::NewsletterSubscriptions,
                "email",
                &email,
            ))
            .await?;
            Err(ApiError::Conflict {
                code: "already_subscribed",
                id_field: "subscription_id",
                existing_id: existing
                    .and_then(|doc| doc["id"].as_str().map(str::to_string)),
            })
        }
        Err(other) => Err(other),
    }
}
