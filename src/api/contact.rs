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
use crate::validator::{Validator, MAX_TEXT_LEN};

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub service_type: Option<String>,
    pub message: Option<String>,
    pub lead_type: Option<String>,
    pub source: Option<String>,
}

#[post("/contact", data = "<body>")]
pub async fn submit_contact(
    _limit: PublicWriteLimit,
    state: &State<ServerState>,
    body: Json<ContactRequest>,
) -> Result<Json<Value>, ApiError> {
    let req = body.into_inner();

    let mut checks = Validator::new();
    checks
        .required("name", req.name.as_deref())
        .email("email", req.email.as_deref())
        .required("message", req.message.as_deref())
        .max_len("message", req.message.as_deref(), MAX_TEXT_LEN);
    checks.finish().map_err(ApiError::validation)?;

    let email = normalize_email(req.email.as_deref().unwrap_or_default());

    let mut document = Map::new();
    document.insert("name".into(), json!(req.name));
    document.insert("email".into(), json!(email));
    document.insert("company".into(), json!(req.company));
    document.insert("phone".into(), json!(req.phone));
    document.insert("service_type".into(), json!(req.service_type));
    document.insert("message".into(), json!(req.message));
    document.insert(
        "lead_type".into(),
        json!(req.lead_type.unwrap_or_else(|| "contact".to_string())),
    );
    document.insert("status".into(), json!("new"));
    document.insert(
        "source".into(),
        json!(req.source.unwrap_or_else(|| "website".to_string())),
    );

    let stored = with_deadline(state.store.insert(Collection::ContactMessages, document)).await?;

    // One to the team inbox, one acknowledgement to the submitter.
    notifier::dispatch(
        state.notifier.clone(),
        "contact-received",
        json!({
            "name": stored["name"],
            "email": stored["email"],
            "company": stored["company"],
            "service_type": stored["service_type"],
        }),
    );
    notifier::dispatch(
        state.notifier.clone(),
        "contact-ack",
        json!({ "name": stored["name"], "email": stored["email"] }),
    );

    Ok(Json(json!({
        "success": true,
        "id": stored["id"],
        "status": stored["status"],
        "timestamp": now_utc_string(),
    })))
}
