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
pub struct ConsultationRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub consultation_type: Option<String>,
    pub preferred_date: Option<String>,
    pub preferred_time: Option<String>,
    pub requirements: Option<String>,
    pub industry: Option<String>,
    pub source: Option<String>,
}

const NEXT_STEPS: [&str; 3] = [
    "We confirm availability within one business day",
    "You receive a calendar invitation by email",
    "A consultant reviews your requirements before the call",
];

/// Books a consultation slot. A partial unique index keeps one pending
/// booking per (email, date, time); absent date/time are normalized to
/// empty strings so undated requests are covered too.
#[post("/consultation", data = "<body>")]
pub async fn request_consultation(
    _limit: PublicWriteLimit,
    state: &State<ServerState>,
    body: Json<ConsultationRequest>,
) -> Result<Json<Value>, ApiError> {
    let req = body.into_inner();

    let mut checks = Validator::new();
    checks
        .required("full_name", req.full_name.as_deref())
        .email("email", req.email.as_deref())
        .required("consultation_type", req.consultation_type.as_deref())
        .iso_date("preferred_date", req.preferred_date.as_deref())
        .hhmm_time("preferred_time", req.preferred_time.as_deref())
        .max_len("requirements", req.requirements.as_deref(), MAX_TEXT_LEN);
    checks.finish().map_err(ApiError::validation)?;

    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    let preferred_date = req.preferred_date.unwrap_or_default();
    let preferred_time = req.preferred_time.unwrap_or_default();

    let mut document = Map::new();
    document.insert("full_name".into(), json!(req.full_name));
    document.insert("email".into(), json!(email));
    document.insert("company".into(), json!(req.company));
    document.insert("phone".into(), json!(req.phone));
    document.insert("consultation_type".into(), json!(req.consultation_type));
    document.insert("preferred_date".into(), json!(preferred_date));
    document.insert("preferred_time".into(), json!(preferred_time));
    document.insert("requirements".into(), json!(req.requirements));
    document.insert("industry".into(), json!(req.industry));
    document.insert("status".into(), json!("pending"));
    document.insert("lead_type".into(), json!("consultation"));
    document.insert(
        "source".into(),
        json!(req.source.unwrap_or_else(|| "website".to_string())),
    );

    match with_deadline(state.store.insert(Collection::ConsultationLeads, document)).await {
        Ok(stored) => {
            notifier::dispatch(
                state.notifier.clone(),
                "consultation-request",
                json!({
                    "full_name": stored["full_name"],
                    "email": email,
                    "consultation_type": stored["consultation_type"],
                    "preferred_date": stored["preferred_date"],
                    "preferred_time": stored["preferred_time"],
                }),
            );
            Ok(Json(json!({
                "success": true,
                "consultation_id": stored["id"],
                "status": stored["status"],
                "full_name": stored["full_name"],
                "consultation_type": stored["consultation_type"],
                "preferred_date": stored["preferred_date"],
                "preferred_time": stored["preferred_time"],
                "next_steps": NEXT_STEPS,
                "timestamp": now_utc_string(),
            })))
        }
        Err(ApiError::Conflict { .. }) => Err(ApiError::Conflict {
            code: "already_booked",
            id_field: "consultation_id",
            // The pending booking id is not disclosed: the slot tuple is
            // enough for the client to adjust.
            existing_id: None,
        }),
        Err(other) => Err(other),
    }
}
