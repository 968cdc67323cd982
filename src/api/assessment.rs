use rocket::serde::json::Json;
use rocket::{post, State};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::{normalize_email, with_deadline};
use crate::error::ApiError;
use crate::notifier;
use crate::rate_limit::PublicWriteLimit;
use crate::scoring;
use crate::server::ServerState;
use crate::store::{now_utc_string, Collection};
use crate::validator::Validator;

#[derive(Debug, Default, Deserialize)]
pub struct UserInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssessmentRequest {
    pub user_info: Option<UserInfo>,
    #[serde(default)]
    pub responses: Map<String, Value>,
    pub source: Option<String>,
}

/// Scores the self-assessment and persists inputs alongside the derived
/// values, so recomputing from the stored responses reproduces the score.
#[post("/ai-assessment", data = "<body>")]
pub async fn submit_assessment(
    _limit: PublicWriteLimit,
    state: &State<ServerState>,
    body: Json<AssessmentRequest>,
) -> Result<Json<Value>, ApiError> {
    let req = body.into_inner();
    let user_info = req.user_info.unwrap_or_default();

    let mut checks = Validator::new();
    checks
        .required("user_info.name", user_info.name.as_deref())
        .email("user_info.email", user_info.email.as_deref())
        .non_empty_map("responses", &req.responses);
    checks.finish().map_err(ApiError::validation)?;

    let email = normalize_email(user_info.email.as_deref().unwrap_or_default());
    let result = scoring::assess_maturity(&req.responses);

    let mut document = Map::new();
    document.insert(
        "user_info".into(),
        json!({
            "name": user_info.name,
            "email": email,
            "company": user_info.company,
            "industry": user_info.industry,
            "company_size": user_info.company_size,
        }),
    );
    document.insert("responses".into(), Value::Object(req.responses));
    document.insert("maturity_score".into(), json!(result.score));
    document.insert("maturity_band".into(), json!(result.band));
    document.insert("recommendations".into(), json!(result.recommendations));
    document.insert("lead_type".into(), json!("ai_assessment"));
    document.insert(
        "source".into(),
        json!(req.source.unwrap_or_else(|| "website".to_string())),
    );

    let stored = with_deadline(state.store.insert(Collection::AiAssessmentLeads, document)).await?;

    notifier::dispatch(
        state.notifier.clone(),
        "assessment-results",
        json!({
            "email": email,
            "maturity_score": result.score,
            "maturity_band": result.band,
        }),
    );

    Ok(Json(json!({
        "success": true,
        "assessment_id": stored["id"],
        "maturity_score": result.score,
        "maturity_band": result.band,
        "recommendations": result.recommendations,
        "timestamp": now_utc_string(),
    })))
}
