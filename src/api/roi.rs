use rocket::serde::json::Json;
use rocket::{post, State};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::{normalize_email, with_deadline};
use crate::error::ApiError;
use crate::notifier;
use crate::rate_limit::PublicWriteLimit;
use crate::scoring::{self, RoiInputs, DEFAULT_REGION, EMPLOYEE_COUNT_BANDS, REGIONS};
use crate::server::ServerState;
use crate::store::{now_utc_string, Collection};
use crate::validator::Validator;

#[derive(Debug, Deserialize)]
pub struct RoiRequest {
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub annual_revenue: Option<f64>,
    pub employee_count: Option<String>,
    /// Monthly.
    pub current_pm_costs: Option<f64>,
    pub tech_budget: Option<f64>,
    /// Free-form ("3-6 months"); stored, not part of the model.
    pub implementation_timeline: Option<Value>,
    pub user_region: Option<String>,
    pub source: Option<String>,
}

#[post("/roi-calculator", data = "<body>")]
pub async fn calculate_roi(
    _limit: PublicWriteLimit,
    state: &State<ServerState>,
    body: Json<RoiRequest>,
) -> Result<Json<Value>, ApiError> {
    let req = body.into_inner();
    let user_region = req
        .user_region
        .clone()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let mut checks = Validator::new();
    checks
        .required("company_name", req.company_name.as_deref())
        .email("email", req.email.as_deref())
        .in_range("annual_revenue", req.annual_revenue, 0.0, f64::MAX)
        .in_range("current_pm_costs", req.current_pm_costs, 0.0, f64::MAX)
        .in_range("tech_budget", req.tech_budget, 0.0, f64::MAX)
        .one_of(
            "employee_count",
            req.employee_count.as_deref(),
            &EMPLOYEE_COUNT_BANDS,
        )
        .one_of("user_region", Some(user_region.as_str()), &REGIONS);
    checks.finish().map_err(ApiError::validation)?;

    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    let employee_count = req.employee_count.unwrap_or_default();

    let outputs = scoring::compute_roi(RoiInputs {
        current_pm_costs: req.current_pm_costs.unwrap_or(0.0),
        tech_budget: req.tech_budget.unwrap_or(0.0),
        employee_count: &employee_count,
        user_region: &user_region,
    });

    let mut document = Map::new();
    document.insert("company_name".into(), json!(req.company_name));
    document.insert("email".into(), json!(email));
    document.insert("annual_revenue".into(), json!(req.annual_revenue));
    document.insert("employee_count".into(), json!(employee_count));
    document.insert("current_pm_costs".into(), json!(req.current_pm_costs));
    document.insert("tech_budget".into(), json!(req.tech_budget));
    document.insert(
        "implementation_timeline".into(),
        req.implementation_timeline.unwrap_or(Value::Null),
    );
    document.insert("user_region".into(), json!(user_region));
    document.insert("potential_savings".into(), json!(outputs.potential_savings));
    document.insert(
        "implementation_cost".into(),
        json!(outputs.implementation_cost),
    );
    document.insert("roi_percentage".into(), json!(outputs.roi_percentage));
    document.insert(
        "payback_period_months".into(),
        json!(outputs.payback_period_months),
    );
    document.insert("lead_type".into(), json!("roi_calculator"));
    document.insert(
        "source".into(),
        json!(req.source.unwrap_or_else(|| "website".to_string())),
    );

    let stored = with_deadline(state.store.insert(Collection::RoiCalculatorLeads, document)).await?;

    notifier::dispatch(
        state.notifier.clone(),
        "roi-report",
        json!({
            "email": email,
            "company_name": stored["company_name"],
            "potential_savings": outputs.potential_savings,
            "roi_percentage": outputs.roi_percentage,
        }),
    );

    Ok(Json(json!({
        "success": true,
        "calculation_id": stored["id"],
        "potential_savings": outputs.potential_savings,
        "implementation_cost": outputs.implementation_cost,
        "roi_percentage": outputs.roi_percentage,
        "payback_period_months": outputs.payback_period_months,
        "user_region": stored["user_region"],
        "timestamp": now_utc_string(),
    })))
}
