//! Admin surface: the aggregate listing that powers the dashboard and the
//! targeted delete endpoint. Both sit behind stricter rate limits than
//! the public forms; cache-busting headers are applied by the fairing.

use rocket::form::FromForm;
use rocket::serde::json::Json;
use rocket::{delete, get, State};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::api::with_deadline;
use crate::error::ApiError;
use crate::rate_limit::{AdminDeleteLimit, AdminReadLimit};
use crate::server::ServerState;
use crate::store::{now_utc_string, Collection};

/// Per-collection cap on the admin listing.
pub const LIST_CAP: i64 = 100;

/// Listing order and display key per collection.
const OVERVIEW: [(Collection, &str, &str); 5] = [
    (Collection::NewsletterSubscriptions, "newsletters", "newsletters"),
    (Collection::ContactMessages, "contact_messages", "contact_messages"),
    (Collection::AiAssessmentLeads, "ai_assessments", "ai_assessment_leads"),
    (Collection::RoiCalculatorLeads, "roi_calculators", "roi_calculator_leads"),
    (Collection::ConsultationLeads, "consultations", "consultation_leads"),
];

/// Aggregate listing: per-collection counts plus the most recent records,
/// newest first, capped at `LIST_CAP`. `summary.total_leads` is the sum
/// of the breakdown counts taken in the same pass.
#[get("/admin")]
pub async fn admin_overview(
    _limit: AdminReadLimit,
    state: &State<ServerState>,
) -> Result<Json<Value>, ApiError> {
    let mut breakdown = Map::new();
    let mut data = Map::new();
    let mut total_leads: i64 = 0;

    for (collection, count_key, data_key) in OVERVIEW {
        let count = with_deadline(state.store.count(collection)).await?;
        let records =
            with_deadline(state.store.list(collection, "created_at", true, LIST_CAP)).await?;

        total_leads += count;
        breakdown.insert(count_key.to_string(), json!(count));
        data.insert(data_key.to_string(), Value::Array(records));
    }

    Ok(Json(json!({
        "success": true,
        "timestamp": now_utc_string(),
        "summary": {
            "total_leads": total_leads,
            "breakdown": breakdown,
        },
        "data": data,
    })))
}

#[derive(Debug, FromForm)]
pub struct AdminDeleteQuery {
    #[field(name = "deleteType")]
    pub delete_type: Option<String>,
    pub collection: Option<String>,
    #[field(name = "leadId")]
    pub lead_id: Option<String>,
}

/// Removes records: one by id, a whole collection, or everything. The
/// collection name must be in the closed enum; anything else is a 400.
#[delete("/admin-delete?<query..>")]
pub async fn admin_delete(
    _limit: AdminDeleteLimit,
    state: &State<ServerState>,
    query: AdminDeleteQuery,
) -> Result<Json<Value>, ApiError> {
    match query.delete_type.as_deref() {
        Some("single") => {
            let collection = require_collection(query.collection.as_deref())?;
            let lead_id = query.lead_id.as_deref().filter(|id| !id.is_empty()).ok_or_else(
                || ApiError::bad_request("missing_lead_id", "deleteType=single requires leadId"),
            )?;

            let deleted = with_deadline(state.store.delete_by_id(collection, lead_id)).await?;
            info!(collection = collection.as_str(), lead_id, deleted, "admin single delete");
            Ok(Json(json!({
                "success": true,
                "operation": "single",
                "collection": collection.as_str(),
                "leadId": lead_id,
                "deletedCount": deleted,
                "timestamp": now_utc_string(),
            })))
        }
        Some("collection") => {
            let collection = require_collection(query.collection.as_deref())?;
            let deleted = with_deadline(state.store.delete_all(collection)).await?;
            info!(collection = collection.as_str(), deleted, "admin collection delete");
            Ok(Json(json!({
                "success": true,
                "operation": "collection",
                "collection": collection.as_str(),
                "deletedCount": deleted,
                "timestamp": now_utc_string(),
            })))
        }
        Some("all") => {
            let mut breakdown = Map::new();
            let mut total: usize = 0;
            for collection in Collection::ALL {
                let deleted = with_deadline(state.store.delete_all(collection)).await?;
                total += deleted;
                breakdown.insert(collection.as_str().to_string(), json!(deleted));
            }
            info!(deleted = total, "admin full wipe");
            Ok(Json(json!({
                "success": true,
                "operation": "all",
                "deletedCount": total,
                "breakdown": breakdown,
                "timestamp": now_utc_string(),
            })))
        }
        _ => Err(ApiError::bad_request(
            "invalid_delete_type",
            "deleteType must be one of: single, collection, all",
        )),
    }
}

fn require_collection(name: Option<&str>) -> Result<Collection, ApiError> {
    name.and_then(Collection::from_name).ok_or_else(|| {
        ApiError::bad_request(
            "invalid_collection",
            "collection must name one of the lead collections",
        )
    })
}
