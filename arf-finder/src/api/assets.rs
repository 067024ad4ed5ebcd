//! Relationship lookup endpoints
//!
//! One POST endpoint per root kind. The fan-out kinds resolve their root,
//! build a fetch plan and hand it to the kind's aggregator; the automation
//! lookup is a plain sequential chain.

use super::{cookie_value, ENTERPRISE_COOKIE};
use crate::engine::resolve::{resolve_data_extension, resolve_email};
use crate::engine::{Aggregation, Report, Selection};
use crate::error::{ApiError, ApiResult};
use crate::reports::{
    find_automations, ActivityType, AutomationReport, CloudPagePlan, CloudPageReport,
    DataExtensionPlan, DataExtensionReport, EmailPlan, EmailReport,
};
use crate::source::{DataExtensionLookup, EmailLookup};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct DataExtensionRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "customerKey")]
    pub customer_key: String,
    #[serde(default, rename = "userselection", alias = "userSelection")]
    pub user_selection: HashMap<String, bool>,
}

#[derive(Debug, Deserialize)]
pub struct CloudPageRequest {
    #[serde(default, rename = "cloudPageID")]
    pub cloud_page_id: String,
    #[serde(default, rename = "userselection", alias = "userSelection")]
    pub user_selection: HashMap<String, bool>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default, rename = "ID")]
    pub id: String,
    #[serde(default, rename = "Name")]
    pub name: String,
    #[serde(default, rename = "userSelection", alias = "userselection")]
    pub user_selection: HashMap<String, bool>,
}

#[derive(Debug, Deserialize)]
pub struct AutomationActivityRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "activityType")]
    pub activity_type: String,
}

/// Report fields plus the resolved root name and completeness
#[derive(Debug, Serialize)]
pub struct AssetResponse<R: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub report: R,
    pub complete: bool,
    pub unsettled: Vec<&'static str>,
}

impl<R: Report + Serialize> AssetResponse<R> {
    fn new(name: Option<String>, aggregation: Aggregation<R>) -> Self {
        Self {
            name,
            report: aggregation.report,
            complete: aggregation.complete,
            unsettled: aggregation.unsettled,
        }
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// POST /data-extension-detail
pub async fn data_extension_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DataExtensionRequest>, JsonRejection>,
) -> ApiResult<Json<AssetResponse<DataExtensionReport>>> {
    let enterprise_id = cookie_value(&headers, ENTERPRISE_COOKIE)
        .ok_or_else(|| ApiError::Unauthorized("entID not found".to_string()))?;
    let req = body(payload)?;

    let lookup = if !req.name.is_empty() {
        DataExtensionLookup::Name(req.name)
    } else if !req.customer_key.is_empty() {
        DataExtensionLookup::CustomerKey(req.customer_key)
    } else {
        return Err(ApiError::BadRequest(
            "either name or customerKey is required".to_string(),
        ));
    };

    let resolved = resolve_data_extension(state.source.as_ref(), &lookup, &enterprise_id).await?;
    let de = resolved.entity;
    info!(
        name = %de.name,
        shared = resolved.scope.is_shared(),
        "Data extension detail requested"
    );

    let root_id = de.object_id.clone();
    let name = de.name.clone();
    let selection = Selection::from_flags(&req.user_selection);
    let plan = DataExtensionPlan::new(state.source.clone(), de, resolved.scope.is_shared());

    let aggregation = state
        .data_extensions
        .run(&root_id, &selection, Arc::new(plan))
        .await?;
    Ok(Json(AssetResponse::new(Some(name), aggregation)))
}

/// POST /cloud-page-detail
pub async fn cloud_page_detail(
    State(state): State<AppState>,
    payload: Result<Json<CloudPageRequest>, JsonRejection>,
) -> ApiResult<Json<AssetResponse<CloudPageReport>>> {
    let req = body(payload)?;
    if req.cloud_page_id.is_empty() {
        return Err(ApiError::BadRequest("cloudPageID is required".to_string()));
    }
    info!(cloud_page_id = %req.cloud_page_id, "Cloud page detail requested");

    let selection = Selection::from_flags(&req.user_selection);
    let plan = CloudPagePlan::new(state.source.clone(), req.cloud_page_id.as_str());

    let aggregation = state
        .cloud_pages
        .run(&req.cloud_page_id, &selection, Arc::new(plan))
        .await?;
    Ok(Json(AssetResponse::new(None, aggregation)))
}

/// POST /email-detail
pub async fn email_detail(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> ApiResult<Json<AssetResponse<EmailReport>>> {
    let req = body(payload)?;
    let lookup = if !req.id.is_empty() {
        EmailLookup::LegacyId(req.id)
    } else if !req.name.is_empty() {
        EmailLookup::Name(req.name)
    } else {
        return Err(ApiError::BadRequest("either ID or Name is required".to_string()));
    };

    let email = resolve_email(state.source.as_ref(), &lookup).await?;
    info!(email_id = %email.id, name = %email.name, "Email detail requested");

    let root_id = email.id.clone();
    let name = email.name.clone();
    let selection = Selection::from_flags(&req.user_selection);
    let plan = EmailPlan::new(state.source.clone(), email);

    let aggregation = state
        .emails
        .run(&root_id, &selection, Arc::new(plan))
        .await?;
    Ok(Json(AssetResponse::new(Some(name), aggregation)))
}

/// POST /automation-activity-detail
pub async fn automation_activity_detail(
    State(state): State<AppState>,
    payload: Result<Json<AutomationActivityRequest>, JsonRejection>,
) -> ApiResult<Json<AutomationReport>> {
    let req = body(payload)?;
    let activity_type: ActivityType = req.activity_type.parse()?;
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }

    let report = find_automations(state.source.as_ref(), activity_type, &req.name).await?;
    Ok(Json(report))
}

/// Build asset lookup routes
pub fn asset_routes() -> Router<AppState> {
    Router::new()
        .route("/data-extension-detail", post(data_extension_detail))
        .route("/cloud-page-detail", post(cloud_page_detail))
        .route("/email-detail", post(email_detail))
        .route(
            "/automation-activity-detail",
            post(automation_activity_detail),
        )
}
