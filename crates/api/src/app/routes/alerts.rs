use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_core::AlertId;
use stockledger_inventory::AlertRule;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CompanyContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_alerts))
        .route("/generate", post(generate_alerts))
        .route("/:id/acknowledge", post(acknowledge_alert))
        .route("/:id/dismiss", post(dismiss_alert))
}

pub async fn generate_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Query(query): Query<dto::GenerateAlertsQuery>,
) -> axum::response::Response {
    let tenant_id = company.tenant_id();
    let result = services
        .run(move |engine| match query.as_of {
            Some(day) => engine.generate_alerts_at(tenant_id, day),
            None => engine.generate_alerts(tenant_id),
        })
        .await;

    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Query(query): Query<dto::AlertsQuery>,
) -> axum::response::Response {
    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.list_alerts(tenant_id, query.status))
        .await
    {
        Ok(alerts) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "count": alerts.len(),
                "alerts": alerts,
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn acknowledge_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let alert_id: AlertId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.acknowledge_alert(tenant_id, alert_id))
        .await
    {
        Ok(alert) => (StatusCode::OK, Json(alert)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn dismiss_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let alert_id: AlertId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.dismiss_alert(tenant_id, alert_id))
        .await
    {
        Ok(alert) => (StatusCode::OK, Json(alert)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_alert_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
) -> axum::response::Response {
    let tenant_id = company.tenant_id();
    match services.run(move |engine| engine.alert_rule(tenant_id)).await {
        Ok(rule) => (StatusCode::OK, Json(rule)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn put_alert_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    payload: Result<Json<AlertRule>, JsonRejection>,
) -> axum::response::Response {
    let rule = match errors::read_body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.set_alert_rule(tenant_id, rule))
        .await
    {
        Ok(rule) => (StatusCode::OK, Json(rule)).into_response(),
        Err(resp) => resp,
    }
}
