use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_core::MovementId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::CompanyContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_movement))
        .route("/:id", get(get_movement))
        .route("/:id/approve", post(approve_movement))
        .route("/:id/reject", post(reject_movement))
}

pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    payload: Result<Json<dto::CreateMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::read_body(payload).and_then(|req| {
        req.into_input().map_err(errors::domain_error_to_response)
    }) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.create_movement(tenant_id, body))
        .await
    {
        Ok(movement) => (StatusCode::CREATED, Json(movement)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let movement_id: MovementId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.get_movement(tenant_id, movement_id))
        .await
    {
        Ok(movement) => (StatusCode::OK, Json(movement)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn approve_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let movement_id: MovementId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.approve_movement(tenant_id, movement_id))
        .await
    {
        Ok(movement) => (StatusCode::OK, Json(movement)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn reject_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let movement_id: MovementId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.reject_movement(tenant_id, movement_id))
        .await
    {
        Ok(movement) => (StatusCode::OK, Json(movement)).into_response(),
        Err(resp) => resp,
    }
}
