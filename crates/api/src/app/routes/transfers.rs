use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_core::TransferId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CompanyContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_transfer))
        .route("/:id", get(get_transfer))
        .route("/:id/status", post(update_transfer_status))
}

pub async fn create_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    payload: Result<Json<dto::CreateTransferRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::read_body(payload).and_then(|req| {
        req.into_input().map_err(errors::domain_error_to_response)
    }) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.create_transfer(tenant_id, body))
        .await
    {
        Ok(transfer) => (StatusCode::CREATED, Json(transfer)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transfer_id: TransferId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.get_transfer(tenant_id, transfer_id))
        .await
    {
        Ok(transfer) => (StatusCode::OK, Json(transfer)).into_response(),
        Err(resp) => resp,
    }
}

/// Drive the transfer to `status`. Shipping debits the source; completing
/// credits the destination; cancelling an in-transit transfer restores the source.
pub async fn update_transfer_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::UpdateTransferStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::read_body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let transfer_id: TransferId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.update_transfer_status(tenant_id, transfer_id, body.status))
        .await
    {
        Ok(transfer) => (StatusCode::OK, Json(transfer)).into_response(),
        Err(resp) => resp,
    }
}
