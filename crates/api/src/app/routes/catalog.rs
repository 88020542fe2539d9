//! Registration endpoints for the in-memory catalog behind the engine's product,
//! location and batch ports.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use stockledger_inventory::Batch;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::CompanyContext;

pub fn router() -> Router {
    Router::new()
        .route("/products", post(register_product))
        .route("/locations", post(register_location))
        .route("/batches", post(register_batch))
}

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    payload: Result<Json<dto::RegisterProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::read_body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let product = body.into_snapshot();
    services
        .catalog()
        .upsert_product(company.tenant_id(), product.clone());
    tracing::debug!(company_id = %company.tenant_id(), product_id = %product.product_id, "product registered");
    (StatusCode::CREATED, Json(product)).into_response()
}

pub async fn register_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    payload: Result<Json<dto::RegisterLocationRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::read_body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let location = body.into_record();
    services
        .catalog()
        .upsert_location(company.tenant_id(), location.clone());
    tracing::debug!(company_id = %company.tenant_id(), location_id = %location.location_id, "location registered");
    (StatusCode::CREATED, Json(location)).into_response()
}

pub async fn register_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    payload: Result<Json<Batch>, JsonRejection>,
) -> axum::response::Response {
    let batch = match errors::read_body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    services
        .catalog()
        .upsert_batch(company.tenant_id(), batch.clone());
    tracing::debug!(
        company_id = %company.tenant_id(),
        product_id = %batch.product_id,
        batch_number = %batch.batch_number,
        "batch registered"
    );
    (StatusCode::CREATED, Json(batch)).into_response()
}
