use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use stockledger_inventory::PricingInput;

use crate::app::errors;
use crate::app::services::AppServices;

/// Net/tax/gross plus margin and markup for a price, without touching the ledger.
pub async fn preview(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<PricingInput>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::read_body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.run(move |engine| engine.pricing_preview(&body)).await {
        Ok(breakdown) => (StatusCode::OK, Json(breakdown)).into_response(),
        Err(resp) => resp,
    }
}
