use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockledger_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CompanyContext;

pub fn router() -> Router {
    Router::new()
        .route("/:product_id", get(get_balance))
        .route("/:product_id/movements", get(list_movements))
}

/// Balance of a product at `location_id`, or its location-less balance when the
/// query omits it. Never-touched balances read as zero.
pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Path(product_id): Path<String>,
    Query(query): Query<dto::LocationQuery>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.get_balance(tenant_id, product_id, query.location_id))
        .await
    {
        Ok(balance) => (StatusCode::OK, Json(balance)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(company): Extension<CompanyContext>,
    Path(product_id): Path<String>,
    Query(query): Query<dto::LocationQuery>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tenant_id = company.tenant_id();
    match services
        .run(move |engine| engine.list_movements(tenant_id, product_id, query.location_id))
        .await
    {
        Ok(movements) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "count": movements.len(),
                "movements": movements,
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}
