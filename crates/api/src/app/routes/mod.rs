use axum::{
    Router,
    routing::{get, post},
};

pub mod alerts;
pub mod balances;
pub mod catalog;
pub mod movements;
pub mod pricing;
pub mod system;
pub mod transfers;

/// Router for all company-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/movements", movements::router())
        .nest("/transfers", transfers::router())
        .nest("/balances", balances::router())
        .nest("/alerts", alerts::router())
        .route(
            "/alert-rule",
            get(alerts::get_alert_rule).put(alerts::put_alert_rule),
        )
        .route("/pricing/preview", post(pricing::preview))
        .nest("/catalog", catalog::router())
}
