use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockledger_core::TenantId;

use crate::app::errors;
use crate::context::CompanyContext;

/// Header carrying the company every request is scoped to.
pub const COMPANY_HEADER: &str = "x-company-id";

/// Resolve the company scope from `X-Company-Id` and attach it to the request.
pub async fn company_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let tenant_id = extract_company(req.headers())?;
    req.extensions_mut().insert(CompanyContext::new(tenant_id));
    Ok(next.run(req).await)
}

fn extract_company(headers: &HeaderMap) -> Result<TenantId, Response> {
    let raw = headers
        .get(COMPANY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "MISSING_COMPANY_ID",
                "X-Company-Id header is required",
            )
        })?;

    raw.parse::<TenantId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "INVALID_COMPANY_ID", e.to_string()))
}
