//! Bearer-token check against the service API key. Applied to every /v1
//! route; `/health` stays open for probes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;
use crate::state::AppState;

pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match token {
        Some(token) if !token.is_empty() && token == state.config.service_api_key => {
            Ok(next.run(request).await)
        }
        _ => Err(AppError::Unauthorized),
    }
}
