use axum::http::HeaderMap;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

const INTERNAL_KEY_HEADER: &str = "x-internal-api-key";

/// Gate operational endpoints behind the shared internal key. Outside
/// production a missing key configuration is allowed so local setups work
/// without secrets.
pub fn require_internal_key(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let Some(expected) = state.config.internal_api_key.as_deref() else {
        if state.config.is_production() {
            return Err(AppError::Dependency(
                "INTERNAL_API_KEY is not configured.".to_string(),
            ));
        }
        return Ok(());
    };

    let provided = headers
        .get(INTERNAL_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    if provided.is_empty() {
        return Err(AppError::Unauthorized(
            "Missing internal API key.".to_string(),
        ));
    }
    if provided != expected {
        return Err(AppError::Unauthorized(
            "Invalid internal API key.".to_string(),
        ));
    }
    Ok(())
}
