use std::time::Duration;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    // Bounded so the probe answers quickly even when the first pooled
    // connection hangs on DNS or TLS.
    let db_ok = match &state.db_pool {
        Some(pool) => matches!(
            tokio::time::timeout(Duration::from_secs(3), sqlx::query("SELECT 1").fetch_one(pool))
                .await,
            Ok(Ok(_))
        ),
        None => true,
    };

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "app": state.config.app_name,
        "environment": state.config.environment,
        "db": db_ok,
        "now": Utc::now().to_rfc3339(),
    }))
}
