use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    auth::require_internal_key,
    billing::batch::MonthlyRunOptions,
    billing::cycle::BillingPeriod,
    error::{AppError, AppResult},
    repository::table_service::list_rows,
    schemas::{
        clamp_limit_in_range, optional_period, validate_input, BatchGenerateInput,
        GenerateInvoiceInput, InvoicePath, InvoicesQuery, MonthlyRunInput,
    },
    state::{billing_engine, db_pool, AppState},
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/invoices", axum::routing::get(list_invoices))
        .route("/invoices/generate", axum::routing::post(generate_invoice))
        .route(
            "/invoices/generate-batch",
            axum::routing::post(generate_batch),
        )
        .route("/invoices/run-monthly", axum::routing::post(run_monthly))
        .route("/invoices/{invoice_id}", axum::routing::get(get_invoice))
}

/// Single-lease generation. Always idempotent per period; force
/// regeneration is only reachable through the batch path.
async fn generate_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GenerateInvoiceInput>,
) -> AppResult<impl IntoResponse> {
    require_internal_key(&state, &headers)?;
    validate_input(&payload)?;

    let period = optional_period(payload.period_start, payload.period_end)?;
    let custom_items = if payload.items.is_empty() {
        None
    } else {
        Some(payload.items.clone())
    };

    let engine = billing_engine(&state)?;
    let invoice = engine
        .generate_invoice_for_lease(
            &payload.lease_id,
            &payload.organization_id,
            period,
            custom_items,
        )
        .await?;

    Ok((axum::http::StatusCode::CREATED, Json(json!({ "invoice": invoice }))))
}

/// Per-organization batch for an explicit period. One lease's failure is
/// reported in its result entry and never aborts the run.
async fn generate_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BatchGenerateInput>,
) -> AppResult<Json<Value>> {
    require_internal_key(&state, &headers)?;
    validate_input(&payload)?;

    let engine = billing_engine(&state)?;
    let results = engine
        .generate_invoices_for_leases(
            &payload.organization_id,
            BillingPeriod::new(payload.period_start, payload.period_end),
            payload.force_regenerate,
        )
        .await?;

    let total = results.len();
    let successful = results.iter().filter(|result| result.success).count();

    Ok(Json(json!({
        "total": total,
        "successful": successful,
        "failed": total - successful,
        "data": results,
    })))
}

/// Multi-tenant scheduled path, also invocable by operators. Defaults to
/// the current calendar month and all active organizations.
async fn run_monthly(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MonthlyRunInput>,
) -> AppResult<Json<Value>> {
    require_internal_key(&state, &headers)?;

    let period = optional_period(payload.period_start, payload.period_end)?;
    let engine = billing_engine(&state)?;
    let summaries = engine
        .run_monthly_invoice_generation(MonthlyRunOptions {
            organization_id: payload.organization_id.clone(),
            period,
            auto_send: payload.auto_send,
            force_regenerate: payload.force_regenerate,
        })
        .await?;

    Ok(Json(json!({ "data": summaries })))
}

async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoicesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_internal_key(&state, &headers)?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    filters.insert(
        "organization_id".to_string(),
        Value::String(query.org_id.clone()),
    );
    if let Some(lease_id) = non_empty_opt(query.lease_id.as_deref()) {
        filters.insert("lease_id".to_string(), Value::String(lease_id));
    }
    if let Some(status) = non_empty_opt(query.status.as_deref()) {
        filters.insert("status".to_string(), Value::String(status));
    }

    let rows = list_rows(
        pool,
        "invoices",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 1000),
        0,
        "period_start",
        false,
    )
    .await?;

    Ok(Json(json!({ "data": rows })))
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(path): Path<InvoicePath>,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_internal_key(&state, &headers)?;

    let engine = billing_engine(&state)?;
    let invoice = engine
        .find_invoice(&path.invoice_id, &query.org_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice not found.".to_string()))?;

    Ok(Json(json!({ "invoice": invoice })))
}

#[derive(Debug, Clone, serde::Deserialize)]
struct OrgQuery {
    org_id: String,
}

fn non_empty_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
}
