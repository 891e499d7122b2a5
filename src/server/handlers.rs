//! HTTP request handlers

use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::data::HospitalId;
use crate::federation::Federation;

use super::error::{Result, ServerError};
use super::state::AppState;

/// Run a blocking federation operation off the async runtime
async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Federation) -> crate::error::Result<T> + Send + 'static,
{
    let federation = Arc::clone(&state.federation);
    let result = tokio::task::spawn_blocking(move || op(&federation))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(result?)
}

/// Hospital id from the URL; malformed ids get the JSON error body
type HospitalPath = std::result::Result<Path<HospitalId>, PathRejection>;

pub async fn train_local(
    State(state): State<Arc<AppState>>,
    hospital: HospitalPath,
) -> Result<Json<Value>> {
    let Path(hospital_id) = hospital?;
    let accuracy = run_blocking(&state, move |f| f.train_local(hospital_id)).await?;
    Ok(Json(json!({
        "success": true,
        "hospital_id": hospital_id,
        "local_accuracy": accuracy,
    })))
}

pub async fn aggregate(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let report = run_blocking(&state, |f| f.aggregate_report()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Central model aggregated",
        "global_accuracy": report.global_accuracy,
        "hospital_accuracies": report.hospital_accuracies,
        "contributors": report.contributors,
        "n_trees": report.n_trees,
        "mode": report.mode,
    })))
}

pub async fn train_with_global(
    State(state): State<Arc<AppState>>,
    hospital: HospitalPath,
) -> Result<Json<Value>> {
    let Path(hospital_id) = hospital?;
    let accuracy = run_blocking(&state, move |f| f.train_with_global(hospital_id)).await?;
    Ok(Json(json!({
        "success": true,
        "hospital_id": hospital_id,
        "global_accuracy": accuracy,
    })))
}

pub async fn train_all_with_global(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let results = run_blocking(&state, |f| f.train_all_with_global()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "All hospitals trained with global model",
        "results": results,
    })))
}

pub async fn reset_data(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    run_blocking(&state, |f| f.reset_distribution()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Hospital data has been randomly redistributed",
    })))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let status = run_blocking(&state, |f| Ok(f.status())).await?;
    Ok(Json(json!({
        "success": true,
        "status": status,
        "uptime_secs": chrono::Utc::now()
            .signed_duration_since(state.started_at)
            .num_seconds(),
    })))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
