use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::Router;
use serde::Deserialize;

use crate::extractors::JsonBody;
use crate::remote::types::ComboDefinition;
use crate::response::{created, ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_combos).post(register_combo))
        .route("/progress", get(progress))
        .route("/:id", get(get_combo).delete(remove_combo))
        .route("/:id/enabled", put(set_enabled))
}

async fn list_combos(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let combos = state.session().lock().await.remote.combos().list();
    ok(combos)
}

async fn get_combo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let session = state.session().lock().await;
    let combo = session
        .remote
        .combos()
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::not_found(&format!("Combo '{id}' not found")))?;
    Ok(ok(combo))
}

/// Registering an existing id replaces that combo. Definitions arriving over
/// the API are always custom.
async fn register_combo(
    State(state): State<AppState>,
    JsonBody(def): JsonBody<ComboDefinition>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let mut def = def.custom();
    if def.name.trim().is_empty() {
        def.name = def.id.clone();
    }
    state
        .session()
        .lock()
        .await
        .remote
        .combos_mut()
        .register(def.clone())?;
    Ok(created(def))
}

async fn remove_combo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let removed = state.session().lock().await.remote.combos_mut().remove(&id)?;
    Ok(ok(removed))
}

#[derive(Debug, Deserialize)]
struct EnabledRequest {
    enabled: bool,
}

async fn set_enabled(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<EnabledRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let mut session = state.session().lock().await;
    session.remote.combos_mut().set_enabled(&id, req.enabled)?;
    let combo = session.remote.combos().get(&id).cloned();
    Ok(ok(combo))
}

async fn progress(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let session = state.session().lock().await;
    ok(session.remote.combo_progress(&session.settings))
}
