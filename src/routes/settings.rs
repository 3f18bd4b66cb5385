use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::extractors::JsonBody;
use crate::remote::settings::RemoteControlSettings;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsResponse {
    settings: RemoteControlSettings,
    /// Fields that were out of range and clamped on the way in.
    clamped: Vec<&'static str>,
}

async fn get_settings(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let settings = state.session().lock().await.settings.clone();
    ok(settings)
}

/// Replace the settings. Every field has a default, so a partial body resets
/// the omitted fields; out-of-range values are clamped rather than refused.
async fn update_settings(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RemoteControlSettings>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let (settings, clamped) = req.sanitized();
    {
        let mut session = state.session().lock().await;
        if session.settings.enabled != settings.enabled {
            tracing::info!(enabled = settings.enabled, "Remote control toggled via settings");
        }
        session.remote.apply_settings(&settings);
        session.settings = settings.clone();
    }
    Ok(ok(SettingsResponse { settings, clamped }))
}
