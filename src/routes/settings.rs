use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::config::SettingsView;
use crate::services::api::ForensicApi;

/// GET /api/v1/settings — connection and retention settings in effect.
pub async fn get_settings<A: ForensicApi>(State(state): State<AppState<A>>) -> Json<SettingsView> {
    Json(state.config.settings_view())
}
