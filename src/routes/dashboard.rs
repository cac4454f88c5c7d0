use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::models::analytics::DashboardView;
use crate::services::api::ForensicApi;

/// GET /api/v1/dashboard — aggregate job counters.
///
/// Never fails: a broken refresh shows up as `degraded` with the last
/// known counters.
pub async fn get_dashboard<A: ForensicApi>(
    State(state): State<AppState<A>>,
) -> Json<DashboardView> {
    Json(state.dashboard.current())
}
