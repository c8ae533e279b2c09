use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers, state::AppState};

pub fn build_router(state: AppState) -> Router {
    // The wizard runs inside an iframe on the wiki's origin.
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/healthz", get(handlers::healthcheck))
        .route(
            "/lug/submit",
            get(handlers::legacy_submit_query).post(handlers::legacy_submit_form),
        )
        .route("/api/v1/groups/dispatch", post(handlers::dispatch_group))
        .route("/api/v1/groups/:token", get(handlers::get_group))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
