use axum::routing::get;
use axum::Router;
use pathdb_protocol::endpoints;
use tower_http::trace::TraceLayer;

use crate::gateway;
use crate::handler;
use crate::state::AppState;

/// Build the axum router with the service and object endpoints.
///
/// The `/v1/...` paths shadow a bucket named `v1`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::INFO, get(handler::info_handler))
        .route("/:bucket", get(gateway::list_bucket))
        .route("/:bucket/", get(gateway::list_bucket))
        .route(
            "/:bucket/*key",
            get(gateway::get_object)
                .put(gateway::put_object)
                .post(gateway::put_object)
                .delete(gateway::delete_object),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
