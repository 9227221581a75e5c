//! HTTP API server with observability for the duel engine.
//!
//! Provides REST endpoints for opening, joining, rolling and cancelling
//! duels, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use duel_store::DuelStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    DuelCoordinator, DuelQueries, InMemoryCustodyService, InMemoryEventPublisher,
    RandomDiceService,
};
use scheduler::AutoRollScheduler;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::duels::{AppState, Coordinator};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, Sc>(state: Arc<AppState<S, Sc>>, metrics_handle: PrometheusHandle) -> Router
where
    S: DuelStore + 'static,
    Sc: AutoRollScheduler + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/duels",
            post(routes::duels::create::<S, Sc>).get(routes::duels::list::<S, Sc>),
        )
        .route("/duels/{id}", get(routes::duels::get::<S, Sc>))
        .route("/duels/{id}/join", post(routes::duels::join::<S, Sc>))
        .route("/duels/{id}/roll", post(routes::duels::roll::<S, Sc>))
        .route("/duels/{id}/cancel", post(routes::duels::cancel::<S, Sc>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around a store and scheduler, with
/// in-process custody, dice and event publishing.
pub fn create_state<S, Sc>(store: S, scheduler: Sc) -> Arc<AppState<S, Sc>>
where
    S: DuelStore + Clone + 'static,
    Sc: AutoRollScheduler + 'static,
{
    let custody = InMemoryCustodyService::new();
    let publisher = InMemoryEventPublisher::new();
    let coordinator: Coordinator<S, Sc> = DuelCoordinator::new(
        store.clone(),
        custody.clone(),
        RandomDiceService,
        scheduler,
        publisher.clone(),
    );

    Arc::new(AppState {
        coordinator,
        queries: DuelQueries::new(store),
        custody,
        publisher,
    })
}
