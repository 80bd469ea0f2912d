use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use cronhive_core::config::CronhiveConfig;
use cronhive_scheduler::TaskScheduler;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::http::{health, tasks};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CronhiveConfig,
    pub scheduler: TaskScheduler,
}

impl AppState {
    pub fn new(config: CronhiveConfig, scheduler: TaskScheduler) -> Self {
        Self { config, scheduler }
    }
}

/// Assemble the full Axum router. Task routes live under `server.base_path`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let task_routes = Router::new()
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/{id}",
            get(tasks::get_task).delete(tasks::delete_task),
        )
        .route("/tasks/{id}/run", post(tasks::run_task))
        .route("/tasks/{id}/toggle", post(tasks::toggle_task))
        .route("/tasks/{id}/logs", get(tasks::task_logs))
        .route("/tasks/{id}/logs/clear", post(tasks::clear_task_logs));

    let base_path = normalize_base_path(&state.config.server.base_path);
    let router = match base_path {
        Some(base) => Router::new().nest(&base, task_routes),
        None => task_routes,
    };

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    router
        .route("/health", get(health::health_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// `"/zima_cron/"` → `Some("/zima_cron")`, `""` or `"/"` → `None` (mount at root).
fn normalize_base_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{trimmed}"))
    }
}
