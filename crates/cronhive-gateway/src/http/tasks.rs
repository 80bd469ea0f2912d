//! Task management endpoints, mounted under `server.base_path`.
//!
//! Engine errors become `{"error": "..."}` bodies: validation failures are
//! 400, unknown IDs are 404.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use cronhive_scheduler::{CreateTask, LogEntry, SchedulerError, TaskId, TaskView};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<T, ApiError>;

fn api_error(err: SchedulerError) -> ApiError {
    let status = match &err {
        SchedulerError::InvalidTask(_) | SchedulerError::InvalidCron(_) => StatusCode::BAD_REQUEST,
        SchedulerError::TaskNotFound { .. } => StatusCode::NOT_FOUND,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

/// GET /tasks
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskView>> {
    Json(state.scheduler.list())
}

/// POST /tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateTask>, JsonRejection>,
) -> ApiResult<Json<TaskView>> {
    let Json(request) = body.map_err(|e| {
        warn!(error = %e, "rejected task body");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: format!("invalid request body: {}", e.body_text()),
            }),
        )
    })?;
    state.scheduler.create(request).map(Json).map_err(api_error)
}

/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskView>> {
    state.scheduler.get(&TaskId::from(id)).map(Json).map_err(api_error)
}

/// DELETE /tasks/{id}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.scheduler.delete(&TaskId::from(id)).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /tasks/{id}/run. Waits for the command to finish.
pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskView>> {
    state
        .scheduler
        .run_now(&TaskId::from(id))
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /tasks/{id}/toggle
pub async fn toggle_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskView>> {
    state.scheduler.toggle(&TaskId::from(id)).map(Json).map_err(api_error)
}

/// GET /tasks/{id}/logs, newest first.
pub async fn task_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    state.scheduler.logs(&TaskId::from(id)).map(Json).map_err(api_error)
}

/// POST /tasks/{id}/logs/clear
pub async fn clear_task_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.scheduler.clear_logs(&TaskId::from(id)).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_router;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        Router,
    };
    use cronhive_core::config::{CronhiveConfig, ExecutorConfig};
    use cronhive_scheduler::ShellExecutor;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BASE: &str = "/zima_cron";

    fn router() -> Router {
        let config = CronhiveConfig {
            executor: ExecutorConfig {
                login_shell: false,
                timeout_secs: 10,
                ..ExecutorConfig::default()
            },
            ..CronhiveConfig::default()
        };
        let runner = Arc::new(ShellExecutor::new(config.executor.clone()));
        let scheduler = cronhive_scheduler::TaskScheduler::new(runner, &config.scheduler);
        build_router(Arc::new(AppState::new(config, scheduler)))
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create(router: &Router, body: Value) -> Value {
        let (status, json) = send(router, "POST", &format!("{BASE}/tasks"), Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        json
    }

    #[tokio::test]
    async fn health_is_mounted_at_root() {
        let (status, json) = send(&router(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn create_list_get_delete() {
        let router = router();
        let task = create(
            &router,
            json!({"name": "hello", "command": "echo hi", "type": "interval", "interval_min": 5}),
        )
        .await;
        assert_eq!(task["status"], "running");
        assert_eq!(task["interval_ms"], 300_000);
        assert!(task["next_run_at"].as_i64().unwrap() > 0);
        let id = task["id"].as_str().unwrap().to_string();

        let (status, list) = send(&router, "GET", &format!("{BASE}/tasks"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, got) = send(&router, "GET", &format!("{BASE}/tasks/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(got["name"], "hello");

        let (status, _) = send(&router, "DELETE", &format!("{BASE}/tasks/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&router, "GET", &format!("{BASE}/tasks/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains(&id));
    }

    #[tokio::test]
    async fn validation_errors_are_bad_request() {
        let router = router();
        let uri = format!("{BASE}/tasks");

        let (status, body) = send(
            &router,
            "POST",
            &uri,
            Some(json!({"name": "x", "command": "true", "type": "interval", "interval_min": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = send(
            &router,
            "POST",
            &uri,
            Some(json!({"name": "x", "command": "true", "type": "cron", "cron_expr": "* * *"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, "POST", &uri, Some(json!({"name": "", "command": "true", "type": "cron"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &router,
            "POST",
            &uri,
            Some(json!({"name": "x", "command": "true", "type": "interval", "interval_min": i64::MAX})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // accepted: a huge cron step just yields a sparse field
        create(
            &router,
            json!({"name": "y", "command": "true", "type": "cron", "cron_expr": "0 0 */4294967295 * *"}),
        )
        .await;

        let (_, list) = send(&router, "GET", &uri, None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let router = router();
        let request = Request::builder()
            .method("POST")
            .uri(format!("{BASE}/tasks"))
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn run_now_records_logs_and_clear_empties_them() {
        let router = router();
        let task = create(
            &router,
            json!({"name": "echo", "command": "echo from-run", "type": "cron", "cron_expr": "0 0 1 1 *"}),
        )
        .await;
        let id = task["id"].as_str().unwrap();

        let (status, logs) = send(&router, "GET", &format!("{BASE}/tasks/{id}/logs"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logs, json!([]));

        let (status, view) = send(&router, "POST", &format!("{BASE}/tasks/{id}/run"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["last_result"]["success"], true);
        assert_eq!(view["last_result"]["message"], "from-run");
        assert!(view["last_run_at"].as_i64().unwrap() > 0);

        let (_, logs) = send(&router, "GET", &format!("{BASE}/tasks/{id}/logs"), None).await;
        assert_eq!(logs.as_array().unwrap().len(), 1);
        assert_eq!(logs[0]["message"], "from-run");

        let (status, _) = send(&router, "POST", &format!("{BASE}/tasks/{id}/logs/clear"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, logs) = send(&router, "GET", &format!("{BASE}/tasks/{id}/logs"), None).await;
        assert_eq!(logs, json!([]));
    }

    #[tokio::test]
    async fn toggle_flips_status() {
        let router = router();
        let task = create(
            &router,
            json!({"name": "t", "command": "true", "type": "interval", "interval_min": 1}),
        )
        .await;
        let uri = format!("{BASE}/tasks/{}/toggle", task["id"].as_str().unwrap());

        let (_, paused) = send(&router, "POST", &uri, None).await;
        assert_eq!(paused["status"], "paused");
        assert_eq!(paused["next_run_at"], 0);

        let (_, running) = send(&router, "POST", &uri, None).await;
        assert_eq!(running["status"], "running");
        assert!(running["next_run_at"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found_everywhere() {
        let router = router();
        for (method, suffix) in [
            ("GET", ""),
            ("DELETE", ""),
            ("POST", "/run"),
            ("POST", "/toggle"),
            ("GET", "/logs"),
            ("POST", "/logs/clear"),
        ] {
            let (status, body) =
                send(&router, method, &format!("{BASE}/tasks/nope{suffix}"), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {suffix}");
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn routes_are_not_served_outside_base_path() {
        let (status, _) = send(&router(), "GET", "/tasks", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
