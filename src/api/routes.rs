use crate::config::Config;
use crate::error::JournalError;
use crate::journal::JournalSnapshot;
use crate::registry::catalog::{self, CatalogCategory, CatalogSelection};
use crate::registry::question::Question;
use crate::report::{NO_DATA_MESSAGE, TrendReport};
use crate::service::{JournalService, Submission};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub service: Arc<JournalService>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/catalog", get(catalog_list))
        .route("/api/v1/children", get(children_list).post(children_add))
        .route(
            "/api/v1/children/:child/questions",
            get(questions_get).put(questions_put),
        )
        .route("/api/v1/children/:child/entries", post(entries_submit))
        .route("/api/v1/entries", get(entries_list))
        .route("/api/v1/trends", get(trends))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ChildQuery {
    child: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddChildPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct QuestionsUpdatePayload {
    #[serde(default)]
    predefined: Vec<String>,
    #[serde(default)]
    custom: Vec<Question>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    registry_path: String,
    journal_path: String,
    children: usize,
    rows: usize,
    columns: usize,
    api_port: u16,
}

#[derive(Debug, Serialize)]
struct ChildrenPayload {
    children: Vec<String>,
}

#[derive(Debug, Serialize)]
struct QuestionsPayload {
    child: String,
    questions: Vec<Question>,
    selection: CatalogSelection,
}

#[derive(Debug, Serialize)]
struct EntriesPayload {
    child: Option<String>,
    count: usize,
    #[serde(flatten)]
    snapshot: JournalSnapshot,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let (children, snapshot) = with_service(&state, |service| {
        Ok((service.list_children()?, service.snapshot(None)?))
    })
    .await??;

    Ok(Json(StatusPayload {
        registry_path: state.config.registry_path.display().to_string(),
        journal_path: state.config.journal_path.display().to_string(),
        children: children.len(),
        rows: snapshot.rows.len(),
        columns: snapshot.header.len(),
        api_port: state.config.api_port,
    }))
}

async fn catalog_list() -> Json<&'static [CatalogCategory]> {
    Json(catalog::categories())
}

async fn children_list(State(state): State<ApiState>) -> ApiResult<Json<ChildrenPayload>> {
    let children = with_service(&state, |service| service.list_children()).await??;

    Ok(Json(ChildrenPayload { children }))
}

async fn children_add(
    State(state): State<ApiState>,
    Json(payload): Json<AddChildPayload>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let name = with_service(&state, move |service| service.add_child(&payload.name)).await??;

    Ok((StatusCode::CREATED, Json(json!({ "saved": true, "child": name }))))
}

async fn questions_get(
    State(state): State<ApiState>,
    Path(child): Path<String>,
) -> ApiResult<Json<QuestionsPayload>> {
    let lookup = child.clone();
    let questions = with_service(&state, move |service| {
        if service.registry().contains(&lookup)? {
            service.child_questions(&lookup).map(Some)
        } else {
            Ok(None)
        }
    })
    .await??
    .ok_or_else(|| ApiError::NotFound(format!("Unknown child: {child}")))?;
    let selection = catalog::split_selection(&questions);

    Ok(Json(QuestionsPayload {
        child: child.trim().to_string(),
        questions,
        selection,
    }))
}

async fn questions_put(
    State(state): State<ApiState>,
    Path(child): Path<String>,
    Json(payload): Json<QuestionsUpdatePayload>,
) -> ApiResult<Json<Value>> {
    let target = child.clone();
    let questions = with_service(&state, move |service| {
        service.set_questions(&target, &payload.predefined, &payload.custom)
    })
    .await??;

    Ok(Json(json!({
        "saved": true,
        "child": child.trim(),
        "questions": questions,
    })))
}

async fn entries_submit(
    State(state): State<ApiState>,
    Path(child): Path<String>,
    Json(form): Json<HashMap<String, String>>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let now = Local::now().naive_local();
    let (target, answers) = (child.clone(), form.clone());

    match with_service(&state, move |service| service.submit(&target, &answers, now)).await? {
        Ok(submission) => Ok((StatusCode::CREATED, Json(submission))),
        Err(error) => {
            warn!(child = %child, error = %error, "submission rejected");
            Err(ApiError::Submission {
                status: status_for(&error),
                message: error.to_string(),
                child,
                form,
            })
        }
    }
}

async fn entries_list(
    State(state): State<ApiState>,
    Query(query): Query<ChildQuery>,
) -> ApiResult<Json<EntriesPayload>> {
    let child = query.child.clone();
    let snapshot =
        with_service(&state, move |service| service.snapshot(child.as_deref())).await??;

    Ok(Json(EntriesPayload {
        child: query.child,
        count: snapshot.rows.len(),
        snapshot,
    }))
}

async fn trends(
    State(state): State<ApiState>,
    Query(query): Query<ChildQuery>,
) -> ApiResult<Json<Value>> {
    let child = query.child.clone();
    let report =
        with_service(&state, move |service| Ok(service.trends(child.as_deref()))).await??;

    Ok(match report {
        TrendReport::NoData => Json(json!({
            "status": "no_data",
            "child": query.child,
            "message": NO_DATA_MESSAGE,
        })),
        TrendReport::Ready(series) => Json(json!({
            "status": "ready",
            "child": query.child,
            "series": series,
        })),
    })
}

/// Runs `job` on the blocking pool; the journal files are guarded by blocking locks.
async fn with_service<T, F>(state: &ApiState, job: F) -> ApiResult<Result<T, JournalError>>
where
    F: FnOnce(&JournalService) -> Result<T, JournalError> + Send + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(&state.service);
    tokio::task::spawn_blocking(move || job(&service))
        .await
        .map_err(|error| ApiError::Task(error.to_string()))
}

fn status_for(error: &JournalError) -> StatusCode {
    match error {
        JournalError::InvalidInput(_) | JournalError::SchemaConflict(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        JournalError::UnknownChild(_) => StatusCode::NOT_FOUND,
        JournalError::Io(_) | JournalError::Csv(_) | JournalError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Submission {
        status: StatusCode,
        message: String,
        child: String,
        form: HashMap<String, String>,
    },
    Internal(JournalError),
    Task(String),
}

impl From<JournalError> for ApiError {
    fn from(value: JournalError) -> Self {
        match value {
            JournalError::InvalidInput(message) => Self::BadRequest(message),
            JournalError::SchemaConflict(question) => Self::BadRequest(format!(
                "Question collides with a fixed column: {question}"
            )),
            JournalError::UnknownChild(child) => Self::NotFound(format!("Unknown child: {child}")),
            other => Self::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Submission {
                status,
                message,
                child,
                form,
            } => (
                status,
                Json(json!({ "error": message, "child": child, "form": form })),
            )
                .into_response(),
            ApiError::Internal(error) => {
                error!(error = %error, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error.to_string() })),
                )
                    .into_response()
            }
            ApiError::Task(message) => {
                error!(error = %message, "request task failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "request task failed" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiState, router};
    use crate::config::Config;
    use crate::service::JournalService;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_state() -> (tempfile::TempDir, ApiState) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::with_data_dir(dir.path().to_path_buf());
        let service = JournalService::from_config(&config);
        service.bootstrap().expect("bootstrap");

        let state = ApiState {
            config: Arc::new(config),
            service: Arc::new(service),
        };
        (dir, state)
    }

    async fn send(
        state: &ApiState,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = router(state.clone())
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn add_child_then_list() {
        let (_dir, state) = make_state();

        let payload = json!({ "name": " Alex " });
        let (status, _) = send(&state, "POST", "/api/v1/children", Some(payload)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&state, "GET", "/api/v1/children", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["children"], json!(["Alex"]));
    }

    #[tokio::test]
    async fn blank_child_name_is_bad_request() {
        let (_dir, state) = make_state();

        let payload = json!({ "name": "  " });
        let (status, body) = send(&state, "POST", "/api/v1/children", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("error message").contains("empty"));
    }

    #[tokio::test]
    async fn questions_round_trip_with_catalog_split() {
        let (_dir, state) = make_state();
        let payload = json!({
            "predefined": ["How many meltdowns occurred today?"],
            "custom": ["What made today special?", { "text": "Bath done", "kind": "yes_no" }],
        });

        let uri = "/api/v1/children/Alex/questions";
        let (status, _) = send(&state, "PUT", uri, Some(payload)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&state, "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["questions"].as_array().expect("questions").len(), 3);
        assert_eq!(body["selection"]["custom"].as_array().expect("custom").len(), 2);
        assert_eq!(body["questions"][2]["kind"], "yes_no");
    }

    #[tokio::test]
    async fn unknown_child_questions_is_not_found() {
        let (_dir, state) = make_state();

        let (status, _) = send(&state, "GET", "/api/v1/children/Nobody/questions", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn submission_stores_coerced_values() {
        let (_dir, state) = make_state();
        let payload = json!({
            "custom": [
                "How many meltdowns did your child have today?",
                "On a scale of 1–5, how stable was your child’s mood today?",
            ],
        });
        send(&state, "PUT", "/api/v1/children/Alex/questions", Some(payload)).await;

        let (status, body) = send(
            &state,
            "POST",
            "/api/v1/children/Alex/entries",
            Some(json!({ "q0": "3", "q1": "7" })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["answers"][0]["value"], "3");
        assert_eq!(body["answers"][1]["value"], Value::Null);
        assert_eq!(body["issues"][0]["field"], "q1");

        let (_, entries) = send(&state, "GET", "/api/v1/entries?child=Alex", None).await;
        assert_eq!(entries["count"], 1);
    }

    #[tokio::test]
    async fn failed_submission_echoes_form() {
        let (_dir, state) = make_state();

        let (status, body) = send(
            &state,
            "POST",
            "/api/v1/children/Nobody/entries",
            Some(json!({ "q0": "2" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["child"], "Nobody");
        assert_eq!(body["form"]["q0"], "2");
    }

    #[tokio::test]
    async fn trends_without_rows_report_no_data() {
        let (_dir, state) = make_state();

        let (status, body) = send(&state, "GET", "/api/v1/trends", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "no_data");
    }

    #[tokio::test]
    async fn status_reports_counts() {
        let (_dir, state) = make_state();
        send(&state, "POST", "/api/v1/children", Some(json!({ "name": "Alex" }))).await;

        let (status, body) = send(&state, "GET", "/api/v1/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["children"], 1);
        assert_eq!(body["rows"], 0);
        assert_eq!(body["columns"], 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_submissions_are_all_stored() {
        let (_dir, state) = make_state();
        let children = ["Alex", "Sam", "Robin", "Kai"];
        for child in children {
            let uri = format!("/api/v1/children/{child}/questions");
            let payload = json!({ "custom": ["How many naps today?"] });
            send(&state, "PUT", &uri, Some(payload)).await;
        }

        let tasks = children
            .into_iter()
            .map(|child| {
                let state = state.clone();
                tokio::spawn(async move {
                    let uri = format!("/api/v1/children/{child}/entries");
                    send(&state, "POST", &uri, Some(json!({ "q0": "2" }))).await.0
                })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            assert_eq!(task.await.expect("join"), StatusCode::CREATED);
        }

        let (_, entries) = send(&state, "GET", "/api/v1/entries", None).await;
        assert_eq!(entries["count"], 4);

        let (_, trends) = send(&state, "GET", "/api/v1/trends", None).await;
        assert_eq!(trends["status"], "ready");
        assert_eq!(trends["series"][0]["points"][0]["sum"], 8);
    }
}
