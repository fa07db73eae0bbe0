mod users;
mod tasks;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use crate::config::Config;
use crate::errors::{AppResult, StoreError};
use crate::query::Projection;
use crate::services::{Stores, TaskService, UserService};

// Application state that can be shared between handlers
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub users: UserService,
    pub tasks: TaskService,
    pub config: Config,
}

impl AppState {
    pub fn new(stores: Stores, config: Config) -> Self {
        Self {
            users: UserService::new(stores.clone()),
            tasks: TaskService::new(stores.clone()),
            stores,
            config,
        }
    }
}

/// Body of every non-204 response.
#[derive(Serialize)]
pub struct Envelope {
    pub message: String,
    pub data: Value,
}

pub fn envelope(status: StatusCode, message: impl Into<String>, data: Value) -> Response {
    let body = Envelope { message: message.into(), data };
    (status, Json(body)).into_response()
}

/// A fetched record as JSON, narrowed to the `select` projection when one was given.
pub fn project<T: Serialize>(record: &T, projection: Option<Projection>) -> AppResult<Value> {
    let data = serde_json::to_value(record).map_err(StoreError::from)?;
    Ok(match projection {
        Some(projection) => projection.apply(data),
        None => data,
    })
}

async fn home() -> Response {
    envelope(StatusCode::OK, "OK", json!({}))
}

pub fn router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .route("/", get(home))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/:id",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        )
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(Stores::in_memory(), Config::for_tests()))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_user(app: &Router, name: &str, email: &str) -> String {
        let (status, body) = call(app, Method::POST, "/users", Some(json!({ "name": name, "email": email }))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["_id"].as_str().unwrap().to_string()
    }

    #[test]
    fn project_narrows_a_record_to_the_selected_fields() {
        let user = crate::models::User::new("Ada".into(), "ada@example.com".into());
        let select = crate::query::parse_projection(Some(r#"{"email": 1}"#)).unwrap();

        let data = project(&user, select).unwrap();
        assert_eq!(data, json!({ "_id": "", "email": "ada@example.com" }));

        let full = project(&user, None).unwrap();
        assert_eq!(full["pendingTasks"], json!([]));
        assert_eq!(full["name"], json!("Ada"));
    }

    #[tokio::test]
    async fn home_answers_with_an_envelope() {
        let (status, body) = call(&app(), Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "OK", "data": {} }));
    }

    #[tokio::test]
    async fn assigned_task_shows_up_in_pending_tasks() {
        let app = app();
        let user_id = create_user(&app, "Ada", "ada@example.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/tasks",
            Some(json!({ "name": "A", "deadline": "2025-01-01", "assignedUser": user_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["assignedUserName"], json!("Ada"));
        let task_id = body["data"]["_id"].clone();

        let (status, body) = call(&app, Method::GET, &format!("/users/{user_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pendingTasks"], json!([task_id]));
    }

    #[tokio::test]
    async fn user_validation_errors_are_bad_requests() {
        let app = app();
        let (status, body) = call(&app, Method::POST, "/users", Some(json!({ "name": "Ada" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Name and email are required"));

        create_user(&app, "Ada", "ada@example.com").await;
        let (status, body) =
            call(&app, Method::POST, "/users", Some(json!({ "name": "B", "email": "ada@example.com" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Email already exists"));
    }

    #[tokio::test]
    async fn malformed_body_uses_the_envelope() {
        let app = app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/users")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"], json!({}));
    }

    #[tokio::test]
    async fn list_rejects_invalid_json_parameters() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/users?where=%7Bbad", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Invalid JSON in where parameter"));

        let (status, body) = call(&app, Method::GET, "/tasks?select=nope", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Invalid JSON in select parameter"));
    }

    #[tokio::test]
    async fn list_supports_filter_sort_select_and_count() {
        let app = app();
        create_user(&app, "Cy", "cy@example.com").await;
        create_user(&app, "Ada", "ada@example.com").await;
        create_user(&app, "Bo", "bo@example.com").await;

        let uri = "/users?sort=%7B%22name%22%3A1%7D&select=%7B%22name%22%3A1%2C%22_id%22%3A0%7D&skip=1&limit=abc";
        let (status, body) = call(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([{ "name": "Bo" }, { "name": "Cy" }]));

        let uri = "/users?where=%7B%22name%22%3A%7B%22%24ne%22%3A%22Ada%22%7D%7D&count=true";
        let (_, body) = call(&app, Method::GET, uri, None).await;
        assert_eq!(body["data"], json!(2));
    }

    #[tokio::test]
    async fn get_by_id_applies_select_and_reports_missing() {
        let app = app();
        let id = create_user(&app, "Ada", "ada@example.com").await;

        let uri = format!("/users/{id}?select=%7B%22email%22%3A1%7D");
        let (status, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({ "_id": id, "email": "ada@example.com" }));

        let (status, _) = call(&app, Method::GET, &format!("/users/{id}?select=%7B"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::GET, "/tasks/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Task not found"));
    }

    #[tokio::test]
    async fn put_user_with_completed_task_is_rejected() {
        let app = app();
        let id = create_user(&app, "Ada", "ada@example.com").await;
        let (_, body) = call(
            &app,
            Method::POST,
            "/tasks",
            Some(json!({ "name": "Done", "deadline": 1, "completed": "true" })),
        )
        .await;
        let done = body["data"]["_id"].clone();

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/users/{id}"),
            Some(json!({ "name": "Ada", "email": "ada@example.com", "pendingTasks": [done] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&app, Method::GET, &format!("/users/{id}"), None).await;
        assert_eq!(body["data"]["pendingTasks"], json!([]));
    }

    #[tokio::test]
    async fn put_task_with_unknown_user_is_not_found() {
        let app = app();
        let (_, body) = call(&app, Method::POST, "/tasks", Some(json!({ "name": "A", "deadline": 1 }))).await;
        let task_id = body["data"]["_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/tasks/{task_id}"),
            Some(json!({ "name": "A", "deadline": 1, "assignedUser": "ghost" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["data"], json!({ "missingUserId": "ghost" }));
    }

    #[tokio::test]
    async fn delete_returns_no_content_and_cascades() {
        let app = app();
        let user_id = create_user(&app, "Ada", "ada@example.com").await;
        let (_, body) = call(
            &app,
            Method::POST,
            "/tasks",
            Some(json!({ "name": "A", "deadline": 1, "assignedUser": user_id })),
        )
        .await;
        let task_id = body["data"]["_id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, Method::DELETE, &format!("/users/{user_id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (_, body) = call(&app, Method::GET, &format!("/tasks/{task_id}"), None).await;
        assert_eq!(body["data"]["assignedUser"], json!(""));
        assert_eq!(body["data"]["assignedUserName"], json!("unassigned"));

        let (status, _) = call(&app, Method::DELETE, &format!("/users/{user_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn task_list_applies_the_default_limit() {
        let app = app();
        for n in 0..105 {
            call(&app, Method::POST, "/tasks", Some(json!({ "name": format!("t{n}"), "deadline": n }))).await;
        }
        let (_, body) = call(&app, Method::GET, "/tasks", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 100);

        let (_, body) = call(&app, Method::GET, "/tasks?count=true", None).await;
        assert_eq!(body["data"], json!(100));

        let (_, body) = call(&app, Method::GET, "/tasks?count=true&limit=0", None).await;
        assert_eq!(body["data"], json!(105));
    }
}
