use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use crate::errors::{AppError, AppResult};
use crate::models::TaskForm;
use crate::query::{parse_projection, ListParams};
use super::{envelope, project, AppState};

pub async fn list_tasks(
    State(state): State<AppState>,
    WithRejection(Query(params), _): WithRejection<Query<ListParams>, AppError>,
) -> AppResult<Response> {
    let options = params.find_options(state.config.query.task_default_limit)?;

    if params.wants_count() {
        let count = state.stores.tasks.count(&options).await?;
        tracing::debug!("Counted {} tasks", count);
        return Ok(envelope(StatusCode::OK, "OK", json!(count)));
    }

    let tasks = state.stores.tasks.find(&options).await?;
    tracing::debug!("Listed {} tasks", tasks.len());
    Ok(envelope(StatusCode::OK, "OK", Value::Array(tasks)))
}

pub async fn create_task(
    State(state): State<AppState>,
    WithRejection(Json(form), _): WithRejection<Json<TaskForm>, AppError>,
) -> AppResult<Response> {
    let task = state.tasks.create(form).await?;
    Ok(envelope(StatusCode::CREATED, "Task created", project(&task, None)?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    WithRejection(Query(params), _): WithRejection<Query<ListParams>, AppError>,
) -> AppResult<Response> {
    let projection = parse_projection(params.select.as_deref())?;
    let task = state.tasks.get(&id).await?;
    Ok(envelope(StatusCode::OK, "OK", project(&task, projection)?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    WithRejection(Json(form), _): WithRejection<Json<TaskForm>, AppError>,
) -> AppResult<Response> {
    let task = state.tasks.update(&id, form).await?;
    Ok(envelope(StatusCode::OK, "Task updated", project(&task, None)?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    state.tasks.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
