use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use crate::errors::{AppError, AppResult};
use crate::models::UserForm;
use crate::query::{parse_projection, ListParams};
use super::{envelope, project, AppState};

pub async fn list_users(
    State(state): State<AppState>,
    WithRejection(Query(params), _): WithRejection<Query<ListParams>, AppError>,
) -> AppResult<Response> {
    let options = params.find_options(None)?;

    if params.wants_count() {
        let count = state.stores.users.count(&options).await?;
        tracing::debug!("Counted {} users", count);
        return Ok(envelope(StatusCode::OK, "OK", json!(count)));
    }

    let users = state.stores.users.find(&options).await?;
    tracing::debug!("Listed {} users", users.len());
    Ok(envelope(StatusCode::OK, "OK", Value::Array(users)))
}

pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(form), _): WithRejection<Json<UserForm>, AppError>,
) -> AppResult<Response> {
    let user = state.users.create(form).await?;
    Ok(envelope(StatusCode::CREATED, "User created", project(&user, None)?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    WithRejection(Query(params), _): WithRejection<Query<ListParams>, AppError>,
) -> AppResult<Response> {
    let projection = parse_projection(params.select.as_deref())?;
    let user = state.users.get(&id).await?;
    Ok(envelope(StatusCode::OK, "OK", project(&user, projection)?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    WithRejection(Json(form), _): WithRejection<Json<UserForm>, AppError>,
) -> AppResult<Response> {
    let user = state.users.update(&id, form).await?;
    Ok(envelope(StatusCode::OK, "User updated", project(&user, None)?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    state.users.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
