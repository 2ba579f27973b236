use axum::{
    extract::{Extension, Path},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::authentication::{self, CurrentUser, TokenKeys};
use crate::entities::{
    ChangePasswordRequest, CreateEventRequest, CreateTaskRequest, Event, EventPatch, LoginRequest,
    Priority, RegisterRequest, TaskDraft, TaskPatch, UserPatch, UserPublic,
};
use crate::error::ApiError;
use crate::store::Store;
use crate::templates::generate_default_tasks;

/// The single ownership predicate. Every handler that touches an event or one
/// of its tasks goes through this, including the bare task-id routes.
fn can_access(caller: CurrentUser, event: &Event) -> bool {
    event.owner_id == caller.user_id
}

/// Resolves an event and gates it on ownership: absent is 404, someone else's
/// is 403.
async fn owned_event(store: &Store, caller: CurrentUser, id: Uuid) -> Result<Event, ApiError> {
    let event = store.event_by_id(id).await?;
    if !can_access(caller, &event) {
        return Err(ApiError::Forbidden);
    }
    Ok(event)
}

fn require(field: Option<String>, message: &str) -> Result<String, ApiError> {
    field
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Validation(message.to_string()))
}

// auth

async fn register_user(
    Extension(store): Extension<Store>,
    Extension(keys): Extension<TokenKeys>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = require(body.email, "email, name and password are required")?;
    let name = require(body.name, "email, name and password are required")?;
    let password = require(body.password, "email, name and password are required")?;

    let auth = authentication::register(&store, &keys, &email, &name, password).await?;
    Ok((StatusCode::CREATED, Json(auth)))
}

async fn login(
    Extension(store): Extension<Store>,
    Extension(keys): Extension<TokenKeys>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = require(body.email, "email and password are required")?;
    let password = require(body.password, "email and password are required")?;

    let auth = authentication::authenticate(&store, &keys, &email, password).await?;
    Ok(Json(auth))
}

async fn get_me(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = store.user_by_id(caller.user_id).await?;
    Ok(Json(user.into()))
}

async fn update_me(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = store.update_user(caller.user_id, patch).await?;
    Ok(Json(user.into()))
}

async fn change_password(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = require(
        body.current_password,
        "current and new password are required",
    )?;
    let new = require(body.new_password, "current and new password are required")?;

    authentication::change_password(&store, caller.user_id, current, new).await?;
    Ok(Json(json!({ "message": "password updated" })))
}

// events

async fn list_events(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
) -> Result<impl IntoResponse, ApiError> {
    let events = store.events_by_owner(caller.user_id).await?;
    Ok(Json(events))
}

/// Creates the event, then seeds the default checklist. The seed loop is
/// sequential with no compensating rollback: a mid-loop storage failure
/// leaves the already-committed prefix in place.
async fn create_event(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
    Json(body): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = require(body.title, "title and eventDate are required")?;
    let event_date = body
        .event_date
        .ok_or_else(|| ApiError::Validation("title and eventDate are required".to_string()))?;
    let description = body.description.unwrap_or_default();

    let event = store
        .create_event(caller.user_id, &title, &description, event_date)
        .await?;

    for draft in generate_default_tasks(event.event_date) {
        store.create_task(event.id, draft).await?;
    }

    Ok((StatusCode::CREATED, Json(event)))
}

async fn get_event(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
    Path(id): Path<Uuid>,
) -> Result<Json<Event>, ApiError> {
    let event = owned_event(&store, caller, id).await?;
    Ok(Json(event))
}

async fn update_event(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> Result<Json<Event>, ApiError> {
    owned_event(&store, caller, id).await?;
    let event = store.update_event(id, patch).await?;
    Ok(Json(event))
}

async fn delete_event(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    owned_event(&store, caller, id).await?;
    store.delete_event(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// tasks

async fn list_event_tasks(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    owned_event(&store, caller, id).await?;
    let tasks = store.tasks_by_event(id).await?;
    Ok(Json(tasks))
}

async fn create_event_task(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    owned_event(&store, caller, id).await?;

    let title = require(body.title, "title, dueDate and taskType are required")?;
    let due_date = body.due_date.ok_or_else(|| {
        ApiError::Validation("title, dueDate and taskType are required".to_string())
    })?;
    let task_type = body.task_type.ok_or_else(|| {
        ApiError::Validation("title, dueDate and taskType are required".to_string())
    })?;

    let task = store
        .create_task(
            id,
            TaskDraft {
                title,
                description: body.description.unwrap_or_default(),
                due_date,
                task_type,
                priority: body.priority.unwrap_or(Priority::Medium),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
    Path(task_id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let task = store.task_by_id(task_id).await?;
    owned_event(&store, caller, task.event_id).await?;

    let task = store.update_task(task_id, patch).await?;
    Ok(Json(task))
}

async fn delete_task(
    caller: CurrentUser,
    Extension(store): Extension<Store>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = store.task_by_id(task_id).await?;
    owned_event(&store, caller, task.event_id).await?;

    store.delete_task(task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// service meta

async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Event planner API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/auth",
            "events": "/events",
            "health": "/health"
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "OK", "timestamp": Utc::now() }))
}

pub fn router(store: Store, keys: TokenKeys, allowed_origin: &HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login))
        .route("/auth/me", get(get_me).put(update_me))
        .route("/auth/change-password", put(change_password))
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route(
            "/events/{id}/tasks",
            get(list_event_tasks).post(create_event_task),
        )
        .route(
            "/events/tasks/{task_id}",
            put(update_task).delete(delete_task),
        )
        .layer(Extension(store))
        .layer(Extension(keys))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
