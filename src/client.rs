//! Typed client for the planner API, one abstraction over one transport.
//! The session credential is explicit state handed to each call; on a 401 the
//! caller drops the [`Session`] (forced logout) — nothing is retried.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::entities::{
    AuthResponse, Event, EventPatch, EventTask, Priority, TaskPatch, TaskType, UserPatch,
    UserPublic,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network-level failure: unreachable API, bad transport.
    #[error("operation failed")]
    Transport(#[from] reqwest::Error),

    /// Credential missing, expired or rejected, or a sign-in that failed.
    /// Carries the server's own wording for display; a caller holding a
    /// session drops it and returns to the unauthenticated state.
    #[error("{message}")]
    Unauthenticated { message: String },

    /// The server refused the request; `message` is its own wording,
    /// surfaced to the user verbatim.
    #[error("{message}")]
    Api { status: u16, message: String },
}

/// Proof of identity for one signed-in user.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<(UserPublic, Session), ClientError> {
        let response = self
            .http
            .post(self.url("/auth/register"))
            .json(&json!({ "email": email, "name": name, "password": password }))
            .send()
            .await?;
        let auth: AuthResponse = check(response).await?.json().await?;
        Ok((auth.user, Session::new(auth.token)))
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(UserPublic, Session), ClientError> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let auth: AuthResponse = check(response).await?.json().await?;
        Ok((auth.user, Session::new(auth.token)))
    }

    pub async fn me(&self, session: &Session) -> Result<UserPublic, ClientError> {
        let response = self
            .http
            .get(self.url("/auth/me"))
            .bearer_auth(&session.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn update_me(
        &self,
        session: &Session,
        patch: &UserPatch,
    ) -> Result<UserPublic, ClientError> {
        let response = self
            .http
            .put(self.url("/auth/me"))
            .bearer_auth(&session.token)
            .json(patch)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn change_password(
        &self,
        session: &Session,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .put(self.url("/auth/change-password"))
            .bearer_auth(&session.token)
            .json(&json!({
                "currentPassword": current_password,
                "newPassword": new_password,
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn events(&self, session: &Session) -> Result<Vec<Event>, ClientError> {
        let response = self
            .http
            .get(self.url("/events"))
            .bearer_auth(&session.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn create_event(
        &self,
        session: &Session,
        title: &str,
        description: &str,
        event_date: DateTime<Utc>,
    ) -> Result<Event, ClientError> {
        let response = self
            .http
            .post(self.url("/events"))
            .bearer_auth(&session.token)
            .json(&json!({
                "title": title,
                "description": description,
                "eventDate": event_date,
            }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn event(&self, session: &Session, id: Uuid) -> Result<Event, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/events/{id}")))
            .bearer_auth(&session.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn update_event(
        &self,
        session: &Session,
        id: Uuid,
        patch: &EventPatch,
    ) -> Result<Event, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("/events/{id}")))
            .bearer_auth(&session.token)
            .json(patch)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn delete_event(&self, session: &Session, id: Uuid) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/events/{id}")))
            .bearer_auth(&session.token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn event_tasks(
        &self,
        session: &Session,
        event_id: Uuid,
    ) -> Result<Vec<EventTask>, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/events/{event_id}/tasks")))
            .bearer_auth(&session.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_task(
        &self,
        session: &Session,
        event_id: Uuid,
        title: &str,
        description: &str,
        due_date: DateTime<Utc>,
        task_type: TaskType,
        priority: Priority,
    ) -> Result<EventTask, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/events/{event_id}/tasks")))
            .bearer_auth(&session.token)
            .json(&json!({
                "title": title,
                "description": description,
                "dueDate": due_date,
                "taskType": task_type,
                "priority": priority,
            }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn update_task(
        &self,
        session: &Session,
        task_id: Uuid,
        patch: &TaskPatch,
    ) -> Result<EventTask, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("/events/tasks/{task_id}")))
            .bearer_auth(&session.token)
            .json(patch)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Fast path for the checkbox: toggles `completed` and nothing else.
    pub async fn set_task_completed(
        &self,
        session: &Session,
        task_id: Uuid,
        completed: bool,
    ) -> Result<EventTask, ClientError> {
        self.update_task(
            session,
            task_id,
            &TaskPatch {
                completed: Some(completed),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete_task(&self, session: &Session, task_id: Uuid) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/events/tasks/{task_id}")))
            .bearer_auth(&session.token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // read the error body first so a 401 keeps the server's wording
    let message = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| body.get("error")?.as_str().map(String::from))
        .unwrap_or_else(|| "operation failed".to_string());
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthenticated { message });
    }
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Display classification of a task relative to now. Presentation only, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrgencyBucket {
    Overdue,
    Urgent,
    Upcoming,
    Normal,
}

/// Buckets a task for the list view: past due is overdue, within a day is
/// urgent, within a week is upcoming. Completed tasks are never flagged.
pub fn urgency_bucket(
    due_date: DateTime<Utc>,
    completed: bool,
    now: DateTime<Utc>,
) -> UrgencyBucket {
    if completed {
        return UrgencyBucket::Normal;
    }
    if due_date < now {
        return UrgencyBucket::Overdue;
    }
    let days_until_due = (due_date - now).num_days();
    if days_until_due <= 1 {
        UrgencyBucket::Urgent
    } else if days_until_due <= 7 {
        UrgencyBucket::Upcoming
    } else {
        UrgencyBucket::Normal
    }
}
