use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::entities::{
    Event, EventPatch, EventStatus, EventTask, TaskDraft, TaskPatch, User, UserPatch,
};
use crate::error::ApiError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            BLOB PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS events (
    id          BLOB PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    event_date  TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'planning',
    owner_id    BLOB NOT NULL REFERENCES users(id),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS event_tasks (
    id          BLOB PRIMARY KEY,
    event_id    BLOB NOT NULL REFERENCES events(id) ON DELETE CASCADE,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    due_date    TEXT NOT NULL,
    completed   INTEGER NOT NULL DEFAULT 0,
    task_type   TEXT NOT NULL,
    priority    TEXT NOT NULL DEFAULT 'medium',
    notes       TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
";

/// Treats empty strings like absent fields, matching the partial-update
/// presence rule.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn map_unique_violation(err: sqlx::Error) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::DuplicateEmail,
        _ => ApiError::Sqlx(err),
    }
}

/// All reads and writes against the SQLite file. Ids are random v4 UUIDs
/// minted here at creation time.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    // users

    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<User, ApiError> {
        if self.user_by_email(email).await?.is_some() {
            return Err(ApiError::DuplicateEmail);
        }

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        self.user_by_id(id).await
    }

    pub async fn user_by_id(&self, id: Uuid) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ApiError::NotFound("user"))
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, ApiError> {
        // uniqueness re-check before any write, so a rejected patch leaves
        // the whole row untouched
        if let Some(email) = present(&patch.email) {
            if let Some(existing) = self.user_by_email(email).await? {
                if existing.id != id {
                    return Err(ApiError::DuplicateEmail);
                }
            }
        }

        if let Some(name) = present(&patch.name) {
            sqlx::query("UPDATE users SET name = ? WHERE id = ?")
                .bind(name)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(email) = present(&patch.email) {
            sqlx::query("UPDATE users SET email = ? WHERE id = ?")
                .bind(email)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_unique_violation)?;
        }
        self.user_by_id(id).await
    }

    pub async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("user"));
        }
        Ok(())
    }

    // events

    pub async fn create_event(
        &self,
        owner_id: Uuid,
        title: &str,
        description: &str,
        event_date: DateTime<Utc>,
    ) -> Result<Event, ApiError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO events (id, title, description, event_date, status, owner_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(event_date)
        .bind(EventStatus::Planning)
        .bind(owner_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.event_by_id(id).await
    }

    pub async fn event_by_id(&self, id: Uuid) -> Result<Event, ApiError> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ApiError::NotFound("event"))
    }

    pub async fn events_by_owner(&self, owner_id: Uuid) -> Result<Vec<Event>, ApiError> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE owner_id = ? ORDER BY event_date ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    /// Applies the present fields of `patch` and refreshes `updated_at`.
    /// Changing `event_date` does not recompute existing task due dates.
    pub async fn update_event(&self, id: Uuid, patch: EventPatch) -> Result<Event, ApiError> {
        if let Some(title) = present(&patch.title) {
            sqlx::query("UPDATE events SET title = ? WHERE id = ?")
                .bind(title)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(description) = present(&patch.description) {
            sqlx::query("UPDATE events SET description = ? WHERE id = ?")
                .bind(description)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(event_date) = patch.event_date {
            sqlx::query("UPDATE events SET event_date = ? WHERE id = ?")
                .bind(event_date)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(status) = patch.status {
            sqlx::query("UPDATE events SET status = ? WHERE id = ?")
                .bind(status)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        sqlx::query("UPDATE events SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.event_by_id(id).await
    }

    /// Deletes the event and every task that references it, in one
    /// transaction, so no orphaned task survives a committed deletion.
    pub async fn delete_event(&self, id: Uuid) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM event_tasks WHERE event_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("event"));
        }
        tx.commit().await?;
        Ok(())
    }

    // tasks

    pub async fn create_task(&self, event_id: Uuid, draft: TaskDraft) -> Result<EventTask, ApiError> {
        // the parent must exist at creation time
        self.event_by_id(event_id).await?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO event_tasks (id, event_id, title, description, due_date, completed, task_type, priority, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(event_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.due_date)
        .bind(draft.task_type)
        .bind(draft.priority)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.task_by_id(id).await
    }

    pub async fn task_by_id(&self, id: Uuid) -> Result<EventTask, ApiError> {
        sqlx::query_as::<_, EventTask>("SELECT * FROM event_tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ApiError::NotFound("task"))
    }

    pub async fn tasks_by_event(&self, event_id: Uuid) -> Result<Vec<EventTask>, ApiError> {
        let tasks = sqlx::query_as::<_, EventTask>(
            "SELECT * FROM event_tasks WHERE event_id = ? ORDER BY due_date ASC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    pub async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<EventTask, ApiError> {
        if let Some(title) = present(&patch.title) {
            sqlx::query("UPDATE event_tasks SET title = ? WHERE id = ?")
                .bind(title)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(description) = present(&patch.description) {
            sqlx::query("UPDATE event_tasks SET description = ? WHERE id = ?")
                .bind(description)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(due_date) = patch.due_date {
            sqlx::query("UPDATE event_tasks SET due_date = ? WHERE id = ?")
                .bind(due_date)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(completed) = patch.completed {
            sqlx::query("UPDATE event_tasks SET completed = ? WHERE id = ?")
                .bind(completed)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(priority) = patch.priority {
            sqlx::query("UPDATE event_tasks SET priority = ? WHERE id = ?")
                .bind(priority)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(notes) = &patch.notes {
            sqlx::query("UPDATE event_tasks SET notes = ? WHERE id = ?")
                .bind(notes)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        sqlx::query("UPDATE event_tasks SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.task_by_id(id).await
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM event_tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("task"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Priority, TaskType};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> Store {
        // single connection keeps the in-memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Store::new(pool);
        store.init_schema().await.unwrap();
        store
    }

    async fn seed_user(store: &Store) -> User {
        store
            .create_user("alice@example.com", "Alice", "hash")
            .await
            .unwrap()
    }

    fn draft(due_date: DateTime<Utc>) -> TaskDraft {
        TaskDraft {
            title: "Post to Instagram".into(),
            description: "".into(),
            due_date,
            task_type: TaskType::Instagram,
            priority: Priority::Medium,
        }
    }

    #[tokio::test]
    async fn duplicate_email_rejected_first_user_untouched() {
        let store = test_store().await;
        let alice = seed_user(&store).await;

        let err = store
            .create_user("alice@example.com", "Impostor", "other-hash")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::DuplicateEmail));

        let still_alice = store.user_by_id(alice.id).await.unwrap();
        assert_eq!(still_alice.name, "Alice");
        assert_eq!(still_alice.password_hash, "hash");
    }

    #[tokio::test]
    async fn update_user_rejects_email_taken_by_someone_else() {
        let store = test_store().await;
        let alice = seed_user(&store).await;
        store
            .create_user("bob@example.com", "Bob", "hash")
            .await
            .unwrap();

        let err = store
            .update_user(
                alice.id,
                UserPatch {
                    email: Some("bob@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::DuplicateEmail));

        // re-submitting your own address is fine
        let same = store
            .update_user(
                alice.id,
                UserPatch {
                    email: Some("alice@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.email, "alice@example.com");
    }

    #[tokio::test]
    async fn rejected_patch_applies_none_of_its_fields() {
        let store = test_store().await;
        let alice = seed_user(&store).await;
        store
            .create_user("bob@example.com", "Bob", "hash")
            .await
            .unwrap();

        // name rides along with a duplicate email: the whole patch is refused
        let err = store
            .update_user(
                alice.id,
                UserPatch {
                    name: Some("Alicia".into()),
                    email: Some("bob@example.com".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::DuplicateEmail));

        let unchanged = store.user_by_id(alice.id).await.unwrap();
        assert_eq!(unchanged.name, "Alice");
        assert_eq!(unchanged.email, "alice@example.com");
    }

    #[tokio::test]
    async fn events_list_ascending_by_event_date() {
        let store = test_store().await;
        let alice = seed_user(&store).await;

        let later = "2025-08-01T10:00:00Z".parse().unwrap();
        let sooner = "2025-07-01T10:00:00Z".parse().unwrap();
        store
            .create_event(alice.id, "Later", "", later)
            .await
            .unwrap();
        store
            .create_event(alice.id, "Sooner", "", sooner)
            .await
            .unwrap();

        let events = store.events_by_owner(alice.id).await.unwrap();
        let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Sooner", "Later"]);
    }

    #[tokio::test]
    async fn completion_patch_touches_only_completed_and_updated_at() {
        let store = test_store().await;
        let alice = seed_user(&store).await;
        let date = "2025-06-30T18:00:00Z".parse().unwrap();
        let event = store.create_event(alice.id, "Party", "", date).await.unwrap();
        let task = store.create_task(event.id, draft(date)).await.unwrap();

        let updated = store
            .update_task(
                task.id,
                TaskPatch {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.completed);
        assert!(updated.updated_at >= task.updated_at);
        assert_eq!(updated.title, task.title);
        assert_eq!(updated.description, task.description);
        assert_eq!(updated.due_date, task.due_date);
        assert_eq!(updated.task_type, task.task_type);
        assert_eq!(updated.priority, task.priority);
        assert_eq!(updated.notes, task.notes);
        assert_eq!(updated.created_at, task.created_at);
    }

    #[tokio::test]
    async fn deleting_event_removes_its_tasks() {
        let store = test_store().await;
        let alice = seed_user(&store).await;
        let date = "2025-06-30T18:00:00Z".parse().unwrap();
        let event = store.create_event(alice.id, "Party", "", date).await.unwrap();
        store.create_task(event.id, draft(date)).await.unwrap();
        store.create_task(event.id, draft(date)).await.unwrap();

        store.delete_event(event.id).await.unwrap();

        assert!(matches!(
            store.event_by_id(event.id).await.unwrap_err(),
            ApiError::NotFound("event")
        ));
        let remaining = store.tasks_by_event(event.id).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn tasks_list_ascending_by_due_date_and_empty_list_is_ok() {
        let store = test_store().await;
        let alice = seed_user(&store).await;
        let date: DateTime<Utc> = "2025-06-30T18:00:00Z".parse().unwrap();
        let event = store.create_event(alice.id, "Party", "", date).await.unwrap();

        assert!(store.tasks_by_event(event.id).await.unwrap().is_empty());

        let mut early = draft(date - chrono::Duration::days(10));
        early.title = "early".into();
        let mut late = draft(date);
        late.title = "late".into();
        store.create_task(event.id, late).await.unwrap();
        store.create_task(event.id, early).await.unwrap();

        let tasks = store.tasks_by_event(event.id).await.unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn create_task_requires_existing_event() {
        let store = test_store().await;
        let date = "2025-06-30T18:00:00Z".parse().unwrap();
        let err = store
            .create_task(Uuid::new_v4(), draft(date))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound("event")));
    }

    #[tokio::test]
    async fn event_patch_does_not_touch_task_due_dates() {
        let store = test_store().await;
        let alice = seed_user(&store).await;
        let date: DateTime<Utc> = "2025-06-30T18:00:00Z".parse().unwrap();
        let event = store.create_event(alice.id, "Party", "", date).await.unwrap();
        let task = store.create_task(event.id, draft(date)).await.unwrap();

        let moved: DateTime<Utc> = "2025-07-15T18:00:00Z".parse().unwrap();
        store
            .update_event(
                event.id,
                EventPatch {
                    event_date: Some(moved),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // existing due dates stay where the old event date put them
        let unchanged = store.task_by_id(task.id).await.unwrap();
        assert_eq!(unchanged.due_date, date);
    }
}
