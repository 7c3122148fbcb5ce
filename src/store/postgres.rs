use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, CategoryStore, OwnedStore, StoreHealth, TaskStore, UserStore};
use crate::error::AppError;
use crate::models::{
    Category, CategoryInput, CategoryUpdate, NewUser, Page, Task, TaskFilter, TaskInput,
    TaskStatus, TaskUpdate, User, UserChanges,
};

const USER_COLUMNS: &str =
    "id, email, username, hashed_password, is_active, is_verified, full_name, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, name, color, user_id, created_at, updated_at";
const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, user_id, category_id, created_at, updated_at";

// `id` breaks ties between rows created in the same instant.
const NEWEST_FIRST: &str = "ORDER BY created_at DESC, id DESC";
const DUE_SOONEST_FIRST: &str = "ORDER BY due_date ASC, created_at ASC, id ASC";

/// PostgreSQL-backed store. Every mutation is a single statement, so uniqueness and
/// foreign-key rules are enforced by the schema's constraints.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (id, email, username, hashed_password, full_name) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_user.email)
            .bind(new_user.username)
            .bind(new_user.hashed_password)
            .bind(new_user.full_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_by_email_or_username(&self, identifier: &str) -> Result<Option<User>, AppError> {
        // An email match wins over a username match.
        let sql = format!(
            "SELECT {} FROM users WHERE email = $1 OR username = $1 \
             ORDER BY (email = $1) DESC LIMIT 1",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");
        if let Some(email) = changes.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(username) = changes.username {
            qb.push(", username = ").push_bind(username);
        }
        if let Some(full_name) = changes.full_name {
            qb.push(", full_name = ").push_bind(full_name);
        }
        if let Some(hashed_password) = changes.hashed_password {
            qb.push(", hashed_password = ").push_bind(hashed_password);
        }
        if let Some(is_active) = changes.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }
        if let Some(is_verified) = changes.is_verified {
            qb.push(", is_verified = ").push_bind(is_verified);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(USER_COLUMNS);

        let user = qb
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        // Categories and tasks go with the user through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OwnedStore<Category> for PgStore {
    async fn create(&self, owner: Uuid, new: CategoryInput) -> Result<Category, AppError> {
        let sql = format!(
            "INSERT INTO categories (id, name, color, user_id) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.name)
            .bind(new.color)
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
        Ok(category)
    }

    async fn get_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<Category>, AppError> {
        let sql = format!(
            "SELECT {} FROM categories WHERE id = $1 AND user_id = $2",
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn list_by_owner(&self, owner: Uuid, page: Page) -> Result<Vec<Category>, AppError> {
        let sql = format!(
            "SELECT {} FROM categories WHERE user_id = $1 {} OFFSET $2 LIMIT $3",
            CATEGORY_COLUMNS, NEWEST_FIRST
        );
        let categories = sqlx::query_as::<_, Category>(&sql)
            .bind(owner)
            .bind(page.skip)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    async fn count_by_owner(&self, owner: Uuid) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories WHERE user_id = $1")
                .bind(owner)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: CategoryUpdate,
    ) -> Result<Option<Category>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE categories SET updated_at = NOW()");
        if let Some(name) = changes.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(color) = changes.color {
            qb.push(", color = ").push_bind(color);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND user_id = ").push_bind(owner);
        qb.push(" RETURNING ").push(CATEGORY_COLUMNS);

        let category = qb
            .build_query_as::<Category>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError> {
        // Tasks filed under the category keep existing with category_id set to NULL.
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn name_exists(
        &self,
        owner: Uuid,
        name: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM categories \
             WHERE user_id = $1 AND name = $2 AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(owner)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

/// Appends the owner scope and every present filter predicate as `AND` conditions.
fn push_task_filter(qb: &mut QueryBuilder<'_, Postgres>, owner: Uuid, filter: &TaskFilter) {
    qb.push(" WHERE user_id = ").push_bind(owner);
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ").push_bind(priority);
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(search) = filter.search.as_deref() {
        let pattern = like_pattern(search);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(from) = filter.due_from {
        qb.push(" AND due_date >= ").push_bind(from);
    }
    if let Some(to) = filter.due_to {
        qb.push(" AND due_date <= ").push_bind(to);
    }
}

/// One page of matching tasks, newest first.
fn task_page_query(owner: Uuid, filter: &TaskFilter, page: Page) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
    qb.push(TASK_COLUMNS).push(" FROM tasks");
    push_task_filter(&mut qb, owner, filter);
    qb.push(" ").push(NEWEST_FIRST);
    qb.push(" OFFSET ")
        .push_bind(page.skip)
        .push(" LIMIT ")
        .push_bind(page.limit);
    qb
}

#[async_trait]
impl OwnedStore<Task> for PgStore {
    async fn create(&self, owner: Uuid, new: TaskInput) -> Result<Task, AppError> {
        let sql = format!(
            "INSERT INTO tasks (id, title, description, status, priority, due_date, user_id, category_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.title)
            .bind(new.description)
            .bind(new.status)
            .bind(new.priority)
            .bind(new.due_date)
            .bind(owner)
            .bind(new.category_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn get_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND user_id = $2",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn list_by_owner(&self, owner: Uuid, page: Page) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE user_id = $1 {} OFFSET $2 LIMIT $3",
            TASK_COLUMNS, NEWEST_FIRST
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(owner)
            .bind(page.skip)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn count_by_owner(&self, owner: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE user_id = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TaskUpdate,
    ) -> Result<Option<Task>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tasks SET updated_at = NOW()");
        if let Some(title) = changes.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = changes.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(status) = changes.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(priority) = changes.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = changes.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(category_id) = changes.category_id {
            qb.push(", category_id = ").push_bind(category_id);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND user_id = ").push_bind(owner);
        qb.push(" RETURNING ").push(TASK_COLUMNS);

        let task = qb
            .build_query_as::<Task>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn filter(
        &self,
        owner: Uuid,
        filter: &TaskFilter,
        page: Page,
    ) -> Result<(Vec<Task>, i64), AppError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_task_filter(&mut count_qb, owner, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = task_page_query(owner, filter, page);
        let tasks = qb.build_query_as::<Task>().fetch_all(&self.pool).await?;

        Ok((tasks, total))
    }

    async fn overdue(
        &self,
        owner: Uuid,
        now: DateTime<Utc>,
        page: Page,
    ) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks \
             WHERE user_id = $1 AND status <> $2 AND due_date IS NOT NULL AND due_date < $3 \
             {} OFFSET $4 LIMIT $5",
            TASK_COLUMNS, DUE_SOONEST_FIRST
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(owner)
            .bind(TaskStatus::Completed)
            .bind(now)
            .bind(page.skip)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn count_overdue(&self, owner: Uuid, now: DateTime<Utc>) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks \
             WHERE user_id = $1 AND status <> $2 AND due_date IS NOT NULL AND due_date < $3",
        )
        .bind(owner)
        .bind(TaskStatus::Completed)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_by_status(&self, owner: Uuid, status: TaskStatus) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE user_id = $1 AND status = $2",
        )
        .bind(owner)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_by_category(&self, owner: Uuid, category_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE user_id = $1 AND category_id = $2",
        )
        .bind(owner)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_page_query_has_total_order() {
        let filter = TaskFilter {
            status: Some(TaskStatus::Todo),
            search: Some("report".to_string()),
            ..Default::default()
        };
        let qb = task_page_query(Uuid::new_v4(), &filter, Page::new(10, 5));

        assert_eq!(
            qb.sql(),
            "SELECT id, title, description, status, priority, due_date, user_id, category_id, \
             created_at, updated_at FROM tasks WHERE user_id = $1 AND status = $2 \
             AND (title ILIKE $3 OR description ILIKE $4) \
             ORDER BY created_at DESC, id DESC OFFSET $5 LIMIT $6"
        );
    }

    #[test]
    fn test_orderings_break_ties_on_id() {
        assert!(NEWEST_FIRST.ends_with(", id DESC"));
        assert!(DUE_SOONEST_FIRST.ends_with(", id ASC"));
    }
}
