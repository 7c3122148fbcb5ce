//! Persistence traits and their backends.
//!
//! Every record except users belongs to exactly one owner. The owned-record traits take
//! the owner's id on every call, and a record belonging to someone else is reported
//! exactly like a record that does not exist (`None` / `false`).
//!
//! Two backends implement all traits: [`postgres::PgStore`] for production and
//! [`memory::MemoryStore`] for tests and `DATABASE_URL=memory://`.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Category, CategoryInput, CategoryUpdate, NewUser, Page, Task, TaskFilter, TaskInput,
    TaskStatus, TaskUpdate, User, UserChanges,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `AlreadyExists` when the email or username is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;
    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    /// Matches `identifier` against the email first, then the username.
    async fn get_by_email_or_username(&self, identifier: &str) -> Result<Option<User>, AppError>;
    async fn email_exists(&self, email: &str) -> Result<bool, AppError>;
    async fn username_exists(&self, username: &str) -> Result<bool, AppError>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AppError>;
    /// Removes the user along with every category and task they own.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

/// A record type stored under an owner, with its creation and update payloads.
pub trait OwnedEntity: Send + Sync + 'static {
    type New: Send + Sync + 'static;
    type Changes: Send + Sync + 'static;
}

impl OwnedEntity for Category {
    type New = CategoryInput;
    type Changes = CategoryUpdate;
}

impl OwnedEntity for Task {
    type New = TaskInput;
    type Changes = TaskUpdate;
}

#[async_trait]
pub trait OwnedStore<E: OwnedEntity>: Send + Sync {
    async fn create(&self, owner: Uuid, new: E::New) -> Result<E, AppError>;
    async fn get_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<E>, AppError>;
    /// Newest first.
    async fn list_by_owner(&self, owner: Uuid, page: Page) -> Result<Vec<E>, AppError>;
    async fn count_by_owner(&self, owner: Uuid) -> Result<i64, AppError>;
    async fn update(&self, owner: Uuid, id: Uuid, changes: E::Changes)
        -> Result<Option<E>, AppError>;
    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait CategoryStore: OwnedStore<Category> {
    async fn name_exists(
        &self,
        owner: Uuid,
        name: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, AppError>;
}

#[async_trait]
pub trait TaskStore: OwnedStore<Task> {
    /// Returns one page of matching tasks, newest first, plus the total match count.
    async fn filter(
        &self,
        owner: Uuid,
        filter: &TaskFilter,
        page: Page,
    ) -> Result<(Vec<Task>, i64), AppError>;
    /// Unfinished tasks due before `now`, earliest due date first.
    async fn overdue(&self, owner: Uuid, now: DateTime<Utc>, page: Page)
        -> Result<Vec<Task>, AppError>;
    async fn count_overdue(&self, owner: Uuid, now: DateTime<Utc>) -> Result<i64, AppError>;
    async fn count_by_status(&self, owner: Uuid, status: TaskStatus) -> Result<i64, AppError>;
    async fn count_by_category(&self, owner: Uuid, category_id: Uuid) -> Result<i64, AppError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;
}

/// The store handles shared by the services, all backed by one backend.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub categories: Arc<dyn CategoryStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub health: Arc<dyn StoreHealth>,
}

impl Stores {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: UserStore + CategoryStore + TaskStore + StoreHealth + 'static,
    {
        Self {
            users: backend.clone(),
            categories: backend.clone(),
            tasks: backend.clone(),
            health: backend,
        }
    }

    pub fn memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }
}

/// Escapes `%`, `_` and `\` so a search term matches literally inside `ILIKE`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
