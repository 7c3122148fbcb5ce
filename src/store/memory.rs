use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{CategoryStore, OwnedStore, StoreHealth, TaskStore, UserStore};
use crate::error::AppError;
use crate::models::{
    Category, CategoryInput, CategoryUpdate, NewUser, Page, Task, TaskFilter, TaskInput,
    TaskStatus, TaskUpdate, User, UserChanges,
};

#[derive(Default)]
struct Tables {
    // Rows are kept in insertion order, so the newest row is last.
    users: Vec<User>,
    categories: Vec<Category>,
    tasks: Vec<Task>,
}

/// In-process store with the same constraints as the PostgreSQL schema:
/// unique emails and usernames, unique category names per owner, cascading
/// user deletion and `SET NULL` on category deletion.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".into()))
    }
}

fn paginate<T: Clone>(rows: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    rows.skip(page.skip.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}

fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    task.status != TaskStatus::Completed && task.due_date.is_some_and(|due| due < now)
}

impl Tables {
    fn check_user_unique(
        &self,
        email: Option<&str>,
        username: Option<&str>,
        except: Option<Uuid>,
    ) -> Result<(), AppError> {
        let others = self.users.iter().filter(|u| Some(u.id) != except);
        for user in others {
            if email.is_some_and(|e| e == user.email) {
                return Err(AppError::AlreadyExists("Email already registered".into()));
            }
            if username.is_some_and(|n| n == user.username) {
                return Err(AppError::AlreadyExists("Username already taken".into()));
            }
        }
        Ok(())
    }

    fn category_name_taken(&self, owner: Uuid, name: &str, except: Option<Uuid>) -> bool {
        self.categories
            .iter()
            .any(|c| c.user_id == owner && c.name == name && Some(c.id) != except)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables()?;
        tables.check_user_unique(Some(&new_user.email), Some(&new_user.username), None)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            hashed_password: new_user.hashed_password,
            is_active: true,
            is_verified: false,
            full_name: new_user.full_name,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let tables = self.tables()?;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables()?;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables()?;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn get_by_email_or_username(&self, identifier: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables()?;
        let by_email = tables.users.iter().find(|u| u.email == identifier);
        Ok(by_email
            .or_else(|| tables.users.iter().find(|u| u.username == identifier))
            .cloned())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let tables = self.tables()?;
        Ok(tables.users.iter().any(|u| u.email == email))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let tables = self.tables()?;
        Ok(tables.users.iter().any(|u| u.username == username))
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AppError> {
        let mut tables = self.tables()?;
        tables.check_user_unique(
            changes.email.as_deref(),
            changes.username.as_deref(),
            Some(id),
        )?;

        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        changes.apply_to(user);
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables()?;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }
        tables.categories.retain(|c| c.user_id != id);
        tables.tasks.retain(|t| t.user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl OwnedStore<Category> for MemoryStore {
    async fn create(&self, owner: Uuid, new: CategoryInput) -> Result<Category, AppError> {
        let mut tables = self.tables()?;
        if tables.category_name_taken(owner, &new.name, None) {
            return Err(AppError::AlreadyExists("Category already exists".into()));
        }

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: new.name,
            color: new.color,
            user_id: owner,
            created_at: now,
            updated_at: now,
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn get_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<Category>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .categories
            .iter()
            .find(|c| c.id == id && c.user_id == owner)
            .cloned())
    }

    async fn list_by_owner(&self, owner: Uuid, page: Page) -> Result<Vec<Category>, AppError> {
        let tables = self.tables()?;
        let owned = tables.categories.iter().rev().filter(|c| c.user_id == owner);
        Ok(paginate(owned.cloned(), page))
    }

    async fn count_by_owner(&self, owner: Uuid) -> Result<i64, AppError> {
        let tables = self.tables()?;
        Ok(tables.categories.iter().filter(|c| c.user_id == owner).count() as i64)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: CategoryUpdate,
    ) -> Result<Option<Category>, AppError> {
        let mut tables = self.tables()?;
        if let Some(name) = changes.name.as_deref() {
            if tables.category_name_taken(owner, name, Some(id)) {
                return Err(AppError::AlreadyExists("Category already exists".into()));
            }
        }

        let Some(category) = tables
            .categories
            .iter_mut()
            .find(|c| c.id == id && c.user_id == owner)
        else {
            return Ok(None);
        };
        changes.apply_to(category);
        category.updated_at = Utc::now();
        Ok(Some(category.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables()?;
        let before = tables.categories.len();
        tables
            .categories
            .retain(|c| !(c.id == id && c.user_id == owner));
        if tables.categories.len() == before {
            return Ok(false);
        }
        for task in tables.tasks.iter_mut() {
            if task.category_id == Some(id) {
                task.category_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn name_exists(
        &self,
        owner: Uuid,
        name: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let tables = self.tables()?;
        Ok(tables.category_name_taken(owner, name, exclude_id))
    }
}

#[async_trait]
impl OwnedStore<Task> for MemoryStore {
    async fn create(&self, owner: Uuid, new: TaskInput) -> Result<Task, AppError> {
        let mut tables = self.tables()?;
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            status: new.status,
            priority: new.priority,
            due_date: new.due_date,
            user_id: owner,
            category_id: new.category_id,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.push(task.clone());
        Ok(task)
    }

    async fn get_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .tasks
            .iter()
            .find(|t| t.id == id && t.user_id == owner)
            .cloned())
    }

    async fn list_by_owner(&self, owner: Uuid, page: Page) -> Result<Vec<Task>, AppError> {
        let tables = self.tables()?;
        let owned = tables.tasks.iter().rev().filter(|t| t.user_id == owner);
        Ok(paginate(owned.cloned(), page))
    }

    async fn count_by_owner(&self, owner: Uuid) -> Result<i64, AppError> {
        let tables = self.tables()?;
        Ok(tables.tasks.iter().filter(|t| t.user_id == owner).count() as i64)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TaskUpdate,
    ) -> Result<Option<Task>, AppError> {
        let mut tables = self.tables()?;
        let Some(task) = tables
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.user_id == owner)
        else {
            return Ok(None);
        };
        changes.apply_to(task);
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables()?;
        let before = tables.tasks.len();
        tables.tasks.retain(|t| !(t.id == id && t.user_id == owner));
        Ok(tables.tasks.len() < before)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn filter(
        &self,
        owner: Uuid,
        filter: &TaskFilter,
        page: Page,
    ) -> Result<(Vec<Task>, i64), AppError> {
        let tables = self.tables()?;
        let matching: Vec<&Task> = tables
            .tasks
            .iter()
            .rev()
            .filter(|t| t.user_id == owner && filter.matches(t))
            .collect();
        let total = matching.len() as i64;
        Ok((paginate(matching.into_iter().cloned(), page), total))
    }

    async fn overdue(
        &self,
        owner: Uuid,
        now: DateTime<Utc>,
        page: Page,
    ) -> Result<Vec<Task>, AppError> {
        let tables = self.tables()?;
        let mut overdue: Vec<&Task> = tables
            .tasks
            .iter()
            .filter(|t| t.user_id == owner && is_overdue(t, now))
            .collect();
        overdue.sort_by_key(|t| t.due_date);
        Ok(paginate(overdue.into_iter().cloned(), page))
    }

    async fn count_overdue(&self, owner: Uuid, now: DateTime<Utc>) -> Result<i64, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .tasks
            .iter()
            .filter(|t| t.user_id == owner && is_overdue(t, now))
            .count() as i64)
    }

    async fn count_by_status(&self, owner: Uuid, status: TaskStatus) -> Result<i64, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .tasks
            .iter()
            .filter(|t| t.user_id == owner && t.status == status)
            .count() as i64)
    }

    async fn count_by_category(&self, owner: Uuid, category_id: Uuid) -> Result<i64, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .tasks
            .iter()
            .filter(|t| t.user_id == owner && t.category_id == Some(category_id))
            .count() as i64)
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        self.tables().map(|_| ())
    }
}
