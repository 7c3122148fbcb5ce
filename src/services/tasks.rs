use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Page, StatusCounts, Task, TaskFilter, TaskInput, TaskListResponse, TaskPriority,
    TaskStatistics, TaskStatus, TaskUpdate,
};
use crate::store::{CategoryStore, TaskStore};

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found".into())
}

#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    categories: Arc<dyn CategoryStore>,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskStore>, categories: Arc<dyn CategoryStore>) -> Self {
        Self { tasks, categories }
    }

    /// A task may only reference a category owned by the same user.
    async fn ensure_category(&self, owner: Uuid, category_id: Uuid) -> Result<(), AppError> {
        match self.categories.get_owned(owner, category_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Category not found".into())),
        }
    }

    pub async fn create(&self, owner: Uuid, input: TaskInput) -> Result<Task, AppError> {
        if let Some(category_id) = input.category_id {
            self.ensure_category(owner, category_id).await?;
        }
        self.tasks.create(owner, input).await
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Task, AppError> {
        self.tasks
            .get_owned(owner, id)
            .await?
            .ok_or_else(task_not_found)
    }

    pub async fn list(
        &self,
        owner: Uuid,
        filter: &TaskFilter,
        page: Page,
    ) -> Result<TaskListResponse, AppError> {
        if let Some(category_id) = filter.category_id {
            self.ensure_category(owner, category_id).await?;
        }
        let (tasks, total) = self.tasks.filter(owner, filter, page).await?;
        Ok(TaskListResponse::new(tasks, total, page))
    }

    /// Updates only the fields present in `update`; `category_id: null` clears the category.
    pub async fn update(&self, owner: Uuid, id: Uuid, update: TaskUpdate) -> Result<Task, AppError> {
        let existing = self.get(owner, id).await?;
        if update.is_empty() {
            return Ok(existing);
        }
        if let Some(Some(category_id)) = update.category_id {
            self.ensure_category(owner, category_id).await?;
        }

        self.tasks
            .update(owner, id, update)
            .await?
            .ok_or_else(task_not_found)
    }

    pub async fn update_status(
        &self,
        owner: Uuid,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Task, AppError> {
        let update = TaskUpdate {
            status: Some(status),
            ..Default::default()
        };
        self.update(owner, id, update).await
    }

    pub async fn update_priority(
        &self,
        owner: Uuid,
        id: Uuid,
        priority: TaskPriority,
    ) -> Result<Task, AppError> {
        let update = TaskUpdate {
            priority: Some(priority),
            ..Default::default()
        };
        self.update(owner, id, update).await
    }

    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), AppError> {
        if !self.tasks.delete(owner, id).await? {
            return Err(task_not_found());
        }
        Ok(())
    }

    pub async fn overdue(&self, owner: Uuid, page: Page) -> Result<Vec<Task>, AppError> {
        self.tasks.overdue(owner, Utc::now(), page).await
    }

    pub async fn statistics(&self, owner: Uuid) -> Result<TaskStatistics, AppError> {
        let total = self.tasks.count_by_owner(owner).await?;

        let mut by_status = StatusCounts::default();
        for status in TaskStatus::ALL {
            let count = self.tasks.count_by_status(owner, status).await?;
            by_status.set(status, count);
        }

        let overdue = self.tasks.count_overdue(owner, Utc::now()).await?;

        Ok(TaskStatistics {
            total,
            by_status,
            overdue,
        })
    }
}
