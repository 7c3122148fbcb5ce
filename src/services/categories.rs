use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Category, CategoryInput, CategoryStats, CategoryUpdate, Page};
use crate::store::{CategoryStore, TaskStore};

fn category_not_found() -> AppError {
    AppError::NotFound("Category not found".into())
}

fn duplicate_name(name: &str) -> AppError {
    AppError::AlreadyExists(format!("Category '{}' already exists", name))
}

#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn CategoryStore>,
    tasks: Arc<dyn TaskStore>,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn CategoryStore>, tasks: Arc<dyn TaskStore>) -> Self {
        Self { categories, tasks }
    }

    pub async fn create(&self, owner: Uuid, input: CategoryInput) -> Result<Category, AppError> {
        if self.categories.name_exists(owner, &input.name, None).await? {
            return Err(duplicate_name(&input.name));
        }
        let name = input.name.clone();
        self.categories
            .create(owner, input)
            .await
            .map_err(|e| match e {
                AppError::AlreadyExists(_) => duplicate_name(&name),
                other => other,
            })
    }

    pub async fn list(&self, owner: Uuid, page: Page) -> Result<Vec<Category>, AppError> {
        self.categories.list_by_owner(owner, page).await
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Category, AppError> {
        self.categories
            .get_owned(owner, id)
            .await?
            .ok_or_else(category_not_found)
    }

    /// Renaming a category to its current name is allowed.
    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        update: CategoryUpdate,
    ) -> Result<Category, AppError> {
        let existing = self.get(owner, id).await?;
        if update.is_empty() {
            return Ok(existing);
        }

        if let Some(name) = update.name.as_deref() {
            if self.categories.name_exists(owner, name, Some(id)).await? {
                return Err(duplicate_name(name));
            }
        }

        self.categories
            .update(owner, id, update)
            .await?
            .ok_or_else(category_not_found)
    }

    /// Tasks filed under the category are kept and lose their category.
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), AppError> {
        if !self.categories.delete(owner, id).await? {
            return Err(category_not_found());
        }
        Ok(())
    }

    pub async fn stats(&self, owner: Uuid, id: Uuid) -> Result<CategoryStats, AppError> {
        let category = self.get(owner, id).await?;
        let task_count = self.tasks.count_by_category(owner, id).await?;
        Ok(CategoryStats {
            category,
            task_count,
        })
    }
}
