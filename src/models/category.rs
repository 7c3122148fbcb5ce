use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::Page;

lazy_static! {
    static ref HEX_COLOR_REGEX: Regex = Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap();
}

pub const DEFAULT_COLOR: &str = "#3B82F6";

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

/// A user-owned label for grouping tasks. Names are unique per owner.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[serde(default = "default_color")]
    #[validate(regex(path = "HEX_COLOR_REGEX", message = "Color must be a hex code like #FF5733"))]
    pub color: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CategoryUpdate {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(regex(path = "HEX_COLOR_REGEX", message = "Color must be a hex code like #FF5733"))]
    pub color: Option<String>,
}

impl CategoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none()
    }

    pub fn apply_to(&self, category: &mut Category) {
        if let Some(name) = &self.name {
            category.name = name.clone();
        }
        if let Some(color) = &self.color {
            category.color = color.clone();
        }
    }
}

fn default_category_limit() -> i64 {
    100
}

/// Query parameters for `GET /categories`.
#[derive(Debug, Deserialize, Validate)]
pub struct CategoryListQuery {
    #[serde(default)]
    #[validate(range(min = 0))]
    pub skip: i64,
    #[serde(default = "default_category_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
}

impl CategoryListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

/// A category together with the number of tasks filed under it.
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: Category,
    pub task_count: i64,
}
