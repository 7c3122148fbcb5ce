pub mod category;
pub mod task;
pub mod user;

use serde::{Deserialize, Deserializer};

pub use category::{Category, CategoryInput, CategoryListQuery, CategoryStats, CategoryUpdate};
pub use task::{
    OverdueQuery, PriorityQuery, StatusCounts, StatusQuery, Task, TaskFilter, TaskInput,
    TaskListResponse, TaskPriority, TaskQuery, TaskResponse, TaskStatistics, TaskStatus,
    TaskUpdate,
};
pub use user::{NewUser, PasswordUpdate, User, UserChanges, UserUpdate};

/// Offset/limit window applied to list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }

    /// One-based page number of this window.
    pub fn number(&self) -> i64 {
        self.skip / self.limit.max(1) + 1
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            return 0;
        }
        let limit = self.limit.max(1);
        (total + limit - 1) / limit
    }
}

/// Deserializes a present field into `Some(value)`, so that together with
/// `#[serde(default)]` an absent field (`None`) can be told apart from an
/// explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
