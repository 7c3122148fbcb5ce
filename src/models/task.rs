use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{double_option, Page};

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task is yet to be started.
    #[default]
    Todo,
    /// Task is currently being worked on.
    InProgress,
    /// Task is completed.
    Completed,
    /// Task is kept for reference only.
    Archived,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Archived,
    ];
}

/// Represents a task entity as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    /// The title of the task.
    pub title: String,
    /// An optional description for the task.
    pub description: Option<String>,
    /// The current status of the task.
    pub status: TaskStatus,
    /// The priority of the task.
    pub priority: TaskPriority,
    /// Optional due date for the task.
    pub due_date: Option<DateTime<Utc>>,
    /// Identifier of the user who owns the task. Never changes after creation.
    pub user_id: Uuid,
    /// Optional category, always owned by the same user.
    pub category_id: Option<Uuid>,
    /// Timestamp of when the task was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update to the task.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A task is overdue when its due date has passed and it is not completed.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => due < now && self.status != TaskStatus::Completed,
            None => false,
        }
    }
}

/// Input structure for creating a task.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// Must be between 1 and 200 characters.
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub category_id: Option<Uuid>,
}

/// Partial update of a task. Absent fields are left untouched; an explicit
/// `null` clears `description`, `due_date` or `category_id`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<Uuid>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.category_id.is_none()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(category_id) = self.category_id {
            task.category_id = category_id;
        }
    }
}

/// A task as returned by the API, with the derived overdue flag.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: Task,
    pub is_overdue: bool,
}

impl TaskResponse {
    pub fn at(task: Task, now: DateTime<Utc>) -> Self {
        let is_overdue = task.is_overdue_at(now);
        Self { task, is_overdue }
    }
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self::at(task, Utc::now())
    }
}

/// One page of a filtered task listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub items: Vec<TaskResponse>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl TaskListResponse {
    pub fn new(tasks: Vec<Task>, total: i64, page: Page) -> Self {
        let now = Utc::now();
        Self {
            items: tasks.into_iter().map(|t| TaskResponse::at(t, now)).collect(),
            total,
            page: page.number(),
            page_size: page.limit,
            total_pages: page.total_pages(total),
        }
    }
}

/// Filter predicates for listing tasks. All present predicates must match.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category_id: Option<Uuid>,
    /// Case-insensitive substring matched against title and description.
    pub search: Option<String>,
    /// Inclusive lower bound on the due date.
    pub due_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the due date.
    pub due_to: Option<DateTime<Utc>>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        if self.category_id.is_some() && self.category_id != task.category_id {
            return false;
        }
        if let Some(term) = self.search.as_deref() {
            let term = term.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&term);
            let in_description = task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&term));
            if !in_title && !in_description {
                return false;
            }
        }
        if let Some(from) = self.due_from {
            if !task.due_date.is_some_and(|due| due >= from) {
                return false;
            }
        }
        if let Some(to) = self.due_to {
            if !task.due_date.is_some_and(|due| due <= to) {
                return false;
            }
        }
        true
    }
}

fn default_task_limit() -> i64 {
    10
}

/// Query parameters for `GET /tasks`.
#[derive(Debug, Deserialize, Validate)]
pub struct TaskQuery {
    #[serde(default)]
    #[validate(range(min = 0))]
    pub skip: i64,
    #[serde(default = "default_task_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category_id: Option<Uuid>,
    #[validate(length(max = 200))]
    pub search: Option<String>,
    pub due_date_from: Option<DateTime<Utc>>,
    pub due_date_to: Option<DateTime<Utc>>,
}

impl TaskQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }

    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            status: self.status,
            priority: self.priority,
            category_id: self.category_id,
            search: self.search.clone().filter(|s| !s.is_empty()),
            due_from: self.due_date_from,
            due_to: self.due_date_to,
        }
    }
}

/// Query parameters for `GET /tasks/overdue`.
#[derive(Debug, Deserialize, Validate)]
pub struct OverdueQuery {
    #[serde(default)]
    #[validate(range(min = 0))]
    pub skip: i64,
    #[serde(default = "default_task_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
}

impl OverdueQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub new_status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct PriorityQuery {
    pub new_priority: TaskPriority,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub todo: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub archived: i64,
}

impl StatusCounts {
    pub fn set(&mut self, status: TaskStatus, count: i64) {
        match status {
            TaskStatus::Todo => self.todo = count,
            TaskStatus::InProgress => self.in_progress = count,
            TaskStatus::Completed => self.completed = count,
            TaskStatus::Archived => self.archived = count,
        }
    }
}

/// Per-user task statistics.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskStatistics {
    pub total: i64,
    pub by_status: StatusCounts,
    pub overdue: i64,
}
