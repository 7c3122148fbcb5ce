//! Workflows between the HTTP layer and the stores. Every operation takes the
//! acting user's id and returns `Result<T, AppError>`.

pub mod auth;
pub mod categories;
pub mod tasks;
pub mod users;

pub use auth::AuthService;
pub use categories::CategoryService;
pub use tasks::TaskService;
pub use users::UserService;
