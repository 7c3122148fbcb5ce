use std::sync::Arc;

use crate::auth::{PasswordHasher, TokenCodec};
use crate::config::Config;
use crate::monitoring::PerformanceMonitor;
use crate::services::{AuthService, CategoryService, TaskService, UserService};
use crate::store::Stores;

/// Everything handlers need, built once at startup and shared through `web::Data`.
pub struct AppState {
    pub app_name: String,
    pub app_version: String,
    pub environment: String,
    pub stores: Stores,
    pub tokens: TokenCodec,
    pub auth: AuthService,
    pub users: UserService,
    pub categories: CategoryService,
    pub tasks: TaskService,
    pub monitor: Arc<PerformanceMonitor>,
}

impl AppState {
    pub fn new(config: &Config, stores: Stores) -> Self {
        let tokens = TokenCodec::new(&config.tokens);
        let hasher = PasswordHasher::new(config.bcrypt_cost);
        let auth = AuthService::new(stores.users.clone(), tokens.clone(), hasher);

        Self {
            app_name: config.app_name.clone(),
            app_version: config.app_version.clone(),
            environment: config.environment.clone(),
            users: UserService::new(stores.users.clone(), auth.clone()),
            categories: CategoryService::new(stores.categories.clone(), stores.tasks.clone()),
            tasks: TaskService::new(stores.tasks.clone(), stores.categories.clone()),
            auth,
            tokens,
            stores,
            monitor: Arc::new(PerformanceMonitor::new()),
        }
    }

    /// Production deployments deliver reset and verification tokens out of band
    /// and never echo them in API responses.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}
