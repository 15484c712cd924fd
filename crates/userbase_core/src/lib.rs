//! Core domain logic for the user store.
//! This crate is the single source of truth for user business invariants.

pub mod config;
pub mod db;
pub mod dto;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use dto::{
    CreateUserRequest, ListUsersRequest, PaginatedResponse, UpdateUserRequest, UserResponse,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::user::{NewUser, User, UserId, UserSummary, UserValidationError};
pub use repo::user_repo::{
    RepoError, RepoResult, SortDirection, SqliteUserRepository, UserListQuery, UserPage,
    UserRepository, UserSearchQuery, UserSortField,
};
pub use service::user_service::{UserService, UserServiceError, UserServiceResult};

/// Minimal health-check API for embedding callers.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
