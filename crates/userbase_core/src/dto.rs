//! Request/response shapes exchanged with callers of the service layer.
//!
//! # Responsibility
//! - Describe inputs accepted by `UserService` and the payloads it returns.
//! - Build the pagination envelope from a page slice and filtered total.
//!
//! # Invariants
//! - `PaginatedResponse::pages == ceil(total / page_size)`.
//! - Response DTOs are derived from persisted `User` rows only.

use crate::model::user::{User, UserId};
use crate::repo::user_repo::{SortDirection, UserListQuery, UserSortField};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

impl CreateUserRequest {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UpdateUserRequest {
    /// Returns whether no field was supplied.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

/// Paginated list request with optional filter and ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListUsersRequest {
    pub page: u32,
    pub page_size: u32,
    pub active: Option<bool>,
    pub sort_field: UserSortField,
    pub sort_direction: SortDirection,
}

impl Default for ListUsersRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            active: None,
            sort_field: UserSortField::default(),
            sort_direction: SortDirection::default(),
        }
    }
}

impl ListUsersRequest {
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            ..Self::default()
        }
    }

    pub(crate) fn to_query(&self) -> UserListQuery {
        UserListQuery {
            page: self.page,
            page_size: self.page_size,
            active: self.active,
            sort_field: self.sort_field,
            sort_direction: self.sort_direction,
        }
    }
}

/// Outward view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub active: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            active: user.active,
            created_at: user.created_at,
        }
    }
}

/// Pagination envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    /// Number of rows matching the filter, across all pages.
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        Self {
            items,
            total,
            page,
            page_size,
            pages: total_pages(total, page_size),
        }
    }
}

/// Returns `ceil(total / page_size)`, or `0` for a zero page size.
pub fn total_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}
