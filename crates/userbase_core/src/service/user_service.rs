//! User use-case service.
//!
//! # Responsibility
//! - Enforce user business rules before delegating to the repository.
//! - Normalize input (trimmed name, lowercase email) prior to persistence.
//! - Shape list results into the pagination envelope.
//!
//! # Invariants
//! - Field and paging validation run before any repository call.
//! - Name uniqueness is checked on create, and on update only when the
//!   trimmed name differs from the stored one.
//! - Delete and deactivate re-fetch the user first and fail with `NotFound`
//!   without issuing the write.

use crate::dto::{CreateUserRequest, ListUsersRequest, PaginatedResponse, UpdateUserRequest, UserResponse};
use crate::model::user::{
    normalize_email, normalize_name, validate_email, validate_name, NewUser, User, UserId,
    UserValidationError,
};
use crate::repo::user_repo::{RepoError, UserRepository, UserSearchQuery};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Largest accepted `page_size`.
pub const PAGE_SIZE_MAX: u32 = 100;
/// Largest accepted search limit.
pub const SEARCH_LIMIT_MAX: u32 = 100;

pub type UserServiceResult<T> = Result<T, UserServiceError>;

/// Errors from user service operations.
///
/// `Display` renders the human-readable message handed back to callers.
#[derive(Debug)]
pub enum UserServiceError {
    /// Name or email failed field rules.
    Validation(UserValidationError),
    /// Another user already holds this name.
    DuplicateName(String),
    /// No user with this id.
    NotFound(UserId),
    /// Page index below 1.
    InvalidPage(u32),
    /// Page size outside `1..=PAGE_SIZE_MAX`.
    InvalidPageSize(u32),
    /// Search limit outside `1..=SEARCH_LIMIT_MAX`.
    InvalidSearchLimit(u32),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for UserServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateName(name) => write!(f, "name already exists: {name}"),
            Self::NotFound(id) => write!(f, "user not found: {id}"),
            Self::InvalidPage(page) => write!(f, "page must be at least 1, got {page}"),
            Self::InvalidPageSize(size) => write!(
                f,
                "page_size must be between 1 and {PAGE_SIZE_MAX}, got {size}"
            ),
            Self::InvalidSearchLimit(limit) => write!(
                f,
                "search limit must be between 1 and {SEARCH_LIMIT_MAX}, got {limit}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UserServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UserValidationError> for UserServiceError {
    fn from(value: UserValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for UserServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateName(name) => Self::DuplicateName(name),
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// User service facade over repository implementations.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validates, normalizes and persists a new active user.
    ///
    /// # Errors
    /// - `Validation` for out-of-range name length or malformed email.
    /// - `DuplicateName` when the trimmed name is already taken.
    pub fn create_user(&self, request: &CreateUserRequest) -> UserServiceResult<User> {
        validate_name(&request.name)?;
        validate_email(&request.email)?;

        let new_user = NewUser::new(&request.name, &request.email);
        self.ensure_name_available(&new_user.name)?;

        let user = self.repo.create_user(&new_user)?;
        info!(
            "event=user_create module=service status=ok user_id={}",
            user.id
        );
        Ok(user)
    }

    /// Gets one user by id, failing with `NotFound` when absent.
    pub fn get_user(&self, id: UserId) -> UserServiceResult<User> {
        self.repo
            .get_user(id)?
            .ok_or(UserServiceError::NotFound(id))
    }

    /// Lists users newest first.
    pub fn list_users(
        &self,
        page: u32,
        page_size: u32,
    ) -> UserServiceResult<PaginatedResponse<UserResponse>> {
        self.list_users_with(&ListUsersRequest::page(page, page_size))
    }

    /// Lists users with explicit filter and ordering.
    pub fn list_users_with(
        &self,
        request: &ListUsersRequest,
    ) -> UserServiceResult<PaginatedResponse<UserResponse>> {
        validate_paging(request.page, request.page_size)?;

        let page = self.repo.list_users(&request.to_query())?;
        debug!(
            "event=user_list module=service status=ok page={} page_size={} returned={} total={}",
            request.page,
            request.page_size,
            page.items.len(),
            page.total
        );

        let items = page.items.into_iter().map(UserResponse::from).collect();
        Ok(PaginatedResponse::new(
            items,
            page.total,
            request.page,
            request.page_size,
        ))
    }

    /// Applies the supplied fields to an existing user.
    ///
    /// Each supplied field is validated again; an empty string counts as
    /// supplied and fails validation.
    pub fn update_user(
        &self,
        id: UserId,
        request: &UpdateUserRequest,
    ) -> UserServiceResult<User> {
        let mut user = self.get_user(id)?;

        if let Some(name) = request.name.as_deref() {
            validate_name(name)?;
            let normalized = normalize_name(name);
            if normalized != user.name {
                self.ensure_name_available(&normalized)?;
            }
            user.name = normalized;
        }

        if let Some(email) = request.email.as_deref() {
            validate_email(email)?;
            user.email = normalize_email(email);
        }

        let updated = self.repo.update_user(&user)?;
        info!(
            "event=user_update module=service status=ok user_id={} name_changed={} email_changed={}",
            updated.id,
            request.name.is_some(),
            request.email.is_some()
        );
        Ok(updated)
    }

    /// Hard-deletes an existing user.
    pub fn delete_user(&self, id: UserId) -> UserServiceResult<bool> {
        self.get_user(id)?;

        let deleted = self.repo.delete_user(id)?;
        info!("event=user_delete module=service status=ok user_id={id} deleted={deleted}");
        Ok(deleted)
    }

    /// Soft-deletes an existing user and returns the stored row.
    pub fn deactivate_user(&self, id: UserId) -> UserServiceResult<User> {
        self.get_user(id)?;

        if !self.repo.soft_delete_user(id)? {
            return Err(UserServiceError::NotFound(id));
        }
        info!("event=user_deactivate module=service status=ok user_id={id}");
        self.get_user(id)
    }

    /// Substring search on name.
    ///
    /// The term is matched as given, surrounding whitespace included. A blank
    /// term yields no results without touching storage.
    pub fn search_users(&self, query: &UserSearchQuery) -> UserServiceResult<Vec<UserResponse>> {
        if query.limit == 0 || query.limit > SEARCH_LIMIT_MAX {
            return Err(UserServiceError::InvalidSearchLimit(query.limit));
        }

        if query.term.trim().is_empty() {
            return Ok(Vec::new());
        }

        let users = self.repo.search_users(query)?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    /// Batched lookup; unknown ids are skipped.
    pub fn get_users_by_ids(&self, ids: &[UserId]) -> UserServiceResult<Vec<UserResponse>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = self.repo.get_users_by_ids(ids)?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub fn count_users(&self, active: Option<bool>) -> UserServiceResult<u64> {
        Ok(self.repo.count_users(active)?)
    }

    fn ensure_name_available(&self, name: &str) -> UserServiceResult<()> {
        if self.repo.get_user_by_name(name)?.is_some() {
            return Err(UserServiceError::DuplicateName(name.to_string()));
        }
        Ok(())
    }
}

fn validate_paging(page: u32, page_size: u32) -> UserServiceResult<()> {
    if page < 1 {
        return Err(UserServiceError::InvalidPage(page));
    }
    if page_size < 1 || page_size > PAGE_SIZE_MAX {
        return Err(UserServiceError::InvalidPageSize(page_size));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::UserSummary;
    use crate::repo::user_repo::{RepoResult, UserListQuery, UserPage};
    use mockall::mock;

    mock! {
        pub UserRepo {}
        impl UserRepository for UserRepo {
            fn create_user(&self, user: &NewUser) -> RepoResult<User>;
            fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
            fn get_user_by_name(&self, name: &str) -> RepoResult<Option<User>>;
            fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
            fn get_users_by_ids(&self, ids: &[UserId]) -> RepoResult<Vec<User>>;
            fn get_user_summaries_by_ids(&self, ids: &[UserId]) -> RepoResult<Vec<UserSummary>>;
            fn list_users(&self, query: &UserListQuery) -> RepoResult<UserPage>;
            fn search_users(&self, query: &UserSearchQuery) -> RepoResult<Vec<User>>;
            fn update_user(&self, user: &User) -> RepoResult<User>;
            fn delete_user(&self, id: UserId) -> RepoResult<bool>;
            fn soft_delete_user(&self, id: UserId) -> RepoResult<bool>;
            fn delete_users_by_ids(&self, ids: &[UserId]) -> RepoResult<u64>;
            fn deactivate_users_by_ids(&self, ids: &[UserId]) -> RepoResult<u64>;
            fn count_users(&self, active: Option<bool>) -> RepoResult<u64>;
            fn create_users(&self, users: &[NewUser]) -> RepoResult<Vec<User>>;
        }
    }

    fn sample_user(id: UserId, name: &str, email: &str) -> User {
        User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            active: true,
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        }
    }

    fn persisted(user: &NewUser) -> User {
        User {
            id: 1,
            name: user.name.clone(),
            email: user.email.clone(),
            active: user.active,
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn create_user_checks_uniqueness_and_persists() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user_by_name()
            .withf(|name: &str| name == "홍길동")
            .times(1)
            .returning(|_| Ok(None));
        repo.expect_create_user()
            .times(1)
            .returning(|user| Ok(persisted(user)));

        let service = UserService::new(repo);
        let user = service
            .create_user(&CreateUserRequest::new("홍길동", "hong@test.com"))
            .unwrap();

        assert_eq!(user.name, "홍길동");
        assert_eq!(user.email, "hong@test.com");
        assert!(user.active);
    }

    #[test]
    fn create_user_normalizes_name_and_email_before_persisting() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user_by_name()
            .withf(|name: &str| name == "홍길동")
            .times(1)
            .returning(|_| Ok(None));
        repo.expect_create_user()
            .withf(|user: &NewUser| user.name == "홍길동" && user.email == "hong@test.com")
            .times(1)
            .returning(|user| Ok(persisted(user)));

        let service = UserService::new(repo);
        service
            .create_user(&CreateUserRequest::new("  홍길동  ", "HONG@TEST.COM"))
            .unwrap();
    }

    #[test]
    fn create_user_rejects_out_of_range_names_before_repository_access() {
        let too_long = "가".repeat(51);
        for name in ["홍", "홍길", "  a ", too_long.as_str()] {
            let mut repo = MockUserRepo::new();
            repo.expect_get_user_by_name().never();
            repo.expect_create_user().never();

            let service = UserService::new(repo);
            let err = service
                .create_user(&CreateUserRequest::new(name, "hong@test.com"))
                .unwrap_err();
            assert!(
                matches!(err, UserServiceError::Validation(_)),
                "unexpected error for {name:?}: {err}"
            );
        }
    }

    #[test]
    fn create_user_accepts_boundary_name_lengths() {
        for name in ["홍길동".to_string(), "가".repeat(50)] {
            let mut repo = MockUserRepo::new();
            repo.expect_get_user_by_name().returning(|_| Ok(None));
            repo.expect_create_user().returning(|user| Ok(persisted(user)));

            let service = UserService::new(repo);
            let user = service
                .create_user(&CreateUserRequest::new(name.clone(), "test@test.com"))
                .unwrap();
            assert_eq!(user.name, name);
        }
    }

    #[test]
    fn create_user_rejects_malformed_email() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user_by_name().never();
        repo.expect_create_user().never();

        let service = UserService::new(repo);
        let err = service
            .create_user(&CreateUserRequest::new("홍길동", "invalid-email"))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid email format: invalid-email");
    }

    #[test]
    fn create_user_rejects_duplicate_name_without_creating() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user_by_name()
            .returning(|_| Ok(Some(sample_user(1, "홍길동", "hong@test.com"))));
        repo.expect_create_user().never();

        let service = UserService::new(repo);
        let err = service
            .create_user(&CreateUserRequest::new(" 홍길동 ", "other@test.com"))
            .unwrap_err();
        assert!(matches!(err, UserServiceError::DuplicateName(ref name) if name == "홍길동"));
        assert_eq!(err.to_string(), "name already exists: 홍길동");
    }

    #[test]
    fn create_user_maps_storage_conflict_to_duplicate_name() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user_by_name().returning(|_| Ok(None));
        repo.expect_create_user()
            .returning(|user| Err(RepoError::DuplicateName(user.name.clone())));

        let service = UserService::new(repo);
        let err = service
            .create_user(&CreateUserRequest::new("홍길동", "hong@test.com"))
            .unwrap_err();
        assert!(matches!(err, UserServiceError::DuplicateName(_)));
    }

    #[test]
    fn get_user_missing_returns_not_found() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user().returning(|_| Ok(None));

        let service = UserService::new(repo);
        let err = service.get_user(999).unwrap_err();
        assert!(matches!(err, UserServiceError::NotFound(999)));
        assert_eq!(err.to_string(), "user not found: 999");
    }

    #[test]
    fn list_users_rejects_invalid_paging_before_repository_access() {
        for (page, page_size) in [(0, 20), (1, 0), (1, 101)] {
            let mut repo = MockUserRepo::new();
            repo.expect_list_users().never();

            let service = UserService::new(repo);
            let err = service.list_users(page, page_size).unwrap_err();
            if page == 0 {
                assert!(matches!(err, UserServiceError::InvalidPage(0)));
            } else {
                assert!(matches!(err, UserServiceError::InvalidPageSize(size) if size == page_size));
            }
        }
    }

    #[test]
    fn list_users_wraps_results_in_pagination_envelope() {
        let mut repo = MockUserRepo::new();
        repo.expect_list_users()
            .withf(|query: &UserListQuery| query.page == 1 && query.page_size == 20)
            .times(1)
            .returning(|_| {
                Ok(UserPage {
                    items: vec![
                        sample_user(1, "홍길동", "hong@test.com"),
                        sample_user(2, "김철수", "kim@test.com"),
                    ],
                    total: 2,
                })
            });

        let service = UserService::new(repo);
        let result = service.list_users(1, 20).unwrap();

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.total, 2);
        assert_eq!(result.page, 1);
        assert_eq!(result.page_size, 20);
        assert_eq!(result.pages, 1);
    }

    #[test]
    fn list_users_rounds_page_count_up() {
        let mut repo = MockUserRepo::new();
        repo.expect_list_users().returning(|_| {
            Ok(UserPage {
                items: Vec::new(),
                total: 45,
            })
        });

        let service = UserService::new(repo);
        let result = service.list_users(3, 20).unwrap();
        assert_eq!(result.pages, 3);
        assert_eq!(result.page, 3);
    }

    #[test]
    fn update_user_applies_normalized_fields() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user()
            .returning(|_| Ok(Some(sample_user(1, "홍길동", "hong@test.com"))));
        repo.expect_get_user_by_name()
            .withf(|name: &str| name == "홍길순")
            .times(1)
            .returning(|_| Ok(None));
        repo.expect_update_user()
            .withf(|user: &User| user.name == "홍길순" && user.email == "hongsoon@test.com")
            .times(1)
            .returning(|user| Ok(user.clone()));

        let service = UserService::new(repo);
        let request = UpdateUserRequest {
            name: Some(" 홍길순 ".to_string()),
            email: Some("HongSoon@Test.com".to_string()),
        };
        let updated = service.update_user(1, &request).unwrap();
        assert_eq!(updated.name, "홍길순");
        assert_eq!(updated.email, "hongsoon@test.com");
    }

    #[test]
    fn update_user_rejects_name_held_by_another_user() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user()
            .returning(|_| Ok(Some(sample_user(1, "홍길동", "hong@test.com"))));
        repo.expect_get_user_by_name()
            .returning(|_| Ok(Some(sample_user(2, "김철수", "kim@test.com"))));
        repo.expect_update_user().never();

        let service = UserService::new(repo);
        let request = UpdateUserRequest {
            name: Some("김철수".to_string()),
            email: None,
        };
        let err = service.update_user(1, &request).unwrap_err();
        assert!(matches!(err, UserServiceError::DuplicateName(_)));
    }

    #[test]
    fn update_user_keeping_current_name_skips_uniqueness_check() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user()
            .returning(|_| Ok(Some(sample_user(1, "홍길동", "hong@test.com"))));
        repo.expect_get_user_by_name().never();
        repo.expect_update_user()
            .times(1)
            .returning(|user| Ok(user.clone()));

        let service = UserService::new(repo);
        let request = UpdateUserRequest {
            name: Some("  홍길동".to_string()),
            email: None,
        };
        let updated = service.update_user(1, &request).unwrap();
        assert_eq!(updated.name, "홍길동");
    }

    #[test]
    fn update_user_validates_supplied_fields_only() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user()
            .returning(|_| Ok(Some(sample_user(1, "홍길동", "hong@test.com"))));
        repo.expect_update_user().never();

        let service = UserService::new(repo);
        let request = UpdateUserRequest {
            name: None,
            email: Some("broken".to_string()),
        };
        let err = service.update_user(1, &request).unwrap_err();
        assert!(matches!(
            err,
            UserServiceError::Validation(UserValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn update_user_missing_returns_not_found() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user().returning(|_| Ok(None));
        repo.expect_update_user().never();

        let service = UserService::new(repo);
        let err = service
            .update_user(7, &UpdateUserRequest::default())
            .unwrap_err();
        assert!(matches!(err, UserServiceError::NotFound(7)));
    }

    #[test]
    fn delete_user_removes_existing_user() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user()
            .returning(|_| Ok(Some(sample_user(1, "홍길동", "hong@test.com"))));
        repo.expect_delete_user()
            .withf(|id: &UserId| *id == 1)
            .times(1)
            .returning(|_| Ok(true));

        let service = UserService::new(repo);
        assert!(service.delete_user(1).unwrap());
    }

    #[test]
    fn delete_user_missing_fails_without_deleting() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user().returning(|_| Ok(None));
        repo.expect_delete_user().never();

        let service = UserService::new(repo);
        let err = service.delete_user(999).unwrap_err();
        assert!(matches!(err, UserServiceError::NotFound(999)));
    }

    #[test]
    fn deactivate_user_missing_fails_without_writing() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user().returning(|_| Ok(None));
        repo.expect_soft_delete_user().never();

        let service = UserService::new(repo);
        assert!(matches!(
            service.deactivate_user(3),
            Err(UserServiceError::NotFound(3))
        ));
    }

    #[test]
    fn search_users_validates_limit_and_skips_blank_terms() {
        let mut repo = MockUserRepo::new();
        repo.expect_search_users().never();

        let service = UserService::new(repo);
        let mut query = UserSearchQuery::new("홍");
        query.limit = 0;
        assert!(matches!(
            service.search_users(&query),
            Err(UserServiceError::InvalidSearchLimit(0))
        ));
        query.limit = 101;
        assert!(service.search_users(&query).is_err());

        let blank = UserSearchQuery::new("   ");
        assert!(service.search_users(&blank).unwrap().is_empty());
    }

    #[test]
    fn search_users_passes_term_through_untrimmed() {
        let mut repo = MockUserRepo::new();
        repo.expect_search_users()
            .withf(|query: &UserSearchQuery| query.term == " 홍 " && query.limit == 10)
            .times(1)
            .returning(|_| Ok(vec![sample_user(1, "홍길동", "hong@test.com")]));

        let service = UserService::new(repo);
        let hits = service.search_users(&UserSearchQuery::new(" 홍 ")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }
}
