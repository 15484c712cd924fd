//! User repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Translate user CRUD and query operations into SQL over `users`.
//! - Keep SQL details inside the persistence boundary; own no business rules.
//!
//! # Invariants
//! - Read paths return `None`/empty results for missing rows, never `NotFound`.
//! - Pagination totals are counted under the same filter as the page slice.
//! - Rows failing to decode surface as `InvalidData` instead of being masked.
//! - `users.name` uniqueness violations surface as `DuplicateName`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::user::{NewUser, User, UserId, UserSummary};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    email,
    active,
    created_at,
    updated_at
FROM users";

const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

/// Upper bound of bound parameters per `IN (...)` statement.
const IN_CLAUSE_CHUNK: usize = 500;

/// Default number of rows returned by name search.
pub const SEARCH_DEFAULT_LIMIT: u32 = 10;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for user persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Write rejected by the `users.name` unique constraint.
    DuplicateName(String),
    /// Write path targeted a row that does not exist.
    NotFound(UserId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateName(name) => write!(f, "name already exists: {name}"),
            Self::NotFound(id) => write!(f, "user not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted user data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Column a user list can be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSortField {
    Id,
    Name,
    Email,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl UserSortField {
    /// Parses a field name as accepted by callers (`created_at`, `name`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Email => "email",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Query options for paginated user listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListQuery {
    /// 1-based page index.
    pub page: u32,
    pub page_size: u32,
    /// `None` lists active and inactive users.
    pub active: Option<bool>,
    pub sort_field: UserSortField,
    pub sort_direction: SortDirection,
}

impl Default for UserListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            active: None,
            sort_field: UserSortField::default(),
            sort_direction: SortDirection::default(),
        }
    }
}

/// One page of users plus the filtered total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPage {
    pub items: Vec<User>,
    pub total: u64,
}

/// Options for substring search by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSearchQuery {
    /// Substring matched against `name`; wildcards are taken literally.
    pub term: String,
    pub active: Option<bool>,
    pub limit: u32,
}

impl UserSearchQuery {
    /// Creates an unfiltered search bounded by [`SEARCH_DEFAULT_LIMIT`].
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            active: None,
            limit: SEARCH_DEFAULT_LIMIT,
        }
    }
}

/// Repository interface for user persistence.
pub trait UserRepository {
    /// Inserts one user and returns the stored row.
    fn create_user(&self, user: &NewUser) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Exact, case-sensitive name lookup.
    fn get_user_by_name(&self, name: &str) -> RepoResult<Option<User>>;
    /// Case-insensitive email lookup.
    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Batched lookup ordered by id; unknown ids are skipped.
    fn get_users_by_ids(&self, ids: &[UserId]) -> RepoResult<Vec<User>>;
    fn get_user_summaries_by_ids(&self, ids: &[UserId]) -> RepoResult<Vec<UserSummary>>;
    fn list_users(&self, query: &UserListQuery) -> RepoResult<UserPage>;
    fn search_users(&self, query: &UserSearchQuery) -> RepoResult<Vec<User>>;
    /// Persists name/email/active of an existing row and returns it re-read.
    fn update_user(&self, user: &User) -> RepoResult<User>;
    /// Hard delete. Returns `false` when no row matched.
    fn delete_user(&self, id: UserId) -> RepoResult<bool>;
    /// Sets `active = false`. Returns `false` when no row matched.
    fn soft_delete_user(&self, id: UserId) -> RepoResult<bool>;
    fn delete_users_by_ids(&self, ids: &[UserId]) -> RepoResult<u64>;
    fn deactivate_users_by_ids(&self, ids: &[UserId]) -> RepoResult<u64>;
    fn count_users(&self, active: Option<bool>) -> RepoResult<u64>;
    /// Inserts all users in one transaction, or none of them.
    fn create_users(&self, users: &[NewUser]) -> RepoResult<Vec<User>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_user_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        let id = insert_user(self.conn, user)?;
        load_required_user(self.conn, id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        query_optional_user(
            self.conn,
            &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
            Value::Integer(id),
        )
    }

    fn get_user_by_name(&self, name: &str) -> RepoResult<Option<User>> {
        query_optional_user(
            self.conn,
            &format!("{USER_SELECT_SQL} WHERE name = ?1;"),
            Value::Text(name.to_string()),
        )
    }

    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        query_optional_user(
            self.conn,
            &format!("{USER_SELECT_SQL} WHERE email = ?1 COLLATE NOCASE ORDER BY id ASC LIMIT 1;"),
            Value::Text(email.to_string()),
        )
    }

    fn get_users_by_ids(&self, ids: &[UserId]) -> RepoResult<Vec<User>> {
        let mut users = Vec::new();
        for chunk in unique_ids(ids).chunks(IN_CLAUSE_CHUNK) {
            let sql = format!(
                "{USER_SELECT_SQL} WHERE id IN ({}) ORDER BY id ASC;",
                in_placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                users.push(parse_user_row(row)?);
            }
        }
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    fn get_user_summaries_by_ids(&self, ids: &[UserId]) -> RepoResult<Vec<UserSummary>> {
        let mut summaries = Vec::new();
        for chunk in unique_ids(ids).chunks(IN_CLAUSE_CHUNK) {
            let sql = format!(
                "SELECT id, name, email FROM users WHERE id IN ({}) ORDER BY id ASC;",
                in_placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                summaries.push(UserSummary {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    email: row.get("email")?,
                });
            }
        }
        summaries.sort_by_key(|summary| summary.id);
        Ok(summaries)
    }

    fn list_users(&self, query: &UserListQuery) -> RepoResult<UserPage> {
        let mut filter = String::from(" WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(active) = query.active {
            filter.push_str(" AND active = ?");
            bind_values.push(Value::Integer(bool_to_int(active)));
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM users{filter};"),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;

        let total = count_to_u64(total)?;
        // An offset past i64 lies beyond any table.
        let Some(offset) =
            i64::from(query.page.saturating_sub(1)).checked_mul(i64::from(query.page_size))
        else {
            return Ok(UserPage {
                items: Vec::new(),
                total,
            });
        };

        let direction = query.sort_direction.keyword();
        let sql = format!(
            "{USER_SELECT_SQL}{filter} ORDER BY {} {direction}, id {direction} LIMIT ? OFFSET ?;",
            query.sort_field.column()
        );
        bind_values.push(Value::Integer(i64::from(query.page_size)));
        bind_values.push(Value::Integer(offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_user_row(row)?);
        }

        Ok(UserPage { items, total })
    }

    fn search_users(&self, query: &UserSearchQuery) -> RepoResult<Vec<User>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let mut sql = format!("{USER_SELECT_SQL} WHERE name LIKE ? ESCAPE '\\'");
        let mut bind_values = vec![Value::Text(format!("%{}%", escape_like(&query.term)))];
        if let Some(active) = query.active {
            sql.push_str(" AND active = ?");
            bind_values.push(Value::Integer(bool_to_int(active)));
        }
        sql.push_str(" ORDER BY name ASC, id ASC LIMIT ?;");
        bind_values.push(Value::Integer(i64::from(query.limit)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn update_user(&self, user: &User) -> RepoResult<User> {
        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE users
                     SET
                        name = ?1,
                        email = ?2,
                        active = ?3,
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?4;"
                ),
                params![
                    user.name.as_str(),
                    user.email.as_str(),
                    bool_to_int(user.active),
                    user.id,
                ],
            )
            .map_err(|err| map_name_conflict(err, &user.name))?;

        if changed == 0 {
            return Err(RepoError::NotFound(user.id));
        }

        load_required_user(self.conn, user.id)
    }

    fn delete_user(&self, id: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn soft_delete_user(&self, id: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            &format!("UPDATE users SET active = 0, updated_at = {NOW_MS_SQL} WHERE id = ?1;"),
            [id],
        )?;
        Ok(changed > 0)
    }

    fn delete_users_by_ids(&self, ids: &[UserId]) -> RepoResult<u64> {
        let mut removed = 0u64;
        for chunk in ids.chunks(IN_CLAUSE_CHUNK) {
            let sql = format!(
                "DELETE FROM users WHERE id IN ({});",
                in_placeholders(chunk.len())
            );
            removed += self.conn.execute(&sql, params_from_iter(chunk.iter()))? as u64;
        }
        Ok(removed)
    }

    fn deactivate_users_by_ids(&self, ids: &[UserId]) -> RepoResult<u64> {
        let mut matched = 0u64;
        for chunk in ids.chunks(IN_CLAUSE_CHUNK) {
            let sql = format!(
                "UPDATE users SET active = 0, updated_at = {NOW_MS_SQL} WHERE id IN ({});",
                in_placeholders(chunk.len())
            );
            matched += self.conn.execute(&sql, params_from_iter(chunk.iter()))? as u64;
        }
        Ok(matched)
    }

    fn count_users(&self, active: Option<bool>) -> RepoResult<u64> {
        let total: i64 = match active {
            Some(active) => self.conn.query_row(
                "SELECT COUNT(*) FROM users WHERE active = ?1;",
                [bool_to_int(active)],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))?,
        };
        count_to_u64(total)
    }

    fn create_users(&self, users: &[NewUser]) -> RepoResult<Vec<User>> {
        if users.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(users.len());
        for user in users {
            ids.push(insert_user(&tx, user)?);
        }
        let mut created = Vec::with_capacity(ids.len());
        for id in ids {
            created.push(load_required_user(&tx, id)?);
        }
        tx.commit()?;
        Ok(created)
    }
}

fn insert_user(conn: &Connection, user: &NewUser) -> RepoResult<UserId> {
    conn.execute(
        "INSERT INTO users (name, email, active) VALUES (?1, ?2, ?3);",
        params![
            user.name.as_str(),
            user.email.as_str(),
            bool_to_int(user.active)
        ],
    )
    .map_err(|err| map_name_conflict(err, &user.name))?;
    Ok(conn.last_insert_rowid())
}

fn load_required_user(conn: &Connection, id: UserId) -> RepoResult<User> {
    query_optional_user(
        conn,
        &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
        Value::Integer(id),
    )?
    .ok_or(RepoError::NotFound(id))
}

fn query_optional_user(conn: &Connection, sql: &str, key: Value) -> RepoResult<Option<User>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([key])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_user_row(row)?));
    }
    Ok(None)
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let active = match row.get::<_, i64>("active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid active value `{other}` in users.active"
            )));
        }
    };

    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        active,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn map_name_conflict(err: rusqlite::Error, name: &str) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RepoError::DuplicateName(name.to_string())
        }
        _ => err.into(),
    }
}

/// Sorted, duplicate-free copy so chunked `IN` queries never repeat a row.
fn unique_ids(ids: &[UserId]) -> Vec<UserId> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    unique
}

fn in_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Escapes `LIKE` wildcards so the term matches literally under `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn count_to_u64(value: i64) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative row count `{value}`")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_user_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "users")? {
        return Err(RepoError::MissingRequiredTable("users"));
    }

    for column in ["id", "name", "email", "active", "created_at", "updated_at"] {
        if !table_has_column(conn, "users", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "users",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
