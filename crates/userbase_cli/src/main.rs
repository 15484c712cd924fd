//! Command-line driver for the user store.
//!
//! # Responsibility
//! - Resolve configuration from `.env`, environment and flags.
//! - Open the database, build `UserService` and run one operation per call.
//! - Print results as pretty JSON on stdout.
//!
//! # Invariants
//! - Failures go to stderr and exit with status 1.
//! - Flags override environment configuration.

use clap::{Parser, Subcommand};
use log::info;
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process;
use userbase_core::db::{open_db, DbError};
use userbase_core::{
    init_logging, ConfigError, CoreConfig, CreateUserRequest, ListUsersRequest, LoggingError,
    RepoError, SortDirection, SqliteUserRepository, UpdateUserRequest, UserId, UserRepository,
    UserResponse, UserSearchQuery, UserService, UserServiceError, UserSortField,
};

#[derive(Parser, Debug)]
#[command(name = "userbase")]
#[command(about = "Manage users stored in a local SQLite database", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file (overrides USERBASE_DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new user
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },

    /// Show one user
    Get {
        #[arg(value_name = "ID")]
        id: UserId,
    },

    /// List users page by page
    List {
        /// 1-based page index
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Items per page (defaults to USERBASE_PAGE_SIZE or 20)
        #[arg(long)]
        page_size: Option<u32>,

        /// Only active (true) or inactive (false) users
        #[arg(long, value_name = "BOOL")]
        active: Option<bool>,

        /// Sort column: id, name, email, created_at, updated_at
        #[arg(long, value_parser = parse_sort_field, default_value = "created_at")]
        sort: UserSortField,

        /// Descending order (default)
        #[arg(long, conflicts_with = "asc")]
        desc: bool,

        /// Ascending order
        #[arg(long)]
        asc: bool,
    },

    /// Change name and/or email
    Update {
        #[arg(value_name = "ID")]
        id: UserId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },

    /// Permanently remove a user
    Delete {
        #[arg(value_name = "ID")]
        id: UserId,
    },

    /// Mark a user inactive, keeping the row
    Deactivate {
        #[arg(value_name = "ID")]
        id: UserId,
    },

    /// Find users whose name contains TERM
    Search {
        #[arg(value_name = "TERM")]
        term: String,

        /// Maximum results (defaults to USERBASE_SEARCH_LIMIT or 10)
        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, value_name = "BOOL")]
        active: Option<bool>,
    },

    /// Count users
    Count {
        #[arg(long, value_name = "BOOL")]
        active: Option<bool>,
    },

    /// Check that the core library is linked
    Ping,
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Db(DbError),
    Repo(RepoError),
    Service(UserServiceError),
    Output(serde_json::Error),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Logging(err) => write!(f, "logging error: {err}"),
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "failed to render output: {err}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Output(err) => Some(err),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<UserServiceError> for CliError {
    fn from(value: UserServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

fn main() {
    // A missing .env file is not an error.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<String, CliError> {
    let mut config = CoreConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let value = if matches!(cli.command, Commands::Ping) {
        ping()
    } else {
        if let Some(log_dir) = config.log_dir.as_deref() {
            init_logging(config.log_level, log_dir)?;
        }
        let conn = open_db(&config.db_path)?;
        let service = UserService::new(SqliteUserRepository::try_new(&conn)?);
        execute(&service, cli.command, &config)?
    };

    Ok(serde_json::to_string_pretty(&value)?)
}

fn execute<R: UserRepository>(
    service: &UserService<R>,
    command: Commands,
    config: &CoreConfig,
) -> Result<Value, CliError> {
    let value = match command {
        Commands::Create { name, email } => {
            let user = service.create_user(&CreateUserRequest::new(name, email))?;
            serde_json::to_value(UserResponse::from(user))?
        }
        Commands::Get { id } => serde_json::to_value(UserResponse::from(service.get_user(id)?))?,
        Commands::List {
            page,
            page_size,
            active,
            sort,
            desc: _,
            asc,
        } => {
            let request = ListUsersRequest {
                page,
                page_size: page_size.unwrap_or(config.default_page_size),
                active,
                sort_field: sort,
                sort_direction: if asc {
                    SortDirection::Asc
                } else {
                    SortDirection::Desc
                },
            };
            serde_json::to_value(service.list_users_with(&request)?)?
        }
        Commands::Update { id, name, email } => {
            let user = service.update_user(id, &UpdateUserRequest { name, email })?;
            serde_json::to_value(UserResponse::from(user))?
        }
        Commands::Delete { id } => json!({ "id": id, "deleted": service.delete_user(id)? }),
        Commands::Deactivate { id } => {
            serde_json::to_value(UserResponse::from(service.deactivate_user(id)?))?
        }
        Commands::Search {
            term,
            limit,
            active,
        } => {
            let query = UserSearchQuery {
                term,
                active,
                limit: limit.unwrap_or(config.search_limit),
            };
            serde_json::to_value(service.search_users(&query)?)?
        }
        Commands::Count { active } => json!({ "total": service.count_users(active)? }),
        Commands::Ping => ping(),
    };

    info!("event=cli_command module=cli status=ok");
    Ok(value)
}

fn ping() -> Value {
    json!({
        "ping": userbase_core::ping(),
        "version": userbase_core::core_version(),
    })
}

fn parse_sort_field(value: &str) -> Result<UserSortField, String> {
    UserSortField::parse(value).ok_or_else(|| {
        format!("unknown sort field `{value}`; expected id|name|email|created_at|updated_at")
    })
}
