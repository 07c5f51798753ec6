use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth;
use crate::config::Config;
use crate::models::{DatasheetLink, Developer, Project, TimesheetEntry, TimesheetWithNames, User};

#[derive(Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("timesheet row {row} references unknown {kind} {reference:?}")]
    MissingReference {
        kind: &'static str,
        reference: String,
        row: i64,
    },
}

/// One timesheet row as delivered in a batch save.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTimesheetEntry {
    pub developer_id: String,
    pub team_lead_id: String,
    pub project_id: String,
    pub hours: f64,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        super_user INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS datasheet_link (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        datasheet_link TEXT NOT NULL,
        is_enabled INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS master_developer (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        team_lead INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS master_projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS time_sheet_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        developer_id TEXT NOT NULL,
        team_lead_id TEXT NOT NULL,
        project_id TEXT NOT NULL,
        hours REAL NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
];

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new Database instance with a connection pool
    pub async fn new(config: &Config) -> Result<Self, DbError> {
        Self::connect(config.database_url()).await
    }

    /// Connect to the given database URL and bootstrap the schema.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        // An in-memory database exists per connection, so a wider pool
        // would hand out empty databases.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        let db = Self { pool };
        db.create_schema().await?;

        Ok(db)
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_schema(&self) -> Result<(), DbError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // User operations

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.get_pool())
            .await?;

        Ok(user)
    }

    /// Insert a new user. The password must already be hashed and the
    /// email already checked for duplicates by the caller.
    pub async fn create_user(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        hashed_password: &str,
        super_user: bool,
    ) -> Result<User, DbError> {
        let now = Utc::now().naive_utc();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (first_name, last_name, email, hashed_password, super_user, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(hashed_password)
        .bind(super_user)
        .bind(now)
        .bind(now)
        .fetch_one(self.get_pool())
        .await?;

        Ok(user)
    }

    /// Look up a user by email and check the password. Unknown email and
    /// hash mismatch both come back as `None`, never as an error.
    pub async fn authenticate_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, DbError> {
        let Some(user) = self.get_user_by_email(email).await? else {
            return Ok(None);
        };

        match auth::verify_password(password, &user.hashed_password) {
            Ok(true) => Ok(Some(user)),
            Ok(false) => Ok(None),
            Err(e) => {
                warn!("stored password hash for {email} is unreadable: {e}");
                Ok(None)
            }
        }
    }

    // Developer operations

    pub async fn create_master_developer(
        &self,
        name: &str,
        team_lead: bool,
    ) -> Result<Developer, DbError> {
        let now = Utc::now().naive_utc();
        let developer = sqlx::query_as::<_, Developer>(
            r#"
            INSERT INTO master_developer (name, team_lead, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(team_lead)
        .bind(now)
        .bind(now)
        .fetch_one(self.get_pool())
        .await?;

        Ok(developer)
    }

    pub async fn get_master_developers(&self) -> Result<Vec<Developer>, DbError> {
        let developers =
            sqlx::query_as::<_, Developer>("SELECT * FROM master_developer ORDER BY id ASC")
                .fetch_all(self.get_pool())
                .await?;

        Ok(developers)
    }

    /// Delete a developer by id, reporting whether a row existed.
    pub async fn delete_master_developer(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM master_developer WHERE id = ?")
            .bind(id)
            .execute(self.get_pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // Project operations

    pub async fn create_master_project(&self, project_name: &str) -> Result<Project, DbError> {
        let now = Utc::now().naive_utc();
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO master_projects (project_name, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(project_name)
        .bind(now)
        .bind(now)
        .fetch_one(self.get_pool())
        .await?;

        Ok(project)
    }

    pub async fn get_master_projects(&self) -> Result<Vec<Project>, DbError> {
        let projects =
            sqlx::query_as::<_, Project>("SELECT * FROM master_projects ORDER BY id ASC")
                .fetch_all(self.get_pool())
                .await?;

        Ok(projects)
    }

    pub async fn delete_master_project(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM master_projects WHERE id = ?")
            .bind(id)
            .execute(self.get_pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // Timesheet operations

    /// Insert a batch of timesheet rows in a single transaction. On any
    /// failure nothing is committed and the error propagates.
    pub async fn save_timesheet_batch(
        &self,
        entries: &[NewTimesheetEntry],
    ) -> Result<(), DbError> {
        let result: Result<(), sqlx::Error> = async {
            let mut tx = self.pool.begin().await?;
            let now = Utc::now().naive_utc();

            for entry in entries {
                sqlx::query(
                    r#"
                    INSERT INTO time_sheet_data (date, developer_id, team_lead_id, project_id, hours, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(now)
                .bind(&entry.developer_id)
                .bind(&entry.team_lead_id)
                .bind(&entry.project_id)
                .bind(entry.hours)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(())
        }
        .await;

        result.map_err(|e| {
            error!("error saving timesheet data: {e}");
            DbError::Sqlx(e)
        })
    }

    /// List every timesheet row with its references resolved to names.
    /// A reference with no matching row is a [`DbError::MissingReference`].
    pub async fn get_timesheets_with_names(&self) -> Result<Vec<TimesheetWithNames>, DbError> {
        let entries =
            sqlx::query_as::<_, TimesheetEntry>("SELECT * FROM time_sheet_data ORDER BY id ASC")
                .fetch_all(self.get_pool())
                .await?;

        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            let developer_name = self
                .developer_name(&entry.developer_id, false)
                .await?
                .ok_or_else(|| DbError::MissingReference {
                    kind: "developer",
                    reference: entry.developer_id.clone(),
                    row: entry.id,
                })?;

            // Team leads only count if the referenced developer carries the flag.
            let team_lead_name = self
                .developer_name(&entry.team_lead_id, true)
                .await?
                .ok_or_else(|| DbError::MissingReference {
                    kind: "team lead",
                    reference: entry.team_lead_id.clone(),
                    row: entry.id,
                })?;

            let project_name = self.project_name(&entry.project_id).await?.ok_or_else(|| {
                DbError::MissingReference {
                    kind: "project",
                    reference: entry.project_id.clone(),
                    row: entry.id,
                }
            })?;

            resolved.push(TimesheetWithNames {
                id: entry.id,
                date: entry.date,
                developer_name,
                team_lead_name,
                project_name,
                hours: entry.hours,
            });
        }

        Ok(resolved)
    }

    async fn developer_name(
        &self,
        reference: &str,
        team_lead_only: bool,
    ) -> Result<Option<String>, DbError> {
        // References are stored as free-form strings; anything that is
        // not a developer id cannot resolve.
        let Ok(id) = reference.parse::<i64>() else {
            return Ok(None);
        };

        let sql = if team_lead_only {
            "SELECT name FROM master_developer WHERE id = ? AND team_lead = 1"
        } else {
            "SELECT name FROM master_developer WHERE id = ?"
        };

        let name = sqlx::query_scalar::<_, String>(sql)
            .bind(id)
            .fetch_optional(self.get_pool())
            .await?;

        Ok(name)
    }

    async fn project_name(&self, reference: &str) -> Result<Option<String>, DbError> {
        let Ok(id) = reference.parse::<i64>() else {
            return Ok(None);
        };

        let name =
            sqlx::query_scalar::<_, String>("SELECT project_name FROM master_projects WHERE id = ?")
                .bind(id)
                .fetch_optional(self.get_pool())
                .await?;

        Ok(name)
    }

    /// Delete every row whose date portion equals the given calendar
    /// date, returning how many were removed.
    pub async fn delete_timesheets_by_date(&self, date: NaiveDate) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM time_sheet_data WHERE date(date) = ?")
            .bind(date.to_string())
            .execute(self.get_pool())
            .await?;

        Ok(result.rows_affected())
    }

    // Datasheet link operations

    /// Disable every stored link and enable the given one, inserting it
    /// if it was never stored. Returns the final record and whether it
    /// was newly created. Runs in one transaction so concurrent calls
    /// cannot leave two links enabled.
    pub async fn set_active_link(&self, link: &str) -> Result<(DatasheetLink, bool), DbError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().naive_utc();

        sqlx::query("UPDATE datasheet_link SET is_enabled = 0, updated_at = ?")
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, DatasheetLink>(
            r#"
            UPDATE datasheet_link SET is_enabled = 1, updated_at = ?
            WHERE datasheet_link = ?
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(link)
        .fetch_optional(&mut *tx)
        .await?;

        let (record, created) = match existing {
            Some(record) => (record, false),
            None => {
                let record = sqlx::query_as::<_, DatasheetLink>(
                    r#"
                    INSERT INTO datasheet_link (datasheet_link, is_enabled, created_at, updated_at)
                    VALUES (?, 1, ?, ?)
                    RETURNING *
                    "#,
                )
                .bind(link)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                (record, true)
            }
        };

        tx.commit().await?;

        Ok((record, created))
    }

    /// The currently enabled datasheet link, if any.
    pub async fn active_link(&self) -> Result<Option<DatasheetLink>, DbError> {
        let link = sqlx::query_as::<_, DatasheetLink>(
            "SELECT * FROM datasheet_link WHERE is_enabled = 1 LIMIT 1",
        )
        .fetch_optional(self.get_pool())
        .await?;

        Ok(link)
    }
}

/// Initialize the database connection pool
pub async fn init(config: &Config) -> Result<Database, DbError> {
    let db = Database::new(config).await?;

    Ok(db)
}
