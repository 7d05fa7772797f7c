//! Database repository for session records and user profiles.

use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::MigrationHarness;
use tracing::{debug, info, instrument, warn};

use crate::db::{DbError, DbErrorKind, GameRow, MIGRATIONS, NewUser, User, schema};
use crate::{SessionState, StoreError};

/// Milliseconds a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// SQLite repository for games and users.
///
/// Opens a fresh connection per call, so clones are cheap and can be moved
/// into blocking tasks.
#[derive(Debug, Clone)]
pub struct GameRepository {
    db_path: String,
}

impl GameRepository {
    /// Creates a new repository connected to the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is empty.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        if db_path.trim().is_empty() {
            return Err(DbError::invalid("Database path is empty"));
        }
        info!(path = %db_path, "Creating GameRepository");
        Ok(Self { db_path })
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(DbErrorKind::Connection, format!("Failed to connect to '{}': {}", self.db_path, e)))?;
        diesel::sql_query(format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
            .execute(&mut conn)?;
        Ok(conn)
    }

    /// Applies any pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(DbErrorKind::Migration, format!("Migration failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Inserts a new session record at version 0.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] on a duplicate id.
    #[instrument(skip(self, state), fields(session_id = %state.id()))]
    pub fn insert_game(&self, state: &SessionState) -> Result<SessionState, StoreError> {
        let state = state.clone().with_version(0);
        let row = GameRow::from_state(&state)?;
        let mut conn = self.connection()?;

        match diesel::insert_into(schema::games::table)
            .values(&row)
            .execute(&mut conn)
        {
            Ok(_) => {
                info!("Session record inserted");
                Ok(state)
            }
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                warn!("Session id already taken");
                Err(StoreError::AlreadyExists(state.id().clone()))
            }
            Err(e) => Err(DbError::from(e).into()),
        }
    }

    /// Loads a session record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record has this id.
    #[instrument(skip(self))]
    pub fn load_game(&self, session_id: &str) -> Result<SessionState, StoreError> {
        let mut conn = self.connection()?;
        let row = schema::games::table
            .filter(schema::games::id.eq(session_id))
            .select(GameRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(DbError::from)?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        debug!(version = row.version(), "Session record loaded");
        Ok(row.into_state()?)
    }

    /// Replaces the mutable columns of a session record if its version still
    /// equals `expected_version`, bumping the version by one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] if the stored version moved,
    /// or [`StoreError::Mismatched`] if `new_state` belongs to another
    /// session.
    #[instrument(skip(self, new_state))]
    pub fn compare_and_swap_game(
        &self,
        session_id: &str,
        expected_version: u64,
        new_state: &SessionState,
    ) -> Result<SessionState, StoreError> {
        use schema::games::dsl;

        StoreError::ensure_same_session(session_id, new_state)?;
        let committed = new_state.clone().with_version(expected_version + 1);
        let expected = i64::try_from(expected_version)
            .map_err(|_| DbError::invalid(format!("Version {} overflows", expected_version)))?;
        let participants = serde_json::to_string(committed.participants()).map_err(DbError::from)?;
        let game_state = serde_json::to_string(committed.game_state()).map_err(DbError::from)?;
        let mut conn = self.connection()?;

        let updated = diesel::update(
            dsl::games
                .filter(dsl::id.eq(session_id))
                .filter(dsl::version.eq(expected)),
        )
        .set((
            dsl::participants.eq(participants),
            dsl::game_state.eq(game_state),
            dsl::status.eq(committed.status().to_string()),
            dsl::version.eq(expected + 1),
            dsl::start_time.eq(committed.start_time().map(|t| t.naive_utc())),
            dsl::end_time.eq(committed.end_time().map(|t| t.naive_utc())),
        ))
        .execute(&mut conn)
        .map_err(DbError::from)?;

        if updated == 1 {
            debug!(version = committed.version(), "Session record committed");
            return Ok(committed);
        }

        let actual: Option<i64> = dsl::games
            .filter(dsl::id.eq(session_id))
            .select(dsl::version)
            .first(&mut conn)
            .optional()
            .map_err(DbError::from)?;

        match actual {
            None => Err(StoreError::NotFound(session_id.to_string())),
            Some(actual) => {
                warn!(expected_version, actual, "Version conflict");
                Err(StoreError::VersionConflict {
                    session_id: session_id.to_string(),
                    expected: expected_version,
                    actual: u64::try_from(actual).unwrap_or_default(),
                })
            }
        }
    }

    /// Creates a new user profile.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the id or username is already taken or a
    /// database error occurs.
    #[instrument(skip(self))]
    pub fn create_user(
        &self,
        id: String,
        username: String,
        highlight_color: Option<String>,
    ) -> Result<User, DbError> {
        debug!(username = %username, "Creating user");
        let mut conn = self.connection()?;

        let new_user = NewUser::new(id, username, highlight_color);

        let user = diesel::insert_into(schema::users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(&mut conn)?;

        info!(user_id = %user.id(), username = %user.username(), "User created");
        Ok(user)
    }

    /// Gets a user by id. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_user(&self, id: &str) -> Result<Option<User>, DbError> {
        let mut conn = self.connection()?;

        let user = schema::users::table
            .filter(schema::users::id.eq(id))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        if user.is_none() {
            debug!("User not found");
        }
        Ok(user)
    }

    /// Gets a user by username. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_user_by_name(&self, username: &str) -> Result<Option<User>, DbError> {
        let mut conn = self.connection()?;

        let user = schema::users::table
            .filter(schema::users::username.eq(username))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(user)
    }

    /// Updates a user's highlight color and returns the updated profile.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the user does not exist or a database error
    /// occurs.
    #[instrument(skip(self))]
    pub fn set_highlight_color(&self, id: &str, color: Option<String>) -> Result<User, DbError> {
        let mut conn = self.connection()?;

        let user = diesel::update(schema::users::table.filter(schema::users::id.eq(id)))
            .set(schema::users::highlight_color.eq(color))
            .returning(User::as_returning())
            .get_result(&mut conn)
            .optional()?
            .ok_or_else(|| DbError::new(DbErrorKind::NotFound, format!("User '{}' not found", id)))?;

        info!(user_id = %id, "Highlight color updated");
        Ok(user)
    }

    /// Lists all user profiles, ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_users(&self) -> Result<Vec<User>, DbError> {
        let mut conn = self.connection()?;

        let users = schema::users::table
            .order(schema::users::created_at.asc())
            .select(User::as_select())
            .load(&mut conn)?;

        info!(count = users.len(), "Users loaded");
        Ok(users)
    }
}
