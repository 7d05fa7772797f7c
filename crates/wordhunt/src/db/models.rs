//! Database models and conversions to domain types.

use std::str::FromStr;

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use tracing::instrument;
use wordhunt_grid::GridSize;

use crate::db::{DbError, schema};
use crate::{Profile, SessionState, SessionStatus};

/// User profile database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::users)]
pub struct User {
    id: String,
    username: String,
    highlight_color: Option<String>,
    created_at: NaiveDateTime,
}

impl User {
    /// Converts to the identity view used when joining games.
    pub fn to_profile(&self) -> Profile {
        Profile::new(
            self.id.clone(),
            self.username.clone(),
            self.highlight_color.clone(),
        )
    }
}

/// Insertable user model for creating new users.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    id: String,
    username: String,
    highlight_color: Option<String>,
}

/// One persisted session record.
///
/// Collections are stored as JSON text; the board (`game_state`) keeps the
/// same shape it has on the wire.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Insertable)]
#[diesel(table_name = schema::games)]
pub struct GameRow {
    id: String,
    word_list: String,
    grid_width: i32,
    grid_height: i32,
    category: String,
    participants: String,
    game_state: String,
    status: String,
    version: i64,
    created_at: NaiveDateTime,
    start_time: Option<NaiveDateTime>,
    end_time: Option<NaiveDateTime>,
}

impl GameRow {
    /// Encodes a session state as a row.
    #[instrument(skip(state), fields(session_id = %state.id()))]
    pub fn from_state(state: &SessionState) -> Result<Self, DbError> {
        Ok(Self {
            id: state.id.clone(),
            word_list: serde_json::to_string(&state.word_list)?,
            grid_width: dimension(state.grid_size.width)?,
            grid_height: dimension(state.grid_size.height)?,
            category: state.category.clone(),
            participants: serde_json::to_string(&state.participants)?,
            game_state: serde_json::to_string(&state.game_state)?,
            status: state.status.to_string(),
            version: i64::try_from(state.version)
                .map_err(|_| DbError::invalid(format!("Version {} overflows", state.version)))?,
            created_at: state.created_at.naive_utc(),
            start_time: state.start_time.map(|t| t.naive_utc()),
            end_time: state.end_time.map(|t| t.naive_utc()),
        })
    }

    /// Decodes a row back into a session state.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn into_state(self) -> Result<SessionState, DbError> {
        let status = SessionStatus::from_str(&self.status)
            .map_err(|_| DbError::corrupt(format!("Invalid status: '{}'", self.status)))?;
        let version = u64::try_from(self.version)
            .map_err(|_| DbError::corrupt(format!("Negative version: {}", self.version)))?;
        let width = usize::try_from(self.grid_width)
            .map_err(|_| DbError::corrupt(format!("Invalid width: {}", self.grid_width)))?;
        let height = usize::try_from(self.grid_height)
            .map_err(|_| DbError::corrupt(format!("Invalid height: {}", self.grid_height)))?;

        Ok(SessionState {
            id: self.id,
            word_list: serde_json::from_str(&self.word_list)?,
            grid_size: GridSize::new(width, height),
            category: self.category,
            participants: serde_json::from_str(&self.participants)?,
            game_state: serde_json::from_str(&self.game_state)?,
            status,
            version,
            created_at: self.created_at.and_utc(),
            start_time: self.start_time.map(|t| t.and_utc()),
            end_time: self.end_time.map(|t| t.and_utc()),
        })
    }

    /// Stored version.
    pub fn version(&self) -> i64 {
        self.version
    }
}

fn dimension(value: usize) -> Result<i32, DbError> {
    i32::try_from(value).map_err(|_| DbError::invalid(format!("Grid dimension {} too large", value)))
}
