//! SQLite persistence for session records and user profiles.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub use error::{DbError, DbErrorKind};
pub use models::{GameRow, NewUser, User};
pub use repository::GameRepository;

/// Schema migrations shipped with the crate.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
