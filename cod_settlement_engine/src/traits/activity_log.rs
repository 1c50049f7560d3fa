use thiserror::Error;

use crate::db_types::{ActivityRecord, NewActivity};

#[derive(Debug, Clone, Error)]
pub enum ActivityLogError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for ActivityLogError {
    fn from(e: sqlx::Error) -> Self {
        ActivityLogError::DatabaseError(e.to_string())
    }
}

/// A side channel recording who did what. Writes are best effort; callers log failures and carry on.
#[allow(async_fn_in_trait)]
pub trait ActivityLog {
    async fn log_activity(&self, activity: NewActivity) -> Result<(), ActivityLogError>;

    /// Activity recorded against the entity, oldest first.
    async fn fetch_activity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<ActivityRecord>, ActivityLogError>;
}
