// Error handling framework

use thiserror::Error;

/// Errors talking to the external discovery engine
#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Connection to discovery engine failed: {0}")]
    Connectivity(String),

    #[error("Job submission rejected for source '{source_name}': {reason}")]
    SubmissionRejected {
        source_name: String,
        reason: String,
    },

    #[error("Job {job_id} timed out after {seconds} seconds")]
    Timeout { job_id: String, seconds: u64 },

    #[error("Invalid response from discovery engine: {0}")]
    InvalidResponse(String),
}

impl ScraperError {
    /// Connection-level failures are the only ones worth a retry
    pub fn is_connection_level(&self) -> bool {
        matches!(self, ScraperError::Connectivity(_))
    }
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => DatabaseError::DuplicateKey(db_err.to_string()),
                Some("23503") => DatabaseError::ForeignKeyViolation(db_err.to_string()),
                _ => DatabaseError::QueryFailed(db_err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionFailed(err.to_string())
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Run lease errors
#[derive(Error, Debug)]
pub enum LeaseError {
    #[error("Lease already held for '{resource}'")]
    AlreadyHeld { resource: String },

    #[error("Lease backend error: {0}")]
    Backend(String),
}

/// Notification composition and delivery errors
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Failed to compose report: {0}")]
    Compose(String),

    #[error("Invalid email address '{0}'")]
    InvalidAddress(String),

    #[error("No recipients configured")]
    NoRecipients,

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Schedule-related errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("No next occurrence for schedule '{0}'")]
    NoNextOccurrence(String),
}

/// Validation errors for monitoring configurations and inputs
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Fatal errors for a single monitoring run
///
/// Expected conditions (held lease, unreachable engine, per-source failures)
/// are recorded on the run outcome instead; this enum covers failures the
/// coordinator cannot work around.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Invalid monitoring config '{name}': {source}")]
    InvalidConfig {
        name: String,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}
