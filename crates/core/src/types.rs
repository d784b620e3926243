/// Product and unit primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Jobs are keyed by an opaque UUID assigned at intake.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
