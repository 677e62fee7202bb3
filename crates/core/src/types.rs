/// Row identifiers are UUIDs assigned by the remote store.
pub type Id = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Calendar dates (`YYYY-MM-DD`) such as session dates.
pub type Date = chrono::NaiveDate;
