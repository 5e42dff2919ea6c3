/// Primary keys are 32-character hex strings (UUID without dashes).
pub type DbId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Parent id of every top-level department and menu node.
pub const ROOT_PARENT_ID: &str = "ROOT";

/// Generate a new primary key.
pub fn new_id() -> DbId {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
