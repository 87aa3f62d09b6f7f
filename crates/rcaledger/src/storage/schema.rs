//! `SQLite` schema definitions for rcaledger.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// Live RCA remarks. `id` doubles as the insertion sequence number.
pub const CREATE_RCA_RECORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS rca_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    awb TEXT NOT NULL,
    sc_name TEXT NOT NULL,
    rca_type TEXT NOT NULL,
    email_subject TEXT NOT NULL DEFAULT '',
    rca_remark TEXT NOT NULL,
    updated_by TEXT NOT NULL,
    updated_on TEXT NOT NULL
)
";

/// Per-AWB lookup, ordered the way eviction and tracking read it.
pub const CREATE_RCA_AWB_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_rca_records_awb ON rca_records(awb, updated_on, id)
";

/// SQL statement to create an index on `sc_name` for summaries.
pub const CREATE_RCA_SC_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_rca_records_sc ON rca_records(sc_name)
";

/// Archive of evicted remarks.
pub const CREATE_DELETED_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS deleted_rca_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    awb TEXT NOT NULL,
    rca_remark TEXT NOT NULL,
    deleted_by TEXT NOT NULL,
    deleted_on TEXT NOT NULL
)
";

/// SQL statement to create an index on `deleted_on` for retention pruning.
pub const CREATE_DELETED_TIME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_deleted_rca_records_time ON deleted_rca_records(deleted_on)
";

/// Tracking master: first time each AWB received a remark.
pub const CREATE_TRACKING_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS tracking (
    awb TEXT PRIMARY KEY,
    created_on TEXT NOT NULL
)
";

/// One row per successful login.
pub const CREATE_LOGIN_AUDIT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS login_audit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL,
    role TEXT NOT NULL,
    login_time TEXT NOT NULL
)
";

/// SQL statement to create an index on `login_time` for analytics and pruning.
pub const CREATE_LOGIN_TIME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_login_audit_time ON login_audit(login_time)
";

/// Registered users.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    email TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    password_digest TEXT NOT NULL,
    created_on TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_RCA_RECORDS_TABLE,
    CREATE_RCA_AWB_INDEX,
    CREATE_RCA_SC_INDEX,
    CREATE_DELETED_TABLE,
    CREATE_DELETED_TIME_INDEX,
    CREATE_TRACKING_TABLE,
    CREATE_LOGIN_AUDIT_TABLE,
    CREATE_LOGIN_TIME_INDEX,
    CREATE_USERS_TABLE,
    CREATE_METADATA_TABLE,
];
