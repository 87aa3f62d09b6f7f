//! Storage layer for rcaledger.
//!
//! This module provides `SQLite`-based persistent storage for RCA remarks,
//! their eviction archive, the tracking master, users and the login audit.
//! The bounded append runs the eviction decision and the insert in one
//! `IMMEDIATE` transaction, so concurrent writers serialize on SQLite's
//! reserved lock.

pub mod migrations;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info};

use crate::access::{LoginEvent, Role, User};
use crate::error::{Error, Result};
use crate::eviction::EvictionPolicy;
use crate::record::{
    format_timestamp, parse_timestamp, DeletedRcaRecord, RcaRecord, RcaType, TrackingEntry,
};
use crate::summary::ServiceCenterSummary;

const RECORD_COLUMNS: &str =
    "id, awb, sc_name, rca_type, email_subject, rca_remark, updated_by, updated_on";

/// Result of a single bounded append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    /// Sequence number assigned to the new record.
    pub id: i64,
    /// Archive rows written to make room, oldest first.
    pub evicted: Vec<DeletedRcaRecord>,
}

/// Storage engine for the remark ledger.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// How long a writer waits on another process's lock before failing.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be applied.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Remarks ===

    /// Append a remark, evicting the oldest ones for its AWB if at capacity.
    ///
    /// The record must already be validated and carry `updated_by`. Victims
    /// are archived with `deleted_by = actor` and `deleted_on = now` before
    /// the insert; all of it commits or none of it does.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] on any database failure and
    /// [`Error::CapacityEviction`] if the eviction policy cannot be satisfied.
    pub fn append_bounded(
        &mut self,
        record: &RcaRecord,
        policy: &EvictionPolicy,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = query_records(
            &tx,
            &format!(
                "SELECT {RECORD_COLUMNS} FROM rca_records WHERE awb = ?1 ORDER BY updated_on ASC, id ASC"
            ),
            [&record.awb],
        )?;

        let mut evicted = Vec::new();
        for victim in policy.select_victims(&record.awb, &existing)? {
            let victim_id = victim
                .id
                .ok_or_else(|| Error::internal("stored remark without id"))?;
            tx.execute("DELETE FROM rca_records WHERE id = ?1", [victim_id])?;

            let mut archived = victim.archive(actor, now);
            tx.execute(
                r"
                INSERT INTO deleted_rca_records (awb, rca_remark, deleted_by, deleted_on)
                VALUES (?1, ?2, ?3, ?4)
                ",
                params![
                    archived.awb,
                    archived.remark,
                    archived.deleted_by,
                    format_timestamp(archived.deleted_on),
                ],
            )?;
            archived.id = Some(tx.last_insert_rowid());
            info!(
                "Evicted remark {} for AWB {} (cap {})",
                victim_id,
                record.awb,
                policy.max_per_awb()
            );
            evicted.push(archived);
        }

        tx.execute(
            "INSERT OR IGNORE INTO tracking (awb, created_on) VALUES (?1, ?2)",
            params![record.awb, format_timestamp(now)],
        )?;

        tx.execute(
            r"
            INSERT INTO rca_records
                (awb, sc_name, rca_type, email_subject, rca_remark, updated_by, updated_on)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                record.awb,
                record.service_center,
                record.rca_type.to_string(),
                record.email_subject,
                record.remark,
                record.updated_by,
                format_timestamp(record.updated_on),
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.commit()?;
        debug!("Appended remark {} for AWB {}", id, record.awb);
        Ok(AppendOutcome { id, evicted })
    }

    /// Live remarks for an AWB, newest `updated_on` first.
    ///
    /// Remarks with equal timestamps keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remarks_by_awb(&self, awb: &str) -> Result<Vec<RcaRecord>> {
        query_records(
            &self.conn,
            &format!(
                "SELECT {RECORD_COLUMNS} FROM rca_records WHERE awb = ?1 ORDER BY updated_on DESC, id ASC"
            ),
            [awb],
        )
    }

    /// Every live remark in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all_remarks(&self) -> Result<Vec<RcaRecord>> {
        query_records(
            &self.conn,
            &format!("SELECT {RECORD_COLUMNS} FROM rca_records ORDER BY id ASC"),
            [],
        )
    }

    /// Count live remarks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_remarks(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM rca_records")
    }

    /// Live remark count and distinct updaters per service center.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn service_center_summary(&self) -> Result<BTreeMap<String, ServiceCenterSummary>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT sc_name, COUNT(*), COUNT(DISTINCT updated_by)
            FROM rca_records GROUP BY sc_name
            ",
        )?;

        let rows = stmt.query_map([], |row| {
            let sc: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let updaters: i64 = row.get(2)?;
            Ok((sc, count, updaters))
        })?;

        let mut summary = BTreeMap::new();
        for row in rows {
            let (sc, count, updaters) = row?;
            summary.insert(
                sc,
                ServiceCenterSummary {
                    count: u64::try_from(count).unwrap_or(0),
                    distinct_updaters: u64::try_from(updaters).unwrap_or(0),
                },
            );
        }
        Ok(summary)
    }

    /// AWBs holding more live remarks than `max`, with their counts.
    ///
    /// Only non-empty after the cap has been lowered; the next append to
    /// each listed AWB trims it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn awbs_over_capacity(&self, max: usize) -> Result<Vec<(String, u64)>> {
        let max_i64 = i64::try_from(max).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            r"
            SELECT awb, COUNT(*) AS n FROM rca_records
            GROUP BY awb HAVING n > ?1 ORDER BY awb
            ",
        )?;
        let rows = stmt
            .query_map([max_i64], |row| {
                let awb: String = row.get(0)?;
                let n: i64 = row.get(1)?;
                Ok((awb, u64::try_from(n).unwrap_or(0)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // === Archive ===

    /// Every archived remark in eviction order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn deleted_remarks(&self) -> Result<Vec<DeletedRcaRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, awb, rca_remark, deleted_by, deleted_on
            FROM deleted_rca_records ORDER BY id ASC
            ",
        )?;
        let rows = stmt
            .query_map([], row_to_deleted)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count archived remarks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_deleted(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM deleted_rca_records")
    }

    /// Delete archive rows evicted before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM deleted_rca_records WHERE deleted_on < ?1",
            [format_timestamp(cutoff)],
        )?;
        if affected > 0 {
            info!("Pruned {} archived remarks", affected);
        }
        Ok(affected)
    }

    // === Tracking master ===

    /// When an AWB first received a remark.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn tracking_entry(&self, awb: &str) -> Result<Option<TrackingEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT awb, created_on FROM tracking WHERE awb = ?1",
                [awb],
                |row| {
                    Ok(TrackingEntry {
                        awb: row.get(0)?,
                        created_on: timestamp_column(row, 1)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Count distinct AWBs ever remarked on.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_tracked(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM tracking")
    }

    // === Login audit ===

    /// Record a successful login.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_login_event(&self, event: &LoginEvent) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO login_audit (email, role, login_time) VALUES (?1, ?2, ?3)",
            params![
                event.email,
                event.role.to_string(),
                format_timestamp(event.login_time),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Every login event in audit order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn login_events(&self) -> Result<Vec<LoginEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, role, login_time FROM login_audit ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LoginEvent {
                    id: Some(row.get(0)?),
                    email: row.get(1)?,
                    role: role_column(row, 2)?,
                    login_time: timestamp_column(row, 3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete login events before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_logins_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM login_audit WHERE login_time < ?1",
            [format_timestamp(cutoff)],
        )?;
        if affected > 0 {
            info!("Pruned {} login events", affected);
        }
        Ok(affected)
    }

    // === Users ===

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserExists`] if the email is taken, or a persistence
    /// error if the database operation fails.
    pub fn insert_user(&self, user: &User) -> Result<()> {
        let result = self.conn.execute(
            r"
            INSERT INTO users (email, name, role, password_digest, created_on)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                user.email,
                user.name,
                user.role.to_string(),
                user.password_digest,
                format_timestamp(user.created_on),
            ],
        );

        match result {
            Ok(_) => {
                debug!("Registered user {}", user.email);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::UserExists {
                    email: user.email.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_user(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                r"
                SELECT email, name, role, password_digest, created_on
                FROM users WHERE email = ?1
                ",
                [email],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// All users ordered by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT email, name, role, password_digest, created_on
            FROM users ORDER BY email ASC
            ",
        )?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Count registered users.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_users(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM users")
    }

    /// Replace a user's password digest.
    ///
    /// Returns `false` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_password_digest(&self, email: &str, digest: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE users SET password_digest = ?1 WHERE email = ?2",
            params![digest, email],
        )?;
        Ok(affected > 0)
    }

    // === Stats ===

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let oldest: Option<String> = self
            .conn
            .query_row("SELECT MIN(updated_on) FROM rca_records", [], |row| {
                row.get(0)
            })?;
        let newest: Option<String> = self
            .conn
            .query_row("SELECT MAX(updated_on) FROM rca_records", [], |row| {
                row.get(0)
            })?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            live_remarks: self.count_remarks()?,
            deleted_remarks: self.count_deleted()?,
            tracked_awbs: self.count_tracked()?,
            users: self.count_users()?,
            login_events: self.count("SELECT COUNT(*) FROM login_audit")?,
            oldest_remark: oldest.and_then(|s| parse_timestamp(&s).ok()),
            newest_remark: newest.and_then(|s| parse_timestamp(&s).ok()),
            db_size_bytes,
        })
    }

    fn count(&self, sql: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Live remarks.
    pub live_remarks: u64,
    /// Archived (evicted) remarks.
    pub deleted_remarks: u64,
    /// Distinct AWBs in the tracking master.
    pub tracked_awbs: u64,
    /// Registered users.
    pub users: u64,
    /// Login audit rows.
    pub login_events: u64,
    /// Oldest live remark timestamp.
    pub oldest_remark: Option<DateTime<Utc>>,
    /// Newest live remark timestamp.
    pub newest_remark: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

fn query_records<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<RcaRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let records = stmt
        .query_map(params, row_to_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

fn row_to_record(row: &Row) -> rusqlite::Result<RcaRecord> {
    let rca_type: String = row.get(3)?;
    let rca_type = rca_type
        .parse::<RcaType>()
        .map_err(|e| conversion_error(3, e.to_string()))?;

    Ok(RcaRecord {
        id: Some(row.get(0)?),
        awb: row.get(1)?,
        service_center: row.get(2)?,
        rca_type,
        email_subject: row.get(4)?,
        remark: row.get(5)?,
        updated_by: row.get(6)?,
        updated_on: timestamp_column(row, 7)?,
    })
}

fn row_to_deleted(row: &Row) -> rusqlite::Result<DeletedRcaRecord> {
    Ok(DeletedRcaRecord {
        id: Some(row.get(0)?),
        awb: row.get(1)?,
        remark: row.get(2)?,
        deleted_by: row.get(3)?,
        deleted_on: timestamp_column(row, 4)?,
    })
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        email: row.get(0)?,
        name: row.get(1)?,
        role: role_column(row, 2)?,
        password_digest: row.get(3)?,
        created_on: timestamp_column(row, 4)?,
    })
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    parse_timestamp(&value).map_err(|e| conversion_error(idx, format!("'{value}': {e}")))
}

fn role_column(row: &Row, idx: usize) -> rusqlite::Result<Role> {
    let value: String = row.get(idx)?;
    value
        .parse::<Role>()
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const ACTOR: &str = "ops@example.com";

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn remark(awb: &str, text: &str, at: DateTime<Utc>) -> RcaRecord {
        let mut r = RcaRecord::new(awb, "SC-East", RcaType::Pendency, "Subject", text).at(at);
        r.updated_by = ACTOR.to_string();
        r
    }

    fn append(storage: &mut Storage, record: &RcaRecord, policy: &EvictionPolicy) -> AppendOutcome {
        storage
            .append_bounded(record, policy, ACTOR, t(1_000))
            .expect("append failed")
    }

    #[test]
    fn test_open_in_memory() {
        assert!(Storage::open_in_memory().is_ok());
    }

    #[test]
    fn test_append_and_query() {
        let mut storage = create_test_storage();
        let policy = EvictionPolicy::default();
        let outcome = append(&mut storage, &remark("AWB1", "first", t(0)), &policy);

        assert!(outcome.evicted.is_empty());
        let records = storage.remarks_by_awb("AWB1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, Some(outcome.id));
        assert_eq!(records[0].remark, "first");
        assert_eq!(records[0].updated_on, t(0));
        assert_eq!(records[0].updated_by, ACTOR);
        assert_eq!(records[0].rca_type, RcaType::Pendency);
    }

    #[test]
    fn test_query_unknown_awb_is_empty() {
        let storage = create_test_storage();
        assert!(storage.remarks_by_awb("NOPE").unwrap().is_empty());
    }

    #[test]
    fn test_query_orders_newest_first_and_ties_by_insertion() {
        let mut storage = create_test_storage();
        let policy = EvictionPolicy::default();
        append(&mut storage, &remark("AWB1", "old", t(0)), &policy);
        append(&mut storage, &remark("AWB1", "tie-a", t(5)), &policy);
        append(&mut storage, &remark("AWB1", "newest", t(9)), &policy);
        append(&mut storage, &remark("AWB1", "tie-b", t(5)), &policy);

        let remarks: Vec<_> = storage
            .remarks_by_awb("AWB1")
            .unwrap()
            .into_iter()
            .map(|r| r.remark)
            .collect();
        assert_eq!(remarks, vec!["newest", "tie-a", "tie-b", "old"]);
    }

    #[test]
    fn test_append_at_capacity_archives_oldest() {
        let mut storage = create_test_storage();
        let policy = EvictionPolicy::new(3).unwrap();
        for i in 0..3 {
            append(&mut storage, &remark("AWB1", &format!("r{i}"), t(i)), &policy);
        }
        let outcome = append(&mut storage, &remark("AWB1", "r3", t(3)), &policy);

        assert_eq!(outcome.evicted.len(), 1);
        assert_eq!(outcome.evicted[0].remark, "r0");
        assert_eq!(outcome.evicted[0].deleted_by, ACTOR);
        assert_eq!(outcome.evicted[0].deleted_on, t(1_000));
        assert_eq!(storage.count_remarks().unwrap(), 3);

        let archive = storage.deleted_remarks().unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive[0].awb, "AWB1");
        assert_eq!(archive[0].remark, "r0");
        assert_eq!(archive[0].id, outcome.evicted[0].id);
    }

    #[test]
    fn test_capacity_is_per_awb() {
        let mut storage = create_test_storage();
        let policy = EvictionPolicy::new(2).unwrap();
        append(&mut storage, &remark("A", "a0", t(0)), &policy);
        append(&mut storage, &remark("A", "a1", t(1)), &policy);
        append(&mut storage, &remark("B", "b0", t(2)), &policy);
        append(&mut storage, &remark("B", "b1", t(3)), &policy);

        assert_eq!(storage.count_deleted().unwrap(), 0);
        assert_eq!(storage.count_remarks().unwrap(), 4);
    }

    #[test]
    fn test_tracking_entry_written_once() {
        let mut storage = create_test_storage();
        let policy = EvictionPolicy::default();
        assert!(storage.tracking_entry("AWB1").unwrap().is_none());

        storage
            .append_bounded(&remark("AWB1", "a", t(0)), &policy, ACTOR, t(10))
            .unwrap();
        storage
            .append_bounded(&remark("AWB1", "b", t(1)), &policy, ACTOR, t(20))
            .unwrap();

        let entry = storage.tracking_entry("AWB1").unwrap().unwrap();
        assert_eq!(entry.created_on, t(10));
        assert_eq!(storage.count_tracked().unwrap(), 1);
    }

    #[test]
    fn test_service_center_summary() {
        let mut storage = create_test_storage();
        let policy = EvictionPolicy::default();
        let mut r = remark("AWB1", "x", t(0));
        append(&mut storage, &r, &policy);
        r.updated_by = "other@example.com".to_string();
        append(&mut storage, &r, &policy);
        r.service_center = "SC-West".to_string();
        append(&mut storage, &r, &policy);

        let summary = storage.service_center_summary().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["SC-East"].count, 2);
        assert_eq!(summary["SC-East"].distinct_updaters, 2);
        assert_eq!(summary["SC-West"].count, 1);
        assert_eq!(summary["SC-West"].distinct_updaters, 1);
    }

    #[test]
    fn test_awbs_over_capacity_after_cap_lowered() {
        let mut storage = create_test_storage();
        let wide = EvictionPolicy::new(5).unwrap();
        for i in 0..5 {
            append(&mut storage, &remark("AWB1", &format!("r{i}"), t(i)), &wide);
        }
        assert!(storage.awbs_over_capacity(5).unwrap().is_empty());
        assert_eq!(
            storage.awbs_over_capacity(2).unwrap(),
            vec![("AWB1".to_string(), 5)]
        );

        let narrow = EvictionPolicy::new(2).unwrap();
        let outcome = append(&mut storage, &remark("AWB1", "r5", t(5)), &narrow);
        assert_eq!(outcome.evicted.len(), 4);
        assert_eq!(storage.remarks_by_awb("AWB1").unwrap().len(), 2);
    }

    #[test]
    fn test_login_events_roundtrip_and_prune() {
        let storage = create_test_storage();
        let mut old = LoginEvent::now(&crate::access::RequestContext::new(
            "a@example.com",
            "A",
            Role::Admin,
        ));
        old.login_time = t(0);
        let mut recent = old.clone();
        recent.login_time = t(100);
        storage.insert_login_event(&old).unwrap();
        storage.insert_login_event(&recent).unwrap();

        let events = storage.login_events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].role, Role::Admin);
        assert_eq!(events[0].login_time, t(0));

        assert_eq!(storage.prune_logins_before(t(50)).unwrap(), 1);
        assert_eq!(storage.login_events().unwrap().len(), 1);
    }

    #[test]
    fn test_prune_deleted_before() {
        let mut storage = create_test_storage();
        let policy = EvictionPolicy::new(1).unwrap();
        storage
            .append_bounded(&remark("AWB1", "a", t(0)), &policy, ACTOR, t(0))
            .unwrap();
        storage
            .append_bounded(&remark("AWB1", "b", t(1)), &policy, ACTOR, t(10))
            .unwrap();
        storage
            .append_bounded(&remark("AWB1", "c", t(2)), &policy, ACTOR, t(20))
            .unwrap();
        assert_eq!(storage.count_deleted().unwrap(), 2);

        assert_eq!(storage.prune_deleted_before(t(15)).unwrap(), 1);
        let archive = storage.deleted_remarks().unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive[0].remark, "b");
        assert_eq!(storage.count_remarks().unwrap(), 1);
    }

    #[test]
    fn test_users() {
        let storage = create_test_storage();
        let user = User::new("ops@example.com", "Ops", Role::User, "pw").unwrap();
        storage.insert_user(&user).unwrap();

        let err = storage.insert_user(&user).unwrap_err();
        assert!(matches!(err, Error::UserExists { .. }));

        let loaded = storage.get_user("ops@example.com").unwrap().unwrap();
        assert_eq!(loaded.name, "Ops");
        assert!(loaded.verify_password("pw"));
        assert!(storage.get_user("nobody@example.com").unwrap().is_none());

        assert!(storage
            .update_password_digest("ops@example.com", &crate::access::password_digest("new"))
            .unwrap());
        assert!(!storage
            .update_password_digest("nobody@example.com", "x")
            .unwrap());
        let loaded = storage.get_user("ops@example.com").unwrap().unwrap();
        assert!(loaded.verify_password("new"));

        assert_eq!(storage.count_users().unwrap(), 1);
        assert_eq!(storage.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_stats_empty() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.live_remarks, 0);
        assert!(stats.oldest_remark.is_none());
        assert!(stats.newest_remark.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_with_data() {
        let mut storage = create_test_storage();
        let policy = EvictionPolicy::default();
        append(&mut storage, &remark("AWB1", "a", t(3)), &policy);
        append(&mut storage, &remark("AWB2", "b", t(1)), &policy);

        let stats = storage.stats().unwrap();
        assert_eq!(stats.live_remarks, 2);
        assert_eq!(stats.tracked_awbs, 2);
        assert_eq!(stats.oldest_remark, Some(t(1)));
        assert_eq!(stats.newest_remark, Some(t(3)));
    }

    #[test]
    fn test_path() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_unicode_remark() {
        let mut storage = create_test_storage();
        let policy = EvictionPolicy::default();
        append(&mut storage, &remark("AWB1", "पार्सल नहीं मिला 📦", t(0)), &policy);
        let records = storage.remarks_by_awb("AWB1").unwrap();
        assert_eq!(records[0].remark, "पार्सल नहीं मिला 📦");
    }

    #[test]
    fn test_open_file_based() {
        let db_path = std::env::temp_dir().join(format!("rcaledger_test_{}.db", std::process::id()));

        {
            let mut storage = Storage::open(&db_path).unwrap();
            storage.set_busy_timeout(Duration::milliseconds(250).to_std().unwrap()).unwrap();
            append(&mut storage, &remark("AWB1", "persisted", t(0)), &EvictionPolicy::default());
            assert_eq!(storage.path(), db_path);
            assert!(storage.stats().unwrap().db_size_bytes > 0);
        }

        let storage = Storage::open(&db_path).unwrap();
        assert_eq!(storage.remarks_by_awb("AWB1").unwrap()[0].remark, "persisted");

        drop(storage);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let nested_path = std::env::temp_dir().join(format!(
            "rcaledger_test_{}/nested/ledger.db",
            std::process::id()
        ));

        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent.parent().unwrap());
        }
    }
}
