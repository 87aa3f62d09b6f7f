//! Command handlers for the remark ledger.
//!
//! [`Ledger`] is what a presentation layer talks to. Each handler takes its
//! inputs explicitly, mutating ones take a [`RequestContext`], and nothing
//! depends on state left behind by a previous call.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::access::{LoginEvent, RequestContext, Role, User};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::eviction::EvictionPolicy;
use crate::record::{DeletedRcaRecord, RcaRecord, RcaType};
use crate::storage::{AppendOutcome, Storage};
use crate::summary::{self, DashboardMetrics, LoginActivity, ServiceCenterSummary};

/// Shared fields applied to every AWB of a bulk submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSubmission {
    /// AWBs in submission order.
    pub awbs: Vec<String>,
    /// Service center for every remark.
    pub service_center: String,
    /// Root-cause category for every remark.
    pub rca_type: RcaType,
    /// Email subject for every remark.
    pub email_subject: String,
    /// Remark text for every AWB.
    pub remark: String,
}

/// An AWB skipped by a bulk submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedAwb {
    /// Position in the submitted list.
    pub index: usize,
    /// The AWB as submitted.
    pub awb: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Outcome of a bulk submission that ran to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Records appended.
    pub appended: usize,
    /// Records evicted to make room.
    pub evicted: usize,
    /// AWBs skipped for validation errors.
    pub rejected: Vec<RejectedAwb>,
    /// AWBs dropped for exceeding the batch size.
    pub truncated: usize,
}

/// Remarks found for one requested AWB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedAwb {
    /// The AWB looked up.
    pub awb: String,
    /// When the AWB got its first remark, if ever.
    pub first_seen: Option<DateTime<Utc>>,
    /// Its live remarks, newest first. Empty if none.
    pub remarks: Vec<RcaRecord>,
}

/// Rows removed by a retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Archive rows removed.
    pub deleted_remarks: usize,
    /// Login events removed.
    pub login_events: usize,
}

/// Read-only copy of the exportable tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Live remarks in insertion order.
    pub records: Vec<RcaRecord>,
    /// Archived remarks in eviction order.
    pub deleted: Vec<DeletedRcaRecord>,
    /// Login audit in order.
    pub logins: Vec<LoginEvent>,
}

/// The remark ledger.
#[derive(Debug)]
pub struct Ledger {
    storage: Storage,
    policy: EvictionPolicy,
    max_batch_size: usize,
    awb_pattern: Option<Regex>,
    retention: Option<chrono::Duration>,
}

impl Ledger {
    /// Open the ledger database named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the database
    /// cannot be opened.
    pub fn open(config: &Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        storage.set_busy_timeout(config.busy_timeout())?;
        Self::with_storage(storage, config)
    }

    /// Wrap an already-open storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_storage(storage: Storage, config: &Config) -> Result<Self> {
        config.validate()?;
        let policy = EvictionPolicy::new(config.ledger.max_remarks_per_awb)?;
        let awb_pattern = config
            .ledger
            .awb_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| Error::ConfigValidation {
                message: format!("invalid awb_pattern regex: {e}"),
            })?;

        Ok(Self {
            storage,
            policy,
            max_batch_size: config.ledger.max_batch_size,
            awb_pattern,
            retention: config.retention(),
        })
    }

    /// Underlying storage, for read-only inspection.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The eviction policy in force.
    #[must_use]
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    // === Record store ===

    /// Append one remark as `ctx`.
    ///
    /// The AWB is trimmed and `updated_by` is overwritten with the caller's
    /// identity. At capacity the oldest remark for the AWB is archived first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a missing field or an AWB that does
    /// not match the configured pattern, and a persistence error if the
    /// write fails.
    pub fn append(&mut self, ctx: &RequestContext, mut record: RcaRecord) -> Result<AppendOutcome> {
        record.awb = record.awb.trim().to_string();
        record.updated_by.clone_from(&ctx.identity);
        record.validate()?;
        self.check_awb_pattern(&record.awb)?;

        self.storage
            .append_bounded(&record, &self.policy, &ctx.identity, Utc::now())
    }

    /// Append the same remark to many AWBs, one insert at a time.
    ///
    /// Each insert sees the evictions made by earlier inserts of the same
    /// batch. AWBs past the configured batch size are dropped. Invalid AWBs
    /// are skipped and listed in the report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BatchAborted`] carrying the number of records
    /// already appended if a non-validation error stops the batch.
    pub fn submit_batch(
        &mut self,
        ctx: &RequestContext,
        submission: &BatchSubmission,
    ) -> Result<BatchReport> {
        let mut report = BatchReport {
            truncated: submission.awbs.len().saturating_sub(self.max_batch_size),
            ..BatchReport::default()
        };
        if report.truncated > 0 {
            warn!(
                "Batch of {} AWBs exceeds limit {}; dropping {}",
                submission.awbs.len(),
                self.max_batch_size,
                report.truncated
            );
        }

        for (index, awb) in submission.awbs.iter().take(self.max_batch_size).enumerate() {
            let record = RcaRecord::new(
                awb.as_str(),
                submission.service_center.as_str(),
                submission.rca_type,
                submission.email_subject.as_str(),
                submission.remark.as_str(),
            );

            match self.append(ctx, record) {
                Ok(outcome) => {
                    report.appended += 1;
                    report.evicted += outcome.evicted.len();
                }
                Err(e) if e.is_validation() => {
                    warn!("Skipping AWB #{} '{}': {}", index, awb, e);
                    report.rejected.push(RejectedAwb {
                        index,
                        awb: awb.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    return Err(Error::BatchAborted {
                        appended: report.appended,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(
            "Batch by {}: {} appended, {} evicted, {} rejected",
            ctx.identity,
            report.appended,
            report.evicted,
            report.rejected.len()
        );
        Ok(report)
    }

    /// Live remarks for an AWB, newest first; ties keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn query_by_awb(&self, awb: &str) -> Result<Vec<RcaRecord>> {
        self.storage.remarks_by_awb(awb.trim())
    }

    /// Look up several AWBs, in the order given.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn track(&self, awbs: &[String]) -> Result<Vec<TrackedAwb>> {
        awbs.iter()
            .map(|awb| {
                let awb = awb.trim();
                Ok(TrackedAwb {
                    awb: awb.to_string(),
                    first_seen: self
                        .storage
                        .tracking_entry(awb)?
                        .map(|entry| entry.created_on),
                    remarks: self.storage.remarks_by_awb(awb)?,
                })
            })
            .collect()
    }

    /// Total live remarks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<u64> {
        self.storage.count_remarks()
    }

    /// Live remark count and distinct updaters per service center.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn group_summary(&self) -> Result<BTreeMap<String, ServiceCenterSummary>> {
        self.storage.service_center_summary()
    }

    /// AWBs holding more live remarks than the current cap.
    ///
    /// Only possible after the cap was lowered; each shrinks back on its
    /// next append.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn over_capacity(&self) -> Result<Vec<(String, u64)>> {
        self.storage.awbs_over_capacity(self.policy.max_per_awb())
    }

    // === Summary ===

    /// Headline dashboard numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn dashboard(&self) -> Result<DashboardMetrics> {
        let users = self.storage.list_users()?;
        let events = self.storage.login_events()?;
        Ok(DashboardMetrics {
            total_records: self.storage.count_remarks()?,
            total_users: users.len() as u64,
            active_users: summary::active_users(&events),
            deleted_records: self.storage.count_deleted()?,
            never_logged_in: summary::never_logged_in(&users, &events).len() as u64,
        })
    }

    /// Distinct logins per day and month. Elevated roles only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] for plain users, or a persistence
    /// error.
    pub fn login_activity(&self, ctx: &RequestContext) -> Result<LoginActivity> {
        ctx.require_elevated("view login analytics")?;
        Ok(summary::login_activity(&self.storage.login_events()?))
    }

    /// Emails of users who never logged in. Elevated roles only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] for plain users, or a persistence
    /// error.
    pub fn never_logged_in(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        ctx.require_elevated("view login analytics")?;
        let users = self.storage.list_users()?;
        let events = self.storage.login_events()?;
        Ok(summary::never_logged_in(&users, &events)
            .into_iter()
            .map(ToString::to_string)
            .collect())
    }

    /// Copy of the remark, archive and login tables. Elevated roles only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] for plain users, or a persistence
    /// error.
    pub fn snapshot(&self, ctx: &RequestContext) -> Result<Snapshot> {
        ctx.require_elevated("export records")?;
        Ok(Snapshot {
            records: self.storage.all_remarks()?,
            deleted: self.storage.deleted_remarks()?,
            logins: self.storage.login_events()?,
        })
    }

    // === Access ===

    /// Check credentials and record the login.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] for an unknown email or wrong
    /// password.
    pub fn login(&self, email: &str, password: &str) -> Result<RequestContext> {
        let user = self
            .storage
            .get_user(email.trim())?
            .filter(|user| user.verify_password(password))
            .ok_or(Error::InvalidCredentials)?;

        let ctx = user.context();
        self.storage.insert_login_event(&LoginEvent::now(&ctx))?;
        info!("{} logged in as {}", ctx.identity, ctx.role);
        Ok(ctx)
    }

    /// Create the first account, as superadmin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] once any user exists, or a
    /// validation error for bad fields.
    pub fn bootstrap_user(&self, email: &str, name: &str, password: &str) -> Result<User> {
        if self.storage.count_users()? > 0 {
            return Err(Error::permission_denied(
                "anonymous",
                "bootstrap a ledger that already has users",
            ));
        }
        let user = User::new(email, name, Role::SuperAdmin, password)?;
        self.storage.insert_user(&user)?;
        info!("Bootstrapped superadmin {}", user.email);
        Ok(user)
    }

    /// Register a user. Elevated roles only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`], [`Error::UserExists`] or a
    /// validation error.
    pub fn create_user(
        &self,
        ctx: &RequestContext,
        email: &str,
        name: &str,
        role: Role,
        password: &str,
    ) -> Result<User> {
        ctx.require_elevated("manage users")?;
        let user = User::new(email, name, role, password)?;
        self.storage.insert_user(&user)?;
        info!("{} created {} user {}", ctx.identity, user.role, user.email);
        Ok(user)
    }

    /// Change the caller's own password.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty password, or
    /// [`Error::UserNotFound`] if the caller's account is gone.
    pub fn change_password(&self, ctx: &RequestContext, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            return Err(Error::validation("password", "must not be empty"));
        }
        let digest = crate::access::password_digest(new_password);
        if !self.storage.update_password_digest(&ctx.identity, &digest)? {
            return Err(Error::UserNotFound {
                email: ctx.identity.clone(),
            });
        }
        info!("{} changed their password", ctx.identity);
        Ok(())
    }

    /// All users. Elevated roles only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] for plain users, or a persistence
    /// error.
    pub fn list_users(&self, ctx: &RequestContext) -> Result<Vec<User>> {
        ctx.require_elevated("manage users")?;
        self.storage.list_users()
    }

    // === Retention ===

    /// Drop archive rows and login events older than the retention window.
    /// Elevated roles only; live remarks are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] for plain users, or a persistence
    /// error.
    pub fn prune(&self, ctx: &RequestContext) -> Result<PruneReport> {
        ctx.require_elevated("prune history")?;
        let Some(retention) = self.retention else {
            return Ok(PruneReport::default());
        };

        let cutoff = Utc::now() - retention;
        Ok(PruneReport {
            deleted_remarks: self.storage.prune_deleted_before(cutoff)?,
            login_events: self.storage.prune_logins_before(cutoff)?,
        })
    }

    fn check_awb_pattern(&self, awb: &str) -> Result<()> {
        match &self.awb_pattern {
            Some(pattern) if !pattern.is_match(awb) => Err(Error::validation(
                "awb",
                format!("'{awb}' does not match pattern {}", pattern.as_str()),
            )),
            _ => Ok(()),
        }
    }
}
