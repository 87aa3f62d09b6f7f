//! Read-only aggregation over the ledger.
//!
//! Everything here is recomputed from the full live set on each call.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::access::{LoginEvent, User};
use crate::record::RcaRecord;

/// Per-service-center remark counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceCenterSummary {
    /// Live remarks for the service center.
    pub count: u64,
    /// Distinct users who wrote them.
    pub distinct_updaters: u64,
}

/// A calendar month, `YYYY-MM` when displayed or serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    /// Calendar year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

/// Headline numbers for the operations dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardMetrics {
    /// Live remarks.
    pub total_records: u64,
    /// Registered users.
    pub total_users: u64,
    /// Distinct identities that have logged in at least once.
    pub active_users: u64,
    /// Archived (evicted) remarks.
    pub deleted_records: u64,
    /// Registered users with no login on record.
    pub never_logged_in: u64,
}

/// Distinct active identities per calendar day and month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoginActivity {
    /// Distinct logins per UTC day.
    pub daily: BTreeMap<NaiveDate, u64>,
    /// Distinct logins per UTC month.
    pub monthly: BTreeMap<YearMonth, u64>,
}

/// Group live remarks by service center.
#[must_use]
pub fn by_service_center(records: &[RcaRecord]) -> BTreeMap<String, ServiceCenterSummary> {
    let mut updaters: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut summary: BTreeMap<String, ServiceCenterSummary> = BTreeMap::new();

    for record in records {
        summary
            .entry(record.service_center.clone())
            .or_default()
            .count += 1;
        updaters
            .entry(&record.service_center)
            .or_default()
            .insert(&record.updated_by);
    }

    for (sc, users) in updaters {
        if let Some(entry) = summary.get_mut(sc) {
            entry.distinct_updaters = users.len() as u64;
        }
    }
    summary
}

/// Count distinct identities per day and per month of login activity.
#[must_use]
pub fn login_activity(events: &[LoginEvent]) -> LoginActivity {
    let mut daily: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
    let mut monthly: BTreeMap<YearMonth, BTreeSet<&str>> = BTreeMap::new();

    for event in events {
        let day = event.login_time.date_naive();
        daily.entry(day).or_default().insert(&event.email);
        monthly
            .entry(YearMonth::from(day))
            .or_default()
            .insert(&event.email);
    }

    LoginActivity {
        daily: daily
            .into_iter()
            .map(|(k, v)| (k, v.len() as u64))
            .collect(),
        monthly: monthly
            .into_iter()
            .map(|(k, v)| (k, v.len() as u64))
            .collect(),
    }
}

/// Registered users with no login event, by email.
#[must_use]
pub fn never_logged_in<'a>(users: &'a [User], events: &[LoginEvent]) -> Vec<&'a str> {
    let seen: BTreeSet<&str> = events.iter().map(|e| e.email.as_str()).collect();
    users
        .iter()
        .map(|u| u.email.as_str())
        .filter(|email| !seen.contains(email))
        .collect()
}

/// Number of distinct identities that ever logged in.
#[must_use]
pub fn active_users(events: &[LoginEvent]) -> u64 {
    events
        .iter()
        .map(|e| e.email.as_str())
        .collect::<BTreeSet<_>>()
        .len() as u64
}
