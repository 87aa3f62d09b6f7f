//! Core record types for rcaledger.
//!
//! This module defines the RCA remark records kept against shipment AWBs,
//! the archive rows produced by eviction, and the timestamp encoding shared
//! by the storage layer.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Root-cause category of a remark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RcaType {
    /// Shipment is stuck or delayed.
    Pendency,
    /// Shipment arrived short.
    Shortage,
    /// Shipment was lost.
    Loss,
}

impl RcaType {
    /// All categories, in display order.
    pub const ALL: [Self; 3] = [Self::Pendency, Self::Shortage, Self::Loss];
}

impl std::fmt::Display for RcaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pendency => write!(f, "Pendency"),
            Self::Shortage => write!(f, "Shortage"),
            Self::Loss => write!(f, "Loss"),
        }
    }
}

impl FromStr for RcaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::validation("rca_type", "must not be empty"));
        }
        Self::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let expected: Vec<String> = Self::ALL.iter().map(ToString::to_string).collect();
                Error::validation(
                    "rca_type",
                    format!("unknown type '{s}' (expected one of {})", expected.join(", ")),
                )
            })
    }
}

/// A single RCA remark against an AWB.
///
/// Records are immutable once written; the only way one leaves the live set
/// is capacity eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcaRecord {
    /// Insertion sequence number (assigned by storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Shipment tracking number.
    pub awb: String,

    /// Service center the remark concerns.
    pub service_center: String,

    /// Root-cause category.
    pub rca_type: RcaType,

    /// Subject line of the escalation email, if any.
    pub email_subject: String,

    /// Free-text remark.
    pub remark: String,

    /// Identity of the user who wrote the remark.
    pub updated_by: String,

    /// When the remark was written.
    pub updated_on: DateTime<Utc>,
}

impl RcaRecord {
    /// Create a record stamped with the current time.
    ///
    /// `updated_by` is left empty; the ledger fills it from the request
    /// context on append.
    #[must_use]
    pub fn new(
        awb: impl Into<String>,
        service_center: impl Into<String>,
        rca_type: RcaType,
        email_subject: impl Into<String>,
        remark: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            awb: awb.into(),
            service_center: service_center.into(),
            rca_type,
            email_subject: email_subject.into(),
            remark: remark.into(),
            updated_by: String::new(),
            updated_on: Utc::now(),
        }
    }

    /// Override the remark timestamp.
    #[must_use]
    pub fn at(mut self, updated_on: DateTime<Utc>) -> Self {
        self.updated_on = updated_on;
        self
    }

    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first empty field among
    /// `awb`, `service_center` and `remark`.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("awb", &self.awb),
            ("service_center", &self.service_center),
            ("remark", &self.remark),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation(field, "must not be empty"));
            }
        }
        Ok(())
    }

    /// Archive copy of this record.
    #[must_use]
    pub fn archive(&self, deleted_by: &str, deleted_on: DateTime<Utc>) -> DeletedRcaRecord {
        DeletedRcaRecord {
            id: None,
            awb: self.awb.clone(),
            remark: self.remark.clone(),
            deleted_by: deleted_by.to_string(),
            deleted_on,
        }
    }
}

/// Archive row written when a remark is evicted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedRcaRecord {
    /// Archive sequence number (assigned by storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// AWB of the evicted remark.
    pub awb: String,
    /// Text of the evicted remark.
    pub remark: String,
    /// Actor whose insert caused the eviction.
    pub deleted_by: String,
    /// When the eviction happened.
    pub deleted_on: DateTime<Utc>,
}

/// First sighting of an AWB in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEntry {
    /// Shipment tracking number.
    pub awb: String,
    /// When the AWB received its first remark.
    pub created_on: DateTime<Utc>,
}

/// Split pasted AWB text into trimmed, non-blank AWBs, preserving order.
#[must_use]
pub fn parse_awbs(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Encode a timestamp for storage.
///
/// Fixed nanosecond precision keeps lexical and chronological order equal.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Decode a stored timestamp.
///
/// # Errors
///
/// Returns the chrono parse error if the value is not RFC 3339.
pub fn parse_timestamp(s: &str) -> chrono::ParseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
