//! `rcaledger` - Shipment RCA remark ledger
//!
//! Stores root-cause remarks against air waybills (AWBs). Each AWB keeps a
//! bounded number of live remarks; appending past the cap archives the oldest
//! one. Summaries, user access and spreadsheet export sit on top.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod access;
pub mod cli;
pub mod config;
pub mod error;
pub mod eviction;
pub mod export;
pub mod ledger;
pub mod logging;
pub mod record;
pub mod storage;
pub mod summary;

pub use access::{RequestContext, Role, User};
pub use config::Config;
pub use error::{Error, Result};
pub use eviction::EvictionPolicy;
pub use ledger::{BatchReport, BatchSubmission, Ledger};
pub use logging::init_logging;
pub use record::{DeletedRcaRecord, RcaRecord, RcaType};
pub use storage::{AppendOutcome, Storage, StorageStats};
