//! Spreadsheet export of the ledger tables.
//!
//! One workbook, one sheet per table. Only elevated roles may export.

use std::path::Path;

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde::Serialize;
use tracing::info;

use crate::access::RequestContext;
use crate::error::Result;
use crate::ledger::{Ledger, Snapshot};

/// Sheet holding live remarks.
pub const RCA_SHEET: &str = "RCA_Data";

/// Sheet holding evicted remarks.
pub const DELETED_SHEET: &str = "Deleted_RCA";

/// Sheet holding the login audit.
pub const LOGIN_SHEET: &str = "Login_Audit";

const RCA_HEADERS: [&str; 8] = [
    "ID",
    "AWB",
    "SC Name",
    "RCA Type",
    "Email Subject",
    "RCA Remark",
    "Updated By",
    "Updated On",
];
const DELETED_HEADERS: [&str; 5] = ["ID", "AWB", "RCA Remark", "Deleted By", "Deleted On"];
const LOGIN_HEADERS: [&str; 4] = ["ID", "Email", "Role", "Login Time"];

/// Row counts written by an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Rows on the live remarks sheet.
    pub records: usize,
    /// Rows on the archive sheet.
    pub deleted: usize,
    /// Rows on the login audit sheet.
    pub logins: usize,
}

impl From<&Snapshot> for ExportSummary {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            records: snapshot.records.len(),
            deleted: snapshot.deleted.len(),
            logins: snapshot.logins.len(),
        }
    }
}

/// Write the full report to `path`.
///
/// # Errors
///
/// Returns [`crate::Error::PermissionDenied`] for plain users, or an export
/// error if the workbook cannot be written.
pub fn export_workbook(
    ledger: &Ledger,
    ctx: &RequestContext,
    path: impl AsRef<Path>,
) -> Result<ExportSummary> {
    let path = path.as_ref();
    let snapshot = ledger.snapshot(ctx)?;
    let mut workbook = build_workbook(&snapshot)?;
    workbook.save(path)?;

    let summary = ExportSummary::from(&snapshot);
    info!(
        "{} exported {} remarks, {} archived, {} logins to {}",
        ctx.identity,
        summary.records,
        summary.deleted,
        summary.logins,
        path.display()
    );
    Ok(summary)
}

/// Render the full report into memory.
///
/// # Errors
///
/// Returns [`crate::Error::PermissionDenied`] for plain users, or an export
/// error if the workbook cannot be rendered.
pub fn export_to_buffer(ledger: &Ledger, ctx: &RequestContext) -> Result<Vec<u8>> {
    let snapshot = ledger.snapshot(ctx)?;
    let mut workbook = build_workbook(&snapshot)?;
    Ok(workbook.save_to_buffer()?)
}

/// One cell of an exported row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Numeric cell.
    Number(f64),
    /// Text cell.
    Text(String),
    /// Left blank.
    Empty,
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Option<i64>> for Cell {
    #[allow(clippy::cast_precision_loss)]
    fn from(id: Option<i64>) -> Self {
        id.map_or(Self::Empty, |id| Self::Number(id as f64))
    }
}

/// A named sheet: header row plus data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    /// Worksheet name.
    pub name: &'static str,
    /// Column titles.
    pub headers: &'static [&'static str],
    /// Data rows, in table order.
    pub rows: Vec<Vec<Cell>>,
}

/// Tabulate a snapshot into the three report sheets.
#[must_use]
pub fn sheets(snapshot: &Snapshot) -> [SheetData; 3] {
    let records: Vec<Vec<Cell>> = snapshot
        .records
        .iter()
        .map(|r| {
            vec![
                r.id.into(),
                r.awb.as_str().into(),
                r.service_center.as_str().into(),
                r.rca_type.to_string().into(),
                r.email_subject.as_str().into(),
                r.remark.as_str().into(),
                r.updated_by.as_str().into(),
                cell_time(r.updated_on).into(),
            ]
        })
        .collect();

    let deleted: Vec<Vec<Cell>> = snapshot
        .deleted
        .iter()
        .map(|d| {
            vec![
                d.id.into(),
                d.awb.as_str().into(),
                d.remark.as_str().into(),
                d.deleted_by.as_str().into(),
                cell_time(d.deleted_on).into(),
            ]
        })
        .collect();

    let logins: Vec<Vec<Cell>> = snapshot
        .logins
        .iter()
        .map(|e| {
            vec![
                e.id.into(),
                e.email.as_str().into(),
                e.role.to_string().into(),
                cell_time(e.login_time).into(),
            ]
        })
        .collect();

    [
        SheetData {
            name: RCA_SHEET,
            headers: &RCA_HEADERS,
            rows: records,
        },
        SheetData {
            name: DELETED_SHEET,
            headers: &DELETED_HEADERS,
            rows: deleted,
        },
        SheetData {
            name: LOGIN_SHEET,
            headers: &LOGIN_HEADERS,
            rows: logins,
        },
    ]
}

/// Lay out a snapshot as a three-sheet workbook.
///
/// # Errors
///
/// Returns an export error if a sheet cannot be written.
pub fn build_workbook(snapshot: &Snapshot) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    for data in sheets(snapshot) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(data.name)?;
        for (col, title) in (0u16..).zip(data.headers) {
            sheet.write_string_with_format(0, col, *title, &header)?;
        }
        // The writer rejects rows past the sheet limit.
        for (row, cells) in (1u32..).zip(&data.rows) {
            for (col, cell) in (0u16..).zip(cells) {
                write_cell(sheet, row, col, cell)?;
            }
        }
    }

    Ok(workbook)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<()> {
    match cell {
        Cell::Number(n) => {
            sheet.write_number(row, col, *n)?;
        }
        Cell::Text(text) => {
            sheet.write_string(row, col, text)?;
        }
        Cell::Empty => {}
    }
    Ok(())
}

fn cell_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::config::Config;
    use crate::record::{RcaRecord, RcaType};
    use crate::storage::Storage;

    fn populated_ledger() -> Ledger {
        let mut config = Config::default();
        config.ledger.max_remarks_per_awb = 1;
        let mut ledger = Ledger::with_storage(Storage::open_in_memory().unwrap(), &config).unwrap();

        let ctx = RequestContext::new("ops@example.com", "Ops", Role::User);
        for remark in ["first", "second"] {
            let record = RcaRecord::new("AWB1", "SC-1", RcaType::Loss, "Lost", remark);
            ledger.append(&ctx, record).unwrap();
        }
        ledger
    }

    fn admin() -> RequestContext {
        RequestContext::new("admin@example.com", "Admin", Role::Admin)
    }

    #[test]
    fn test_export_requires_elevated_role() {
        let ledger = populated_ledger();
        let user = RequestContext::new("ops@example.com", "Ops", Role::User);
        let err = export_to_buffer(&ledger, &user).unwrap_err();
        assert!(err.is_permission_error());
    }

    #[test]
    fn test_export_to_buffer_is_xlsx() {
        let ledger = populated_ledger();
        let bytes = export_to_buffer(&ledger, &admin()).unwrap();
        // XLSX files are zip archives.
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_build_workbook_has_all_sheets() {
        let ledger = populated_ledger();
        let snapshot = ledger.snapshot(&admin()).unwrap();
        let mut workbook = build_workbook(&snapshot).unwrap();

        for name in [RCA_SHEET, DELETED_SHEET, LOGIN_SHEET] {
            assert!(workbook.worksheet_from_name(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn test_deleted_sheet_holds_evicted_remark() {
        let ledger = populated_ledger();
        let snapshot = ledger.snapshot(&admin()).unwrap();
        let [live, deleted, logins] = sheets(&snapshot);

        assert_eq!(deleted.name, DELETED_SHEET);
        assert_eq!(deleted.rows.len(), 1);
        let row = &deleted.rows[0];
        assert_eq!(row.len(), DELETED_HEADERS.len());
        assert_eq!(row[1], Cell::from("AWB1"));
        assert_eq!(row[2], Cell::from("first"));
        assert_eq!(row[3], Cell::from("ops@example.com"));

        assert_eq!(live.rows.len(), 1);
        assert_eq!(live.rows[0][5], Cell::from("second"));
        assert_eq!(live.rows[0][3], Cell::from("Loss"));
        assert!(logins.rows.is_empty());
    }

    #[test]
    fn test_missing_id_left_blank() {
        assert_eq!(Cell::from(None::<i64>), Cell::Empty);
        assert_eq!(Cell::from(Some(7)), Cell::Number(7.0));
    }

    #[test]
    fn test_build_workbook_empty_snapshot() {
        let mut workbook = build_workbook(&Snapshot::default()).unwrap();
        assert!(workbook.save_to_buffer().is_ok());
    }

    #[test]
    fn test_export_workbook_writes_file() {
        let ledger = populated_ledger();
        let path = std::env::temp_dir().join(format!("rcaledger_export_{}.xlsx", std::process::id()));

        let summary = export_workbook(&ledger, &admin(), &path).unwrap();
        assert_eq!(
            summary,
            ExportSummary {
                records: 1,
                deleted: 1,
                logins: 0
            }
        );
        assert!(path.exists());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_cell_time_format() {
        use chrono::TimeZone;
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(cell_time(ts), "2024-05-06 07:08:09");
    }
}
