use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::error::Result;
use crate::roster::{Roster, csv_row};

/// Name of the single worksheet in the exported workbook
pub const SHEET_NAME: &str = "Attendance";

/// MIME type of the XLSX download
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const HEADERS: [&str; 3] = ["ID", "Name", "Status"];

/// Attendance status of one student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Present,
    Absent,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Present => write!(f, "Present"),
            Status::Absent => write!(f, "Absent"),
        }
    }
}

/// One line of the attendance report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub id: String,
    pub name: String,
    pub status: Status,
}

/// Join the roster with the set of present identifiers
///
/// Every student appears exactly once, in roster order. Identifiers in
/// `present` that are not on the roster are ignored.
pub fn build_report(roster: &Roster, present: &HashSet<String>) -> Vec<ReportRow> {
    roster
        .iter()
        .map(|student| ReportRow {
            id: student.id.clone(),
            name: student.name.clone(),
            status: if present.contains(&student.id) {
                Status::Present
            } else {
                Status::Absent
            },
        })
        .collect()
}

/// Convert the report to CSV format
///
/// Values containing commas, quotes or newlines are quoted.
pub fn to_csv(rows: &[ReportRow]) -> String {
    let mut csv_content = csv_row(&HEADERS);
    csv_content.push('\n');

    for row in rows {
        let status = row.status.to_string();
        csv_content.push_str(&csv_row(&[row.id.as_str(), row.name.as_str(), status.as_str()]));
        csv_content.push('\n');
    }

    csv_content
}

/// Convert the report to XLSX format
///
/// Produces a workbook with one worksheet named [`SHEET_NAME`] holding a bold
/// header row and one row per student. Identifiers are written as text so
/// leading zeros survive.
///
/// # Examples
/// ```
/// use attendance::downloader::{ReportRow, Status, to_xlsx};
///
/// let rows = vec![ReportRow { id: "1".into(), name: "Alice".into(), status: Status::Present }];
/// let xlsx = to_xlsx(&rows).unwrap();
/// assert!(!xlsx.is_empty());
/// ```
pub fn to_xlsx(rows: &[ReportRow]) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (r, row) in rows.iter().enumerate() {
        let line = (r + 1) as u32;
        worksheet.write_string(line, 0, &row.id)?;
        worksheet.write_string(line, 1, &row.name)?;
        worksheet.write_string(line, 2, row.status.to_string())?;
    }

    worksheet.set_column_width(0, 14)?;
    worksheet.set_column_width(1, 30)?;
    worksheet.set_column_width(2, 10)?;

    workbook.push_worksheet(worksheet);

    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Student;
    use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
    use std::io::Cursor;

    fn alice_and_bob() -> Roster {
        [
            Student::new("1", "Alice", "photos/alice.jpg"),
            Student::new("2", "Bob", "photos/bob.jpg"),
        ]
        .into_iter()
        .collect()
    }

    fn present(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn duplicate_presence_is_one_present_row() {
        let rows = build_report(&alice_and_bob(), &present(&["1", "1"]));

        assert_eq!(
            rows,
            vec![
                ReportRow { id: "1".into(), name: "Alice".into(), status: Status::Present },
                ReportRow { id: "2".into(), name: "Bob".into(), status: Status::Absent },
            ]
        );
    }

    #[test]
    fn row_count_matches_roster_not_log() {
        let rows = build_report(&alice_and_bob(), &present(&["1", "2", "ghost", "other"]));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.status == Status::Present));

        let rows = build_report(&Roster::new(), &present(&["1"]));
        assert!(rows.is_empty());
    }

    #[test]
    fn csv_has_header_and_escapes() {
        let rows = vec![ReportRow {
            id: "9".into(),
            name: "Doe, Jane".into(),
            status: Status::Absent,
        }];
        assert_eq!(to_csv(&rows), "ID,Name,Status\n9,\"Doe, Jane\",Absent\n");
    }

    #[test]
    fn xlsx_reads_back_with_one_attendance_sheet() {
        let rows = build_report(&alice_and_bob(), &present(&["2"]));
        let bytes = to_xlsx(&rows).unwrap();

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec![SHEET_NAME.to_string()]);

        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        let cells: Vec<Vec<String>> = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Data::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect();

        assert_eq!(
            cells,
            vec![
                vec!["ID", "Name", "Status"],
                vec!["1", "Alice", "Absent"],
                vec!["2", "Bob", "Present"],
            ]
        );
    }
}
