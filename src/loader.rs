use crate::error::{AttendanceError, Result};
use crate::roster::{Roster, Student};
use std::fs;
use std::path::Path;

/// Load a roster from a CSV file
///
/// The first line names the columns; `id` and `name` are required and
/// `photo_path` is optional. Columns may appear in any order. A file that
/// does not exist yields an empty roster so a fresh install can start without
/// one.
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Returns
/// * `Result<Roster>` - The loaded roster or an error
///
/// # Examples
/// ```no_run
/// use attendance::loader::from_csv;
///
/// match from_csv("students.csv") {
///     Ok(roster) => println!("Loaded {} students", roster.len()),
///     Err(e) => eprintln!("Error loading roster: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Roster> {
    match fs::read_to_string(filepath) {
        Ok(text) => from_csv_str(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Roster::new()),
        Err(e) => Err(e.into()),
    }
}

/// Parse roster CSV text
///
/// Quoted fields may span lines. Blank lines are skipped, and so are rows
/// whose id is empty. Short rows get empty strings for the missing fields.
pub fn from_csv_str(text: &str) -> Result<Roster> {
    let mut records = parse_csv_records(text).into_iter();

    let header = match records.next() {
        Some(record) => record,
        None => return Ok(Roster::new()),
    };
    let columns = Columns::locate(header.iter().map(String::as_str))?;

    Ok(records
        .filter_map(|fields| columns.student(&fields))
        .collect())
}

/// Load a roster from a spreadsheet file
///
/// Reads the first worksheet; its first row is the header, using the same
/// column names as the CSV format. The workbook kind (`.xlsx`, `.xls`,
/// `.xlsb`, `.ods`) is picked from the extension. Numbers are rendered the
/// way a spreadsheet shows them, so an id typed as `12` is read back as
/// `"12"` rather than `"12.0"`.
///
/// # Arguments
/// * `filepath` - Path to the spreadsheet to load
///
/// # Returns
/// * `Result<Roster>` - The loaded roster or an error
pub fn from_excel(filepath: impl AsRef<Path>) -> Result<Roster> {
    use calamine::{Reader, open_workbook_auto};

    let mut workbook = open_workbook_auto(filepath)?;

    // Get the first worksheet
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AttendanceError::UnsupportedRoster("workbook has no sheets".to_string()))?;

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();

    let header: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(cell_to_string).collect(),
        None => return Ok(Roster::new()),
    };
    let columns = Columns::locate(header.iter().map(String::as_str))?;

    Ok(rows
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
        .filter_map(|fields| columns.student(&fields))
        .collect())
}

/// How a roster file is stored, decided by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterFormat {
    /// `.csv` or `.txt`, re-read on every request and writable
    Csv,
    /// `.xlsx`, `.xls`, `.xlsb` or `.ods`, read once and read-only
    Spreadsheet,
}

impl RosterFormat {
    /// Detect the format of a roster path
    ///
    /// # Examples
    /// ```
    /// use attendance::loader::RosterFormat;
    /// use std::path::Path;
    ///
    /// assert_eq!(RosterFormat::detect(Path::new("class.XLSX")).unwrap(), RosterFormat::Spreadsheet);
    /// assert!(RosterFormat::detect(Path::new("class.json")).is_err());
    /// ```
    pub fn detect(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("csv") | Some("txt") => Ok(RosterFormat::Csv),
            Some("xlsx") | Some("xls") | Some("xlsb") | Some("ods") => Ok(RosterFormat::Spreadsheet),
            Some(ext) => Err(AttendanceError::UnsupportedRoster(format!(
                "unsupported file extension: {}",
                ext
            ))),
            None => Err(AttendanceError::UnsupportedRoster(
                "file has no extension".to_string(),
            )),
        }
    }
}

// Positions of the roster columns within a header row
struct Columns {
    id: usize,
    name: usize,
    photo_path: Option<usize>,
}

impl Columns {
    fn locate<'a>(header: impl Iterator<Item = &'a str>) -> Result<Self> {
        let header: Vec<&str> = header.map(str::trim).collect();
        let find = |name: &str| header.iter().position(|h| *h == name);

        Ok(Columns {
            id: find("id").ok_or(AttendanceError::MissingColumn("id"))?,
            name: find("name").ok_or(AttendanceError::MissingColumn("name"))?,
            photo_path: find("photo_path"),
        })
    }

    fn student(&self, fields: &[String]) -> Option<Student> {
        let field = |pos: Option<usize>| {
            pos.and_then(|p| fields.get(p))
                .map(|f| f.trim().to_string())
                .unwrap_or_default()
        };

        let id = field(Some(self.id));
        if id.is_empty() {
            return None;
        }

        Some(Student {
            id,
            name: field(Some(self.name)),
            photo_path: field(self.photo_path),
        })
    }
}

fn cell_to_string(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.clone(),
        calamine::Data::Int(i) => i.to_string(),
        calamine::Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", *f as i64)
        }
        calamine::Data::Float(f) => f.to_string(),
        calamine::Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

// Split CSV text into records of fields, honouring quotes across lines
fn parse_csv_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Double quote inside quoted field - add a single quote
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                // End of field
                record.push(std::mem::take(&mut current_field));
            }
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                // End of record
                record.push(std::mem::take(&mut current_field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => {
                current_field.push(c);
            }
        }
    }

    // Last record without a trailing newline
    if !current_field.is_empty() || !record.is_empty() {
        record.push(current_field);
        push_record(&mut records, record);
    }

    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.len() == 1 && record[0].trim().is_empty();
    if !blank {
        records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    #[test]
    fn parses_header_in_any_order() {
        let roster = from_csv_str("name,photo_path,id\nAlice,photos/a.jpg,1\nBob,photos/b.jpg,2\n")
            .unwrap();

        assert_eq!(roster.len(), 2);
        let bob = roster.get("2").unwrap();
        assert_eq!(bob.name, "Bob");
        assert_eq!(bob.photo_path, "photos/b.jpg");
    }

    #[test]
    fn handles_quotes_blank_lines_and_crlf() {
        let text = "id,name,photo_path\r\n\r\n1,\"Doe, Jane\",\"a \"\"b\"\".jpg\"\r\n  \n2,Bob,b.jpg\r\n";
        let roster = from_csv_str(text).unwrap();

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get("1").unwrap().name, "Doe, Jane");
        assert_eq!(roster.get("1").unwrap().photo_path, "a \"b\".jpg");
    }

    #[test]
    fn short_rows_and_missing_photo_column() {
        let roster = from_csv_str("id,name\n1,Alice\n2\n,Nobody\n").unwrap();

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get("1").unwrap().photo_path, "");
        assert_eq!(roster.get("2").unwrap().name, "");
        assert!(!roster.contains(""));
    }

    #[test]
    fn missing_id_column_is_an_error() {
        let err = from_csv_str("student,name\n1,Alice\n").unwrap_err();
        assert!(matches!(err, AttendanceError::MissingColumn("id")));
    }

    #[test]
    fn missing_file_is_empty_roster() {
        let dir = tempdir().unwrap();
        let roster = from_csv(dir.path().join("nope.csv")).unwrap();
        assert!(roster.is_empty());
    }

    #[test]
    fn reads_first_sheet_of_workbook() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "id").unwrap();
        sheet.write_string(0, 1, "name").unwrap();
        sheet.write_string(0, 2, "photo_path").unwrap();
        sheet.write_number(1, 0, 101).unwrap();
        sheet.write_string(1, 1, "Alice").unwrap();
        sheet.write_string(1, 2, "photos/alice.jpg").unwrap();
        sheet.write_string(2, 0, "B-7").unwrap();
        sheet.write_string(2, 1, "Bob").unwrap();
        workbook.save(&path).unwrap();

        let roster = from_excel(&path).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get("101").unwrap().name, "Alice");
        assert_eq!(roster.get("B-7").unwrap().photo_path, "");
    }

    #[test]
    fn quoted_newlines_stay_inside_the_field() {
        let text = "id,name,photo_path\n3,\"Carol\nKing\",c.jpg\n4,Dan,d.jpg";
        let roster = from_csv_str(text).unwrap();

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get("3").unwrap().name, "Carol\nKing");
        assert_eq!(roster.get("3").unwrap().photo_path, "c.jpg");
        assert_eq!(roster.get("4").unwrap().name, "Dan");
    }

    #[test]
    fn xls_is_read_as_legacy_workbook() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("class.xls");
        fs::write(&path, b"not a workbook").unwrap();

        // Routed to the legacy reader, which rejects the bytes instead of a zip error.
        match from_excel(&path) {
            Err(AttendanceError::Workbook(calamine::Error::Xls(_))) => {}
            other => panic!("expected an xls reader error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn detects_roster_format_by_extension() {
        assert_eq!(RosterFormat::detect(Path::new("students.csv")).unwrap(), RosterFormat::Csv);
        assert_eq!(RosterFormat::detect(Path::new("students.TXT")).unwrap(), RosterFormat::Csv);
        for name in ["class.xlsx", "class.xls", "class.xlsb", "class.ods"] {
            assert_eq!(
                RosterFormat::detect(Path::new(name)).unwrap(),
                RosterFormat::Spreadsheet,
                "{}",
                name
            );
        }
        assert!(matches!(
            RosterFormat::detect(Path::new("students.json")),
            Err(AttendanceError::UnsupportedRoster(_))
        ));
        assert!(matches!(
            RosterFormat::detect(Path::new("students")),
            Err(AttendanceError::UnsupportedRoster(_))
        ));
    }
}
