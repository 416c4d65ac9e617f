use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AttendanceError, Result};
use crate::loader::{self, RosterFormat};

/// Column names of the roster file, in the order new rows are written.
pub const ROSTER_COLUMNS: [&str; 3] = ["id", "name", "photo_path"];

/// A student known to the tracker
///
/// Students are created by importing a roster file or through the registration
/// form, and never change for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Unique identifier, also encoded in the student's QR code
    pub id: String,

    /// Display name
    pub name: String,

    /// Path to the student's photo, relative to the working directory
    pub photo_path: String,
}

impl Student {
    pub fn new(id: impl Into<String>, name: impl Into<String>, photo_path: impl Into<String>) -> Self {
        Student {
            id: id.into(),
            name: name.into(),
            photo_path: photo_path.into(),
        }
    }
}

/// Ordered set of students keyed by identifier
///
/// Students keep the order in which they were first inserted. Inserting an
/// identifier twice replaces the earlier data but keeps its position.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    students: Vec<Student>,
    index: HashMap<String, usize>,
}

impl Roster {
    pub fn new() -> Self {
        Roster::default()
    }

    pub fn insert(&mut self, student: Student) {
        match self.index.get(&student.id) {
            Some(&pos) => self.students[pos] = student,
            None => {
                self.index.insert(student.id.clone(), self.students.len());
                self.students.push(student);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.index.get(id).map(|&pos| &self.students[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Student> {
        self.students.iter()
    }
}

impl FromIterator<Student> for Roster {
    fn from_iter<I: IntoIterator<Item = Student>>(iter: I) -> Self {
        let mut roster = Roster::new();
        for student in iter {
            roster.insert(student);
        }
        roster
    }
}

/// Where the roster comes from
///
/// Implementations decide whether the roster is re-read on every call or
/// loaded once. Only writable sources override [`RosterSource::append`].
pub trait RosterSource: Send + Sync {
    /// Current roster
    fn load(&self) -> Result<Roster>;

    /// Add a student, failing if the identifier is already present
    fn append(&self, _student: &Student) -> Result<()> {
        Err(AttendanceError::ReadOnlyRoster)
    }

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Roster stored as a delimited text file, re-read on every request
pub struct CsvRoster {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvRoster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvRoster {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

impl RosterSource for CsvRoster {
    fn load(&self) -> Result<Roster> {
        loader::from_csv(&self.path)
    }

    fn append(&self, student: &Student) -> Result<()> {
        // Held across the duplicate check and the write.
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if loader::from_csv(&self.path)?.contains(&student.id) {
            return Err(AttendanceError::Validation(
                "Student ID already exists".to_string(),
            ));
        }

        let existing = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let row = csv_row(&[
            student.id.as_str(),
            student.name.as_str(),
            student.photo_path.as_str(),
        ]);

        // No header yet: start the file over.
        if existing.iter().all(|b| b.is_ascii_whitespace()) {
            fs::write(&self.path, format!("{}\n{}\n", ROSTER_COLUMNS.join(","), row))?;
            return Ok(());
        }

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        if existing.last() != Some(&b'\n') {
            file.write_all(b"\n")?;
        }
        file.write_all(format!("{}\n", row).as_bytes())?;

        Ok(())
    }

    fn describe(&self) -> String {
        format!("CSV roster {}", self.path.display())
    }
}

/// Roster read once from a spreadsheet at startup and kept in memory
pub struct SpreadsheetRoster {
    path: PathBuf,
    roster: Roster,
}

impl SpreadsheetRoster {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let roster = loader::from_excel(&path)?;
        Ok(SpreadsheetRoster { path, roster })
    }
}

impl RosterSource for SpreadsheetRoster {
    fn load(&self) -> Result<Roster> {
        Ok(self.roster.clone())
    }

    fn describe(&self) -> String {
        format!(
            "spreadsheet roster {} ({} students)",
            self.path.display(),
            self.roster.len()
        )
    }
}

/// Open the right roster source for a path, by extension
///
/// Unknown extensions are rejected here so a typo in the roster path stops
/// the server at startup instead of silently creating a new CSV file.
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn RosterSource>> {
    let path = path.as_ref();
    match RosterFormat::detect(path)? {
        RosterFormat::Csv => Ok(Box::new(CsvRoster::new(path))),
        RosterFormat::Spreadsheet => Ok(Box::new(SpreadsheetRoster::open(path)?)),
    }
}

/// Join fields into one CSV line, quoting where needed
pub fn csv_row(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|value| {
            if value.contains(',') || value.contains('"') || value.contains('\n') {
                format!("\"{}\"", value.replace('"', "\"\""))
            } else {
                value.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
