//! The attendance service.
//!
//! [`Tracker`] owns the roster source, the presence store and the QR issuer.
//! It is built once at startup and shared by every request handler; nothing
//! in the crate keeps attendance state anywhere else.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::downloader::{self, ReportRow};
use crate::error::{AttendanceError, Result};
use crate::presence::PresenceStore;
use crate::qr::QrIssuer;
use crate::roster::{RosterSource, Student};

lazy_static! {
    // Identifiers double as QR file names.
    static ref ID_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

/// A student as returned by the lookup endpoint, photo included
#[derive(Debug, Clone, Serialize)]
pub struct StudentCard {
    pub id: String,
    pub name: String,
    /// Base64 encoded photo file
    pub photo: String,
}

/// Result of marking a student present
#[derive(Debug, Clone)]
pub struct MarkOutcome {
    pub student: Student,
    /// The student had already been marked before this call
    pub already_present: bool,
}

/// Registration form input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStudent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub photo_path: String,
}

/// The attendance service shared by every request
///
/// Owns the roster source, the presence store and the QR issuer. All methods
/// take `&self`; the stores do their own locking.
pub struct Tracker {
    roster: Box<dyn RosterSource>,
    presence: Box<dyn PresenceStore>,
    qr: QrIssuer,
}

impl Tracker {
    pub fn new(
        roster: Box<dyn RosterSource>,
        presence: Box<dyn PresenceStore>,
        qr: QrIssuer,
    ) -> Self {
        Tracker {
            roster,
            presence,
            qr,
        }
    }

    pub fn presence_store(&self) -> &dyn PresenceStore {
        self.presence.as_ref()
    }

    pub fn qr_issuer(&self) -> &QrIssuer {
        &self.qr
    }

    /// Students marked present, in roster order
    ///
    /// Identifiers in the presence log that are no longer on the roster are
    /// skipped.
    pub fn present_students(&self) -> Result<Vec<Student>> {
        let roster = self.roster.load()?;
        let present = self.presence.snapshot()?;

        Ok(roster
            .iter()
            .filter(|student| present.contains(&student.id))
            .cloned()
            .collect())
    }

    /// Number of students on the roster
    pub fn roster_size(&self) -> Result<usize> {
        Ok(self.roster.load()?.len())
    }

    /// Look a student up and attach their photo
    pub fn lookup(&self, id: &str) -> Result<StudentCard> {
        let roster = self.roster.load()?;
        let student = roster.get(id).ok_or_else(|| {
            warn!("Lookup of unknown student {}", id);
            AttendanceError::StudentNotFound(id.to_string())
        })?;

        let photo_path = PathBuf::from(&student.photo_path);
        let photo = match fs::read(&photo_path) {
            Ok(bytes) => STANDARD.encode(bytes),
            Err(e) => {
                warn!("Photo {} for student {} unreadable: {}", photo_path.display(), id, e);
                return Err(AttendanceError::PhotoNotFound(photo_path));
            }
        };

        Ok(StudentCard {
            id: student.id.clone(),
            name: student.name.clone(),
            photo,
        })
    }

    /// Mark a roster student present
    ///
    /// Marking twice is allowed and changes nothing the second time.
    pub fn mark_present(&self, id: &str) -> Result<MarkOutcome> {
        let id = id.trim();
        if id.is_empty() {
            return Err(AttendanceError::MissingId);
        }

        let roster = self.roster.load()?;
        let student = match roster.get(id) {
            Some(student) => student.clone(),
            None => {
                warn!("Refused to mark unknown student {}", id);
                return Err(AttendanceError::StudentNotFound(id.to_string()));
            }
        };

        let already_present = self.presence.snapshot()?.contains(id);
        self.presence.record(id)?;
        info!("Marked {} ({}) present", student.id, student.name);

        Ok(MarkOutcome {
            student,
            already_present,
        })
    }

    /// Add a student to the roster and issue their QR code
    pub fn register(&self, form: NewStudent) -> Result<Student> {
        let student = Student::new(form.id.trim(), form.name.trim(), form.photo_path.trim());

        if student.id.is_empty() || student.name.is_empty() || student.photo_path.is_empty() {
            return Err(AttendanceError::Validation(
                "All fields are required".to_string(),
            ));
        }
        if [&student.id, &student.name, &student.photo_path]
            .iter()
            .any(|field| field.chars().any(char::is_control))
        {
            return Err(AttendanceError::Validation(
                "Fields may not contain line breaks or control characters".to_string(),
            ));
        }
        if !ID_PATTERN.is_match(&student.id) {
            return Err(AttendanceError::Validation(
                "Student ID may only contain letters, digits, '-' and '_'".to_string(),
            ));
        }

        self.roster.append(&student)?;
        let image = self.qr.issue(&student.id)?;
        info!(
            "Registered {} ({}), QR code at {}",
            student.id,
            student.name,
            image.display()
        );

        Ok(student)
    }

    /// Roster joined with presence, one row per student
    pub fn report(&self) -> Result<Vec<ReportRow>> {
        let roster = self.roster.load()?;
        let present = self.presence.snapshot()?;
        Ok(downloader::build_report(&roster, &present))
    }
}
