//! Error types for the attendance tracker.
//!
//! Every fallible operation in the crate returns [`AttendanceError`]. The web
//! layer maps the variants onto HTTP status codes: lookups of unknown students
//! or photos become 404s, form problems are shown inline, and everything else
//! is a server error.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for attendance operations.
#[derive(Error, Debug)]
pub enum AttendanceError {
    // === Lookup Errors ===
    /// The identifier is not in the roster.
    #[error("Student not found")]
    StudentNotFound(String),

    /// The student exists but their photo file could not be read.
    #[error("Photo not found")]
    PhotoNotFound(PathBuf),

    // === Request Errors ===
    /// A mark-present request carried no identifier.
    #[error("Missing student ID")]
    MissingId,

    /// A registration form failed validation.
    #[error("{0}")]
    Validation(String),

    /// The roster source cannot be written to.
    #[error("Roster is read-only; edit the spreadsheet to add students")]
    ReadOnlyRoster,

    // === Roster Errors ===
    /// The roster header lacks a required column.
    #[error("roster is missing the '{0}' column")]
    MissingColumn(&'static str),

    /// The roster workbook could not be opened or read.
    #[error("failed to read roster workbook: {0}")]
    Workbook(#[from] calamine::Error),

    /// The roster file has an extension we do not know how to read.
    #[error("unsupported roster file: {0}")]
    UnsupportedRoster(String),

    // === Output Errors ===
    /// Building the Excel report failed.
    #[error("failed to build spreadsheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// The data does not fit in a QR code.
    #[error("failed to encode QR code: {0}")]
    Qr(#[from] qrcode::types::QrError),

    /// Writing a PNG image failed.
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),

    /// Rendering an HTML page failed.
    #[error("failed to render page: {0}")]
    Template(String),

    // === I/O Errors ===
    /// A roster, presence or image file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AttendanceError {
    /// True for errors caused by the request rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AttendanceError::StudentNotFound(_)
                | AttendanceError::PhotoNotFound(_)
                | AttendanceError::MissingId
                | AttendanceError::Validation(_)
                | AttendanceError::ReadOnlyRoster
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AttendanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_messages_are_distinct() {
        let student = AttendanceError::StudentNotFound("42".to_string());
        let photo = AttendanceError::PhotoNotFound(PathBuf::from("photos/42.jpg"));

        assert_eq!(student.to_string(), "Student not found");
        assert_eq!(photo.to_string(), "Photo not found");
        assert!(student.is_client_error());
        assert!(photo.is_client_error());
    }

    #[test]
    fn io_errors_are_server_errors() {
        let err: AttendanceError = std::io::Error::other("disk full").into();
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("disk full"));
    }
}
