/*!
# Attendance Tracker

A small web application for taking attendance at a class or event, built in Rust.

## Overview

An admin screen lists the students marked present and shows a QR code that
opens the mobile entry page on a phone. Students are marked present either by
typing their ID on the mobile page or by scanning their personal QR code on the
scanner page. At the end of the session the whole roster can be downloaded as
an Excel report with every student tagged Present or Absent.

## Architecture

### Storage Layer
- **Roster**: `id,name,photo_path` CSV file re-read on every request, or an
  Excel workbook loaded once at startup (read-only)
- **Presence log**: append-only text file with one ID per line, or an
  in-memory set that lives as long as the process
- **QR images**: one `<id>.png` per registered student

### Service Layer
- [`tracker::Tracker`] owns the roster source, presence store and QR issuer,
  and implements lookup, mark-present, registration and the report join

### Web Layer (feature `web`)
- **Technologies**: Rust, axum, handlebars
- Pages for the admin view, mobile entry, camera scanner and registration form
- JSON endpoints for lookup and mark-present, file downloads for the report

## Modules

- **error**: `AttendanceError` and the crate `Result` alias
- **config**: command line and environment configuration
- **loader**: roster parsing from CSV and spreadsheets, and the roster file-extension rule
- **roster**: `Student`, `Roster` and the `RosterSource` storage interface
- **presence**: the `PresenceStore` storage interface and its implementations
- **qr**: QR code PNG encoding and per-student issuance
- **downloader**: report rows and their XLSX / CSV encodings
- **tracker**: the attendance service
- **app**: routing and handlers

## REST API Endpoints

- `/` - Admin page with the present list
- `/mobile`, `/scanner` - Entry pages
- `/create_qrcode` - Registration form
- `/get_student/{id}` - Student name and photo
- `/mark_present/{id}`, `/mark_present`, `/submit_attendance` - Mark a student present
- `/export_excel`, `/download`, `/export_csv` - Attendance report
*/

#[cfg(feature = "web")]
pub mod app;
pub mod config;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod presence;
pub mod qr;
pub mod roster;
pub mod tracker;

/// Re-export the types most callers need
pub use config::Config;
pub use downloader::{ReportRow, Status};
pub use error::{AttendanceError, Result};
pub use presence::{FilePresence, MemoryPresence, PresenceStore};
pub use roster::{CsvRoster, Roster, RosterSource, SpreadsheetRoster, Student};
pub use tracker::{MarkOutcome, NewStudent, StudentCard, Tracker};
