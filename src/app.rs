use axum::{
    Form, Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use handlebars::Handlebars;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::downloader::{self, XLSX_MIME};
use crate::error::{AttendanceError, Result};
use crate::presence::{FilePresence, MemoryPresence, PresenceStore};
use crate::qr::{self, QrIssuer};
use crate::roster;
use crate::tracker::{NewStudent, Tracker};

pub struct AppState {
    tracker: Tracker,
    templates: Handlebars<'static>,
    mobile_url: String,
}

impl AppState {
    /// Build the shared state, compiling the page templates
    pub fn new(tracker: Tracker, mobile_url: impl Into<String>) -> Result<Self> {
        let mut templates = Handlebars::new();
        templates
            .register_template_string("admin", include_str!("./static/admin.html"))
            .map_err(|e| AttendanceError::Template(e.to_string()))?;
        templates
            .register_template_string("create_qrcode", include_str!("./static/create_qrcode.html"))
            .map_err(|e| AttendanceError::Template(e.to_string()))?;

        Ok(AppState {
            tracker,
            templates,
            mobile_url: mobile_url.into(),
        })
    }

    fn render(&self, name: &str, data: &Value) -> Result<Html<String>> {
        self.templates
            .render(name, data)
            .map(Html)
            .map_err(|e| AttendanceError::Template(e.to_string()))
    }
}

/// Body of the JSON mark-present endpoints
#[derive(Deserialize)]
struct IdPayload {
    #[serde(default)]
    id: Value,
}

impl IdPayload {
    // Scanners sometimes send numeric ids. Only whole numbers name a student.
    fn id(&self) -> Result<String> {
        match &self.id {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Value::Number(n) => n
                .as_u64()
                .map(|v| v.to_string())
                .or_else(|| n.as_i64().map(|v| v.to_string()))
                .ok_or_else(|| {
                    AttendanceError::Validation(
                        "Student ID must be text or a whole number".to_string(),
                    )
                }),
            _ => Err(AttendanceError::MissingId),
        }
    }
}

#[derive(Serialize)]
struct MarkResponse {
    success: bool,
    id: String,
    name: String,
    photo_path: String,
    already_present: bool,
}

impl IntoResponse for AttendanceError {
    fn into_response(self) -> Response {
        let status = match &self {
            AttendanceError::StudentNotFound(_) | AttendanceError::PhotoNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router over shared state
///
/// Issued QR images are served from the tracker's QR directory under
/// `/qrcodes`.
pub fn router(state: Arc<AppState>) -> Router {
    let qr_dir = state.tracker.qr_issuer().dir().to_path_buf();

    Router::new()
        .route("/", get(serve_admin))
        .route("/mobile", get(serve_mobile))
        .route("/scanner", get(serve_scanner))
        .route("/create_qrcode", get(serve_create_form).post(create_student))
        .route("/get_student/:student_id", get(get_student))
        .route("/mark_present/:student_id", post(mark_present))
        .route("/mark_present", post(mark_present_json))
        .route("/submit_attendance", post(submit_attendance))
        .route("/export_excel", get(export_excel))
        .route("/download", get(export_excel))
        .route("/export_csv", get(export_csv))
        .nest_service("/qrcodes", ServeDir::new(qr_dir))
        .with_state(state)
}

/// Open the configured stores, bind and serve until the process is stopped
pub async fn run(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let roster = roster::open_source(&config.roster)?;
    let presence: Box<dyn PresenceStore> = if config.in_memory {
        Box::new(MemoryPresence::new())
    } else {
        Box::new(FilePresence::open(&config.present_file)?)
    };
    info!("Roster: {}", roster.describe());
    info!("Presence: {}", presence.describe());

    let lan_ip = local_ip_address::local_ip().ok();
    let mobile_url = config.mobile_url(lan_ip);
    info!("Mobile page: {}", mobile_url);

    let tracker = Tracker::new(roster, presence, QrIssuer::new(&config.qr_dir));
    let app_state = Arc::new(AppState::new(tracker, mobile_url)?);
    let app = router(app_state);

    let listener = TcpListener::bind((config.host, config.port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_admin(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let present = state.tracker.present_students()?;
    let present_count = present.len();
    let roster_count = state.tracker.roster_size()?;
    let qr_code = STANDARD.encode(qr::encode_png(&state.mobile_url)?);

    state.render(
        "admin",
        &json!({
            "qr_code": qr_code,
            "mobile_url": state.mobile_url,
            "present_students": present,
            "present_count": present_count,
            "roster_count": roster_count,
        }),
    )
}

async fn serve_mobile() -> Html<&'static str> {
    Html(include_str!("./static/mobile.html"))
}

async fn serve_scanner() -> Html<&'static str> {
    Html(include_str!("./static/scanner.html"))
}

async fn serve_create_form(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    state.render("create_qrcode", &json!({}))
}

async fn create_student(
    State(state): State<Arc<AppState>>,
    Form(form): Form<NewStudent>,
) -> Result<Html<String>> {
    let submitted = form.clone();

    match state.tracker.register(form) {
        Ok(student) => {
            let qr_url = format!("/qrcodes/{}.png", urlencoding::encode(&student.id));
            state.render(
                "create_qrcode",
                &json!({ "created": student, "qr_url": qr_url }),
            )
        }
        // Form problems are shown inline, keeping what was typed.
        Err(e) if e.is_client_error() => state.render(
            "create_qrcode",
            &json!({ "error": e.to_string(), "form": submitted }),
        ),
        Err(e) => Err(e),
    }
}

async fn get_student(
    Path(student_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse> {
    let card = state.tracker.lookup(&student_id)?;
    Ok(Json(card))
}

async fn mark_present(
    Path(student_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse> {
    state.tracker.mark_present(&student_id)?;
    Ok(Json(json!({ "success": true })))
}

async fn mark_present_json(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<IdPayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload.map_err(|_| AttendanceError::MissingId)?;
    let outcome = state.tracker.mark_present(&payload.id()?)?;

    Ok(Json(MarkResponse {
        success: true,
        id: outcome.student.id,
        name: outcome.student.name,
        photo_path: outcome.student.photo_path,
        already_present: outcome.already_present,
    }))
}

async fn submit_attendance(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<IdPayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload.map_err(|_| AttendanceError::MissingId)?;
    let outcome = state.tracker.mark_present(&payload.id()?)?;

    Ok(Json(json!({
        "status": "marked",
        "id": outcome.student.id,
        "name": outcome.student.name,
    })))
}

async fn export_excel(State(state): State<Arc<AppState>>) -> Result<Response> {
    let rows = state.tracker.report()?;
    let buffer = downloader::to_xlsx(&rows)?;
    info!("Exported attendance for {} students as XLSX", rows.len());

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"attendance.xlsx\"",
            ),
        ],
        buffer,
    )
        .into_response())
}

async fn export_csv(State(state): State<Arc<AppState>>) -> Result<Response> {
    let rows = state.tracker.report()?;
    let csv_content = downloader::to_csv(&rows);
    info!("Exported attendance for {} students as CSV", rows.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"attendance.csv\"",
            ),
        ],
        csv_content,
    )
        .into_response())
}
