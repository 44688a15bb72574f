//! HTTP request handlers.

use super::AppState;
use crate::db::LogFilter;
use crate::export::write_csv;
use crate::probe::Classification;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::NaiveDate;
use serde::Deserialize;

// ============================================================================
// API: Session
// ============================================================================

pub async fn handle_get_session(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sessions.status().await)
}

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub target: String,
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

fn default_interval() -> u64 {
    1
}

pub async fn handle_start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    match state
        .sessions
        .start_session(&req.target, req.interval_seconds)
        .await
    {
        Ok(status) => Json(status).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

pub async fn handle_stop_session(State(state): State<AppState>) -> impl IntoResponse {
    state.sessions.stop_session().await;
    StatusCode::NO_CONTENT
}

// ============================================================================
// API: Logs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

impl LogsQuery {
    /// Turn query parameters into a store filter. Empty values and a
    /// result of `All` mean "no filter".
    pub fn to_filter(&self) -> Result<LogFilter, String> {
        let classification = match self.result.as_deref().map(str::trim) {
            None | Some("") | Some("All") => None,
            Some(result) => Some(result.parse::<Classification>()?),
        };

        Ok(LogFilter {
            target: self
                .ip
                .as_deref()
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string),
            classification,
            from: parse_date("from", self.from.as_deref())?,
            to: parse_date("to", self.to.as_deref())?,
        })
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| format!("invalid {} date {:?}: {}", field, s, e)),
    }
}

pub async fn handle_get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    match query.to_filter() {
        Ok(filter) => Json(state.sessions.query_logs(&filter)).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteLogsRequest {
    pub ids: Vec<i64>,
}

pub async fn handle_delete_logs(
    State(state): State<AppState>,
    Json(req): Json<DeleteLogsRequest>,
) -> impl IntoResponse {
    state.sessions.delete_logs(&req.ids);
    StatusCode::NO_CONTENT
}

pub async fn handle_export_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };

    let logs = state.sessions.query_logs(&filter);
    let mut body = Vec::new();
    if let Err(e) = write_csv(logs.iter().map(|e| &e.record), &mut body) {
        tracing::error!("Export failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"ping_logs.csv\""),
        ],
        body,
    )
        .into_response()
}

pub async fn handle_health() -> impl IntoResponse {
    StatusCode::OK
}
