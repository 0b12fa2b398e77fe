//! Best-effort JSON-lines audit log for admin-facing actions.

use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
};

use serde::Serialize;

use crate::Result;

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,
    pub user_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn command(user_id: i64, command: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "command".to_string(),
            user_id,
            command: Some(command.to_string()),
            authorized: None,
            error: None,
        }
    }

    pub fn auth(user_id: i64, command: &str, authorized: bool) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "auth".to_string(),
            user_id,
            command: Some(command.to_string()),
            authorized: Some(authorized),
            error: None,
        }
    }

    pub fn error(user_id: i64, command: &str, error: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "error".to_string(),
            user_id,
            command: Some(command.to_string()),
            authorized: None,
            error: Some(truncate_text(error, AUDIT_MAX_TEXT)),
        }
    }
}

fn iso_timestamp_utc() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn truncate_text(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    format!("{}...", s.chars().take(max).collect::<String>())
}

/// Appends one JSON object per line. A `None` path disables the logger.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: Option<PathBuf>,
}

impl AuditLogger {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn write(&self, event: AuditEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut line = serde_json::to_string(&event)
            .map_err(|e| crate::Error::External(format!("audit serialize: {e}")))?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
