use std::fmt::Write;

use serde_json::Value;

use crate::models::{AttemptRecord, Submission};

/// A record that flattens into one CSV row.
pub trait CsvRow {
    const HEADER: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

pub fn to_csv<T: CsvRow>(rows: &[T]) -> String {
    let mut csv = String::new();
    let _ = writeln!(csv, "{}", T::HEADER.join(","));

    for row in rows {
        let line = row
            .cells()
            .iter()
            .map(|cell| escape(cell))
            .collect::<Vec<_>>()
            .join(",");
        let _ = writeln!(csv, "{line}");
    }

    csv
}

fn escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Object-valued fields are embedded as JSON text.
fn json_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl CsvRow for Submission {
    const HEADER: &'static [&'static str] = &[
        "id",
        "form_type",
        "client_name",
        "payload",
        "submitter",
        "webhook_sent",
        "webhook_success",
        "retry_count",
        "last_retry_at",
        "created_at",
        "updated_at",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.form_type.to_string(),
            self.client_name.clone(),
            json_cell(&self.payload),
            opt(&self.submitter),
            self.webhook_sent.to_string(),
            self.webhook_success.to_string(),
            self.retry_count.to_string(),
            opt(&self.last_retry_at.map(|t| t.to_rfc3339())),
            self.created_at.to_rfc3339(),
            self.updated_at.to_rfc3339(),
        ]
    }
}

impl CsvRow for AttemptRecord {
    const HEADER: &'static [&'static str] = &[
        "id",
        "submission_id",
        "payload",
        "endpoint_url",
        "http_status",
        "response_body",
        "error_message",
        "attempt_number",
        "submitter",
        "origin",
        "success",
        "created_at",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            opt(&self.submission_id),
            json_cell(&self.payload),
            self.endpoint_url.clone(),
            opt(&self.http_status),
            self.response_body.clone(),
            opt(&self.error_message),
            self.attempt_number.to_string(),
            opt(&self.submitter),
            self.origin.as_str().to_string(),
            self.success.to_string(),
            self.created_at.to_rfc3339(),
        ]
    }
}
