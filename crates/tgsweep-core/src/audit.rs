use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    domain::GroupHandle,
    errors::Error,
    lifecycle::{Intent, Outcome},
    Result,
};

const AUDIT_MAX_TEXT: usize = 500;

/// RFC3339 timestamp in UTC.
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

/// The group a flow ran on.
#[derive(Clone, Debug, Serialize)]
pub struct GroupFields {
    pub group_id: i64,
    pub title: String,
    pub kind: &'static str,
}

/// What a flow decided and achieved.
#[derive(Clone, Debug, Serialize)]
pub struct FlowFields {
    pub intent: &'static str,
    pub role: &'static str,
    pub outcome: &'static str,
    pub own_messages_deleted: usize,
    pub messages_drained: usize,
    pub members_removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One audit record. Flow records carry the group and flow fields, reload
/// records only the scan size.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: &'static str,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupFields>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups_scanned: Option<usize>,
}

impl AuditEvent {
    pub fn flow(handle: &GroupHandle, intent: Intent, outcome: &Outcome) -> Self {
        let report = outcome.report();
        let failure = match outcome {
            Outcome::PartialFailure(f) => Some(f),
            _ => None,
        };
        Self {
            timestamp: iso_timestamp_utc(),
            event: "flow",
            group: Some(GroupFields {
                group_id: handle.id.0,
                title: truncate_text(&handle.title, AUDIT_MAX_TEXT),
                kind: handle.kind.label(),
            }),
            flow: Some(FlowFields {
                intent: intent.label(),
                role: outcome.role().label(),
                outcome: outcome.label(),
                own_messages_deleted: report.own_messages_deleted,
                messages_drained: report.messages_drained,
                members_removed: report.members_removed,
                failed_step: failure.map(|f| f.step.label()),
                error: failure.map(|f| truncate_text(&f.cause, AUDIT_MAX_TEXT)),
            }),
            groups_scanned: None,
        }
    }

    pub fn reload(groups_scanned: usize) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "reload",
            group: None,
            flow: None,
            groups_scanned: Some(groups_scanned),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record: a JSON line, or a `key=value` line in plain mode.
    pub fn write(&self, event: AuditEvent) -> Result<()> {
        let line = if self.json {
            serde_json::to_string(&event)?
        } else {
            plain_line(&serde_json::to_value(&event)?)?
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

fn plain_line(value: &serde_json::Value) -> Result<String> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::External("audit event is not a JSON object".to_string()))?;
    let fields: Vec<String> = obj
        .iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) if s.contains(char::is_whitespace) => {
                format!("{k}={v}")
            }
            serde_json::Value::String(s) => format!("{k}={s}"),
            other => format!("{k}={other}"),
        })
        .collect();
    Ok(fields.join(" "))
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
