//! Job-status notifications as published by the transcoding service.
//!
//! A notification body is JSON. It arrives either bare:
//!
//! ```json
//! {"state": "COMPLETED", "jobId": "1500000000000-abcdef", "pipelineId": "..."}
//! ```
//!
//! or wrapped in a topic envelope whose `Message` field holds the bare
//! notification as a string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Submitted,
    Progressing,
    Completed,
    Warning,
    Error,
}

impl JobState {
    /// No further status changes follow a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Warning | JobState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Submitted => "SUBMITTED",
            JobState::Progressing => "PROGRESSING",
            JobState::Completed => "COMPLETED",
            JobState::Warning => "WARNING",
            JobState::Error => "ERROR",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = NotificationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(JobState::Submitted),
            "PROGRESSING" => Ok(JobState::Progressing),
            "COMPLETED" => Ok(JobState::Completed),
            "WARNING" => Ok(JobState::Warning),
            "ERROR" => Ok(JobState::Error),
            other => Err(NotificationParseError::UnknownState(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationParseError {
    #[error("notification is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("notification is not a JSON object")]
    NotAnObject,
    #[error("notification has no jobId")]
    MissingJobId,
    #[error("notification has no state")]
    MissingState,
    #[error("unknown job state `{0}`")]
    UnknownState(String),
}

/// A parsed job-status notification. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusEvent {
    pub job_id: String,
    pub state: JobState,
    pub pipeline_id: Option<String>,
    pub error_code: Option<String>,
    pub message_details: Option<String>,
    /// Key of the first output, when the service reports one.
    pub output_key: Option<String>,
    /// The unwrapped notification object.
    pub raw: Value,
}

impl JobStatusEvent {
    #[cfg(test)]
    pub fn new(job_id: impl Into<String>, state: JobState) -> Self {
        let job_id = job_id.into();
        let raw = serde_json::json!({ "jobId": job_id, "state": state.as_str() });
        Self {
            job_id,
            state,
            pipeline_id: None,
            error_code: None,
            message_details: None,
            output_key: None,
            raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn parse(body: &[u8]) -> Result<Self, NotificationParseError> {
        let value: Value = serde_json::from_slice(body)?;
        let notification = unwrap_envelope(value)?;

        let object = notification
            .as_object()
            .ok_or(NotificationParseError::NotAnObject)?;

        let job_id = object
            .get("jobId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(NotificationParseError::MissingJobId)?
            .to_string();

        let state = object
            .get("state")
            .and_then(Value::as_str)
            .ok_or(NotificationParseError::MissingState)?
            .parse::<JobState>()?;

        let output_key = object
            .get("outputs")
            .and_then(Value::as_array)
            .and_then(|outputs| outputs.first())
            .and_then(|output| output.get("key"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            job_id,
            state,
            pipeline_id: string_field(object.get("pipelineId")),
            error_code: string_field(object.get("errorCode")),
            message_details: string_field(object.get("messageDetails")),
            output_key,
            raw: notification,
        })
    }
}

impl fmt::Display for JobStatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} {}", self.job_id, self.state)?;
        if let Some(details) = &self.message_details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

fn unwrap_envelope(value: Value) -> Result<Value, NotificationParseError> {
    match value.get("Message").and_then(Value::as_str) {
        Some(inner) => Ok(serde_json::from_str(inner)?),
        None => Ok(value),
    }
}

// errorCode is numeric on the wire, everything else is a string.
fn string_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_notification() {
        let body = br#"{"state":"PROGRESSING","jobId":"job-123","pipelineId":"p-1"}"#;
        let event = JobStatusEvent::parse(body).expect("valid notification");

        assert_eq!(event.job_id, "job-123");
        assert_eq!(event.state, JobState::Progressing);
        assert_eq!(event.pipeline_id.as_deref(), Some("p-1"));
        assert!(!event.is_terminal());
    }

    #[test]
    fn parses_enveloped_notification() {
        let inner = serde_json::json!({
            "state": "ERROR",
            "jobId": "job-7",
            "errorCode": 3002,
            "messageDetails": "output already exists",
            "outputs": [{"key": "abc", "status": "Error"}]
        });
        let envelope = serde_json::json!({
            "Type": "Notification",
            "MessageId": "m-1",
            "Message": inner.to_string(),
        });

        let event = JobStatusEvent::parse(envelope.to_string().as_bytes()).expect("valid envelope");

        assert_eq!(event.job_id, "job-7");
        assert_eq!(event.state, JobState::Error);
        assert_eq!(event.error_code.as_deref(), Some("3002"));
        assert_eq!(event.message_details.as_deref(), Some("output already exists"));
        assert_eq!(event.output_key.as_deref(), Some("abc"));
        assert_eq!(event.raw, inner);
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Warning.is_terminal());
        assert!(JobState::Error.is_terminal());
        assert!(!JobState::Submitted.is_terminal());
        assert!(!JobState::Progressing.is_terminal());
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(matches!(
            JobStatusEvent::parse(b"not json"),
            Err(NotificationParseError::Json(_))
        ));
        assert!(matches!(
            JobStatusEvent::parse(b"[1,2]"),
            Err(NotificationParseError::NotAnObject)
        ));
        assert!(matches!(
            JobStatusEvent::parse(br#"{"state":"COMPLETED"}"#),
            Err(NotificationParseError::MissingJobId)
        ));
        assert!(matches!(
            JobStatusEvent::parse(br#"{"jobId":"job-1"}"#),
            Err(NotificationParseError::MissingState)
        ));
        assert!(matches!(
            JobStatusEvent::parse(br#"{"jobId":"job-1","state":"PAUSED"}"#),
            Err(NotificationParseError::UnknownState(s)) if s == "PAUSED"
        ));
    }
}
