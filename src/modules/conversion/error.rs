use axum::http::StatusCode;
use thiserror::Error;

use crate::common::response::ApiError;
use crate::jobs::event::JobState;
use crate::jobs::waiter::WaitError;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("failed to store input audio: {0:#}")]
    Upload(anyhow::Error),

    #[error("failed to submit transcoding job: {0:#}")]
    Submit(anyhow::Error),

    #[error("transcoding job {job_id} finished with {state}{}", describe_failure(.error_code, .detail))]
    JobFailed {
        job_id: String,
        state: JobState,
        error_code: Option<String>,
        detail: Option<String>,
    },

    #[error("failed to retrieve converted audio: {0:#}")]
    Retrieve(anyhow::Error),

    #[error("failed to write local file: {0}")]
    Staging(#[from] std::io::Error),

    #[error(transparent)]
    Wait(#[from] WaitError),
}

impl ConversionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ConversionError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ConversionError::Upload(_) | ConversionError::Submit(_) | ConversionError::Retrieve(_) => {
                StatusCode::BAD_GATEWAY
            }
            ConversionError::JobFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ConversionError::Wait(WaitError::TimedOut { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ConversionError::Wait(WaitError::Abandoned { .. }) | ConversionError::Staging(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ConversionError> for ApiError {
    fn from(err: ConversionError) -> Self {
        ApiError(err.to_string(), err.status_code())
    }
}

fn describe_failure(error_code: &Option<String>, detail: &Option<String>) -> String {
    match (error_code, detail) {
        (Some(code), Some(detail)) => format!(" (code {code}: {detail})"),
        (Some(code), None) => format!(" (code {code})"),
        (None, Some(detail)) => format!(" ({detail})"),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn job_failure_message_includes_service_details() {
        let err = ConversionError::JobFailed {
            job_id: "job-1".to_string(),
            state: JobState::Error,
            error_code: Some("4000".to_string()),
            detail: Some("unsupported input".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "transcoding job job-1 finished with ERROR (code 4000: unsupported input)"
        );
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn status_codes_distinguish_failure_kinds() {
        assert_eq!(
            ConversionError::InvalidUpload("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ConversionError::Submit(anyhow::anyhow!("down")).status_code(),
            StatusCode::BAD_GATEWAY
        );
        let timeout = ConversionError::from(WaitError::TimedOut {
            job_id: "job-1".to_string(),
            after: Duration::from_secs(1),
        });
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
