use crate::common::response::{ApiError, ErrorResponse};
use crate::modules::conversion::dto::{ConvertUpload, UploadedAudio};
use crate::modules::conversion::service::ConversionService;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};

const FILE_FIELD: &str = "file";

/// Convert an audio file
/// Blocks until the transcoding job has finished and its output is stored locally.
#[utoipa::path(
    post,
    path = "/rest/api/convert",
    request_body(content = ConvertUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Conversion finished"),
        (status = 400, description = "Bad Request", body = ErrorResponse),
        (status = 422, description = "Transcoding job failed", body = ErrorResponse),
        (status = 502, description = "Object store or transcoder unavailable", body = ErrorResponse),
        (status = 504, description = "Timed out waiting for the job", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    ),
    tag = "Conversion"
)]
pub async fn convert(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let upload = match read_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err(e) => return e.into_response(),
    };

    info!(
        "Received {} ({} bytes) for conversion",
        upload.file_name.as_deref().unwrap_or("unnamed upload"),
        upload.bytes.len()
    );

    match ConversionService::convert(state, upload).await {
        Ok(converted) => {
            info!(
                job_id = %converted.job_id,
                input_key = %converted.input_key,
                output_key = %converted.output_key,
                output = %converted.output_path.display(),
                "✅ Conversion finished"
            );
            StatusCode::OK.into_response()
        }
        Err(e) => {
            error!("❌ Conversion failed: {}", e);
            ApiError::from(e).into_response()
        }
    }
}

async fn read_upload(multipart: &mut Multipart) -> Result<UploadedAudio, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(e.body_text(), e.status()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError(e.body_text(), e.status()))?;

        return Ok(UploadedAudio {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(ApiError(
        format!("Missing multipart field '{}'", FILE_FIELD),
        StatusCode::BAD_REQUEST,
    ))
}
