use bytes::Bytes;
use std::path::PathBuf;
use utoipa::ToSchema;

/// Audio file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Result of one finished conversion.
#[derive(Debug, Clone)]
pub struct ConvertedAudio {
    pub job_id: String,
    pub input_key: String,
    pub output_key: String,
    pub output_path: PathBuf,
}

/// Multipart body of the convert endpoint, for the OpenAPI document only.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ConvertUpload {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
