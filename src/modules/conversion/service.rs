use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dto::{ConvertedAudio, UploadedAudio};
use super::error::ConversionError;
use crate::infrastructure::storage::ObjectStore;
use crate::infrastructure::transcoder::CreateJobRequest;
use crate::jobs::event::{JobState, JobStatusEvent};
use crate::jobs::waiter::JobWaiter;
use crate::state::AppState;

const DEFAULT_INPUT_EXTENSION: &str = "wav";
const DEFAULT_CONTENT_TYPE: &str = "audio/wav";

pub struct ConversionService;

impl ConversionService {
    /// Runs one upload through the remote transcoder and stores the result
    /// locally. Returns once the job has finished and its output is on disk.
    pub async fn convert(state: AppState, upload: UploadedAudio) -> Result<ConvertedAudio, ConversionError> {
        if upload.bytes.is_empty() {
            return Err(ConversionError::InvalidUpload("file is empty".to_string()));
        }

        let config = &state.config;
        let input_key = input_key_for(upload.file_name.as_deref());
        let output_key = output_key_for(&input_key).to_string();
        let content_type = upload.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);

        // 1. Store the input
        state
            .storage
            .put(&config.input_bucket, &input_key, upload.bytes.clone(), content_type)
            .await
            .map_err(ConversionError::Upload)?;
        info!(input_key = %input_key, bytes = upload.bytes.len(), "Stored input audio");

        let staging_dir = config.local_storage_dir.join(&output_key);
        tokio::fs::create_dir_all(&staging_dir).await?;
        tokio::fs::write(staging_dir.join(&input_key), &upload.bytes).await?;

        // 2. Submit the job
        let job_id = state
            .transcoder
            .create_job(&CreateJobRequest {
                pipeline_id: config.pipeline_id.clone(),
                input_key: input_key.clone(),
                output_key: output_key.clone(),
                preset_id: config.preset_id.clone(),
            })
            .await
            .map_err(ConversionError::Submit)?;

        // 3. Keep the shared poller alive until this request is done
        let _lease = state.coordinator.acquire_poller();

        // 4. Wait for the terminal notification
        let retrieval = OutputRetrieval {
            storage: Arc::clone(&state.storage),
            bucket: config.output_bucket.clone(),
            output_key: output_key.clone(),
            destination: staging_dir.join(format!("{}.{}", output_key, config.output_extension)),
        };
        let (waiter, handle) = JobWaiter::arm(job_id.clone(), move |event| retrieval.run(event));
        state.coordinator.register(waiter).await;

        info!(job_id = %job_id, "Waiting for job to complete");
        let output_path = handle.wait(config.job_wait_timeout()).await??;

        debug!(job_id = %job_id, "Output retrieved");
        Ok(ConvertedAudio {
            job_id,
            input_key,
            output_key,
            output_path,
        })
    }
}

/// Completion action of a conversion: copies the produced object to disk.
struct OutputRetrieval {
    storage: Arc<dyn ObjectStore>,
    bucket: String,
    output_key: String,
    destination: PathBuf,
}

impl OutputRetrieval {
    async fn run(self, event: JobStatusEvent) -> Result<PathBuf, ConversionError> {
        match event.state {
            JobState::Completed => {}
            JobState::Warning => warn!(job_id = %event.job_id, "Job finished with warnings: {}", event),
            _ => {
                return Err(ConversionError::JobFailed {
                    job_id: event.job_id,
                    state: event.state,
                    error_code: event.error_code,
                    detail: event.message_details,
                });
            }
        }

        if let Some(reported) = event.output_key.as_deref().filter(|key| *key != self.output_key) {
            warn!(job_id = %event.job_id, reported, expected = %self.output_key, "Service reported a different output key");
        }

        let body = self
            .storage
            .get(&self.bucket, &self.output_key)
            .await
            .map_err(ConversionError::Retrieve)?;

        write_stream(body, &self.destination).await?;
        Ok(self.destination)
    }
}

async fn write_stream(
    body: aws_sdk_s3::primitives::ByteStream,
    destination: &Path,
) -> Result<(), ConversionError> {
    let reader = body.into_async_read();
    tokio::pin!(reader);
    let mut file = tokio::fs::File::create(destination).await?;
    tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;
    Ok(())
}

/// Fresh object key for an upload, keeping a sane extension from the client's
/// file name.
pub fn input_key_for(file_name: Option<&str>) -> String {
    let extension = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_INPUT_EXTENSION.to_string());

    format!("{}.{}", Uuid::new_v4(), extension)
}

/// Output key of the job for `input_key`: the input key without its extension.
pub fn output_key_for(input_key: &str) -> &str {
    match input_key.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !stem.ends_with('/') && !ext.contains('/') => stem,
        _ => input_key,
    }
}
