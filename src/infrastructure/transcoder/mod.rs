use anyhow::Result;
use async_trait::async_trait;

pub mod client;

/// Parameters of one transcoding job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateJobRequest {
    pub pipeline_id: String,
    pub input_key: String,
    pub output_key: String,
    pub preset_id: String,
}

/// Submits jobs to the remote media-conversion service.
#[async_trait]
pub trait JobSubmitter: Send + Sync + 'static {
    /// Returns the job id minted by the service.
    async fn create_job(&self, request: &CreateJobRequest) -> Result<String>;
}
