//! HTTP client for the transcoding service's job API.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{CreateJobRequest, JobSubmitter};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const JOBS_PATH: &str = "2012-09-25/jobs";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateJobBody<'a> {
    pipeline_id: &'a str,
    input: JobInput<'a>,
    outputs: Vec<JobOutput<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct JobInput<'a> {
    key: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct JobOutput<'a> {
    key: &'a str,
    preset_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateJobResponse {
    job: CreatedJob,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatedJob {
    id: String,
}

#[derive(Clone)]
pub struct TranscoderClient {
    base_url: String,
    client: reqwest::Client,
}

impl TranscoderClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn jobs_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), JOBS_PATH)
    }
}

#[async_trait]
impl JobSubmitter for TranscoderClient {
    async fn create_job(&self, request: &CreateJobRequest) -> Result<String> {
        let body = CreateJobBody {
            pipeline_id: &request.pipeline_id,
            input: JobInput {
                key: &request.input_key,
            },
            outputs: vec![JobOutput {
                key: &request.output_key,
                preset_id: &request.preset_id,
            }],
        };

        let response = self
            .client
            .post(self.jobs_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("Create job request failed: {}", e))?;

        let status = response.status();
        if status.is_success() {
            let created = response
                .json::<CreateJobResponse>()
                .await
                .map_err(|e| anyhow!("Invalid create job response: {}", e))?;
            info!(job_id = %created.job.id, input_key = %request.input_key, "Transcoding job created");
            return Ok(created.job.id);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| anyhow!("Failed reading create job error body: {}", e))?;
        let message = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .or_else(|| value.get("Message"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());

        Err(anyhow!("Create job failed ({}): {}", status, message))
    }
}
