use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub rabbitmq_url: String,
    pub notification_queue: String,
    pub s3_endpoint: String,
    pub aws_region: String,
    pub aws_access_key: String,
    pub aws_secret_key: String,
    pub input_bucket: String,
    pub output_bucket: String,
    pub transcoder_url: String,
    pub pipeline_id: String,
    pub preset_id: String,
    pub output_extension: String,
    pub local_storage_dir: PathBuf,
    pub poll_batch_size: usize,
    pub poll_idle_ms: u64,
    pub poll_error_backoff_ms: u64,
    /// Unset means a request waits for its job indefinitely.
    pub job_wait_timeout_secs: Option<u64>,
    pub max_upload_bytes: usize,
    /// How long shutdown waits for in-flight conversions before dropping them.
    pub shutdown_drain_secs: u64,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        let default_storage = std::env::temp_dir().join("audio-converter");

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            rabbitmq_url: env::get(EnvKey::RabbitMqUrl)?,
            notification_queue: env::get_or(EnvKey::NotificationQueue, "transcoder_notifications"),
            s3_endpoint: env::get(EnvKey::S3Endpoint)?,
            aws_region: env::get_or(EnvKey::AwsRegion, "us-east-1"),
            aws_access_key: env::get(EnvKey::AwsAccessKey)?,
            aws_secret_key: env::get(EnvKey::AwsSecretKey)?,
            input_bucket: env::get_or(EnvKey::InputBucket, "insnds"),
            output_bucket: env::get_or(EnvKey::OutputBucket, "outsnds"),
            transcoder_url: env::get(EnvKey::TranscoderUrl)?,
            pipeline_id: env::get(EnvKey::PipelineId)?,
            preset_id: env::get(EnvKey::PresetId)?,
            output_extension: env::get_or(EnvKey::OutputExtension, "mp3"),
            local_storage_dir: env::get(EnvKey::LocalStorageDir)
                .map(PathBuf::from)
                .unwrap_or(default_storage),
            poll_batch_size: env::get_parsed(EnvKey::PollBatchSize, 10),
            poll_idle_ms: env::get_parsed(EnvKey::PollIdleMs, 1000),
            poll_error_backoff_ms: env::get_parsed(EnvKey::PollErrorBackoffMs, 5000),
            job_wait_timeout_secs: env::get_optional(EnvKey::JobWaitTimeoutSecs),
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, 50 * 1024 * 1024),
            shutdown_drain_secs: env::get_parsed(EnvKey::ShutdownDrainSecs, 30),
        })
    }

    pub fn job_wait_timeout(&self) -> Option<Duration> {
        self.job_wait_timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_idle_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_idle_ms)
    }

    pub fn poll_error_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_error_backoff_ms)
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain_secs)
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests(local_storage_dir: &std::path::Path) -> Self {
        Self {
            server_port: 0,
            rabbitmq_url: "amqp://localhost:5672".to_string(),
            notification_queue: "transcoder_notifications".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_region: "us-east-1".to_string(),
            aws_access_key: "test".to_string(),
            aws_secret_key: "test".to_string(),
            input_bucket: "insnds".to_string(),
            output_bucket: "outsnds".to_string(),
            transcoder_url: "http://localhost:8080".to_string(),
            pipeline_id: "pipeline-1".to_string(),
            preset_id: "preset-mp3".to_string(),
            output_extension: "mp3".to_string(),
            local_storage_dir: local_storage_dir.to_path_buf(),
            poll_batch_size: 10,
            poll_idle_ms: 5,
            poll_error_backoff_ms: 5,
            job_wait_timeout_secs: Some(5),
            max_upload_bytes: 1024 * 1024,
            shutdown_drain_secs: 1,
        }
    }
}
