use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    RabbitMqUrl,
    NotificationQueue,
    S3Endpoint,
    AwsRegion,
    AwsAccessKey,
    AwsSecretKey,
    InputBucket,
    OutputBucket,
    TranscoderUrl,
    PipelineId,
    PresetId,
    OutputExtension,
    LocalStorageDir,
    PollBatchSize,
    PollIdleMs,
    PollErrorBackoffMs,
    JobWaitTimeoutSecs,
    MaxUploadBytes,
    ShutdownDrainSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::RabbitMqUrl => "RABBITMQ_URL",
            EnvKey::NotificationQueue => "NOTIFICATION_QUEUE",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::AwsRegion => "AWS_REGION",
            EnvKey::AwsAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::AwsSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::InputBucket => "INPUT_BUCKET",
            EnvKey::OutputBucket => "OUTPUT_BUCKET",
            EnvKey::TranscoderUrl => "TRANSCODER_URL",
            EnvKey::PipelineId => "PIPELINE_ID",
            EnvKey::PresetId => "PRESET_ID",
            EnvKey::OutputExtension => "OUTPUT_EXTENSION",
            EnvKey::LocalStorageDir => "LOCAL_STORAGE_DIR",
            EnvKey::PollBatchSize => "POLL_BATCH_SIZE",
            EnvKey::PollIdleMs => "POLL_IDLE_MS",
            EnvKey::PollErrorBackoffMs => "POLL_ERROR_BACKOFF_MS",
            EnvKey::JobWaitTimeoutSecs => "JOB_WAIT_TIMEOUT_SECS",
            EnvKey::MaxUploadBytes => "MAX_UPLOAD_BYTES",
            EnvKey::ShutdownDrainSecs => "SHUTDOWN_DRAIN_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Like [`get_parsed`] but without a fallback: unset or unparsable yields `None`.
pub fn get_optional<T: FromStr>(key: EnvKey) -> Option<T> {
    get(key).ok().and_then(|val| val.parse::<T>().ok())
}
