use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Declarative storage service map, deserialized once at startup.
///
/// Each entry names a backend and its kind-specific parameters; one entry is
/// the active default for new blobs. The built registry is immutable for the
/// process lifetime.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Name of the service new blobs are written to.
    pub default_service: String,
    /// Named backend definitions.
    pub services: HashMap<String, ServiceConfig>,
    /// Bounded per-request timeout for backend calls. Default: 30s.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Lifetime of signed read URLs. Default: 300s.
    #[serde(default = "default_url_expiry_secs")]
    pub url_expiry_secs: u64,
    /// Maximum accepted blob size in bytes. Default: 128 MB.
    #[serde(default = "default_max_blob_size")]
    pub max_blob_size: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}
fn default_url_expiry_secs() -> u64 {
    300
}
fn default_max_blob_size() -> u64 {
    128 * 1024 * 1024
}

/// One configured backend.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceConfig {
    Disk {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        /// Custom endpoint for S3-compatible stores (MinIO etc.).
        endpoint: Option<String>,
        access_key: String,
        secret_key: String,
        #[serde(default)]
        path_style: bool,
    },
    Mirror {
        /// Service name all reads and synchronous writes go to.
        primary: String,
        /// Best-effort replicas. Referenced by name; must not themselves be
        /// mirrors.
        #[serde(default)]
        mirrors: Vec<String>,
    },
}

/// App-level MQ configuration shared by server, worker, and cli.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Whether background jobs are enabled. When false, purge/replication
    /// run inline. Default: true.
    #[serde(default = "default_mq_enabled")]
    pub enabled: bool,
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Queue for storage jobs (server/cli publish, worker consumes).
    #[serde(default = "default_job_queue")]
    pub queue_name: String,
    /// Queue for jobs that exhausted their retries.
    #[serde(default = "default_dlq_queue")]
    pub dlq_queue_name: String,
    #[serde(default)]
    pub dlq: DlqConfig,
}

fn default_mq_enabled() -> bool {
    true
}
fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_job_queue() -> String {
    crate::jobs::JOB_QUEUE.into()
}
fn default_dlq_queue() -> String {
    crate::jobs::JOB_DLQ_QUEUE.into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            enabled: default_mq_enabled(),
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            queue_name: default_job_queue(),
            dlq_queue_name: default_dlq_queue(),
            dlq: DlqConfig::default(),
        }
    }
}

/// Retry and dead-letter tuning for the worker.
#[derive(Debug, Deserialize, Clone)]
pub struct DlqConfig {
    /// Attempts before a job is dead-lettered. Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Base backoff delay in milliseconds. Default: 1000.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds. Default: 60000.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// How often stale retry state is swept, in seconds. Default: 300.
    #[serde(default = "default_retry_cleanup_interval_secs")]
    pub retry_cleanup_interval_secs: u64,
    /// Age after which abandoned retry state is dropped. Default: 3600.
    #[serde(default = "default_retry_max_age_secs")]
    pub retry_max_age_secs: u64,
}

fn default_max_retries() -> u8 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    60_000
}
fn default_retry_cleanup_interval_secs() -> u64 {
    300
}
fn default_retry_max_age_secs() -> u64 {
    3600
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            retry_cleanup_interval_secs: default_retry_cleanup_interval_secs(),
            retry_max_age_secs: default_retry_max_age_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_config_parses_tagged_kinds() {
        let toml = r#"
            default_service = "local"

            [services.local]
            kind = "disk"
            root = "/var/lib/pantry"

            [services.s3_east]
            kind = "s3"
            bucket = "pantry-east"
            region = "us-east-1"
            access_key = "AKIA..."
            secret_key = "secret"

            [services.mirrored]
            kind = "mirror"
            primary = "s3_east"
            mirrors = ["local"]
        "#;
        let cfg: StorageConfig = toml_from_str(toml);

        assert_eq!(cfg.default_service, "local");
        assert_eq!(cfg.request_timeout_secs, 30);
        assert!(matches!(cfg.services["local"], ServiceConfig::Disk { .. }));
        assert!(matches!(cfg.services["s3_east"], ServiceConfig::S3 { .. }));
        match &cfg.services["mirrored"] {
            ServiceConfig::Mirror { primary, mirrors } => {
                assert_eq!(primary, "s3_east");
                assert_eq!(mirrors, &["local".to_string()]);
            }
            other => panic!("expected mirror, got {other:?}"),
        }
    }

    #[test]
    fn mq_defaults() {
        let cfg = MqAppConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.queue_name, crate::jobs::JOB_QUEUE);
        assert_eq!(cfg.dlq.max_retries, 3);
    }

    fn toml_from_str(s: &str) -> StorageConfig {
        config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
