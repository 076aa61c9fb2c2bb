//! Configuration loaded from the environment.

use crate::adapters::aws::S3Settings;
use crate::adapters::ffmpeg::EncoderSettings;
use crate::adapters::local::redis::ConsumerSettings;
use crate::application::dispatcher::DispatcherSettings;
use crate::domain::layout::StoreLayout;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name}: cannot parse {value:?}: {reason}")]
    Parse {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("FFMPEG_CRF must be between 0 and 51, got {0}")]
    CrfOutOfRange(u8),
    #[error("STORAGE_BACKEND must be \"s3\" or \"fs\", got {0:?}")]
    UnknownBackend(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Fs,
}

#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub redis_url: String,
    pub upload_topic: String,
    pub group_id: String,
    pub consumer_name: String,
    pub complete_topic: String,
    pub complete_group: String,
    pub redelivery_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3: S3Settings,
    pub source_bucket: String,
    pub processed_bucket: String,
    /// Root directory of the `fs` backend.
    pub root: PathBuf,
    pub layout: StoreLayout,
}

#[derive(Clone, Debug)]
pub struct JobConfig {
    pub max_concurrent_jobs: usize,
    pub job_timeout: Duration,
    pub work_root: PathBuf,
}

/// Configuration for the transcoder service.
#[derive(Clone, Debug)]
pub struct TranscoderConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    pub broker: BrokerConfig,
    pub storage: StorageConfig,
    pub encoder: EncoderSettings,
    pub jobs: JobConfig,
    pub health_timeout: Duration,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            addr: String::from("0.0.0.0"),
            port: String::from("8083"),
            broker: BrokerConfig {
                redis_url: String::from("redis://127.0.0.1/"),
                upload_topic: String::from("video-uploads"),
                group_id: String::from("transcoder-service"),
                consumer_name: String::from("transcoder-1"),
                complete_topic: String::from("transcoding-complete"),
                complete_group: String::from("metadata-service"),
                redelivery_interval: Duration::from_secs(30),
            },
            storage: StorageConfig {
                backend: StorageBackend::S3,
                s3: S3Settings {
                    endpoint: String::from("http://localhost:9000"),
                    region: String::from("us-east-1"),
                    access_key_id: String::from("minioadmin"),
                    secret_access_key: String::from("minioadmin"),
                },
                source_bucket: String::from("rawvideos"),
                processed_bucket: String::from("processedvideos"),
                root: PathBuf::from("./storage"),
                layout: StoreLayout::default(),
            },
            encoder: EncoderSettings::default(),
            jobs: JobConfig {
                max_concurrent_jobs: 2,
                job_timeout: Duration::from_secs(30 * 60),
                work_root: PathBuf::from("/tmp/transcoder"),
            },
            health_timeout: Duration::from_secs(2),
        }
    }
}

/// Source of raw option values, keyed by environment variable name.
trait Lookup {
    fn get(&self, name: &str) -> Option<String>;
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        self(name)
    }
}

fn string(src: &impl Lookup, name: &str, default: &str) -> String {
    src.get(name).unwrap_or_else(|| default.to_string())
}

fn parsed<T>(src: &impl Lookup, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match src.get(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Parse {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

fn duration(src: &impl Lookup, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match src.get(name) {
        None => Ok(default),
        Some(value) => humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Parse {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

impl TranscoderConfig {
    /// Load configuration from environment variables, after `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(&|name: &str| env::var(name).ok())
    }

    fn from_lookup(src: &impl Lookup) -> Result<Self, ConfigError> {
        let d = Self::default();

        let backend = match string(src, "STORAGE_BACKEND", "s3").to_ascii_lowercase().as_str() {
            "s3" => StorageBackend::S3,
            "fs" => StorageBackend::Fs,
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let config = Self {
            addr: string(src, "ADDR", &d.addr),
            port: string(src, "PORT", &d.port),
            broker: BrokerConfig {
                redis_url: string(src, "REDIS_URL", &d.broker.redis_url),
                upload_topic: string(src, "BROKER_UPLOAD_TOPIC", &d.broker.upload_topic),
                group_id: string(src, "BROKER_GROUP_ID", &d.broker.group_id),
                consumer_name: string(src, "BROKER_CONSUMER_NAME", &d.broker.consumer_name),
                complete_topic: string(src, "BROKER_COMPLETE_TOPIC", &d.broker.complete_topic),
                complete_group: string(src, "BROKER_COMPLETE_GROUP", &d.broker.complete_group),
                redelivery_interval: duration(
                    src,
                    "BROKER_REDELIVERY_INTERVAL",
                    d.broker.redelivery_interval,
                )?,
            },
            storage: StorageConfig {
                backend,
                s3: S3Settings {
                    endpoint: string(src, "S3_ENDPOINT", &d.storage.s3.endpoint),
                    region: string(src, "S3_REGION", &d.storage.s3.region),
                    access_key_id: string(src, "AWS_ACCESS_KEY_ID", &d.storage.s3.access_key_id),
                    secret_access_key: string(
                        src,
                        "AWS_SECRET_ACCESS_KEY",
                        &d.storage.s3.secret_access_key,
                    ),
                },
                source_bucket: string(src, "S3_BUCKET", &d.storage.source_bucket),
                processed_bucket: string(src, "S3_PROCESSED_BUCKET", &d.storage.processed_bucket),
                root: PathBuf::from(string(src, "STORAGE_ROOT", "./storage")),
                layout: StoreLayout {
                    original_prefix: string(src, "ORIGINAL_PREFIX", &d.storage.layout.original_prefix),
                    hls_prefix: string(src, "HLS_PREFIX", &d.storage.layout.hls_prefix),
                    mp4_prefix: string(src, "MP4_PREFIX", &d.storage.layout.mp4_prefix),
                    thumbnail_prefix: string(
                        src,
                        "THUMBNAIL_PREFIX",
                        &d.storage.layout.thumbnail_prefix,
                    ),
                },
            },
            encoder: EncoderSettings {
                ffmpeg_path: PathBuf::from(string(src, "FFMPEG_PATH", "ffmpeg")),
                ffprobe_path: PathBuf::from(string(src, "FFPROBE_PATH", "ffprobe")),
                threads: parsed(src, "FFMPEG_THREADS", d.encoder.threads)?,
                preset: string(src, "FFMPEG_PRESET", &d.encoder.preset),
                crf: parsed(src, "FFMPEG_CRF", d.encoder.crf)?,
                segment_length: parsed(src, "FFMPEG_SEGMENT_LENGTH", d.encoder.segment_length)?,
                log_dir: src
                    .get("FFMPEG_LOG_DIR")
                    .filter(|dir| !dir.trim().is_empty())
                    .map(PathBuf::from),
            },
            jobs: JobConfig {
                max_concurrent_jobs: parsed(src, "MAX_CONCURRENT_JOBS", d.jobs.max_concurrent_jobs)?,
                job_timeout: duration(src, "JOB_TIMEOUT", d.jobs.job_timeout)?,
                work_root: PathBuf::from(string(src, "TEMP_DIR", "/tmp/transcoder")),
            },
            health_timeout: duration(src, "HEALTH_TIMEOUT", d.health_timeout)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &str); 12] = [
            ("REDIS_URL", self.broker.redis_url.as_str()),
            ("BROKER_UPLOAD_TOPIC", self.broker.upload_topic.as_str()),
            ("BROKER_GROUP_ID", self.broker.group_id.as_str()),
            ("BROKER_CONSUMER_NAME", self.broker.consumer_name.as_str()),
            ("BROKER_COMPLETE_TOPIC", self.broker.complete_topic.as_str()),
            ("BROKER_COMPLETE_GROUP", self.broker.complete_group.as_str()),
            ("S3_BUCKET", self.storage.source_bucket.as_str()),
            ("S3_PROCESSED_BUCKET", self.storage.processed_bucket.as_str()),
            ("FFMPEG_PATH", self.encoder.ffmpeg_path.to_str().unwrap_or_default()),
            ("FFPROBE_PATH", self.encoder.ffprobe_path.to_str().unwrap_or_default()),
            ("FFMPEG_PRESET", self.encoder.preset.as_str()),
            ("TEMP_DIR", self.jobs.work_root.to_str().unwrap_or_default()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
        }

        if self.storage.backend == StorageBackend::S3 {
            let s3 = [
                ("S3_ENDPOINT", &self.storage.s3.endpoint),
                ("S3_REGION", &self.storage.s3.region),
                ("AWS_ACCESS_KEY_ID", &self.storage.s3.access_key_id),
                ("AWS_SECRET_ACCESS_KEY", &self.storage.s3.secret_access_key),
            ];
            for (name, value) in s3 {
                if value.trim().is_empty() {
                    return Err(ConfigError::Empty(name));
                }
            }
        }

        if self.encoder.threads == 0 {
            return Err(ConfigError::Zero("FFMPEG_THREADS"));
        }
        if self.encoder.crf > 51 {
            return Err(ConfigError::CrfOutOfRange(self.encoder.crf));
        }
        if self.encoder.segment_length == 0 {
            return Err(ConfigError::Zero("FFMPEG_SEGMENT_LENGTH"));
        }
        if self.jobs.max_concurrent_jobs == 0 {
            return Err(ConfigError::Zero("MAX_CONCURRENT_JOBS"));
        }
        if self.jobs.job_timeout.is_zero() {
            return Err(ConfigError::Zero("JOB_TIMEOUT"));
        }
        if self.health_timeout.is_zero() {
            return Err(ConfigError::Zero("HEALTH_TIMEOUT"));
        }
        Ok(())
    }
}

impl BrokerConfig {
    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            topic: self.upload_topic.clone(),
            group: self.group_id.clone(),
            consumer: self.consumer_name.clone(),
            redelivery_interval: self.redelivery_interval,
        }
    }
}

impl JobConfig {
    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            max_concurrent_jobs: self.max_concurrent_jobs,
            job_timeout: self.job_timeout,
        }
    }
}
