//! Service configuration.
//!
//! Layers, lowest precedence first: built-in defaults, an optional config
//! file (TOML, YAML or JSON by extension), then `MNIST_SERVING_*`
//! environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::ServeError;
use crate::orchestrator::{BatchPolicy, DEFAULT_MAX_BATCH_SIZE};

pub const ENV_PREFIX: &str = "MNIST_SERVING";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServingConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    /// Request body limit; applies to the whole multipart payload.
    pub max_upload_bytes: usize,
    pub max_batch_size: usize,
    pub batch_parallelism: usize,
    pub log_format: LogFormat,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            model_path: PathBuf::from("models/mnist-dense.json"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            batch_parallelism: default_parallelism(),
            log_format: LogFormat::Text,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get())
}

impl ServingConfig {
    /// Load from defaults, `file` and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ServeError> {
        Self::from_sources(file, None)
    }

    /// `env` replaces the process environment when given.
    pub fn from_sources(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ServeError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("model_path", defaults.model_path.to_string_lossy().into_owned())?
            .set_default("max_upload_bytes", defaults.max_upload_bytes as i64)?
            .set_default("max_batch_size", defaults.max_batch_size as i64)?
            .set_default("batch_parallelism", defaults.batch_parallelism as i64)?
            .set_default("log_format", "text")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServeError> {
        let checks = [
            (self.port == 0, "port must be non-zero"),
            (self.max_upload_bytes == 0, "max_upload_bytes must be non-zero"),
            (self.max_batch_size == 0, "max_batch_size must be non-zero"),
            (
                self.max_batch_size > DEFAULT_MAX_BATCH_SIZE,
                "max_batch_size must not exceed 50",
            ),
            (self.batch_parallelism == 0, "batch_parallelism must be non-zero"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, reason)) => Err(ServeError::InvalidConfig((*reason).to_string())),
            None => Ok(()),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            max_batch_size: self.max_batch_size,
            max_parallelism: self.batch_parallelism,
        }
    }
}
