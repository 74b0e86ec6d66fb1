//! Configuration Module
//!
//! This module reads configuration values from environment variables once per
//! process and hands an immutable `Config` to each entry point. Missing or
//! unparseable numeric values fall back to defaults; the destination bucket has
//! no default.

use crate::error::{DmarcError, Result};
use crate::storage::WaitPolicy;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Destination bucket. The Extractor falls back to the source bucket when
    /// this is unset; the Transformer refuses to run.
    pub output_bucket: Option<String>,
    pub max_file_size: usize,
    pub max_decompressed_size: usize,
    pub max_files_in_zip: usize,
    pub wait: WaitPolicy,
    pub invocation_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output_bucket: None,
            max_file_size: 10 * 1024 * 1024,
            max_decompressed_size: 100 * 1024 * 1024,
            max_files_in_zip: 1000,
            wait: WaitPolicy::default(),
            invocation_timeout: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Creates a new configuration by reading environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let number = |name: &str| lookup(name).and_then(|s| s.trim().parse::<u64>().ok());

        // Trim the bucket name before checking for emptiness.
        let output_bucket = lookup("OUTPUT_BUCKET_NAME")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let max_file_size = number("DMARC_MAX_FILE_SIZE")
            .map(|n| n as usize)
            .unwrap_or(defaults.max_file_size);

        let max_decompressed_size = number("DMARC_MAX_DECOMPRESSED_SIZE")
            .map(|n| n as usize)
            .unwrap_or(defaults.max_decompressed_size);

        let max_files_in_zip = number("DMARC_MAX_FILES_IN_ZIP")
            .map(|n| n as usize)
            .unwrap_or(defaults.max_files_in_zip);

        let wait = WaitPolicy {
            timeout: number("DMARC_WAIT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.wait.timeout),
            initial_delay: number("DMARC_WAIT_INITIAL_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.wait.initial_delay),
            max_delay: number("DMARC_WAIT_MAX_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.wait.max_delay),
        };

        let invocation_timeout = number("DMARC_INVOCATION_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.invocation_timeout);

        Config {
            output_bucket,
            max_file_size,
            max_decompressed_size,
            max_files_in_zip,
            wait,
            invocation_timeout,
        }
    }

    /// Returns the destination bucket, failing when it was never configured.
    pub fn require_output_bucket(&self) -> Result<&str> {
        self.output_bucket
            .as_deref()
            .ok_or_else(|| DmarcError::Config("OUTPUT_BUCKET_NAME is not set".into()))
    }
}
