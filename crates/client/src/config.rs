use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use swapdeck_core::dimensions::Dimensions;
use swapdeck_core::generation::DEFAULT_VARIATION_COUNT;

use crate::api::DEFAULT_TIMEOUT;

/// Headless client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub face_reference: PathBuf,
    pub targets_dir: PathBuf,
    pub output_dir: PathBuf,
    pub variations: u32,
    pub dimensions: Dimensions,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                 | Required | Default                  |
    /// |-------------------------|----------|--------------------------|
    /// | `SWAPDECK_URL`          | no       | `http://localhost:10000` |
    /// | `SWAPDECK_USERNAME`     | yes      | --                       |
    /// | `SWAPDECK_PASSWORD`     | yes      | --                       |
    /// | `FACE_REFERENCE`        | yes      | --                       |
    /// | `TARGETS_DIR`           | yes      | --                       |
    /// | `OUTPUT_DIR`            | no       | `swapdeck-output`        |
    /// | `VARIATIONS`            | no       | `3`                      |
    /// | `DIMENSIONS`            | no       | `2572*3576`              |
    /// | `CLIENT_TIMEOUT_SECS`   | no       | `300`                    |
    pub fn from_env() -> Result<Self> {
        let server_url =
            std::env::var("SWAPDECK_URL").unwrap_or_else(|_| "http://localhost:10000".into());

        let variations: u32 = match std::env::var("VARIATIONS") {
            Ok(raw) => raw.parse().context("VARIATIONS must be a positive integer")?,
            Err(_) => DEFAULT_VARIATION_COUNT,
        };

        let dimensions = Dimensions::parse_or_default(std::env::var("DIMENSIONS").ok().as_deref())
            .context("DIMENSIONS must look like 2572*3576")?;

        let timeout = match std::env::var("CLIENT_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .context("CLIENT_TIMEOUT_SECS must be a valid u64")?,
            ),
            Err(_) => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            server_url,
            username: required("SWAPDECK_USERNAME")?,
            password: required("SWAPDECK_PASSWORD")?,
            face_reference: required("FACE_REFERENCE")?.into(),
            targets_dir: required("TARGETS_DIR")?.into(),
            output_dir: std::env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "swapdeck-output".into())
                .into(),
            variations,
            dimensions,
            timeout,
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} environment variable is required"))
}
