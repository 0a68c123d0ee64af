//! Configuration for the page-count service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. Callers set only the knobs they care about
//! and rely on the documented defaults for the rest.

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the page-count service.
///
/// # Example
/// ```rust
/// use pagecount::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .work_dir("/var/tmp/pagecount")
///     .office_timeout_secs(60)
///     .max_concurrent_conversions(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_concurrent_conversions, 4);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Shared working directory for transient uploads. Created if absent.
    /// Default: `uploads` (relative to the process working directory).
    pub work_dir: PathBuf,

    /// Headless office converter executable. Default: `soffice`.
    pub office_program: String,

    /// Wall-clock limit for one office conversion, in seconds. Default: 120.
    ///
    /// The converter child is killed once the limit passes and the request
    /// fails with a conversion error.
    pub office_timeout_secs: u64,

    /// Maximum number of office converter processes running at once. Default: 2.
    ///
    /// Each converter instance loads a full office suite; further requests
    /// queue for a slot instead of spawning more processes.
    pub max_concurrent_conversions: usize,

    /// Give every converter run its own user profile inside the request's
    /// scratch directory. Default: true.
    ///
    /// Two converter processes sharing one profile block on its lock file,
    /// and the second one exits without converting anything.
    pub isolate_office_profile: bool,

    /// Maximum accepted request body, in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// JPEG quality (1 to 100) used when a raster image becomes a PDF page. Default: 90.
    pub jpeg_quality: u8,

    /// What to answer when the converted document cannot be read.
    /// Default: [`UnreadablePolicy::ReportZero`].
    pub unreadable_policy: UnreadablePolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("uploads"),
            office_program: "soffice".to_string(),
            office_timeout_secs: 120,
            max_concurrent_conversions: 2,
            isolate_office_profile: true,
            max_upload_bytes: 50 * 1024 * 1024,
            jpeg_quality: 90,
            unreadable_policy: UnreadablePolicy::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn office_timeout(&self) -> Duration {
        Duration::from_secs(self.office_timeout_secs)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn office_program(mut self, program: impl Into<String>) -> Self {
        self.config.office_program = program.into();
        self
    }

    pub fn office_timeout_secs(mut self, secs: u64) -> Self {
        self.config.office_timeout_secs = secs;
        self
    }

    pub fn max_concurrent_conversions(mut self, n: usize) -> Self {
        self.config.max_concurrent_conversions = n;
        self
    }

    pub fn isolate_office_profile(mut self, v: bool) -> Self {
        self.config.isolate_office_profile = v;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn unreadable_policy(mut self, policy: UnreadablePolicy) -> Self {
        self.config.unreadable_policy = policy;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ServiceError> {
        let c = &self.config;
        if c.office_program.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "Office converter program must not be empty".into(),
            ));
        }
        if c.office_timeout_secs == 0 {
            return Err(ServiceError::InvalidConfig(
                "Office timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_concurrent_conversions == 0 {
            return Err(ServiceError::InvalidConfig(
                "Concurrent conversions must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(ServiceError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Client-facing treatment of a converted document that cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnreadablePolicy {
    /// Answer 200 with `pages: 0` and log a warning. (default)
    #[default]
    ReportZero,
    /// Answer 422 `"Failed to read PDF"`.
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ServiceConfig::default();
        assert_eq!(c.work_dir, PathBuf::from("uploads"));
        assert_eq!(c.office_program, "soffice");
        assert_eq!(c.office_timeout(), Duration::from_secs(120));
        assert_eq!(c.unreadable_policy, UnreadablePolicy::ReportZero);
        assert!(c.isolate_office_profile);
    }

    #[test]
    fn builder_rejects_zero_concurrency() {
        let err = ServiceConfig::builder()
            .max_concurrent_conversions(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Concurrent"), "got: {err}");
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(ServiceConfig::builder()
            .office_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn builder_rejects_blank_program() {
        assert!(ServiceConfig::builder().office_program("  ").build().is_err());
    }

    #[test]
    fn jpeg_quality_is_clamped() {
        let c = ServiceConfig::builder().jpeg_quality(0).build().unwrap();
        assert_eq!(c.jpeg_quality, 1);
        let c = ServiceConfig::builder().jpeg_quality(200).build().unwrap();
        assert_eq!(c.jpeg_quality, 100);
    }
}
