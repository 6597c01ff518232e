use serde::Deserialize;
use std::env;

use crate::{UploadError, UploadResult};

/// 1 MiB blocks
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Largest block a store is expected to accept in one staging call
pub const MAX_BLOCK_SIZE: u64 = 4000 * 1024 * 1024;

/// Six digits allows up to 10^6 blocks per upload (about 1 TiB at 1 MiB blocks)
pub const DEFAULT_BLOCK_ID_WIDTH: usize = 6;

/// u64 block indexes never need more than 19 digits
pub const MAX_BLOCK_ID_WIDTH: usize = 19;

pub const DEFAULT_PROGRESS_SUFFIX: &str = ".progress";

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Configuration for chunked uploads
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Bytes read and staged per block. Also the memory ceiling of one upload.
    pub block_size: usize,

    /// Digits in the zero-padded counter behind each block token
    pub block_id_width: usize,

    /// Appended to the object name to form the progress side-channel key
    pub progress_suffix: String,

    /// Used when neither the caller nor the extension table names a type
    pub default_content_type: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_id_width: DEFAULT_BLOCK_ID_WIDTH,
            progress_suffix: DEFAULT_PROGRESS_SUFFIX.to_string(),
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl UploadConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `DOG_UPLOAD_*` environment variables.
    /// Unset variables keep their defaults.
    pub fn from_env() -> UploadResult<Self> {
        fn parse_env(key: &str) -> UploadResult<Option<usize>> {
            match env::var(key) {
                Ok(value) => value
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| UploadError::invalid_config(format!("{} must be an integer, got {:?}", key, value))),
                Err(_) => Ok(None),
            }
        }

        let mut config = Self::default();
        if let Some(size) = parse_env("DOG_UPLOAD_BLOCK_SIZE")? {
            config.block_size = size;
        }
        if let Some(width) = parse_env("DOG_UPLOAD_BLOCK_ID_WIDTH")? {
            config.block_id_width = width;
        }
        if let Ok(suffix) = env::var("DOG_UPLOAD_PROGRESS_SUFFIX") {
            config.progress_suffix = suffix;
        }
        config.validate()?;
        Ok(config)
    }

    /// Set block size
    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    /// Set block token width
    pub fn with_block_id_width(mut self, digits: usize) -> Self {
        self.block_id_width = digits;
        self
    }

    /// Set progress side-channel suffix
    pub fn with_progress_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.progress_suffix = suffix.into();
        self
    }

    /// Set fallback content type
    pub fn with_default_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    /// Highest number of blocks one upload may stage
    pub fn max_blocks(&self) -> u64 {
        crate::BlockIdGenerator::new(self.block_id_width).capacity()
    }

    pub fn validate(&self) -> UploadResult<()> {
        if self.block_size == 0 || self.block_size as u64 > MAX_BLOCK_SIZE {
            return Err(UploadError::invalid_config(format!(
                "block_size {} must be between 1 and {}",
                self.block_size, MAX_BLOCK_SIZE
            )));
        }
        if self.block_id_width == 0 || self.block_id_width > MAX_BLOCK_ID_WIDTH {
            return Err(UploadError::invalid_config(format!(
                "block_id_width {} must be between 1 and {}",
                self.block_id_width, MAX_BLOCK_ID_WIDTH
            )));
        }
        if self.progress_suffix.is_empty() {
            return Err(UploadError::invalid_config("progress_suffix must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = UploadConfig::default();
        assert_eq!(config.block_size, 1024 * 1024);
        assert_eq!(config.max_blocks(), 1_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_oversized_block() {
        let config = UploadConfig::new().with_block_size(usize::MAX);
        assert!(matches!(config.validate(), Err(UploadError::InvalidConfig { .. })));
    }

    #[test]
    fn test_rejects_zero_block_size() {
        let config = UploadConfig::new().with_block_size(0);
        assert!(matches!(config.validate(), Err(UploadError::InvalidConfig { .. })));
    }

    #[test]
    fn test_rejects_out_of_range_width() {
        assert!(UploadConfig::new().with_block_id_width(0).validate().is_err());
        assert!(UploadConfig::new().with_block_id_width(20).validate().is_err());
        assert!(UploadConfig::new().with_block_id_width(19).validate().is_ok());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: UploadConfig = serde_json::from_str(r#"{"block_size": 4096}"#).unwrap();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.progress_suffix, ".progress");
        assert_eq!(config.default_content_type, "application/octet-stream");
    }
}
