use thiserror::Error;

/// Result type for object store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors reported by an object store adapter
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Container not found: {container}")]
    ContainerNotFound { container: String },

    #[error("Object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    #[error("Block list for {key} references unknown block {block}")]
    InvalidBlockList { key: String, block: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<C: Into<String>, K: Into<String>>(container: C, key: K) -> Self {
        Self::NotFound {
            container: container.into(),
            key: key.into(),
        }
    }

    /// Create a container not found error
    pub fn container_not_found<S: Into<String>>(container: S) -> Self {
        Self::ContainerNotFound {
            container: container.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors that end an upload call. None of them are retried.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to create container {container}: {source}")]
    ContainerCreationFailed {
        container: String,
        #[source]
        source: StoreError,
    },

    #[error("Upload source must declare its length up front")]
    SourceLengthRequired,

    #[error("Failed to read source at offset {offset}: {source}")]
    ReadFailed {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage block {index} ({block}): {source}")]
    StageFailed {
        index: u64,
        block: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to commit {blocks} blocks to {key}: {source}")]
    CommitFailed {
        key: String,
        blocks: usize,
        #[source]
        source: StoreError,
    },

    #[error("Object {key} committed but setting content type {content_type} failed: {source}")]
    ContentTypeSetFailed {
        key: String,
        content_type: String,
        #[source]
        source: StoreError,
    },

    #[error("Upload needs {blocks} blocks but block tokens are limited to {limit}")]
    BlockLimitExceeded { blocks: u64, limit: u64 },

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Invalid upload configuration: {message}")]
    InvalidConfig { message: String },
}

impl UploadError {
    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// True when the object was committed and only a follow-up step failed
    pub fn is_partial_failure(&self) -> bool {
        matches!(self, Self::ContentTypeSetFailed { .. })
    }
}
