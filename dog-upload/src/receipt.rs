use crate::{UploadError, UploadResult};

/// Returned after an object has been committed
#[derive(Debug)]
pub struct UploadReceipt {
    pub container: String,
    pub key: String,
    pub size_bytes: u64,
    pub blocks: usize,
    pub block_size: usize,
    /// Type the engine tried to set; see `content_type_error`
    pub content_type: String,
    pub committed_at: i64,
    /// Set when the commit succeeded but the content type could not be applied
    pub content_type_error: Option<UploadError>,
}

impl UploadReceipt {
    pub fn new<C: Into<String>, K: Into<String>>(
        container: C,
        key: K,
        size_bytes: u64,
        blocks: usize,
        block_size: usize,
        content_type: String,
    ) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
            size_bytes,
            blocks,
            block_size,
            content_type,
            committed_at: chrono::Utc::now().timestamp(),
            content_type_error: None,
        }
    }

    pub fn with_content_type_error(mut self, error: UploadError) -> Self {
        self.content_type_error = Some(error);
        self
    }

    /// True when content and declared type are both in place
    pub fn is_complete(&self) -> bool {
        self.content_type_error.is_none()
    }

    /// Treat a partial failure as an error
    pub fn into_strict(mut self) -> UploadResult<Self> {
        match self.content_type_error.take() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}
