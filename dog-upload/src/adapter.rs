use bytes::Bytes;
use std::sync::Arc;

use crate::progress::parse_percent;
use crate::{
    ByteStream, ChunkedUploader, ContentTypeResolver, ObjectStore, StoreError, StoreResult, UploadConfig,
    UploadReceipt, UploadRequest, UploadResult, UploadSource,
};

/// Storage facade that services embed: chunked uploads plus the plain
/// read, delete, metadata, and listing calls around them.
pub struct StorageAdapter {
    store: Arc<dyn ObjectStore>,
    uploader: ChunkedUploader,
}

impl StorageAdapter {
    /// Create a new storage adapter
    pub fn new<S: ObjectStore + 'static>(store: S, config: UploadConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    pub fn with_shared_store(store: Arc<dyn ObjectStore>, config: UploadConfig) -> Self {
        Self {
            uploader: ChunkedUploader::with_shared_store(store.clone(), config),
            store,
        }
    }

    /// Replace the extension table used to infer content types
    pub fn with_content_types<R: ContentTypeResolver + 'static>(mut self, resolver: R) -> Self {
        self.uploader = self.uploader.with_content_types(resolver);
        self
    }

    /// Upload a source in blocks
    pub async fn upload(&self, request: UploadRequest, source: UploadSource) -> UploadResult<UploadReceipt> {
        self.uploader.upload(request, source).await
    }

    /// Upload an in-memory buffer in blocks
    pub async fn upload_bytes<B: Into<Bytes>>(
        &self,
        container: &str,
        name: &str,
        data: B,
        content_type: Option<&str>,
    ) -> UploadResult<UploadReceipt> {
        let mut request = UploadRequest::new(container, name);
        if let Some(content_type) = content_type {
            request = request.with_content_type(content_type);
        }
        self.uploader.upload(request, UploadSource::from_bytes(data)).await
    }

    pub async fn get_bytes(&self, container: &str, name: &str) -> StoreResult<Bytes> {
        self.store.get_object(container, name).await
    }

    /// Read an object as UTF-8 text
    pub async fn get_string(&self, container: &str, name: &str) -> StoreResult<String> {
        let data = self.store.get_object(container, name).await?;
        String::from_utf8(data.to_vec())
            .map_err(|_| StoreError::invalid(format!("{}/{} is not valid UTF-8", container, name)))
    }

    pub async fn get_stream(&self, container: &str, name: &str) -> StoreResult<ByteStream> {
        self.store.get_stream(container, name).await
    }

    /// Delete an object; missing objects are not an error
    pub async fn delete(&self, container: &str, name: &str) -> StoreResult<()> {
        self.store.delete_object(container, name).await
    }

    pub async fn set_metadata(&self, container: &str, name: &str, key: &str, value: &str) -> StoreResult<()> {
        self.store.set_metadata(container, name, key, value).await
    }

    pub async fn get_metadata(&self, container: &str, name: &str, key: &str) -> StoreResult<Option<String>> {
        let head = self.store.head(container, name).await?;
        Ok(head.metadata.get(key).cloned())
    }

    pub async fn list_directories(&self, container: &str, prefix: &str) -> StoreResult<Vec<String>> {
        self.store.list_directories(container, prefix).await
    }

    /// Last percentage published for an upload in progress, `None` when no
    /// upload is reporting for `name`
    pub async fn read_progress(&self, container: &str, name: &str) -> StoreResult<Option<f64>> {
        let key = format!("{}{}", name, self.uploader.config().progress_suffix);
        match self.store.get_object(container, &key).await {
            Ok(raw) => Ok(parse_percent(&raw)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(StoreError::ContainerNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        self.uploader.config()
    }

    pub fn uploader(&self) -> &ChunkedUploader {
        &self.uploader
    }
}
