use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::commit;
use crate::progress::ProgressReporter;
use crate::types::SourceReader;
use crate::{
    BlockIdGenerator, BlockPlanner, ContentTypeResolver, ContentTypeTable, ObjectStore, TransferProgress,
    UploadConfig, UploadError, UploadReceipt, UploadRequest, UploadResult, UploadSession, UploadSource,
};

/// Streams sources into an [`ObjectStore`] one block at a time.
///
/// Each block is read, staged, and released before the next one is read, so an
/// upload never holds more than `block_size` bytes of content. Nothing becomes
/// visible at the destination key until the final commit. On any failure or
/// cancellation the commit is skipped and already staged blocks are left for
/// the store to expire.
pub struct ChunkedUploader {
    store: Arc<dyn ObjectStore>,
    content_types: Arc<dyn ContentTypeResolver>,
    block_ids: BlockIdGenerator,
    config: UploadConfig,
}

impl ChunkedUploader {
    pub fn new<S: ObjectStore + 'static>(store: S, config: UploadConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Use a store that is also held elsewhere
    pub fn with_shared_store(store: Arc<dyn ObjectStore>, config: UploadConfig) -> Self {
        Self {
            store,
            content_types: Arc::new(ContentTypeTable::default()),
            block_ids: BlockIdGenerator::new(config.block_id_width),
            config,
        }
    }

    /// Replace the extension table used when no content type is given
    pub fn with_content_types<R: ContentTypeResolver + 'static>(mut self, resolver: R) -> Self {
        self.content_types = Arc::new(resolver);
        self
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Upload `source` to `request.container`/`request.name`
    #[instrument(skip(self, request, source), fields(container = %request.container, name = %request.name))]
    pub async fn upload(&self, request: UploadRequest, source: UploadSource) -> UploadResult<UploadReceipt> {
        self.config.validate()?;
        let store = self.store.as_ref();

        store
            .ensure_container(&request.container)
            .await
            .map_err(|source| UploadError::ContainerCreationFailed {
                container: request.container.clone(),
                source,
            })?;

        let (mut reader, len) = source.into_parts();
        let total_size = len.ok_or(UploadError::SourceLengthRequired)?;

        let planner = BlockPlanner::new(self.config.block_size);
        let needed = planner.block_count(total_size);
        let limit = self.config.max_blocks();
        if needed > limit {
            return Err(UploadError::BlockLimitExceeded { blocks: needed, limit });
        }

        let cancel = request.cancellation.clone().unwrap_or_default();
        let mut session = UploadSession::new(
            request.container.as_str(),
            request.name.as_str(),
            total_size,
            self.config.block_size,
            &self.config.progress_suffix,
        );
        let progress_key = session.progress_key().to_string();
        let mut reporter = request
            .report_progress
            .then(|| ProgressReporter::new(store, &request.container, &progress_key));

        info!("Uploading {} bytes as {} blocks of up to {} bytes", total_size, needed, self.config.block_size);

        let staged = self
            .transfer(
                &mut session,
                &mut reader,
                &planner,
                reporter.as_mut(),
                request.observer.as_ref(),
                &cancel,
            )
            .await;

        let result = match staged {
            Ok(()) if cancel.is_cancelled() => Err(UploadError::Cancelled),
            Ok(()) => {
                commit::finalize(
                    store,
                    session,
                    request.content_type.as_deref(),
                    self.content_types.as_ref(),
                    &self.config.default_content_type,
                )
                .await
            }
            Err(e) => Err(e),
        };

        if let Some(reporter) = reporter {
            reporter.clear().await;
        }

        if let Err(e) = &result {
            warn!("Upload to {}/{} failed: {}", request.container, request.name, e);
        }
        result
    }

    /// Read and stage blocks until the source is drained.
    ///
    /// Runs at least once, so an empty source makes a single zero-length read
    /// and stages nothing.
    async fn transfer(
        &self,
        session: &mut UploadSession,
        reader: &mut SourceReader,
        planner: &BlockPlanner,
        mut reporter: Option<&mut ProgressReporter<'_>>,
        observer: Option<&watch::Sender<TransferProgress>>,
        cancel: &CancellationToken,
    ) -> UploadResult<()> {
        let capacity = session.total_size().min(planner.block_size() as u64) as usize;
        let block_ids = self.block_ids.for_session(session.tag());
        let mut buffer = BytesMut::with_capacity(capacity);

        loop {
            // published before the read, so observers may see a block as done early
            if let Some(reporter) = reporter.as_mut() {
                reporter.publish(session.percent_complete()).await;
            }

            let want = planner.next_read(session.bytes_remaining());
            let offset = session.bytes_transferred();
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                res = fill_block(reader, &mut buffer, want) => {
                    res.map_err(|source| UploadError::ReadFailed { offset, source })?
                }
            };
            if read < want {
                return Err(UploadError::ReadFailed {
                    offset: offset + read as u64,
                    source: std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!(
                            "source ended after {} of {} declared bytes",
                            offset + read as u64,
                            session.total_size()
                        ),
                    ),
                });
            }
            session.consume(read);

            if read > 0 {
                let block = block_ids.generate(session.next_block_index())?;
                let data = buffer.split().freeze();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                    res = self.store.stage_block(session.container(), session.object_name(), &block, data) => {
                        res.map_err(|source| UploadError::StageFailed {
                            index: block.index(),
                            block: block.as_str().to_string(),
                            source,
                        })?
                    }
                }
                debug!("Staged block {} ({} bytes)", block.index(), read);
                session.record_block(block);

                if let Some(observer) = observer {
                    observer.send_replace(session.snapshot());
                }
            }

            if session.is_drained() {
                break;
            }
        }
        Ok(())
    }
}

/// Read up to `want` bytes into `buffer`, stopping early only at end of input
async fn fill_block(reader: &mut SourceReader, buffer: &mut BytesMut, want: usize) -> std::io::Result<usize> {
    buffer.clear();
    buffer.reserve(want);
    let mut limited = AsyncReadExt::take(&mut *reader, want as u64);
    while buffer.len() < want {
        if limited.read_buf(buffer).await? == 0 {
            break;
        }
    }
    Ok(buffer.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryObjectStore;
    use bytes::Bytes;

    fn uploader(block_size: usize) -> (Arc<MemoryObjectStore>, ChunkedUploader) {
        let store = Arc::new(MemoryObjectStore::new());
        let uploader = ChunkedUploader::with_shared_store(
            store.clone(),
            UploadConfig::new().with_block_size(block_size),
        );
        (store, uploader)
    }

    #[tokio::test]
    async fn test_fill_block_stops_at_want() {
        let mut reader: SourceReader = Box::new(std::io::Cursor::new(vec![7u8; 10]));
        let mut buffer = BytesMut::new();
        assert_eq!(fill_block(&mut reader, &mut buffer, 4).await.unwrap(), 4);
        assert_eq!(&buffer[..], &[7u8; 4]);
        assert_eq!(fill_block(&mut reader, &mut buffer, 8).await.unwrap(), 6);
        assert_eq!(fill_block(&mut reader, &mut buffer, 0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_small_object() {
        let (store, uploader) = uploader(4);
        let receipt = uploader
            .upload(UploadRequest::new("docs", "notes.txt"), UploadSource::from_bytes(&b"hello world"[..]))
            .await
            .unwrap();

        assert_eq!(receipt.blocks, 3);
        assert_eq!(receipt.size_bytes, 11);
        assert_eq!(receipt.content_type, "text/plain");
        assert_eq!(store.get_object("docs", "notes.txt").await.unwrap(), Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn test_short_source_fails_before_commit() {
        let (store, uploader) = uploader(4);
        let source = UploadSource::new(std::io::Cursor::new(b"abc".to_vec()), 10);
        let err = uploader
            .upload(UploadRequest::new("c", "short.bin"), source)
            .await
            .unwrap_err();

        match err {
            UploadError::ReadFailed { offset, source } => {
                assert_eq!(offset, 3);
                assert_eq!(source.kind(), std::io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected ReadFailed, got {:?}", other),
        }
        assert!(!store.contains("c", "short.bin").await);
    }

    #[tokio::test]
    async fn test_extra_source_bytes_are_ignored() {
        let (store, uploader) = uploader(4);
        let source = UploadSource::new(std::io::Cursor::new(b"abcdefgh".to_vec()), 5);
        uploader.upload(UploadRequest::new("c", "k"), source).await.unwrap();
        assert_eq!(store.get_object("c", "k").await.unwrap(), Bytes::from_static(b"abcde"));
    }

    #[tokio::test]
    async fn test_block_limit_checked_before_staging() {
        let store = Arc::new(MemoryObjectStore::new());
        let uploader = ChunkedUploader::with_shared_store(
            store.clone(),
            UploadConfig::new().with_block_size(1).with_block_id_width(1),
        );
        let err = uploader
            .upload(UploadRequest::new("c", "k"), UploadSource::from_bytes(vec![0u8; 11]))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::BlockLimitExceeded { blocks: 11, limit: 10 }));
        assert_eq!(store.staged_block_count("c", "k").await, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let uploader = ChunkedUploader::new(MemoryObjectStore::new(), UploadConfig::new().with_block_size(0));
        let err = uploader
            .upload(UploadRequest::new("c", "k"), UploadSource::from_bytes(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidConfig { .. }));
    }
}
