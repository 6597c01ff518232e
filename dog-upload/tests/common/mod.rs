#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use dog_upload::{
    BlockId, ByteStream, MemoryObjectStore, ObjectHead, ObjectStore, StoreError, StoreResult,
};

/// One `stage_block` call as seen by the store
#[derive(Debug, Clone)]
pub struct StagedCall {
    pub key: String,
    pub block: BlockId,
    pub len: usize,
}

/// Memory store wrapper that records traffic and fails on demand
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryObjectStore,
    fail_ensure: bool,
    fail_stage_at: Option<u64>,
    fail_commit: bool,
    fail_content_type: bool,
    fail_delete: bool,
    cancel_after_stage: Option<(u64, CancellationToken)>,
    staged: Mutex<Vec<StagedCall>>,
    writes: Mutex<Vec<(String, Bytes)>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn failing_ensure(mut self) -> Self {
        self.fail_ensure = true;
        self
    }

    pub fn failing_stage_at(mut self, index: u64) -> Self {
        self.fail_stage_at = Some(index);
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_content_type(mut self) -> Self {
        self.fail_content_type = true;
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Cancel `token` right after the block with `index` is staged
    pub fn cancelling_after(mut self, index: u64, token: CancellationToken) -> Self {
        self.cancel_after_stage = Some((index, token));
        self
    }

    pub fn inner(&self) -> &MemoryObjectStore {
        &self.inner
    }

    pub async fn staged_calls(&self) -> Vec<StagedCall> {
        self.staged.lock().await.clone()
    }

    /// Every `put_object` body written under `key`, in order
    pub async fn writes_to(&self, key: &str) -> Vec<String> {
        self.writes
            .lock()
            .await
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
            .collect()
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::backend(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("injected {} failure", what),
    ))
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn ensure_container(&self, container: &str) -> StoreResult<()> {
        if self.fail_ensure {
            return Err(injected("ensure_container"));
        }
        self.inner.ensure_container(container).await
    }

    async fn stage_block(
        &self,
        container: &str,
        key: &str,
        block: &BlockId,
        data: Bytes,
    ) -> StoreResult<()> {
        if self.fail_stage_at == Some(block.index()) {
            return Err(injected("stage_block"));
        }
        let len = data.len();
        self.inner.stage_block(container, key, block, data).await?;
        self.staged.lock().await.push(StagedCall {
            key: key.to_string(),
            block: block.clone(),
            len,
        });
        if let Some((index, token)) = &self.cancel_after_stage {
            if *index == block.index() {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn commit_block_list(
        &self,
        container: &str,
        key: &str,
        blocks: &[BlockId],
    ) -> StoreResult<()> {
        if self.fail_commit {
            return Err(injected("commit_block_list"));
        }
        self.inner.commit_block_list(container, key, blocks).await
    }

    async fn put_object(&self, container: &str, key: &str, data: Bytes) -> StoreResult<()> {
        self.writes.lock().await.push((key.to_string(), data.clone()));
        self.inner.put_object(container, key, data).await
    }

    async fn get_object(&self, container: &str, key: &str) -> StoreResult<Bytes> {
        self.inner.get_object(container, key).await
    }

    async fn get_stream(&self, container: &str, key: &str) -> StoreResult<ByteStream> {
        self.inner.get_stream(container, key).await
    }

    async fn head(&self, container: &str, key: &str) -> StoreResult<ObjectHead> {
        self.inner.head(container, key).await
    }

    async fn delete_object(&self, container: &str, key: &str) -> StoreResult<()> {
        if self.fail_delete {
            return Err(injected("delete_object"));
        }
        self.inner.delete_object(container, key).await
    }

    async fn set_content_type(&self, container: &str, key: &str, content_type: &str) -> StoreResult<()> {
        if self.fail_content_type {
            return Err(injected("set_content_type"));
        }
        self.inner.set_content_type(container, key, content_type).await
    }

    async fn set_metadata(&self, container: &str, key: &str, name: &str, value: &str) -> StoreResult<()> {
        self.inner.set_metadata(container, key, name, value).await
    }

    async fn list_directories(&self, container: &str, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.list_directories(container, prefix).await
    }
}

/// Deterministic, non-repeating-per-block test content
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Reader that hands out at most `step` bytes per read and returns `Pending`
/// once before each, so uploads joined on one task interleave
pub struct InterleavedReader {
    data: Vec<u8>,
    pos: usize,
    step: usize,
    primed: bool,
}

impl InterleavedReader {
    pub fn new(data: Vec<u8>, step: usize) -> Self {
        Self {
            data,
            pos: 0,
            step,
            primed: false,
        }
    }
}

impl AsyncRead for InterleavedReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        if !this.primed {
            this.primed = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        this.primed = false;
        let n = (this.data.len() - this.pos).min(this.step).min(buf.remaining());
        buf.put_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}
