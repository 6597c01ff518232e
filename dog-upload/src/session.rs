use uuid::Uuid;

use crate::{BlockId, TransferProgress};

/// State of one upload call.
///
/// Owned by a single `upload` invocation and dropped when it returns; nothing
/// is persisted, so a failed upload cannot be resumed.
#[derive(Debug, Clone)]
pub struct UploadSession {
    container: String,
    object_name: String,
    total_size: u64,
    bytes_remaining: u64,
    block_size: usize,
    block_ids: Vec<BlockId>,
    progress_key: String,
    tag: String,
}

impl UploadSession {
    pub fn new(
        container: impl Into<String>,
        object_name: impl Into<String>,
        total_size: u64,
        block_size: usize,
        progress_suffix: &str,
    ) -> Self {
        let object_name = object_name.into();
        let progress_key = format!("{}{}", object_name, progress_suffix);
        Self {
            container: container.into(),
            object_name,
            total_size,
            bytes_remaining: total_size,
            block_size,
            block_ids: Vec::new(),
            progress_key,
            tag: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn bytes_remaining(&self) -> u64 {
        self.bytes_remaining
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.total_size - self.bytes_remaining
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_ids(&self) -> &[BlockId] {
        &self.block_ids
    }

    /// Key of the progress side-channel object
    pub fn progress_key(&self) -> &str {
        &self.progress_key
    }

    /// Random fixed-width tag that keeps this upload's block tokens apart from
    /// any other upload to the same key
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Index the next staged block will get
    pub fn next_block_index(&self) -> u64 {
        self.block_ids.len() as u64
    }

    /// Share of the source consumed so far, 0 for an empty source
    pub fn percent_complete(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.bytes_transferred() as f64 / self.total_size as f64 * 100.0
    }

    pub fn is_drained(&self) -> bool {
        self.bytes_remaining == 0
    }

    /// Account for bytes read from the source. Saturates at zero.
    pub(crate) fn consume(&mut self, bytes: usize) {
        self.bytes_remaining = self.bytes_remaining.saturating_sub(bytes as u64);
    }

    pub(crate) fn record_block(&mut self, block: BlockId) {
        self.block_ids.push(block);
    }

    pub fn snapshot(&self) -> TransferProgress {
        TransferProgress {
            bytes_transferred: self.bytes_transferred(),
            total_bytes: self.total_size,
            blocks_staged: self.block_ids.len() as u64,
        }
    }

    pub(crate) fn into_block_ids(self) -> Vec<BlockId> {
        self.block_ids
    }
}
