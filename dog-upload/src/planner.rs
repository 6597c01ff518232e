/// Decides how many bytes each iteration of the upload loop reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlanner {
    block_size: usize,
}

impl BlockPlanner {
    pub fn new(block_size: usize) -> Self {
        Self { block_size }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// `min(bytes_remaining, block_size)`
    pub fn next_read(&self, bytes_remaining: u64) -> usize {
        bytes_remaining.min(self.block_size as u64) as usize
    }

    /// Number of non-empty blocks a source of `total_size` bytes stages
    pub fn block_count(&self, total_size: u64) -> u64 {
        total_size.div_ceil(self.block_size as u64)
    }
}
