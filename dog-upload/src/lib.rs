//! # dog-upload: Bounded-memory staged uploads
//!
//! `dog-upload` moves large objects into block-oriented blob stores without ever
//! holding more than one block of content in memory. Sources are read block by
//! block, each block is staged at the store under an ordered token, and the
//! object only becomes visible when the full block list is committed.
//!
//! ## Key Features
//!
//! - **Fixed memory ceiling**: one reusable block buffer per upload, whatever the source size
//! - **Stage then commit**: readers never see a half-written object; a failed upload leaves the key untouched
//! - **Progress side-channel**: optional `<name>.progress` object other processes can poll
//! - **Cancellation**: reads and staging calls observe a `CancellationToken`
//! - **Storage agnostic**: in-memory and filesystem stores included, any backend via [`ObjectStore`]
//!
//! ## Quick Start
//!
//! ```rust
//! use dog_upload::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> UploadResult<()> {
//! let adapter = StorageAdapter::new(MemoryObjectStore::new(), UploadConfig::default());
//!
//! let request = UploadRequest::new("media", "hello.txt").with_progress_reporting();
//! let receipt = adapter
//!     .upload(request, UploadSource::from_bytes(&b"Hello, world!"[..]))
//!     .await?;
//!
//! assert_eq!(receipt.content_type, "text/plain");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  StorageAdapter  │  ← uploads plus read/delete/metadata/listing
//! ├──────────────────┤
//! │ ChunkedUploader  │  ← read → stage → record loop, commit
//! ├──────────────────┤
//! │   ObjectStore    │  ← stage_block / commit_block_list / put / delete
//! └──────────────────┘
//! ```
//!
//! Blocks staged by an upload that fails or is cancelled are not cleaned up;
//! stores discard them on the next commit of the same key or by their own
//! expiry policy.

pub mod adapter;
mod block_id;
mod commit;
pub mod config;
pub mod content_type;
mod engine;
mod error;
mod fs_store;
mod memory_store;
#[cfg(feature = "tracing-basic")]
pub mod observability;
mod planner;
pub mod progress;
mod receipt;
mod session;
pub mod store;
mod types;

pub use adapter::StorageAdapter;
pub use block_id::{BlockId, BlockIdGenerator};
pub use config::UploadConfig;
pub use content_type::{ContentTypeResolver, ContentTypeTable};
pub use engine::ChunkedUploader;
pub use error::{StoreError, StoreResult, UploadError, UploadResult};
pub use fs_store::FsObjectStore;
pub use memory_store::MemoryObjectStore;
pub use planner::BlockPlanner;
pub use progress::ProgressReporter;
pub use receipt::UploadReceipt;
pub use session::UploadSession;
pub use store::{ObjectHead, ObjectStore};
pub use types::{ByteStream, TransferProgress, UploadRequest, UploadSource};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ChunkedUploader, MemoryObjectStore, ObjectStore, StorageAdapter, UploadConfig, UploadError,
        UploadReceipt, UploadRequest, UploadResult, UploadSource,
    };
}
