use bytes::Bytes;
use futures_core::Stream;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Stream of bytes for object content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Reader type accepted as upload content
pub type SourceReader = Box<dyn AsyncRead + Send + Unpin>;

/// Content to upload: a reader plus the length it promises to deliver
pub struct UploadSource {
    reader: SourceReader,
    len: Option<u64>,
}

impl UploadSource {
    /// Source that will yield exactly `len` bytes
    pub fn new<R>(reader: R, len: u64) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            len: Some(len),
        }
    }

    /// Source of unknown length. Uploading it fails with `SourceLengthRequired`.
    pub fn unknown_length<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            len: None,
        }
    }

    /// In-memory source
    pub fn from_bytes<B: Into<Bytes>>(data: B) -> Self {
        let data = data.into();
        let len = data.len() as u64;
        Self::new(std::io::Cursor::new(data), len)
    }

    /// Open a file, taking its length from the filesystem
    pub async fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self::new(file, len))
    }

    pub fn len(&self) -> Option<u64> {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == Some(0)
    }

    pub(crate) fn into_parts(self) -> (SourceReader, Option<u64>) {
        (self.reader, self.len)
    }
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSource").field("len", &self.len).finish_non_exhaustive()
    }
}

/// Snapshot of a running transfer, sent to in-process observers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub blocks_staged: u64,
}

impl TransferProgress {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0
        }
    }
}

/// Request to upload one object
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub container: String,
    pub name: String,
    pub content_type: Option<String>,
    pub report_progress: bool,
    pub cancellation: Option<CancellationToken>,
    pub observer: Option<watch::Sender<TransferProgress>>,
}

impl UploadRequest {
    pub fn new<C: Into<String>, N: Into<String>>(container: C, name: N) -> Self {
        Self {
            container: container.into(),
            name: name.into(),
            content_type: None,
            report_progress: false,
            cancellation: None,
            observer: None,
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Publish completion percentage to the `<name>.progress` side-channel object
    pub fn with_progress_reporting(mut self) -> Self {
        self.report_progress = true;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_observer(mut self, observer: watch::Sender<TransferProgress>) -> Self {
        self.observer = Some(observer);
        self
    }
}
