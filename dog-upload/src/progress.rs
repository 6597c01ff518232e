use bytes::Bytes;
use tracing::{debug, warn};

use crate::ObjectStore;

/// Publishes completion percentage to a small side-channel object.
///
/// Best effort: failures are logged and never abort the upload. The object is
/// created on first publish and removed by [`clear`](Self::clear).
pub struct ProgressReporter<'a> {
    store: &'a dyn ObjectStore,
    container: &'a str,
    key: &'a str,
    touched: bool,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(store: &'a dyn ObjectStore, container: &'a str, key: &'a str) -> Self {
        Self {
            store,
            container,
            key,
            touched: false,
        }
    }

    pub fn key(&self) -> &str {
        self.key
    }

    /// Overwrite the side-channel object with `percent`
    pub async fn publish(&mut self, percent: f64) {
        self.touched = true;
        let text = format_percent(percent);
        match self.store.put_object(self.container, self.key, Bytes::from(text)).await {
            Ok(()) => debug!("Published progress {:.2}% to {}", percent, self.key),
            Err(e) => warn!("Failed to publish progress to {}/{}: {}", self.container, self.key, e),
        }
    }

    /// Remove the side-channel object if this reporter ever wrote it
    pub async fn clear(self) {
        if !self.touched {
            return;
        }
        if let Err(e) = self.store.delete_object(self.container, self.key).await {
            warn!("Failed to clear progress object {}/{}: {}", self.container, self.key, e);
        }
    }
}

/// Fixed two decimals, always `.` as separator
pub fn format_percent(percent: f64) -> String {
    format!("{:.2}", percent.clamp(0.0, 100.0))
}

/// Parse a value written by [`ProgressReporter::publish`]
pub fn parse_percent(raw: &[u8]) -> Option<f64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}
