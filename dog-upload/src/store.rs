use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;

use crate::{BlockId, ByteStream, StoreResult};

/// Block-oriented object storage, the collaborator the upload engine drives.
///
/// Keys live inside named containers. Content becomes readable at a key only
/// through [`put_object`](Self::put_object) or
/// [`commit_block_list`](Self::commit_block_list); staged blocks are invisible
/// until committed. Implementations own their timeouts; callers never retry.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the container if it does not exist
    async fn ensure_container(&self, container: &str) -> StoreResult<()>;

    /// Stage an uncommitted block for `key`. Restaging a token replaces it.
    async fn stage_block(
        &self,
        container: &str,
        key: &str,
        block: &BlockId,
        data: Bytes,
    ) -> StoreResult<()>;

    /// Atomically replace the object at `key` with the given blocks, in order.
    ///
    /// An empty list produces a zero-length object. Properties of any previous
    /// object are reset and staged blocks left over for `key` are discarded.
    async fn commit_block_list(
        &self,
        container: &str,
        key: &str,
        blocks: &[BlockId],
    ) -> StoreResult<()>;

    /// Write a whole object in one call
    async fn put_object(&self, container: &str, key: &str, data: Bytes) -> StoreResult<()>;

    /// Read a whole object
    async fn get_object(&self, container: &str, key: &str) -> StoreResult<Bytes>;

    /// Read an object as a stream
    async fn get_stream(&self, container: &str, key: &str) -> StoreResult<ByteStream> {
        let data = self.get_object(container, key).await?;
        Ok(Box::pin(futures_util::stream::once(async move { Ok(data) })))
    }

    /// Object properties without content
    async fn head(&self, container: &str, key: &str) -> StoreResult<ObjectHead>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete_object(&self, container: &str, key: &str) -> StoreResult<()>;

    async fn set_content_type(&self, container: &str, key: &str, content_type: &str) -> StoreResult<()>;

    /// Set one user metadata entry on an existing object
    async fn set_metadata(&self, container: &str, key: &str, name: &str, value: &str) -> StoreResult<()>;

    /// Immediate "directories" below `prefix`, each returned with a trailing `/`
    async fn list_directories(&self, container: &str, prefix: &str) -> StoreResult<Vec<String>>;
}

/// Properties of a stored object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub last_modified: Option<i64>,
}

/// Normalize a listing prefix so it names a directory: `""`, or ends with `/`
pub(crate) fn directory_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

/// Collect the distinct first path segments below `prefix` that are followed by more path
pub(crate) fn directories_from_keys<'a, I>(keys: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = directory_prefix(prefix);
    let mut dirs = std::collections::BTreeSet::new();
    for key in keys {
        if let Some(rest) = key.strip_prefix(prefix.as_str()) {
            if let Some((segment, _)) = rest.split_once('/') {
                if !segment.is_empty() {
                    dirs.insert(format!("{}{}/", prefix, segment));
                }
            }
        }
    }
    dirs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_prefix() {
        assert_eq!(directory_prefix(""), "");
        assert_eq!(directory_prefix("/"), "");
        assert_eq!(directory_prefix("photos"), "photos/");
        assert_eq!(directory_prefix("photos/"), "photos/");
    }

    #[test]
    fn test_directories_from_keys() {
        let keys = [
            "photos/2024/a.png",
            "photos/2024/b.png",
            "photos/2025/c.png",
            "photos/top.png",
            "videos/x.mp4",
        ];
        assert_eq!(
            directories_from_keys(keys.iter().copied(), "photos"),
            vec!["photos/2024/".to_string(), "photos/2025/".to_string()]
        );
        assert_eq!(
            directories_from_keys(keys.iter().copied(), ""),
            vec!["photos/".to_string(), "videos/".to_string()]
        );
    }
}
