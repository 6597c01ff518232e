use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::store::directory_prefix;
use crate::{BlockId, ByteStream, ObjectHead, ObjectStore, StoreError, StoreResult};

const DATA_DIR: &str = "data";
const STAGED_DIR: &str = "staged";
const PROPS_DIR: &str = "props";
const TMP_DIR: &str = "tmp";

/// Content type and user metadata, kept in a JSON sidecar per object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ObjectProps {
    content_type: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Object store backed by a local directory tree.
///
/// ```text
/// <root>/<container>/data/<key>            committed objects
/// <root>/<container>/staged/<key>/<token>  uncommitted blocks
/// <root>/<container>/props/<key>.json      content type and metadata
/// <root>/<container>/tmp/                  commit scratch space
/// ```
///
/// Keys and tokens are base64url-encoded wherever they become a single file name.
/// Commits stream blocks into a scratch file and rename it over the object, so
/// readers see either the old or the new content and memory use stays flat.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of uncommitted blocks held for `key`
    pub async fn staged_block_count(&self, container: &str, key: &str) -> StoreResult<usize> {
        let dir = self.root.join(container).join(STAGED_DIR).join(encode_name(key));
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut count = 0;
        while entries.next_entry().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    async fn container_dir(&self, container: &str) -> StoreResult<PathBuf> {
        validate_container(container)?;
        let dir = self.root.join(container);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StoreError::container_not_found(container)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::container_not_found(container)),
            Err(e) => Err(e.into()),
        }
    }

    async fn object_path(&self, container: &str, key: &str) -> StoreResult<(PathBuf, PathBuf)> {
        validate_key(key)?;
        let base = self.container_dir(container).await?;
        let path = key.split('/').fold(base.join(DATA_DIR), |p, segment| p.join(segment));
        Ok((base, path))
    }

    fn props_path(base: &Path, key: &str) -> PathBuf {
        base.join(PROPS_DIR).join(format!("{}.json", encode_name(key)))
    }

    async fn read_props(base: &Path, key: &str) -> StoreResult<ObjectProps> {
        match tokio::fs::read(Self::props_path(base, key)).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ObjectProps::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_props(base: &Path, key: &str, props: &ObjectProps) -> StoreResult<()> {
        let raw = serde_json::to_vec(props)?;
        write_atomic(&base.join(TMP_DIR), &Self::props_path(base, key), &raw).await
    }

    async fn require_object(container: &str, key: &str, path: &Path) -> StoreResult<std::fs::Metadata> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(meta),
            Ok(_) => Err(StoreError::not_found(container, key)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::not_found(container, key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_props<F>(&self, container: &str, key: &str, update: F) -> StoreResult<()>
    where
        F: FnOnce(&mut ObjectProps) + Send,
    {
        let (base, path) = self.object_path(container, key).await?;
        Self::require_object(container, key, &path).await?;
        let mut props = Self::read_props(&base, key).await?;
        update(&mut props);
        Self::write_props(&base, key, &props).await
    }
}

fn encode_name(raw: &str) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw)
}

fn validate_container(container: &str) -> StoreResult<()> {
    if container.is_empty()
        || container == "."
        || container == ".."
        || container.contains(['/', '\\'])
    {
        return Err(StoreError::invalid(format!("Invalid container name: {:?}", container)));
    }
    Ok(())
}

fn validate_key(key: &str) -> StoreResult<()> {
    let bad_segment = key
        .split('/')
        .any(|s| s.is_empty() || s == "." || s == ".." || s.contains('\\'));
    if bad_segment {
        return Err(StoreError::invalid(format!("Invalid object key: {:?}", key)));
    }
    Ok(())
}

fn not_found_as(err: std::io::Error, container: &str, key: &str) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::not_found(container, key)
    } else {
        err.into()
    }
}

/// Write `data` to a scratch file, then rename it onto `dest`
async fn write_atomic(tmp_dir: &Path, dest: &Path, data: &[u8]) -> StoreResult<()> {
    let tmp = tmp_dir.join(Uuid::new_v4().simple().to_string());
    if let Err(e) = tokio::fs::write(&tmp, data).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Remove the now-empty directories between `path` and `data_root`, so
/// listings only report prefixes that still hold objects
async fn prune_empty_dirs(data_root: &Path, path: &Path) {
    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == data_root || !current.starts_with(data_root) {
            break;
        }
        // fails on non-empty directories, which ends the walk
        if tokio::fs::remove_dir(current).await.is_err() {
            break;
        }
        dir = current.parent();
    }
}

async fn concat_files(parts: &[PathBuf], dest: &Path) -> std::io::Result<()> {
    let mut out = tokio::fs::File::create(dest).await?;
    for part in parts {
        let mut input = tokio::fs::File::open(part).await?;
        tokio::io::copy(&mut input, &mut out).await?;
    }
    out.flush().await?;
    out.sync_all().await
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn ensure_container(&self, container: &str) -> StoreResult<()> {
        validate_container(container)?;
        let base = self.root.join(container);
        for dir in [DATA_DIR, STAGED_DIR, PROPS_DIR, TMP_DIR] {
            tokio::fs::create_dir_all(base.join(dir)).await?;
        }
        Ok(())
    }

    async fn stage_block(
        &self,
        container: &str,
        key: &str,
        block: &BlockId,
        data: Bytes,
    ) -> StoreResult<()> {
        validate_key(key)?;
        let base = self.container_dir(container).await?;
        let dest = base
            .join(STAGED_DIR)
            .join(encode_name(key))
            .join(encode_name(block.as_str()));
        write_atomic(&base.join(TMP_DIR), &dest, &data).await
    }

    async fn commit_block_list(
        &self,
        container: &str,
        key: &str,
        blocks: &[BlockId],
    ) -> StoreResult<()> {
        let (base, dest) = self.object_path(container, key).await?;
        let block_dir = base.join(STAGED_DIR).join(encode_name(key));

        let mut parts = Vec::with_capacity(blocks.len());
        for block in blocks {
            let part = block_dir.join(encode_name(block.as_str()));
            if tokio::fs::metadata(&part).await.is_err() {
                return Err(StoreError::InvalidBlockList {
                    key: key.to_string(),
                    block: block.as_str().to_string(),
                });
            }
            parts.push(part);
        }

        let tmp = base.join(TMP_DIR).join(Uuid::new_v4().simple().to_string());
        if let Err(e) = concat_files(&parts, &tmp).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if let Err(e) = tokio::fs::rename(&tmp, &dest).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        match tokio::fs::remove_file(Self::props_path(&base, key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = tokio::fs::remove_dir_all(&block_dir).await {
            if e.kind() != ErrorKind::NotFound {
                debug!("Leaving staged blocks for {}/{}: {}", container, key, e);
            }
        }
        Ok(())
    }

    async fn put_object(&self, container: &str, key: &str, data: Bytes) -> StoreResult<()> {
        let (base, dest) = self.object_path(container, key).await?;
        write_atomic(&base.join(TMP_DIR), &dest, &data).await?;
        match tokio::fs::remove_file(Self::props_path(&base, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_object(&self, container: &str, key: &str) -> StoreResult<Bytes> {
        let (_, path) = self.object_path(container, key).await?;
        Self::require_object(container, key, &path).await?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| not_found_as(e, container, key))
    }

    async fn get_stream(&self, container: &str, key: &str) -> StoreResult<ByteStream> {
        let (_, path) = self.object_path(container, key).await?;
        Self::require_object(container, key, &path).await?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| not_found_as(e, container, key))?;
        Ok(Box::pin(tokio_util::io::ReaderStream::new(file)))
    }

    async fn head(&self, container: &str, key: &str) -> StoreResult<ObjectHead> {
        let (base, path) = self.object_path(container, key).await?;
        let meta = Self::require_object(container, key, &path).await?;
        let props = Self::read_props(&base, key).await?;
        let last_modified = meta
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp());

        Ok(ObjectHead {
            size_bytes: meta.len(),
            content_type: props.content_type,
            metadata: props.metadata,
            last_modified,
        })
    }

    async fn delete_object(&self, container: &str, key: &str) -> StoreResult<()> {
        let (base, path) = match self.object_path(container, key).await {
            Ok(paths) => paths,
            Err(StoreError::ContainerNotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        for target in [&path, &Self::props_path(&base, key)] {
            match tokio::fs::remove_file(target).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        prune_empty_dirs(&base.join(DATA_DIR), &path).await;
        Ok(())
    }

    async fn set_content_type(&self, container: &str, key: &str, content_type: &str) -> StoreResult<()> {
        let content_type = content_type.to_string();
        self.update_props(container, key, move |props| props.content_type = Some(content_type))
            .await
    }

    async fn set_metadata(&self, container: &str, key: &str, name: &str, value: &str) -> StoreResult<()> {
        let (name, value) = (name.to_string(), value.to_string());
        self.update_props(container, key, move |props| {
            props.metadata.insert(name, value);
        })
        .await
    }

    async fn list_directories(&self, container: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let base = self.container_dir(container).await?;
        let prefix = directory_prefix(prefix);
        let mut dir = base.join(DATA_DIR);
        if !prefix.is_empty() {
            validate_key(prefix.trim_end_matches('/'))?;
            for segment in prefix.trim_end_matches('/').split('/') {
                dir = dir.join(segment);
            }
        }

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(format!("{}{}/", prefix, entry.file_name().to_string_lossy()));
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(validate_key("a/b/c.txt").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("a//b").is_err());
        assert!(validate_key("a/../b").is_err());
        assert!(validate_key("trailing/").is_err());
    }

    #[test]
    fn test_container_validation() {
        assert!(validate_container("media").is_ok());
        assert!(validate_container("").is_err());
        assert!(validate_container("..").is_err());
        assert!(validate_container("a/b").is_err());
    }

    #[test]
    fn test_encoded_names_are_path_safe() {
        // standard base64 of this token contains '/'
        let encoded = encode_name("MDAwMD/w");
        assert!(!encoded.contains('/'));
        assert!(!encode_name("a/b/c").contains('/'));
    }
}
