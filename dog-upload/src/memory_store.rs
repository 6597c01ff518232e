use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::store::directories_from_keys;
use crate::{BlockId, ObjectHead, ObjectStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    metadata: BTreeMap<String, String>,
    last_modified: i64,
}

impl StoredObject {
    fn new(data: Bytes) -> Self {
        Self {
            data,
            content_type: None,
            metadata: BTreeMap::new(),
            last_modified: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Default)]
struct Container {
    objects: HashMap<String, StoredObject>,
    // key -> token -> block
    staged: HashMap<String, HashMap<String, Bytes>>,
}

/// In-process object store.
///
/// Useful for tests and single-process deployments. Staged blocks that are never
/// committed stay until the next commit of the same key.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    containers: RwLock<HashMap<String, Container>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of uncommitted blocks held for `key`
    pub async fn staged_block_count(&self, container: &str, key: &str) -> usize {
        let containers = self.containers.read().await;
        containers
            .get(container)
            .and_then(|c| c.staged.get(key))
            .map_or(0, HashMap::len)
    }

    pub async fn contains(&self, container: &str, key: &str) -> bool {
        let containers = self.containers.read().await;
        containers
            .get(container)
            .is_some_and(|c| c.objects.contains_key(key))
    }

    pub async fn container_exists(&self, container: &str) -> bool {
        self.containers.read().await.contains_key(container)
    }
}

fn container_mut<'a>(
    containers: &'a mut HashMap<String, Container>,
    name: &str,
) -> StoreResult<&'a mut Container> {
    containers
        .get_mut(name)
        .ok_or_else(|| StoreError::container_not_found(name))
}

fn object_mut<'a>(
    containers: &'a mut HashMap<String, Container>,
    container: &str,
    key: &str,
) -> StoreResult<&'a mut StoredObject> {
    container_mut(containers, container)?
        .objects
        .get_mut(key)
        .ok_or_else(|| StoreError::not_found(container, key))
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ensure_container(&self, container: &str) -> StoreResult<()> {
        if container.is_empty() {
            return Err(StoreError::invalid("Container name must not be empty"));
        }
        let mut containers = self.containers.write().await;
        containers.entry(container.to_string()).or_default();
        Ok(())
    }

    async fn stage_block(
        &self,
        container: &str,
        key: &str,
        block: &BlockId,
        data: Bytes,
    ) -> StoreResult<()> {
        let mut containers = self.containers.write().await;
        container_mut(&mut containers, container)?
            .staged
            .entry(key.to_string())
            .or_default()
            .insert(block.as_str().to_string(), data);
        Ok(())
    }

    async fn commit_block_list(
        &self,
        container: &str,
        key: &str,
        blocks: &[BlockId],
    ) -> StoreResult<()> {
        let mut containers = self.containers.write().await;
        let target = container_mut(&mut containers, container)?;

        let data = {
            let staged = target.staged.get(key);
            let mut assembled = BytesMut::new();
            for block in blocks {
                let part = staged
                    .and_then(|s| s.get(block.as_str()))
                    .ok_or_else(|| StoreError::InvalidBlockList {
                        key: key.to_string(),
                        block: block.as_str().to_string(),
                    })?;
                assembled.extend_from_slice(part);
            }
            assembled.freeze()
        };

        target.staged.remove(key);
        target.objects.insert(key.to_string(), StoredObject::new(data));
        Ok(())
    }

    async fn put_object(&self, container: &str, key: &str, data: Bytes) -> StoreResult<()> {
        let mut containers = self.containers.write().await;
        container_mut(&mut containers, container)?
            .objects
            .insert(key.to_string(), StoredObject::new(data));
        Ok(())
    }

    async fn get_object(&self, container: &str, key: &str) -> StoreResult<Bytes> {
        let containers = self.containers.read().await;
        containers
            .get(container)
            .ok_or_else(|| StoreError::container_not_found(container))?
            .objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StoreError::not_found(container, key))
    }

    async fn head(&self, container: &str, key: &str) -> StoreResult<ObjectHead> {
        let containers = self.containers.read().await;
        let object = containers
            .get(container)
            .ok_or_else(|| StoreError::container_not_found(container))?
            .objects
            .get(key)
            .ok_or_else(|| StoreError::not_found(container, key))?;

        Ok(ObjectHead {
            size_bytes: object.data.len() as u64,
            content_type: object.content_type.clone(),
            metadata: object.metadata.clone(),
            last_modified: Some(object.last_modified),
        })
    }

    async fn delete_object(&self, container: &str, key: &str) -> StoreResult<()> {
        let mut containers = self.containers.write().await;
        if let Some(target) = containers.get_mut(container) {
            target.objects.remove(key);
        }
        Ok(())
    }

    async fn set_content_type(&self, container: &str, key: &str, content_type: &str) -> StoreResult<()> {
        let mut containers = self.containers.write().await;
        object_mut(&mut containers, container, key)?.content_type = Some(content_type.to_string());
        Ok(())
    }

    async fn set_metadata(&self, container: &str, key: &str, name: &str, value: &str) -> StoreResult<()> {
        let mut containers = self.containers.write().await;
        object_mut(&mut containers, container, key)?
            .metadata
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn list_directories(&self, container: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let containers = self.containers.read().await;
        let target = containers
            .get(container)
            .ok_or_else(|| StoreError::container_not_found(container))?;
        Ok(directories_from_keys(target.objects.keys().map(String::as_str), prefix))
    }
}
