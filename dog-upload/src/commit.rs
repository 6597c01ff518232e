use tracing::{info, warn};

use crate::content_type::resolve_content_type;
use crate::{ContentTypeResolver, ObjectStore, UploadError, UploadReceipt, UploadResult, UploadSession};

/// Assemble the staged blocks into the final object, then declare its type.
///
/// The commit is the only point where the uploaded content becomes visible at
/// the key. A failure to set the content type afterwards is reported on the
/// receipt rather than as an error, since the content is already in place.
pub(crate) async fn finalize(
    store: &dyn ObjectStore,
    session: UploadSession,
    requested_type: Option<&str>,
    resolver: &dyn ContentTypeResolver,
    fallback_type: &str,
) -> UploadResult<UploadReceipt> {
    let container = session.container().to_string();
    let key = session.object_name().to_string();
    let size_bytes = session.total_size();
    let block_size = session.block_size();
    let blocks = session.into_block_ids();

    store
        .commit_block_list(&container, &key, &blocks)
        .await
        .map_err(|source| UploadError::CommitFailed {
            key: key.clone(),
            blocks: blocks.len(),
            source,
        })?;
    info!("Committed {} blocks ({} bytes) to {}/{}", blocks.len(), size_bytes, container, key);

    let content_type = resolve_content_type(requested_type, &key, resolver, fallback_type);
    let receipt = UploadReceipt::new(
        container.clone(),
        key.clone(),
        size_bytes,
        blocks.len(),
        block_size,
        content_type.clone(),
    );

    match store.set_content_type(&container, &key, &content_type).await {
        Ok(()) => Ok(receipt),
        Err(source) => {
            warn!("Committed {}/{} but could not set content type {}: {}", container, key, content_type, source);
            Ok(receipt.with_content_type_error(UploadError::ContentTypeSetFailed {
                key,
                content_type,
                source,
            }))
        }
    }
}
