use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{UploadError, UploadResult};

/// Opaque token naming one staged block.
///
/// Ordering follows the sequence index, which is also the transfer order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId {
    index: u64,
    token: String,
}

impl BlockId {
    /// Zero-based position of the block in the committed object
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Token as sent to the store
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Recover a block id from a token produced by [`BlockIdGenerator`]
    pub fn from_token(token: &str) -> Option<Self> {
        let raw = base64::engine::general_purpose::STANDARD.decode(token).ok()?;
        let text = std::str::from_utf8(&raw).ok()?;
        let digits = match text.rsplit_once(SESSION_SEPARATOR) {
            Some((tag, digits)) if !tag.is_empty() => digits,
            Some(_) => return None,
            None => text,
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index = digits.parse().ok()?;
        Some(Self {
            index,
            token: token.to_string(),
        })
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token)
    }
}

const SESSION_SEPARATOR: char = '-';

/// Produces block tokens: the index as a fixed-width decimal string, base64 encoded.
///
/// Fixed width keeps every token in a session the same length, which block-based
/// stores require. A width of `w` digits supports `10^w` blocks.
///
/// Stores keep staged blocks per key, so two uploads racing on one key would
/// overwrite each other's blocks if they shared tokens. [`for_session`] prefixes
/// every token with a per-upload tag to keep their block sets apart.
///
/// [`for_session`]: BlockIdGenerator::for_session
#[derive(Debug, Clone)]
pub struct BlockIdGenerator {
    width: usize,
    session: Option<String>,
}

impl BlockIdGenerator {
    pub fn new(width: usize) -> Self {
        Self { width, session: None }
    }

    /// Generator whose tokens carry `tag`. Tags must all have the same length
    /// for tokens of different sessions to stay the same length.
    pub fn for_session(&self, tag: &str) -> Self {
        Self {
            width: self.width,
            session: Some(tag.to_string()),
        }
    }

    /// Number of distinct tokens this generator can produce
    pub fn capacity(&self) -> u64 {
        10u64.saturating_pow(self.width as u32)
    }

    pub fn generate(&self, index: u64) -> UploadResult<BlockId> {
        if index >= self.capacity() {
            return Err(UploadError::BlockLimitExceeded {
                blocks: index.saturating_add(1),
                limit: self.capacity(),
            });
        }
        let raw = match &self.session {
            Some(tag) => format!("{}{}{:0width$}", tag, SESSION_SEPARATOR, index, width = self.width),
            None => format!("{:0width$}", index, width = self.width),
        };
        Ok(BlockId {
            index,
            token: base64::engine::general_purpose::STANDARD.encode(raw),
        })
    }
}

impl Default for BlockIdGenerator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BLOCK_ID_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_encoding() {
        let ids = BlockIdGenerator::new(6);
        // "000000" and "000001"
        assert_eq!(ids.generate(0).unwrap().as_str(), "MDAwMDAw");
        assert_eq!(ids.generate(1).unwrap().as_str(), "MDAwMDAx");
    }

    #[test]
    fn test_sessions_never_share_tokens() {
        let ids = BlockIdGenerator::new(6);
        let first = ids.for_session("3f2a9c1e0b7d4e6f8a5b2c9d1e0f3a7b");
        let second = ids.for_session("9b8c7d6e5f4a3b2c1d0e9f8a7b6c5d4e");

        let a = first.generate(0).unwrap();
        let b = second.generate(0).unwrap();
        assert_ne!(a.as_str(), b.as_str());
        assert_eq!(a.as_str().len(), b.as_str().len());
        assert_eq!(a.as_str().len(), first.generate(999_999).unwrap().as_str().len());
        assert_eq!(BlockId::from_token(a.as_str()).unwrap().index(), 0);
        assert_eq!(BlockId::from_token(first.generate(42).unwrap().as_str()).unwrap(), first.generate(42).unwrap());
    }

    #[test]
    fn test_tokens_share_length() {
        let ids = BlockIdGenerator::new(6);
        let first = ids.generate(0).unwrap();
        let last = ids.generate(999_999).unwrap();
        assert_eq!(first.as_str().len(), last.as_str().len());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let ids = BlockIdGenerator::new(2);
        assert!(ids.generate(99).is_ok());
        match ids.generate(100) {
            Err(UploadError::BlockLimitExceeded { blocks, limit }) => {
                assert_eq!(blocks, 101);
                assert_eq!(limit, 100);
            }
            other => panic!("expected BlockLimitExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_million_blocks_are_unique_and_ordered() {
        let ids = BlockIdGenerator::new(6);
        let mut seen = std::collections::HashSet::new();
        let mut previous: Option<BlockId> = None;
        for index in 0..1_000_000u64 {
            let id = ids.generate(index).unwrap();
            if let Some(prev) = &previous {
                assert!(prev < &id);
            }
            assert!(seen.insert(id.as_str().to_string()));
            previous = Some(id);
        }
    }

    #[test]
    fn test_from_token_rejects_foreign_tokens() {
        assert!(BlockId::from_token("not base64!").is_none());
        // "abc"
        assert!(BlockId::from_token("YWJj").is_none());
        // "-000001"
        assert!(BlockId::from_token("LTAwMDAwMQ==").is_none());
    }

    proptest! {
        #[test]
        fn prop_token_decodes_to_index(index in 0u64..1_000_000) {
            let id = BlockIdGenerator::new(6).generate(index).unwrap();
            let decoded = BlockId::from_token(id.as_str()).unwrap();
            prop_assert_eq!(decoded, id);
        }
    }
}
