//! Document persistence port.
//!
//! The service talks to storage only through [`DocumentStore`]. Backends
//! translate their own failures into [`StoreError`] so no driver type leaks
//! past this boundary.

mod memory;

pub use memory::MemoryDocumentStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::document::Document;

/// Default ceiling on stored content, in bytes (10 MiB).
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Errors a store may report.
///
/// "Not found" is not an error: lookups and updates return `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Share id already exists: {0}")]
    Conflict(String),

    #[error("Content is {len} bytes, storage limit is {max}")]
    ContentTooLarge { len: usize, max: usize },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Stored record is unreadable: {0}")]
    Corrupt(String),
}

/// Create/read/update storage keyed by share-id.
///
/// Implementations must enforce share-id uniqueness themselves and apply
/// each write atomically: content and `updated_at` change together or not
/// at all.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document with `created_at == updated_at == now`.
    ///
    /// Fails with [`StoreError::Conflict`] if `share_id` is taken.
    async fn create(&self, share_id: &str, content: &str) -> Result<Document, StoreError>;

    async fn find_by_share_id(&self, share_id: &str) -> Result<Option<Document>, StoreError>;

    /// Replaces content wholesale and stamps `updated_at`.
    ///
    /// The stored stamp is `updated_at` unless that would not move past the
    /// document's previous stamp, see [`next_update_stamp`]. Returns
    /// `Ok(None)` when no document has this share-id.
    async fn update(
        &self,
        share_id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Document>, StoreError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Rejects content above the storage limit.
pub fn check_content_length(content: &str, max: usize) -> Result<(), StoreError> {
    if content.len() > max {
        return Err(StoreError::ContentTooLarge {
            len: content.len(),
            max,
        });
    }
    Ok(())
}

/// Timestamp an update should store, given the stamp currently on record.
///
/// Never earlier than `requested` and always at least a microsecond past
/// `previous`, so a document's `updated_at` only ever moves forward even
/// when writers disagree about the time.
pub fn next_update_stamp(requested: DateTime<Utc>, previous: DateTime<Utc>) -> DateTime<Utc> {
    requested.max(previous + Duration::microseconds(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_update_stamp_keeps_later_request() {
        let previous = Utc::now();
        let requested = previous + Duration::seconds(3);
        assert_eq!(next_update_stamp(requested, previous), requested);
    }

    #[test]
    fn test_next_update_stamp_moves_past_previous() {
        let previous = Utc::now() + Duration::seconds(60);
        let stamp = next_update_stamp(Utc::now(), previous);
        assert_eq!(stamp, previous + Duration::microseconds(1));

        assert!(next_update_stamp(previous, previous) > previous);
    }
}
