//! Document service.
//!
//! The only entry point request handlers use. Combines the share-id
//! generator with a [`DocumentStore`] into create, get and update.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use crate::document::Document;
use crate::hrid::ShareIdGenerator;
use crate::store::{DocumentStore, StoreError};

/// Default number of share-ids tried per create: the first plus one retry.
pub const DEFAULT_MAX_CREATE_ATTEMPTS: usize = 2;

/// Errors surfaced by the service.
///
/// Messages carry detail for server logs; the HTTP layer decides what the
/// client gets to see.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Invalid document: {0}")]
    Validation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Document operation failed: {0}")]
    Failure(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ContentTooLarge { .. } => ServiceError::Validation(err.to_string()),
            StoreError::Unavailable(_) => ServiceError::StorageUnavailable(err.to_string()),
            StoreError::Conflict(_) | StoreError::Corrupt(_) => {
                ServiceError::Failure(err.to_string())
            }
        }
    }
}

/// Hands out strictly increasing UTC timestamps.
///
/// Two calls never return the same instant, even when the wall clock has
/// not ticked or has stepped backwards.
#[derive(Debug)]
struct MonotonicClock {
    last: Mutex<DateTime<Utc>>,
}

impl MonotonicClock {
    fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = Utc::now().max(*last + Duration::microseconds(1));
        *last = next;
        next
    }
}

/// Create/read/update of documents by share-id.
pub struct DocumentService {
    generator: Arc<dyn ShareIdGenerator>,
    store: Arc<dyn DocumentStore>,
    max_create_attempts: usize,
    clock: MonotonicClock,
}

impl DocumentService {
    pub fn new(generator: Arc<dyn ShareIdGenerator>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            generator,
            store,
            max_create_attempts: DEFAULT_MAX_CREATE_ATTEMPTS,
            clock: MonotonicClock::new(),
        }
    }

    /// Sets how many share-ids a create may try before giving up.
    ///
    /// Values below one are treated as one.
    pub fn with_max_create_attempts(mut self, attempts: usize) -> Self {
        self.max_create_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Stores `content` under a freshly generated share-id.
    ///
    /// Content is assumed to have passed request validation already. A
    /// share-id collision is retried with a new id until the attempt
    /// budget runs out, which is reported as [`ServiceError::Failure`].
    pub async fn create_document(&self, content: &str) -> Result<Document, ServiceError> {
        for attempt in 1..=self.max_create_attempts {
            let share_id = self.generator.generate();

            match self.store.create(&share_id, content).await {
                Ok(doc) => {
                    tracing::info!("Created document {} ({} bytes)", doc.share_id, content.len());
                    return Ok(doc);
                }
                Err(StoreError::Conflict(_)) => {
                    tracing::warn!(
                        "Share id collision on {} (attempt {}/{})",
                        share_id,
                        attempt,
                        self.max_create_attempts
                    );
                }
                Err(e) => {
                    tracing::error!("Error creating document: {}", e);
                    return Err(e.into());
                }
            }
        }

        tracing::error!(
            "Gave up creating document after {} share id collisions",
            self.max_create_attempts
        );
        Err(ServiceError::Failure(format!(
            "no free share id after {} attempts",
            self.max_create_attempts
        )))
    }

    /// Looks a document up by share-id. `Ok(None)` means no such document.
    pub async fn get_document(&self, share_id: &str) -> Result<Option<Document>, ServiceError> {
        self.store.find_by_share_id(share_id).await.map_err(|e| {
            tracing::error!("Error retrieving document {}: {}", share_id, e);
            ServiceError::from(e)
        })
    }

    /// Replaces a document's content. `Ok(None)` means no such document.
    pub async fn update_document(
        &self,
        share_id: &str,
        content: &str,
    ) -> Result<Option<Document>, ServiceError> {
        let updated_at = self.clock.now();

        match self.store.update(share_id, content, updated_at).await {
            Ok(Some(doc)) => {
                tracing::info!(
                    "Updated document {} at {} ({} bytes)",
                    share_id,
                    doc.updated_at,
                    content.len()
                );
                Ok(Some(doc))
            }
            Ok(None) => {
                tracing::debug!("Update for unknown document {}", share_id);
                Ok(None)
            }
            Err(e) => {
                tracing::error!("Error updating document {}: {}", share_id, e);
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("max_create_attempts", &self.max_create_attempts)
            .finish_non_exhaustive()
    }
}
