//! In-memory document store.
//!
//! Thread-safe via an internal RwLock. Used by tests and as the reference
//! behaviour for persistent backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use super::{
    check_content_length, next_update_stamp, DocumentStore, StoreError,
    DEFAULT_MAX_CONTENT_LENGTH,
};
use crate::document::Document;

/// Documents held in a map keyed by share-id.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
    max_content_length: usize,
    available: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_max_content_length(DEFAULT_MAX_CONTENT_LENGTH)
    }

    pub fn with_max_content_length(max_content_length: usize) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            max_content_length,
            available: AtomicBool::new(true),
        }
    }

    /// Makes every later call fail with [`StoreError::Unavailable`] until
    /// switched back on. Simulates a lost backend connection.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Document>> {
        self.documents.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Document>> {
        self.documents.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, share_id: &str, content: &str) -> Result<Document, StoreError> {
        self.ensure_available()?;
        check_content_length(content, self.max_content_length)?;

        let mut documents = self.write();
        if documents.contains_key(share_id) {
            return Err(StoreError::Conflict(share_id.to_string()));
        }

        let doc = Document::new(Uuid::new_v4().to_string(), share_id, content, Utc::now());
        documents.insert(share_id.to_string(), doc.clone());
        Ok(doc)
    }

    async fn find_by_share_id(&self, share_id: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_available()?;
        Ok(self.read().get(share_id).cloned())
    }

    async fn update(
        &self,
        share_id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Document>, StoreError> {
        self.ensure_available()?;
        check_content_length(content, self.max_content_length)?;

        let mut documents = self.write();
        let Some(doc) = documents.get_mut(share_id) else {
            return Ok(None);
        };

        doc.content = content.to_string();
        doc.updated_at = next_update_stamp(updated_at, doc.updated_at);
        Ok(Some(doc.clone()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_available()
    }
}
