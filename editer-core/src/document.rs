//! Document records.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A stored text document.
///
/// `id` is whatever key the storage backend assigned; clients only ever
/// address a document through its `share_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub share_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates a fresh record with both timestamps set to `now`.
    pub fn new(
        id: impl Into<String>,
        share_id: impl Into<String>,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            share_id: share_id.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Wire shape returned to API clients.
///
/// Timestamps are ISO-8601 in UTC with a `Z` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: String,
    pub share_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            share_id: doc.share_id,
            content: doc.content,
            created_at: format_timestamp(&doc.created_at),
            updated_at: format_timestamp(&doc.updated_at),
        }
    }
}

/// Formats a timestamp as RFC 3339 UTC, keeping sub-second precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
