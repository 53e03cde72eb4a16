//! Editer Core Library
//!
//! Share-id generation, the document store contract and the document
//! service that ties them together.

pub mod document;
pub mod hrid;
pub mod service;
pub mod store;

pub use document::{format_timestamp, Document, DocumentResponse};
pub use hrid::{
    is_url_safe, normalize_share_id, random_seed, GeneratorError, HridGenerator,
    ShareIdGenerator, Vocabulary,
};
pub use service::{DocumentService, ServiceError, DEFAULT_MAX_CREATE_ATTEMPTS};
pub use store::{
    check_content_length, next_update_stamp, DocumentStore, MemoryDocumentStore, StoreError,
    DEFAULT_MAX_CONTENT_LENGTH,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
