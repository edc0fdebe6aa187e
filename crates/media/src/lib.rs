//! Media pipeline: upload store, MIME detect, TTL cleanup.

pub mod cleanup;
pub mod mime;
pub mod store;

pub use store::{StoreError, StoredUpload, UploadStore};
