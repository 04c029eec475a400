pub mod document;
pub mod error;
pub mod habit;
pub mod schema;
pub mod stats;
pub mod store;

pub use document::{DocumentMeta, MAX_DOCUMENT_BYTES, StoredDocument, validate_pdf};
pub use error::{Result, StoreError};
pub use stats::StatCounts;
pub use store::{DB_FILE, Store, default_base_dir};
