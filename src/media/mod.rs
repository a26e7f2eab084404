/// Media Record Store
///
/// Relational metadata for message attachments, plus the messages and
/// profiles they hang off. The store is the single write path for media
/// rows and publishes change notifications consumed by the status monitor.

pub mod models;
pub mod store;

pub use models::*;
pub use store::MediaRecordStore;
