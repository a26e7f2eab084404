/// Whisperbox - anonymous messaging with expiring media
///
/// Users claim a handle, share a public link, and receive anonymous
/// text/media messages. Media is retained for a bounded window and then
/// reclaimed by the cleanup engine.

pub mod api;
pub mod blob_store;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod expiration;
pub mod jobs;
pub mod media;
pub mod metrics;
pub mod monitor;
pub mod rate_limit;
pub mod server;
pub mod validation;
