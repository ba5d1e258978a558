//! Storage module
//!
//! On-device persistence of the last known collections.

pub mod cache_store;

pub use cache_store::CacheStore;
