//! Durable snapshot storage.

pub mod file_store;
