//! Stored report templates: blob storage, metadata rows and the HTTP
//! endpoints that upload them and merge content into them.

pub mod handlers;
pub mod repository;
pub mod store;
