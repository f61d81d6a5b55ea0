//! Outbound adapters implementing domain ports.
//!
//! - **persistence**: PostgreSQL repositories using Diesel ORM
//! - **memory**: in-process repositories for development and tests
//! - **rag**: HTTP client for the answer-generation service
//! - **reindex**: HTTP client for the indexing service
//! - **oauth**: Google sign-in
//!
//! Adapters translate between domain types and wire or row formats. They
//! contain no business logic.

pub mod memory;
pub mod oauth;
pub mod persistence;
pub mod rag;
pub mod reindex;
