//! Semantic memory for watched videos.
//!
//! Recall keeps, per user, a list of short text memories (video title, summary,
//! and source URL), each tagged with a 384-dimensional fingerprint, and returns
//! the memories whose fingerprints sit closest to a query.
//!
//! # Architecture
//!
//! - **Fingerprints**: [`embedding::Normalizer`] wraps a pluggable
//!   [`embedding::EmbeddingProvider`] (local ONNX all-MiniLM-L6-v2, or offline
//!   feature hashing) and yields unit vectors or an all-zero sentinel
//! - **Records**: [`memory::records`] keeps ordered per-user metadata
//! - **Index**: [`memory::index`] stores fingerprints by position, either in a
//!   per-user SQLite file searched by exact L2 through
//!   [sqlite-vec](https://github.com/asg017/sqlite-vec), or in process memory
//!   with a cosine scan
//! - **Facade**: [`memory::service::MemoryService`] keeps records and
//!   fingerprints paired and exposes add, search, clear, and demo seeding
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite initialization and schema for the persisted index
//! - [`embedding`] — Text-to-fingerprint pipeline
//! - [`memory`] — Record store, similarity index, and the memory service

pub mod config;
pub mod db;
pub mod embedding;
pub mod memory;

pub use memory::service::{Backend, MemoryService};
pub use memory::types::{MemoryRecord, SearchResult};
