//! # notekeep core
//!
//! Domain logic for the notekeep personal knowledge base: data models,
//! heading-boundary chunking, the per-user vector index and its
//! maintenance coordinator, retrieval, the insert-position resolver, and
//! snippet clustering.
//!
//! This crate performs no I/O of its own. Storage and model inference are
//! consumed through traits ([`store`], [`embedding`]) so the application
//! decides the backends and tests substitute fakes.
//!
//! ## Data flow
//!
//! 1. Changed documents are split into [`models::Chunk`]s by [`chunk`].
//! 2. [`maintenance`] decides per request which index operations to run,
//!    keeps the document → vector-id ledger in step with the
//!    [`index::UserIndex`], and persists the index blob.
//! 3. [`retrieval`] answers similarity queries with ranked
//!    [`models::Passage`]s, rebuilding a missing index on demand.
//! 4. [`cluster`] groups captured snippets and [`insert`] places each
//!    group into the most relevant document, computing an exact or
//!    whitespace-normalized splice offset.

pub mod chunk;
pub mod cluster;
pub mod embedding;
pub mod error;
pub mod index;
pub mod insert;
pub mod maintenance;
pub mod models;
pub mod retrieval;
pub mod store;
