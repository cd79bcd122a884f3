//! # notekeep application crate
//!
//! Wires the pure domain logic of `notekeep-core` to concrete backends:
//! SQLite for users, documents, index blobs, the vector ledger, and the
//! zettel inbox; OpenAI and Ollama for embeddings and text generation.
//! The `nk` binary exposes the whole pipeline as CLI commands.

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod sqlite_store;
