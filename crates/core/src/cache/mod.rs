//! SQLite-backed response store.
//!
//! This module provides a persistent store of responses grouped into named
//! generations, using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Request keys hashed with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Whole-generation deletion

pub mod connection;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use storage::CacheStorage;
