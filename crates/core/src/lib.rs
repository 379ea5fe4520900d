//! Core types and shared functionality for the DougCast offline worker.
//!
//! This crate provides:
//! - Request/response model
//! - Response store with SQLite backend, grouped into generations
//! - Store manager owning the current generation
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod store;

pub use cache::{CacheDb, CacheStorage};
pub use config::{AppConfig, ConfigError, Manifest};
pub use error::Error;
pub use http::{Destination, Method, Request, RequestKey, RequestMode, Response, ResponseType};
pub use store::{Generation, GenerationId, StoreManager};
