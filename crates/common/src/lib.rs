//! Common utilities and shared types for pollwave.
//!
//! This crate provides foundational components used across all pollwave crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Fingerprints**: Peppered one-way hashes for identity channels
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use pollwave_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod id;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use fingerprint::hash_fingerprint;
pub use id::IdGenerator;
