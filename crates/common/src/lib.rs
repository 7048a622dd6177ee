//! Common utilities and shared types for LiveNest.
//!
//! This crate provides foundational components used across all LiveNest crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Storage**: Media storage backends via [`MediaStore`]
//!
//! # Example
//!
//! ```no_run
//! use livenest_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Listening on {}:{} ({id})", config.server.host, config.server.port);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};
pub use id::IdGenerator;
pub use storage::{LocalStorage, MediaStore, StoredMedia};
