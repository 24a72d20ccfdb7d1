//! Artifact Depot - Backend Library
//!
//! Multi-format artifact repository engine: hosted, proxy and group
//! repositories over a local filesystem, with checksum side files,
//! generated format metadata and a per-repository trash.

#[macro_use]
mod macros;

pub mod api;
pub mod config;
pub mod error;
pub mod formats;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
