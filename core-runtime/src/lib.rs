//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the photo sync tool:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the binary wires together before
//! any folder is touched. It establishes the logging conventions and the
//! validated run configuration used throughout the system.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
