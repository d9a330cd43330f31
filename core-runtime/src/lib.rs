//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the document connector:
//! - Logging and tracing infrastructure
//! - Connector configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the provider crates depend
//! on. It establishes the logging conventions and the validated configuration
//! surface (batch size, size ceiling, retry policy, scope) used throughout the
//! system.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
