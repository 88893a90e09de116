//! # RGMS Library
//!
//! This library exposes the RGMS application modules for testing and
//! integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod forms;
pub mod store;
pub mod views;

// Re-export rgms_core for convenience
pub use rgms_core;
