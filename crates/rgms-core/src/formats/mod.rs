//! # Formats Module
//!
//! Serialization of tracker state.
//!
//! This module contains:
//! - Binary snapshot format (magic + version byte + postcard payload)
//!
//! Note: File I/O operations remain in the app layer (apps/rgms).
//! This module only handles format conversion (pure transformations).

mod persistence;

pub use persistence::*;
