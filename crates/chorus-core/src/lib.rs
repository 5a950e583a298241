//! # chorus-core
//!
//! Core types, traits, configuration, persona routing, and error handling for Chorus.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod persona;
pub mod prompt;
pub mod reply;
pub mod traits;

pub use config::shellexpand;
