//! # chorus-memory
//!
//! Persistent storage for Chorus (SQLite-backed).

pub mod store;

pub use store::Store;
