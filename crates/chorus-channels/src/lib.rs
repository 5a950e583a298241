//! # chorus-channels
//!
//! The WhatsApp transport for Chorus and the SQLite store that keeps its
//! protocol session between runs.

pub mod session_store;
pub mod whatsapp;

pub use session_store::SessionStore;
pub use whatsapp::WhatsAppTransport;
