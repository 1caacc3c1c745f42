//! Parley: channel message translation layer.
//!
//! Normalizes channel payloads into generic conversation events, serializes
//! generic bot responses into each channel's wire format, and packs button
//! choices into compact tokens. Every operation is a pure function of its
//! inputs; the only shared state is the read-only connector registry.

pub mod channels;
pub mod choice;
pub mod config;
pub mod content;
pub mod error;
pub mod event;
pub mod init;

pub use error::{Error, Result};
