//! `cdp-domain`: shared types for the cdptool crates.
//!
//! Holds the server descriptor model and its line-oriented config file
//! format, the TOML tool settings, the shared [`error::Error`] taxonomy and
//! the structured [`trace::TraceEvent`] log records.

pub mod error;
pub mod server;
pub mod settings;
pub mod trace;

pub use error::{Error, Result};
pub use server::{ProtocolVersion, ServerDescriptor};
pub use settings::Settings;
