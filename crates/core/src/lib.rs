//! Core types and installation machinery for godyl.
//!
//! The crate is organised leaves first:
//!
//! - [`platform`] - host detection and asset-name parsing
//! - [`version`] - probing installed binaries and comparing versions
//! - [`matcher`] - scoring release assets against platform requirements
//! - [`cache`] - persistent record of installed tools
//! - [`sources`] - the provider trait every source kind implements
//! - [`tool`] - the manifest model, defaults and the resolution pipeline
//! - [`processor`] - bounded-parallel execution over many tools

pub mod cache;
pub mod download;
mod error;
pub mod fsutil;
pub mod install;
pub mod matcher;
pub mod paths;
pub mod platform;
pub mod processor;
pub mod shell;
pub mod sources;
pub mod template;
pub mod tool;
pub mod unmarshal;
pub mod version;

pub use error::{Error, Result};

/// Version of the godyl crates, embedded at build time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
