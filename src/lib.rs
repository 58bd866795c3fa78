#![allow(clippy::multiple_crate_versions)]

pub mod archive;
pub mod cache;
pub mod checksum;
pub mod config;
pub mod error;
pub mod fetch;
pub mod instance;
pub mod manifest;
pub mod package;
pub mod paths;
pub mod resolver;
pub mod retry;
pub mod sync;

pub use error::{Result, UpdaterError};
