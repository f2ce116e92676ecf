//! Deploy action library
//!
//! Packaging, publishing and deployment of DAR archives against a Deploy
//! server REST API.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod package;
pub mod utils;
