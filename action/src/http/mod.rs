//! Deploy server HTTP client

pub mod client;
pub mod deployit;
