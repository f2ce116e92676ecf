//! DAR packaging

pub mod archive;
pub mod manifest;
