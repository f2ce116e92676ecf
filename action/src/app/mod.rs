//! Action entry points

pub mod options;
pub mod outputs;
pub mod run;
