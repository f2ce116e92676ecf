//! Wire models for the Deploy server REST API

pub mod models;
