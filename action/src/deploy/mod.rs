//! Deployment module

pub mod api;
pub mod fsm;
pub mod ids;
pub mod task;
pub mod workflow;
