//! Library half of the `subgate` operator CLI.
//!
//! The binary in `main.rs` is a thin dispatcher over these modules; they live
//! in a library so the config loader can be exercised from integration tests.

pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;
pub mod output;
