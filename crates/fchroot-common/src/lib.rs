//! # fchroot-common
//!
//! Shared types, error definitions, configuration, and constants used
//! across the fchroot workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and performs no filesystem or kernel operations itself.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
