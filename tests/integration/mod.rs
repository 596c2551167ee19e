//! Integration tests for cellblock
//!
//! These tests drive the capture core through real kernels, the magics and
//! the binary.

#[path = "../common/mod.rs"]
pub mod common;

pub mod block_magic;
pub mod capture_replay;
pub mod deferred_engine;
