//! Shared test utilities for cellblock
//!
//! - Kernels wired with the script executor
//! - An engine wrapper that runs a hook after every event-loop iteration
//! - Scenario files in temporary directories

pub mod scenario_files;
