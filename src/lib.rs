//! perf-doctor library
//!
//! Runs a process under instrumentation and turns what it captured into a single, self
//! contained report.

pub mod analysis;
pub mod app;
pub mod collect;
pub mod config;
pub mod decode;
pub mod error;
mod local_logger;
pub mod logger;
pub mod logging_paths;
mod prelude;
pub mod report;

pub use local_logger::clean_logger;
