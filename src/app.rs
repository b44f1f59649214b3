//! Application plumbing: command-line definitions and tracing setup.

pub mod cli;
pub mod logging;
