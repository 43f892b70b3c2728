//! CLI command implementations for the sluice driver proxy.

pub mod check;
pub mod resolve;
pub mod rewrite;
