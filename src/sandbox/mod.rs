//! Sandbox module containing all execution-related components.

pub mod config;
pub mod epoch;
pub mod executor;
pub mod io;
pub mod limits;
pub mod loader;
