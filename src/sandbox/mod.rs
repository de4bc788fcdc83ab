//! Sandbox module containing all execution-related components.

pub mod config;
pub mod executor;
pub mod io;
pub mod isolation;
pub mod limits;
pub mod outcome;
pub mod resolver;
pub mod runner;
pub mod workspace;
pub mod wrapper;
