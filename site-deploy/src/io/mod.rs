//! I/O helpers for the deploy pipeline.

pub mod command;
pub mod config;
pub mod git;
pub mod lock;
pub mod process;
pub mod tools;
