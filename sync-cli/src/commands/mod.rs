//! CLI command implementations.

pub mod add;
pub mod complete;
pub mod delete;
pub mod demo;
pub mod list;
