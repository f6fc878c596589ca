//! CLI command implementations
//!
//! The `unified` module contains command implementations that work with any
//! `FlashDevice` implementation, so the same read/program/erase/verify paths
//! are used for every sector device backend.

mod list;
pub mod unified;

pub use list::list_backends;
