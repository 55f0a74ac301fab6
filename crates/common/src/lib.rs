//! Common error and logging support shared across Seesaw Rust components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
