//! Common error types for Seesaw Rust components.

use std::fmt;

/// A specialized Result type for Seesaw operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Seesaw operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An external program required by the node could not be started.
    #[error("failed to launch {program}: {source}")]
    CommandLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ARP error: {0}")]
    Arp(String),

    #[error("Interface error: {0}")]
    Interface(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new command launch error.
    pub fn command_launch(program: impl Into<String>, source: std::io::Error) -> Self {
        Error::CommandLaunch {
            program: program.into(),
            source,
        }
    }

    /// Create a new ARP error.
    pub fn arp(msg: impl fmt::Display) -> Self {
        Error::Arp(msg.to_string())
    }

    /// Create a new interface error.
    pub fn interface(msg: impl fmt::Display) -> Self {
        Error::Interface(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }
}
