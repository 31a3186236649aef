//! Serial link error types

use thiserror::Error;

/// Errors raised by a [`SerialLink`](crate::hardware::SerialLink) implementation
#[derive(Error, Debug)]
pub enum CommError {
    /// The port could not be opened
    #[error("cannot open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// An operation needed an open port
    #[error("serial port {port} is closed")]
    NotOpen { port: String },

    /// Read or write failure on an open port
    #[error("I/O error on {port}: {source}")]
    Io {
        port: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommError {
    pub fn open(port: impl Into<String>, source: serialport::Error) -> Self {
        Self::Open {
            port: port.into(),
            source,
        }
    }

    pub fn not_open(port: impl Into<String>) -> Self {
        Self::NotOpen { port: port.into() }
    }

    pub fn io(port: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            port: port.into(),
            source,
        }
    }

    /// Port name the error refers to
    pub fn port(&self) -> &str {
        match self {
            CommError::Open { port, .. } | CommError::NotOpen { port } | CommError::Io { port, .. } => port,
        }
    }
}

/// Result type for serial link operations
pub type CommResult<T> = Result<T, CommError>;
