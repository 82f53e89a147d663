//! # Error Types
//!
//! This module provides the error types used throughout the wfdio library.
//! It defines a central error type `WfdError` that encapsulates all failure
//! classes of a Wi-Fi Display source session: message parsing, capability
//! negotiation, pipeline construction, transport and keepalive handling.
//!
//! ## Example Usage
//!
//! ```rust
//! use wfdio::error::{Result, WfdError};
//!
//! fn check_body(data: &[u8]) -> Result<()> {
//!     if data.is_empty() {
//!         return Err(WfdError::MalformedHeader("empty parameter body".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

use std::num::ParseIntError;
use thiserror::Error;

/// Primary error type for the wfdio library
#[derive(Error, Debug)]
pub enum WfdError {
    /// I/O errors that occur during network operations
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A WFD parameter line failed the top-level `key: value` split
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Source and sink capabilities have an empty intersection
    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    /// Element creation or link failure while building the media graph
    #[error("pipeline build failed: {0}")]
    BuildFailed(String),

    /// Direct-stream discovery yielded no usable source or demuxer
    #[error("type detection failed: {0}")]
    TypeDetectionFailed(String),

    /// RTSP send/receive failure on the session connection
    #[error("transport failure: {0}")]
    Transport(String),

    /// The sink missed the keepalive round-trip budget
    #[error("keepalive timed out")]
    KeepaliveTimeout,

    /// A hot-swap was refused because another swap is in flight or a
    /// graph precondition does not hold
    #[error("swap aborted: {0}")]
    SwapAborted(String),

    /// Errors that occur during integer parsing
    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

/// A specialized Result type for wfdio operations.
///
/// This type is used throughout the wfdio library to handle operations
/// that can produce a `WfdError`.
pub type Result<T> = std::result::Result<T, WfdError>;
