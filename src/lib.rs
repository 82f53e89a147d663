//! # wfdio - Wi-Fi Display Source Toolkit
//!
//! `wfdio` implements the source side of a Wi-Fi Display (Miracast)
//! session: the RTSP-based WFD capability negotiation (messages M1..M16)
//! and the construction and live reconfiguration of the MPEG-TS/RTP
//! streaming pipeline that mirrors a screen to a sink.
//!
//! ## Features
//!
//! ### WFD Negotiation
//! - `wfd_*` parameter-line codec (the WFD dialect replaces SDP)
//! - Capability model with intersection rules for audio codec,
//!   resolution, profile and level
//! - Source-initiated state machine: M1 OPTIONS, M3 capability probe,
//!   M4 commit, M5 SETUP trigger, M16 keepalive
//!
//! ### Streaming
//! - Pipeline builder for selectable capture sources (X11, XVideo,
//!   camera, test pattern, Wayland, file playback) feeding a WFD-mode
//!   MPEG-TS muxer and an RTP MP2T payloader
//! - Live hot-swap of a pre-recorded file into the running muxer chain
//!   with unbroken RTP sequence numbers
//! - RTP transmit statistics with RTCP receiver-report merging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use wfdio::config::SourceConfig;
//! use wfdio::graph::{testing::TestGraph, MediaGraph};
//! use wfdio::rtsp::Connection;
//! use wfdio::session::SourceSession;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let graph: Arc<dyn MediaGraph> = Arc::new(TestGraph::new());
//!     let mut config = SourceConfig::default();
//!     config.host_address = "192.168.49.1".to_string();
//!
//!     let listener = TcpListener::bind("0.0.0.0:7236").await?;
//!     let (stream, _) = listener.accept().await?;
//!
//!     let mut session = SourceSession::new(Connection::new(stream)?, config, graph);
//!     session.start().await?;
//!     session.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `message`: the `wfd_*` parameter-line codec
//! - `caps`: capability bitmaps, resolution tables and intersection
//! - `rtsp`: RTSP request/response framing and the sink connection
//! - `session`: per-sink state machine, keepalive, statistics, ports
//! - `graph`: the pluggable media-graph runtime interface
//! - `pipeline`: graph construction and the direct-stream hot-swap
//! - `error`: error types and the crate-wide `Result`
//! - `config`: the source configuration surface

/// Capability model and intersection rules
pub mod caps;

/// Configuration surface of the source
pub mod config;

/// Error types and utilities
pub mod error;

/// Media-graph runtime interface
pub mod graph;

/// WFD parameter message codec
pub mod message;

/// Streaming pipeline construction and hot-swap
pub mod pipeline;

/// RTSP framing and connection handling
pub mod rtsp;

/// Per-sink session lifecycle
pub mod session;

pub use error::{Result, WfdError};
