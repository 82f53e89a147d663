//! # Session Lifecycle
//!
//! Per-sink session state: the negotiation state machine, keepalive and
//! statistics timers, and the transport port pool.

mod client;
mod ports;
mod stats;

pub use client::{
    SessionEvents, SessionHandler, SessionState, SourceSession, KEEPALIVE_BUDGET,
    KEEPALIVE_INTERVAL, REQUEST_TIMEOUT,
};
pub use ports::{PortPair, PortPool};
pub use stats::{RtpStats, StatsCollector, STATS_INTERVAL};
