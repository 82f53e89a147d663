//! RTSP message codec and connection handling for the WFD control channel.

mod connection;
mod message;

pub use connection::Connection;
pub use message::{
    content_length, find_head_end, parse_message, status_text, Method, Request, Response,
    RtspMessage, RTSP_VERSION, WFD_FEATURE,
};
