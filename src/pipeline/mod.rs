//! # Streaming Pipeline
//!
//! Construction of the capture -> encode -> TS-mux -> RTP graph and the
//! live hot-swap that substitutes a file pipeline into the running muxer
//! chain without disturbing the RTP payloader.

mod builder;
mod discover;
mod swap;

pub use builder::{
    set_pipeline_state, Pipeline, PipelineBuilder, AUDIO_PID_PAD, RTP_PAYLOAD_TYPE, VIDEO_PID_PAD,
};
pub use discover::{discover, Discovery};
pub use swap::{DirectStreamer, SwapHandle, FILL_EOS_EVENT};
