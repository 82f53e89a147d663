//! Source configuration.
//!
//! [`SourceConfig`] is the complete configuration surface of the source:
//! capture selection, audio device tuning, encoder factory names, MTU and
//! the capability bitmaps advertised during negotiation. Defaults match a
//! mirroring deployment with a test video source; a handful of fields can
//! be overridden through `WFDIO_*` environment variables, and a global
//! copy is kept for embedders that configure once at startup.

use lazy_static::lazy_static;
use std::env;
use std::sync::RwLock;

use crate::caps::{ResolutionFamily, AUDIO_AAC};

/// Session timeout in seconds; keepalives run at `WFD_TIMEOUT - 5`.
pub const WFD_TIMEOUT_SECS: u64 = 60;

/// Default receive buffer size for the session connection.
pub const DEFAULT_BUFFER_SIZE: usize = 0x80000;

/// UDP lower transport.
pub const TRANSPORT_UDP: u32 = 1 << 0;
/// Multicast UDP lower transport.
pub const TRANSPORT_UDP_MCAST: u32 = 1 << 1;
/// TCP lower transport.
pub const TRANSPORT_TCP: u32 = 1 << 2;

lazy_static! {
    static ref CONFIG: RwLock<SourceConfig> = RwLock::new(SourceConfig::from_env());
}

/// The selectable source stage of the video pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSrcVariant {
    /// X11 screen capture
    XCapture,
    /// XVideo screen capture with a hardware colorspace
    XvCapture,
    /// Camera capture
    Camera,
    /// Synthetic test pattern
    VideoTest,
    /// Wayland surface capture
    Wayland,
    /// Demuxed playback of a pre-recorded file at the given URI
    FileDemux(String),
}

/// Complete configuration of a WFD source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Which video source stage the pipeline builder instantiates
    pub video_src_variant: VideoSrcVariant,
    /// Audio capture device name
    pub audio_device: String,
    /// Audio capture latency time in microseconds
    pub audio_latency_time: u64,
    /// Audio capture buffer time in microseconds
    pub audio_buffer_time: u64,
    /// Whether the audio source timestamps its buffers
    pub audio_do_timestamp: bool,
    /// MTU handed to the RTP payloader
    pub mtu_size: u32,
    /// Factory name of the H.264 encoder
    pub video_encoder_name: String,
    /// Factory name of the AAC encoder
    pub audio_encoder_aac_name: String,
    /// Factory name of the AC3 encoder
    pub audio_encoder_ac3_name: String,
    /// Append every muxed TS buffer to a debug dump file
    pub dump_ts: bool,
    /// Width and height committed in M4, updated by negotiation
    pub negotiated_resolution: (u32, u32),
    /// Audio codec bitmap the source advertises
    pub audio_codec: u8,
    /// Address the source announces in the presentation URL
    pub host_address: String,
    /// Resolution bitmap the source supports within its native family
    pub video_resolution_supported: u32,
    /// The resolution family the source captures in
    pub video_native_resolution: ResolutionFamily,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            video_src_variant: VideoSrcVariant::VideoTest,
            audio_device: "alsa_output.1.analog-stereo.monitor".to_string(),
            audio_latency_time: 10_000,
            audio_buffer_time: 200_000,
            audio_do_timestamp: false,
            mtu_size: 1400,
            video_encoder_name: "omxh264enc".to_string(),
            audio_encoder_aac_name: "avenc_aac".to_string(),
            audio_encoder_ac3_name: "avenc_ac3".to_string(),
            dump_ts: false,
            negotiated_resolution: (640, 480),
            audio_codec: AUDIO_AAC,
            host_address: "127.0.0.1".to_string(),
            // 640x480p60, the mandatory CEA mode
            video_resolution_supported: 1 << 1,
            video_native_resolution: ResolutionFamily::Cea,
        }
    }
}

impl SourceConfig {
    /// Defaults with `WFDIO_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("WFDIO_HOST_ADDRESS") {
            config.host_address = host;
        }
        if let Ok(device) = env::var("WFDIO_AUDIO_DEVICE") {
            config.audio_device = device;
        }
        if let Ok(mtu) = env::var("WFDIO_MTU") {
            if let Ok(mtu) = mtu.parse() {
                config.mtu_size = mtu;
            }
        }
        if let Ok(encoder) = env::var("WFDIO_VIDEO_ENCODER") {
            config.video_encoder_name = encoder;
        }
        if env::var("WFDIO_DUMP_TS").is_ok() {
            config.dump_ts = true;
        }

        config
    }

    /// Reloads the global configuration from the environment.
    pub fn reload() {
        let new_config = SourceConfig::from_env();
        if let Ok(mut config) = CONFIG.write() {
            *config = new_config;
        }
    }
}

/// Returns a copy of the global configuration.
pub fn global() -> SourceConfig {
    CONFIG.read().unwrap().clone()
}
