//! # WFD Parameter Messages
//!
//! The Wi-Fi Display capability exchange does not use SDP. Instead, both
//! ends trade `wfd_*` parameter lines inside GET_PARAMETER/SET_PARAMETER
//! bodies:
//!
//! ```text
//! wfd_audio_codecs: AAC 00000002 00
//! wfd_video_formats: 00 00 02 08 00000040 00000000 00000000 00 0000 0000 00 none none
//! wfd_client_rtp_ports: RTP/AVP/UDP;unicast 19000 0 mode=play
//! ```
//!
//! [`WfdMessage`] models one such document as an ordered bag of optional
//! fields. [`WfdMessage::parse`] decodes a body, [`WfdMessage::as_text`]
//! renders the canonical full-value form, and
//! [`WfdMessage::param_names_as_text`] renders the names-only form used by
//! the source's M3 probe request.
//!
//! Numeric subfields are rendered as fixed-width hex without a `0x` prefix;
//! the RTP ports are the only decimal fields. Every line is CRLF terminated.

mod parser;
mod text;

use bytes::Bytes;

use crate::error::Result;

/// Bytes per EDID block.
pub const EDID_BLOCK_SIZE: usize = 128;
/// Maximum number of EDID blocks a sink may announce.
pub const EDID_BLOCK_COUNT_MAX: u32 = 256;

pub(crate) const KEY_AUDIO_CODECS: &str = "wfd_audio_codecs";
pub(crate) const KEY_VIDEO_FORMATS: &str = "wfd_video_formats";
pub(crate) const KEY_CONTENT_PROTECTION: &str = "wfd_content_protection";
pub(crate) const KEY_DISPLAY_EDID: &str = "wfd_display_edid";
pub(crate) const KEY_COUPLED_SINK: &str = "wfd_coupled_sink";
pub(crate) const KEY_TRIGGER_METHOD: &str = "wfd_trigger_method";
pub(crate) const KEY_PRESENTATION_URL: &str = "wfd_presentation_URL";
pub(crate) const KEY_CLIENT_RTP_PORTS: &str = "wfd_client_rtp_ports";
pub(crate) const KEY_ROUTE: &str = "wfd_route";
pub(crate) const KEY_I2C: &str = "wfd_I2C";
pub(crate) const KEY_AV_FORMAT_CHANGE_TIMING: &str = "wfd_av_format_change_timing";
pub(crate) const KEY_PREFERRED_DISPLAY_MODE: &str = "wfd_preferred_display_mode";
pub(crate) const KEY_STANDBY_RESUME_CAPABILITY: &str = "wfd_standby_resume_capability";
pub(crate) const KEY_STANDBY: &str = "wfd_standby";
pub(crate) const KEY_CONNECTOR_TYPE: &str = "wfd_connector_type";
pub(crate) const KEY_IDR_REQUEST: &str = "wfd_idr_request";

/// Audio elementary stream formats defined by the WFD specification.
///
/// The meaning of the accompanying modes bitmap depends on the format:
/// for LPCM it is a sampling-frequency bitmap, for AAC and AC3 it is a
/// channel-count bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Uncompressed 16-bit PCM
    Lpcm,
    /// Advanced Audio Coding
    Aac,
    /// Dolby Digital
    Ac3,
}

impl AudioFormat {
    /// The literal token used on the wire for this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Lpcm => "LPCM",
            AudioFormat::Aac => "AAC",
            AudioFormat::Ac3 => "AC3",
        }
    }

    pub(crate) fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "LPCM" => Some(AudioFormat::Lpcm),
            "AAC" => Some(AudioFormat::Aac),
            "AC3" => Some(AudioFormat::Ac3),
            _ => None,
        }
    }
}

/// One audio codec descriptor within `wfd_audio_codecs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCodec {
    /// The elementary stream format
    pub format: AudioFormat,
    /// Format-dependent modes bitmap (frequencies for LPCM, channels for
    /// AAC/AC3)
    pub modes: u32,
    /// Decoder latency in multiples of 5 ms
    pub latency: u8,
}

/// The single H.264 descriptor carried by `wfd_video_formats`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoFormats {
    /// Native resolution index: 3-bit family tag plus 5-bit bit index
    pub native: u8,
    /// Whether the sink supports a preferred display mode
    pub preferred_display_mode_supported: u8,
    /// H.264 profile bitmap
    pub profile: u8,
    /// H.264 level bitmap
    pub level: u8,
    /// CEA resolution bitmap
    pub cea_support: u32,
    /// VESA resolution bitmap
    pub vesa_support: u32,
    /// Handheld resolution bitmap
    pub hh_support: u32,
    /// Decoder latency in multiples of 5 ms
    pub latency: u8,
    /// Minimum slice size in macroblocks, 0 when slices are unsupported
    pub min_slice_size: u16,
    /// Slice encoding parameters
    pub slice_enc_params: u16,
    /// Frame-rate control support bitmap
    pub frame_rate_control: u8,
    /// Maximum horizontal resolution, 0 meaning not announced
    pub max_hres: u32,
    /// Maximum vertical resolution, 0 meaning not announced
    pub max_vres: u32,
}

/// HDCP content-protection versions negotiable over WFD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdcpVersion {
    /// Content protection is not used
    None,
    /// HDCP system 2.0
    V2_0,
    /// HDCP system 2.1
    V2_1,
}

impl HdcpVersion {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            HdcpVersion::None => "none",
            HdcpVersion::V2_0 => "HDCP2.0",
            HdcpVersion::V2_1 => "HDCP2.1",
        }
    }
}

/// `wfd_content_protection`: HDCP version plus the TCP control port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentProtection {
    /// Negotiated HDCP version
    pub hdcp: HdcpVersion,
    /// TCP port of the HDCP session, absent when `hdcp` is `None`
    pub tcp_port: Option<u16>,
}

/// `wfd_display_edid`: raw display identification data shared by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEdid {
    /// Whether the sink shares EDID data at all
    pub supported: bool,
    /// Number of 128-byte blocks, within `[1, 256]` when payload present
    pub block_count: u32,
    /// The decoded EDID bytes, `block_count * 128` long
    pub payload: Option<Bytes>,
}

/// Capabilities of a coupled (paired) sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoupledSinkCap {
    /// Coupled sink status code
    pub status: u8,
    /// Address of the coupled sink, if any
    pub sink_address: Option<String>,
}

/// `wfd_coupled_sink`: present with or without a capability block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoupledSink {
    /// The coupled sink capability, absent when the sink reports `none`
    pub cap: Option<CoupledSinkCap>,
}

/// RTSP methods a source may ask the sink to initiate via
/// `wfd_trigger_method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMethod {
    /// Sink should send SETUP
    Setup,
    /// Sink should send PAUSE
    Pause,
    /// Sink should send PLAY
    Play,
    /// Sink should send TEARDOWN
    Teardown,
}

impl TriggerMethod {
    /// The literal token used on the wire for this trigger.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMethod::Setup => "SETUP",
            TriggerMethod::Pause => "PAUSE",
            TriggerMethod::Play => "PLAY",
            TriggerMethod::Teardown => "TEARDOWN",
        }
    }

    pub(crate) fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "SETUP" => Some(TriggerMethod::Setup),
            "PAUSE" => Some(TriggerMethod::Pause),
            "PLAY" => Some(TriggerMethod::Play),
            "TEARDOWN" => Some(TriggerMethod::Teardown),
            _ => None,
        }
    }
}

/// `wfd_presentation_URL`: up to two presentation URLs for stream id 0/1.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresentationUrl {
    /// URL for stream id 0
    pub url0: Option<String>,
    /// URL for stream id 1
    pub url1: Option<String>,
}

/// `wfd_client_rtp_ports`: the sink's two RTP receive ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRtpPorts {
    /// Transport profile string, e.g. `RTP/AVP/UDP;unicast`
    pub profile: String,
    /// Primary RTP port (decimal on the wire)
    pub rtp_port0: u16,
    /// Secondary RTP port, 0 when unused (decimal on the wire)
    pub rtp_port1: u16,
    /// Mode string, e.g. `mode=play`
    pub mode: String,
}

/// `wfd_route`: where the sink should render audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Destination word, `primary` or `secondary`
    pub destination: String,
}

/// `wfd_I2C`: sink-side I2C bus access for HDMI pass-through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2c {
    /// I2C port number, absent when unsupported
    pub port: Option<u32>,
}

/// `wfd_av_format_change_timing`: PTS/DTS of a codec switch point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvFormatChangeTiming {
    /// Presentation timestamp (90 kHz units)
    pub pts: u64,
    /// Decode timestamp (90 kHz units)
    pub dts: u64,
}

/// `wfd_preferred_display_mode`: raw timing parameters of the mode the
/// sink prefers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreferredDisplayMode {
    /// Whether the sink announced a preferred mode at all
    pub supported: bool,
    /// Pixel clock in 10 kHz units
    pub p_clock: u64,
    /// Active horizontal pixels
    pub h: u16,
    /// Horizontal blanking
    pub hb: u16,
    /// HSYNC polarity and offset
    pub hspol_hsoff: u16,
    /// HSYNC width
    pub hsw: u16,
    /// Active vertical lines
    pub v: u16,
    /// Vertical blanking
    pub vb: u16,
    /// VSYNC polarity and offset
    pub vspol_vsoff: u16,
    /// VSYNC width
    pub vsw: u16,
    /// 3D vertical blanking
    pub vbs3d: u8,
    /// 2D/3D mode flags
    pub v2d_s3d_modes: u8,
    /// Pixel depth
    pub p_depth: u8,
}

/// `wfd_standby_resume_capability`: whether the sink can enter standby
/// and resume the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandbyResumeCapability {
    /// `supported` on the wire when true, `none` otherwise
    pub supported: bool,
}

/// `wfd_connector_type`: physical connector of the sink display, 0 when
/// not announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorType {
    /// Connector code from the WFD connector table
    pub connector: u8,
}

/// A parsed WFD capability/control document.
///
/// Each field is present-or-absent rather than part of a fixed record; a
/// field being `Some` (or `true` for the bare flags) means the
/// corresponding `wfd_*` line appeared in the body, even if its value part
/// was empty. Unknown keys are ignored on input for forward compatibility.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WfdMessage {
    /// `wfd_audio_codecs`, one descriptor per supported format
    pub audio_codecs: Option<Vec<AudioCodec>>,
    /// `wfd_video_formats`
    pub video_formats: Option<VideoFormats>,
    /// `wfd_content_protection`
    pub content_protection: Option<ContentProtection>,
    /// `wfd_display_edid`
    pub display_edid: Option<DisplayEdid>,
    /// `wfd_coupled_sink`
    pub coupled_sink: Option<CoupledSink>,
    /// `wfd_trigger_method`
    pub trigger_method: Option<TriggerMethod>,
    /// `wfd_presentation_URL`
    pub presentation_url: Option<PresentationUrl>,
    /// `wfd_client_rtp_ports`
    pub client_rtp_ports: Option<ClientRtpPorts>,
    /// `wfd_route`
    pub route: Option<Route>,
    /// `wfd_I2C`
    pub i2c: Option<I2c>,
    /// `wfd_av_format_change_timing`
    pub av_format_change_timing: Option<AvFormatChangeTiming>,
    /// `wfd_preferred_display_mode`
    pub preferred_display_mode: Option<PreferredDisplayMode>,
    /// `wfd_standby_resume_capability`
    pub standby_resume_capability: Option<StandbyResumeCapability>,
    /// `wfd_standby` flag line
    pub standby: bool,
    /// `wfd_connector_type`
    pub connector_type: Option<ConnectorType>,
    /// `wfd_idr_request` flag line
    pub idr_request: bool,
}

impl WfdMessage {
    /// Creates an empty message with no fields present.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a WFD parameter body.
    ///
    /// Lines are split on CR/LF. Unknown keys are skipped; field-level
    /// oddities are elided silently the way deployed sinks expect. Only a
    /// failed top-level `key: value` split is an error.
    pub fn parse(data: &[u8]) -> Result<Self> {
        parser::parse(data)
    }

    /// Renders the canonical full-value form, one CRLF-terminated line per
    /// present field. This is the body format of the source's M4 request
    /// and of the sink's M3 response.
    pub fn as_text(&self) -> String {
        text::as_text(self)
    }

    /// Renders only the parameter names of the present fields, one per
    /// line. This is the body format of the source's M3 probe request.
    pub fn param_names_as_text(&self) -> String {
        text::param_names_as_text(self)
    }
}
