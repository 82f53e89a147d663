//! # Capability Model
//!
//! Value types for every negotiable dimension of a WFD session and the
//! intersection rules that reduce the source and sink capability sets to
//! a single [`NegotiatedConfig`].
//!
//! All WFD bitmaps share one convention: bit 0 is the "unknown" point of
//! the underlying enumeration and carries no meaning; defined values start
//! at bit 1. Intersections are plain bitwise ANDs; preference scans run
//! MSB-first so the highest-valued mode both ends support wins.

mod tables;

use log::debug;

use crate::error::{Result, WfdError};
use crate::message::{
    AudioCodec, AudioFormat, ClientRtpPorts, ContentProtection, HdcpVersion, PresentationUrl,
    VideoFormats, WfdMessage,
};

/// LPCM bit in the audio codec bitmap.
pub const AUDIO_LPCM: u8 = 1 << 1;
/// AAC bit in the audio codec bitmap.
pub const AUDIO_AAC: u8 = 1 << 2;
/// AC3 bit in the audio codec bitmap.
pub const AUDIO_AC3: u8 = 1 << 3;

/// 44.1 kHz bit in the LPCM modes bitmap.
pub const FREQ_44100: u32 = 1 << 1;
/// 48 kHz bit in the LPCM modes bitmap.
pub const FREQ_48000: u32 = 1 << 2;

/// Two-channel bit in the AAC/AC3 modes bitmap.
pub const CHANNEL_2: u32 = 1 << 1;
/// Four-channel bit in the AAC/AC3 modes bitmap.
pub const CHANNEL_4: u32 = 1 << 2;
/// Six-channel bit in the AAC/AC3 modes bitmap.
pub const CHANNEL_6: u32 = 1 << 3;
/// Eight-channel bit in the AAC/AC3 modes bitmap.
pub const CHANNEL_8: u32 = 1 << 4;

/// H.264 Constrained Baseline profile bit.
pub const H264_PROFILE_BASE: u8 = 1 << 1;
/// H.264 level 3.1 bit.
pub const H264_LEVEL_3_1: u8 = 1 << 1;

/// The three disjoint resolution tables of the WFD specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFamily {
    /// CEA television modes
    Cea,
    /// VESA desktop modes
    Vesa,
    /// Handheld modes
    Hh,
}

impl ResolutionFamily {
    /// The 3-bit family tag used in the `native` field of
    /// `wfd_video_formats`.
    pub fn tag(&self) -> u8 {
        match self {
            ResolutionFamily::Cea => 0,
            ResolutionFamily::Vesa => 1,
            ResolutionFamily::Hh => 2,
        }
    }

    /// Decodes the family tag from a `native` field value.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag & 0x07 {
            0 => Some(ResolutionFamily::Cea),
            1 => Some(ResolutionFamily::Vesa),
            2 => Some(ResolutionFamily::Hh),
            _ => None,
        }
    }
}

/// One video mode from the WFD resolution tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoMode {
    /// Horizontal resolution in pixels
    pub width: u32,
    /// Vertical resolution in pixels
    pub height: u32,
    /// Frames (or fields when interleaved) per second
    pub framerate: u32,
    /// Whether the mode is interlaced
    pub interleaved: bool,
}

/// Looks up the mode behind a single bit index within a family.
///
/// Returns `None` for bit 0 and for bits past the end of the family table.
pub fn lookup_mode(family: ResolutionFamily, bit_index: u32) -> Option<VideoMode> {
    if bit_index == 0 {
        return None;
    }
    let table: &[VideoMode] = match family {
        ResolutionFamily::Cea => &tables::CEA_MODES,
        ResolutionFamily::Vesa => &tables::VESA_MODES,
        ResolutionFamily::Hh => &tables::HH_MODES,
    };
    table.get(bit_index as usize - 1).copied()
}

/// Number of defined bits in a family's bitmap.
pub fn family_mode_count(family: ResolutionFamily) -> u32 {
    match family {
        ResolutionFamily::Cea => tables::CEA_MODES.len() as u32,
        ResolutionFamily::Vesa => tables::VESA_MODES.len() as u32,
        ResolutionFamily::Hh => tables::HH_MODES.len() as u32,
    }
}

/// Intersects two capability bitmaps. Commutative and idempotent by
/// construction.
pub fn intersect(a: u32, b: u32) -> u32 {
    a & b
}

/// Picks the highest bit set in both 8-bit bitmaps, scanning MSB-first.
pub fn preferred_bit8(src: u8, sink: u8) -> Option<u8> {
    for i in (0..8).rev() {
        let bit = 1u8 << i;
        if src & bit != 0 && sink & bit != 0 {
            return Some(bit);
        }
    }
    None
}

/// Picks the highest bit set in both 32-bit bitmaps, scanning MSB-first.
pub fn preferred_bit32(src: u32, sink: u32) -> Option<u32> {
    for i in (0..32).rev() {
        let bit = 1u32 << i;
        if src & bit != 0 && sink & bit != 0 {
            return Some(bit);
        }
    }
    None
}

/// Source-side capability configuration fed into negotiation.
#[derive(Debug, Clone)]
pub struct SourceCaps {
    /// Audio codec bitmap the source can encode
    pub audio_codecs: u8,
    /// Resolution bitmap within the native family
    pub video_resolution_supported: u32,
    /// The family the source captures in
    pub video_native_family: ResolutionFamily,
}

/// Preferred display resolution recovered from an EDID block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdidResolution {
    /// Horizontal pixels of the first detailed timing descriptor
    pub hres: u32,
    /// Vertical pixels of the first detailed timing descriptor
    pub vres: u32,
}

/// The sink capability set recovered from an M3 response body.
#[derive(Debug, Clone, Default)]
pub struct SinkCaps {
    /// Audio descriptors the sink can decode
    pub audio: Vec<AudioCodec>,
    /// The sink's H.264 descriptor
    pub video: Option<VideoFormats>,
    /// The sink's RTP receive ports
    pub rtp_ports: Option<ClientRtpPorts>,
    /// Preferred resolution from EDID, when shared and plausible
    pub edid: Option<EdidResolution>,
    /// HDCP capability, when announced
    pub protection: Option<ContentProtection>,
}

impl SinkCaps {
    /// Extracts the negotiable dimensions from a parsed M3 response.
    pub fn from_message(msg: &WfdMessage) -> Self {
        let edid = msg
            .display_edid
            .as_ref()
            .filter(|e| e.supported)
            .and_then(|e| e.payload.as_ref())
            .and_then(|payload| decode_edid_resolution(payload));

        SinkCaps {
            audio: msg.audio_codecs.clone().unwrap_or_default(),
            video: msg.video_formats.clone(),
            rtp_ports: msg.client_rtp_ports.clone(),
            edid,
            protection: msg.content_protection.clone(),
        }
    }

    fn audio_bitmap(&self) -> u8 {
        let mut bitmap = 0;
        for codec in &self.audio {
            bitmap |= match codec.format {
                AudioFormat::Lpcm => AUDIO_LPCM,
                AudioFormat::Aac => AUDIO_AAC,
                AudioFormat::Ac3 => AUDIO_AC3,
            };
        }
        bitmap
    }

    fn descriptor(&self, format: AudioFormat) -> Option<&AudioCodec> {
        self.audio.iter().find(|c| c.format == format)
    }
}

/// Reads the first detailed timing descriptor of an EDID block (offset
/// 54) and rejects resolutions outside the range a WFD session can carry.
fn decode_edid_resolution(payload: &[u8]) -> Option<EdidResolution> {
    if payload.len() < 62 {
        return None;
    }
    let hres = (((payload[58] >> 4) as u32) << 8) | payload[56] as u32;
    let vres = (((payload[61] >> 4) as u32) << 8) | payload[59] as u32;
    if !(640..=1920).contains(&hres) || !(480..=1080).contains(&vres) {
        debug!("edid announces implausible resolution {}x{}", hres, vres);
        return None;
    }
    Some(EdidResolution { hres, vres })
}

/// The negotiated audio dimension: one codec, one frequency, one channel
/// count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedAudio {
    /// The elementary stream format
    pub format: AudioFormat,
    /// The modes bitmap echoed in M4 (a single frequency or channel bit)
    pub modes: u32,
    /// Sampling frequency in Hz
    pub frequency: u32,
    /// Channel count; this implementation ships stereo only
    pub channels: u8,
    /// Sink decoder latency
    pub latency: u8,
}

/// The negotiated video dimension: one resolution within one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedVideo {
    /// The family the resolution was taken from
    pub family: ResolutionFamily,
    /// The single resolution bit within the family bitmap
    pub resolution_bit: u32,
    /// The expanded mode
    pub mode: VideoMode,
    /// H.264 profile bitmap (a single bit)
    pub profile: u8,
    /// H.264 level bitmap (a single bit)
    pub level: u8,
    /// Sink decoder latency
    pub latency: u8,
    /// Sink minimum slice size
    pub min_slice_size: u16,
    /// Sink slice encoding parameters
    pub slice_enc_params: u16,
    /// Sink frame-rate control support
    pub frame_rate_control: u8,
}

/// The outcome of capability intersection: every field is a single value,
/// never a bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiatedConfig {
    /// Negotiated audio parameters
    pub audio: NegotiatedAudio,
    /// Negotiated video parameters
    pub video: NegotiatedVideo,
    /// Primary sink RTP port
    pub rtp_port0: u16,
    /// Secondary sink RTP port, 0 when unused
    pub rtp_port1: u16,
    /// Transport profile string echoed back to the sink
    pub rtp_profile: String,
    /// Transport mode string echoed back to the sink
    pub rtp_mode: String,
    /// Presentation URL for stream id 0
    pub presentation_url: String,
    /// HDCP parameters, absent when content protection is off
    pub hdcp: Option<ContentProtection>,
}

impl NegotiatedConfig {
    /// Builds the M4 commit body: presentation URL, audio, video and RTP
    /// ports, each a single-valued line.
    pub fn to_message(&self) -> WfdMessage {
        let mut cea = 0;
        let mut vesa = 0;
        let mut hh = 0;
        match self.video.family {
            ResolutionFamily::Cea => cea = self.video.resolution_bit,
            ResolutionFamily::Vesa => vesa = self.video.resolution_bit,
            ResolutionFamily::Hh => hh = self.video.resolution_bit,
        }

        let native_index = self.video.resolution_bit.trailing_zeros() as u8;

        WfdMessage {
            presentation_url: Some(PresentationUrl {
                url0: Some(self.presentation_url.clone()),
                url1: None,
            }),
            audio_codecs: Some(vec![AudioCodec {
                format: self.audio.format,
                modes: self.audio.modes,
                latency: self.audio.latency,
            }]),
            video_formats: Some(VideoFormats {
                native: (native_index << 3) | self.video.family.tag(),
                preferred_display_mode_supported: 0,
                profile: self.video.profile,
                level: self.video.level,
                cea_support: cea,
                vesa_support: vesa,
                hh_support: hh,
                latency: self.video.latency,
                min_slice_size: self.video.min_slice_size,
                slice_enc_params: self.video.slice_enc_params,
                frame_rate_control: self.video.frame_rate_control,
                max_hres: self.video.mode.width,
                max_vres: self.video.mode.height,
            }),
            client_rtp_ports: Some(ClientRtpPorts {
                profile: self.rtp_profile.clone(),
                rtp_port0: self.rtp_port0,
                rtp_port1: self.rtp_port1,
                mode: self.rtp_mode.clone(),
            }),
            ..Default::default()
        }
    }
}

/// Intersects source and sink capabilities into a [`NegotiatedConfig`].
///
/// Fails with [`WfdError::NegotiationFailed`] as soon as any required
/// dimension has an empty intersection.
pub fn negotiate(source: &SourceCaps, sink: &SinkCaps, host: &str) -> Result<NegotiatedConfig> {
    let audio = negotiate_audio(source.audio_codecs, sink)?;
    let video = negotiate_video(source, sink)?;

    let ports = sink
        .rtp_ports
        .as_ref()
        .ok_or_else(|| WfdError::NegotiationFailed("sink announced no RTP ports".into()))?;

    let config = NegotiatedConfig {
        audio,
        video,
        rtp_port0: ports.rtp_port0,
        rtp_port1: ports.rtp_port1,
        rtp_profile: ports.profile.clone(),
        rtp_mode: ports.mode.clone(),
        presentation_url: format!("rtsp://{}/wfd1.0/streamid=0", host),
        hdcp: sink
            .protection
            .clone()
            .filter(|p| p.hdcp != HdcpVersion::None && p.tcp_port.is_some()),
    };

    debug!(
        "negotiated {:?} {} Hz {}ch, {}x{}@{}{}",
        config.audio.format,
        config.audio.frequency,
        config.audio.channels,
        config.video.mode.width,
        config.video.mode.height,
        config.video.mode.framerate,
        if config.video.mode.interleaved { "i" } else { "p" },
    );

    Ok(config)
}

fn negotiate_audio(src_bitmap: u8, sink: &SinkCaps) -> Result<NegotiatedAudio> {
    let codec_bit = preferred_bit8(src_bitmap, sink.audio_bitmap())
        .ok_or_else(|| WfdError::NegotiationFailed("no common audio codec".into()))?;

    let format = match codec_bit {
        AUDIO_AC3 => AudioFormat::Ac3,
        AUDIO_AAC => AudioFormat::Aac,
        AUDIO_LPCM => AudioFormat::Lpcm,
        _ => return Err(WfdError::NegotiationFailed("unknown audio codec bit".into())),
    };

    let descriptor = sink
        .descriptor(format)
        .ok_or_else(|| WfdError::NegotiationFailed("sink descriptor missing".into()))?;

    let (modes, frequency) = match format {
        // For LPCM the modes bitmap enumerates frequencies; 48 kHz wins
        // when both are offered.
        AudioFormat::Lpcm => {
            if descriptor.modes & FREQ_48000 != 0 {
                (FREQ_48000, 48000)
            } else if descriptor.modes & FREQ_44100 != 0 {
                (FREQ_44100, 44100)
            } else {
                return Err(WfdError::NegotiationFailed(
                    "no common LPCM frequency".into(),
                ));
            }
        }
        // AAC and AC3 modes enumerate channel layouts, all at 48 kHz. The
        // encoder ships stereo only, so the channel choice clamps to 2.
        AudioFormat::Aac | AudioFormat::Ac3 => {
            let channels = descriptor.modes & (CHANNEL_2 | CHANNEL_4 | CHANNEL_6 | CHANNEL_8);
            if channels == 0 {
                return Err(WfdError::NegotiationFailed(
                    "no common channel layout".into(),
                ));
            }
            (CHANNEL_2, 48000)
        }
    };

    Ok(NegotiatedAudio {
        format,
        modes,
        frequency,
        channels: 2,
        latency: descriptor.latency,
    })
}

fn negotiate_video(source: &SourceCaps, sink: &SinkCaps) -> Result<NegotiatedVideo> {
    let video = sink
        .video
        .as_ref()
        .ok_or_else(|| WfdError::NegotiationFailed("sink announced no video formats".into()))?;

    let family = source.video_native_family;
    let sink_bitmap = match family {
        ResolutionFamily::Cea => video.cea_support,
        ResolutionFamily::Vesa => video.vesa_support,
        ResolutionFamily::Hh => video.hh_support,
    };

    let bit = preferred_bit32(source.video_resolution_supported, sink_bitmap)
        .ok_or_else(|| WfdError::NegotiationFailed("no common resolution".into()))?;

    let mode = lookup_mode(family, bit.trailing_zeros()).ok_or_else(|| {
        WfdError::NegotiationFailed(format!("resolution bit {:#x} is not defined", bit))
    })?;

    Ok(NegotiatedVideo {
        family,
        resolution_bit: bit,
        mode,
        profile: H264_PROFILE_BASE,
        level: H264_LEVEL_3_1,
        latency: video.latency,
        min_slice_size: video.min_slice_size,
        slice_enc_params: video.slice_enc_params,
        frame_rate_control: video.frame_rate_control,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_with(audio: Vec<AudioCodec>, cea: u32) -> SinkCaps {
        SinkCaps {
            audio,
            video: Some(VideoFormats {
                native: 0,
                profile: H264_PROFILE_BASE,
                level: H264_LEVEL_3_1,
                cea_support: cea,
                ..Default::default()
            }),
            rtp_ports: Some(ClientRtpPorts {
                profile: "RTP/AVP/UDP;unicast".to_string(),
                rtp_port0: 19000,
                rtp_port1: 0,
                mode: "mode=play".to_string(),
            }),
            edid: None,
            protection: None,
        }
    }

    fn aac_stereo() -> AudioCodec {
        AudioCodec {
            format: AudioFormat::Aac,
            modes: CHANNEL_2 | CHANNEL_4 | CHANNEL_6,
            latency: 0,
        }
    }

    #[test]
    fn test_intersect_commutative_idempotent() {
        let cases = [(0u32, 0u32), (0x40, 0x60), (0xffff_ffff, 0x8000_0001)];
        for (a, b) in cases {
            assert_eq!(intersect(a, b), intersect(b, a));
            assert_eq!(intersect(a, a), a);
        }
    }

    #[test]
    fn test_preferred_scans_msb_first() {
        assert_eq!(preferred_bit8(0x06, 0x06), Some(0x04));
        assert_eq!(preferred_bit8(0x06, 0x02), Some(0x02));
        assert_eq!(preferred_bit8(0x04, 0x02), None);
        assert_eq!(preferred_bit32(0x0000_0060, 0x0000_0040), Some(0x40));
    }

    #[test]
    fn test_lookup_total_on_defined_bits() {
        for family in [
            ResolutionFamily::Cea,
            ResolutionFamily::Vesa,
            ResolutionFamily::Hh,
        ] {
            for bit in 1..=family_mode_count(family) {
                let mode = lookup_mode(family, bit).unwrap();
                assert!(mode.width > 0);
                assert!(mode.height > 0);
                assert!(mode.framerate > 0);
            }
            assert!(lookup_mode(family, 0).is_none());
            assert!(lookup_mode(family, family_mode_count(family) + 1).is_none());
        }
    }

    #[test]
    fn test_cea_720p30_is_bit_six() {
        let mode = lookup_mode(ResolutionFamily::Cea, 6).unwrap();
        assert_eq!((mode.width, mode.height, mode.framerate), (1280, 720, 30));
        assert!(!mode.interleaved);
    }

    #[test]
    fn test_negotiate_aac_720p() {
        let source = SourceCaps {
            audio_codecs: AUDIO_AAC | AUDIO_LPCM,
            video_resolution_supported: 0x40,
            video_native_family: ResolutionFamily::Cea,
        };
        let sink = sink_with(vec![aac_stereo()], 0x40);

        let config = negotiate(&source, &sink, "192.0.2.1").unwrap();
        assert_eq!(config.audio.format, AudioFormat::Aac);
        assert_eq!(config.audio.modes, CHANNEL_2);
        assert_eq!(config.audio.frequency, 48000);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.video.mode.width, 1280);
        assert_eq!(config.video.mode.framerate, 30);
        assert_eq!(config.rtp_port0, 19000);
        assert_eq!(
            config.presentation_url,
            "rtsp://192.0.2.1/wfd1.0/streamid=0"
        );
    }

    #[test]
    fn test_negotiate_prefers_higher_codec() {
        let source = SourceCaps {
            audio_codecs: AUDIO_AAC | AUDIO_LPCM | AUDIO_AC3,
            video_resolution_supported: 0x40,
            video_native_family: ResolutionFamily::Cea,
        };
        let mut sink = sink_with(
            vec![
                AudioCodec {
                    format: AudioFormat::Lpcm,
                    modes: FREQ_44100 | FREQ_48000,
                    latency: 0,
                },
                AudioCodec {
                    format: AudioFormat::Ac3,
                    modes: CHANNEL_2,
                    latency: 0,
                },
            ],
            0x40,
        );

        let config = negotiate(&source, &sink, "host").unwrap();
        assert_eq!(config.audio.format, AudioFormat::Ac3);

        // Remove AC3; LPCM remains and picks 48 kHz.
        sink.audio.remove(1);
        let config = negotiate(&source, &sink, "host").unwrap();
        assert_eq!(config.audio.format, AudioFormat::Lpcm);
        assert_eq!(config.audio.frequency, 48000);
        assert_eq!(config.audio.modes, FREQ_48000);
    }

    #[test]
    fn test_negotiate_empty_intersection_fails() {
        let source = SourceCaps {
            audio_codecs: AUDIO_AAC,
            video_resolution_supported: 0x40,
            video_native_family: ResolutionFamily::Cea,
        };

        // No common audio codec.
        let sink = sink_with(
            vec![AudioCodec {
                format: AudioFormat::Lpcm,
                modes: FREQ_48000,
                latency: 0,
            }],
            0x40,
        );
        assert!(matches!(
            negotiate(&source, &sink, "host"),
            Err(WfdError::NegotiationFailed(_))
        ));

        // No common resolution.
        let sink = sink_with(vec![aac_stereo()], 0x80);
        assert!(matches!(
            negotiate(&source, &sink, "host"),
            Err(WfdError::NegotiationFailed(_))
        ));
    }

    #[test]
    fn test_m4_body_lines() {
        let source = SourceCaps {
            audio_codecs: AUDIO_AAC | AUDIO_LPCM,
            video_resolution_supported: 0x40,
            video_native_family: ResolutionFamily::Cea,
        };
        let sink = sink_with(vec![aac_stereo()], 0x40);
        let config = negotiate(&source, &sink, "192.0.2.1").unwrap();

        let body = config.to_message().as_text();
        assert!(body.contains("wfd_audio_codecs: AAC 00000002 00\r\n"));
        assert!(body
            .contains("wfd_presentation_URL: rtsp://192.0.2.1/wfd1.0/streamid=0 none\r\n"));
        assert!(body.contains("wfd_client_rtp_ports: RTP/AVP/UDP;unicast 19000 0 mode=play\r\n"));
        assert!(body.contains("00000040"));
    }

    #[test]
    fn test_edid_resolution_extraction() {
        let mut payload = vec![0u8; 128];
        // First detailed timing descriptor: 1920x1080.
        payload[56] = 0x80;
        payload[58] = 0x70;
        payload[59] = 0x38;
        payload[61] = 0x40;
        let res = decode_edid_resolution(&payload).unwrap();
        assert_eq!(res.hres, 1920);
        assert_eq!(res.vres, 1080);

        // Implausible resolution is dropped.
        payload[58] = 0xf0;
        assert!(decode_edid_resolution(&payload).is_none());
    }
}
