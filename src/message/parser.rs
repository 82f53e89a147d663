//! Parser for the `wfd_*` parameter-line dialect.
//!
//! Parsing is deliberately lenient below the line level: deployed sinks
//! emit all sorts of slightly-off bodies, and the capability exchange must
//! survive them. A value token that fails hex decoding reads as 0, extra
//! tokens are ignored, and a recognized key with a garbled value simply
//! leaves the field in its empty shape. The only hard error is a line
//! whose `key: value` split fails outright.

use bytes::Bytes;

use super::*;
use crate::error::{Result, WfdError};

/// Splits `data` into lines on CR/LF and folds each recognized line into
/// the message.
pub(super) fn parse(data: &[u8]) -> Result<WfdMessage> {
    let mut msg = WfdMessage::new();

    let text = String::from_utf8_lossy(data);
    for line in text.split(['\r', '\n']) {
        if line.is_empty() {
            continue;
        }
        parse_line(line, &mut msg)?;
    }

    Ok(msg)
}

fn parse_line(line: &str, msg: &mut WfdMessage) -> Result<()> {
    let (key, value) = match line.split_once(':') {
        Some((k, v)) => (k, v.trim_start()),
        // wfd_standby and wfd_idr_request are bare keys; names-only probe
        // bodies also arrive without a colon.
        None => (line, ""),
    };

    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(WfdError::MalformedHeader(format!(
            "bad key/value split in line {:?}",
            line
        )));
    }

    match key {
        KEY_AUDIO_CODECS => msg.audio_codecs = Some(parse_audio_codecs(value)),
        KEY_VIDEO_FORMATS => msg.video_formats = Some(parse_video_formats(value)),
        KEY_CONTENT_PROTECTION => msg.content_protection = Some(parse_content_protection(value)),
        KEY_DISPLAY_EDID => msg.display_edid = Some(parse_display_edid(value)),
        KEY_COUPLED_SINK => msg.coupled_sink = Some(parse_coupled_sink(value)),
        KEY_TRIGGER_METHOD => {
            msg.trigger_method = value
                .split_whitespace()
                .next()
                .and_then(TriggerMethod::from_token);
        }
        KEY_PRESENTATION_URL => msg.presentation_url = Some(parse_presentation_url(value)),
        KEY_CLIENT_RTP_PORTS => msg.client_rtp_ports = parse_client_rtp_ports(value),
        KEY_ROUTE => {
            msg.route = value.split_whitespace().next().map(|d| Route {
                destination: d.to_string(),
            });
        }
        KEY_I2C => {
            let port = match value.split_whitespace().next() {
                Some("none") | None => None,
                Some(tok) => Some(hex32(tok)),
            };
            msg.i2c = Some(I2c { port });
        }
        KEY_AV_FORMAT_CHANGE_TIMING => {
            let mut toks = value.split_whitespace();
            msg.av_format_change_timing = Some(AvFormatChangeTiming {
                pts: toks.next().map(hex64).unwrap_or(0),
                dts: toks.next().map(hex64).unwrap_or(0),
            });
        }
        KEY_PREFERRED_DISPLAY_MODE => {
            msg.preferred_display_mode = Some(parse_preferred_display_mode(value));
        }
        KEY_STANDBY_RESUME_CAPABILITY => {
            msg.standby_resume_capability = Some(StandbyResumeCapability {
                supported: value.split_whitespace().next() == Some("supported"),
            });
        }
        KEY_STANDBY => msg.standby = true,
        KEY_CONNECTOR_TYPE => {
            let connector = match value.split_whitespace().next() {
                Some("none") | None => 0,
                Some(tok) => hex32(tok) as u8,
            };
            msg.connector_type = Some(ConnectorType { connector });
        }
        KEY_IDR_REQUEST => msg.idr_request = true,
        // Unknown keys are ignored for forward compatibility.
        _ => {}
    }

    Ok(())
}

/// Hex integer in the C `strtoul` tradition: garbage decodes as 0.
fn hex32(tok: &str) -> u32 {
    u32::from_str_radix(tok, 16).unwrap_or(0)
}

fn hex64(tok: &str) -> u64 {
    u64::from_str_radix(tok, 16).unwrap_or(0)
}

fn dec16(tok: &str) -> u16 {
    tok.parse().unwrap_or(0)
}

fn parse_audio_codecs(value: &str) -> Vec<AudioCodec> {
    let mut codecs = Vec::new();
    for chunk in value.split(',') {
        let mut toks = chunk.split_whitespace();
        let format = match toks.next().and_then(AudioFormat::from_token) {
            Some(f) => f,
            None => continue,
        };
        codecs.push(AudioCodec {
            format,
            modes: toks.next().map(hex32).unwrap_or(0),
            latency: toks.next().map(hex32).unwrap_or(0) as u8,
        });
    }
    codecs
}

fn parse_video_formats(value: &str) -> VideoFormats {
    let mut toks = value.split_whitespace();
    let mut next = || toks.next().map(hex32).unwrap_or(0);

    VideoFormats {
        native: next() as u8,
        preferred_display_mode_supported: next() as u8,
        profile: next() as u8,
        level: next() as u8,
        cea_support: next(),
        vesa_support: next(),
        hh_support: next(),
        latency: next() as u8,
        min_slice_size: next() as u16,
        slice_enc_params: next() as u16,
        frame_rate_control: next() as u8,
        // Trailing max-hres/max-vres render as "none" when unannounced,
        // which decodes to 0 like any other non-hex token.
        max_hres: next(),
        max_vres: next(),
    }
}

fn parse_content_protection(value: &str) -> ContentProtection {
    let mut toks = value.split_whitespace();
    match toks.next() {
        Some("HDCP2.0") => ContentProtection {
            hdcp: HdcpVersion::V2_0,
            tcp_port: toks.next().and_then(parse_port_attr),
        },
        Some("HDCP2.1") => ContentProtection {
            hdcp: HdcpVersion::V2_1,
            tcp_port: toks.next().and_then(parse_port_attr),
        },
        _ => ContentProtection {
            hdcp: HdcpVersion::None,
            tcp_port: None,
        },
    }
}

/// Decodes the `port=<decimal>` attribute of `wfd_content_protection`.
fn parse_port_attr(tok: &str) -> Option<u16> {
    tok.strip_prefix("port=").and_then(|p| p.parse().ok())
}

fn parse_display_edid(value: &str) -> DisplayEdid {
    let mut toks = value.split_whitespace();
    let first = toks.next();
    if first.is_none() || first == Some("none") {
        return DisplayEdid {
            supported: false,
            block_count: 0,
            payload: None,
        };
    }

    let block_count = hex32(first.unwrap_or(""));
    let payload = if (1..=EDID_BLOCK_COUNT_MAX).contains(&block_count) {
        toks.next()
            .map(|hex| decode_edid_payload(hex, block_count as usize))
    } else {
        None
    };

    DisplayEdid {
        supported: true,
        block_count,
        payload,
    }
}

/// Decodes the ASCII-hex EDID payload, two nibbles per byte. Characters
/// outside `0-9a-fA-F` decode as 0; a short string is zero-padded. The
/// sink already promised `2 * 128 * block_count` characters.
fn decode_edid_payload(hex: &str, block_count: usize) -> Bytes {
    let size = EDID_BLOCK_SIZE * block_count;
    let chars = hex.as_bytes();
    let mut payload = Vec::with_capacity(size);
    for i in 0..size {
        let hi = chars.get(i * 2).map(|&c| nibble(c)).unwrap_or(0);
        let lo = chars.get(i * 2 + 1).map(|&c| nibble(c)).unwrap_or(0);
        payload.push((hi << 4) | lo);
    }
    Bytes::from(payload)
}

fn nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

fn parse_coupled_sink(value: &str) -> CoupledSink {
    let mut toks = value.split_whitespace();
    match toks.next() {
        None | Some("none") => CoupledSink { cap: None },
        Some(status) => CoupledSink {
            cap: Some(CoupledSinkCap {
                status: hex32(status) as u8,
                sink_address: match toks.next() {
                    None | Some("none") => None,
                    Some(addr) => Some(addr.to_string()),
                },
            }),
        },
    }
}

fn parse_presentation_url(value: &str) -> PresentationUrl {
    let mut toks = value.split_whitespace();
    let url = |tok: Option<&str>| match tok {
        None | Some("none") => None,
        Some(u) => Some(u.to_string()),
    };
    PresentationUrl {
        url0: url(toks.next()),
        url1: url(toks.next()),
    }
}

fn parse_client_rtp_ports(value: &str) -> Option<ClientRtpPorts> {
    let mut toks = value.split_whitespace();
    let profile = toks.next()?;
    Some(ClientRtpPorts {
        profile: profile.to_string(),
        rtp_port0: toks.next().map(dec16).unwrap_or(0),
        rtp_port1: toks.next().map(dec16).unwrap_or(0),
        mode: toks.next().unwrap_or("").to_string(),
    })
}

fn parse_preferred_display_mode(value: &str) -> PreferredDisplayMode {
    let mut toks = value.split_whitespace().peekable();
    if toks.peek().is_none() || toks.peek() == Some(&"none") {
        return PreferredDisplayMode::default();
    }

    let mut next16 = Vec::new();
    let p_clock = toks.next().map(hex64).unwrap_or(0);
    for _ in 0..8 {
        next16.push(toks.next().map(hex32).unwrap_or(0) as u16);
    }

    PreferredDisplayMode {
        supported: true,
        p_clock,
        h: next16[0],
        hb: next16[1],
        hspol_hsoff: next16[2],
        hsw: next16[3],
        v: next16[4],
        vb: next16[5],
        vspol_vsoff: next16[6],
        vsw: next16[7],
        vbs3d: toks.next().map(hex32).unwrap_or(0) as u8,
        v2d_s3d_modes: toks.next().map(hex32).unwrap_or(0) as u8,
        p_depth: toks.next().map(hex32).unwrap_or(0) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sink_capability_body() {
        let body = b"wfd_audio_codecs: AAC 0000000e 00, LPCM 00000006 05\r\n\
            wfd_video_formats: 30 00 02 08 00000040 00000000 00000000 00 0000 0000 11 none none\r\n\
            wfd_client_rtp_ports: RTP/AVP/UDP;unicast 19000 0 mode=play\r\n\
            wfd_display_edid: none\r\n\
            wfd_content_protection: none\r\n";
        let msg = WfdMessage::parse(body).unwrap();

        let audio = msg.audio_codecs.unwrap();
        assert_eq!(audio.len(), 2);
        assert_eq!(audio[0].format, AudioFormat::Aac);
        assert_eq!(audio[0].modes, 0x0e);
        assert_eq!(audio[1].format, AudioFormat::Lpcm);
        assert_eq!(audio[1].latency, 5);

        let video = msg.video_formats.unwrap();
        assert_eq!(video.native, 0x30);
        assert_eq!(video.cea_support, 0x40);
        assert_eq!(video.max_hres, 0);
        assert_eq!(video.frame_rate_control, 0x11);

        let ports = msg.client_rtp_ports.unwrap();
        assert_eq!(ports.rtp_port0, 19000);
        assert_eq!(ports.rtp_port1, 0);
        assert_eq!(ports.profile, "RTP/AVP/UDP;unicast");

        assert!(!msg.display_edid.unwrap().supported);
        assert_eq!(msg.content_protection.unwrap().hdcp, HdcpVersion::None);
    }

    #[test]
    fn test_parse_names_only_body() {
        let body = b"wfd_audio_codecs\r\nwfd_video_formats\r\nwfd_client_rtp_ports\r\n";
        let msg = WfdMessage::parse(body).unwrap();
        assert_eq!(msg.audio_codecs, Some(Vec::new()));
        assert!(msg.video_formats.is_some());
        // An empty value after the profile token is unrepresentable, so the
        // ports field stays absent.
        assert!(msg.client_rtp_ports.is_none());
    }

    #[test]
    fn test_malformed_key_is_rejected() {
        let body = b"wfd audio codecs AAC\r\n";
        assert!(matches!(
            WfdMessage::parse(body),
            Err(WfdError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let body = b"wfd_uibc_capability: none\r\nwfd_standby\r\n";
        let msg = WfdMessage::parse(body).unwrap();
        assert!(msg.standby);
        assert!(msg.audio_codecs.is_none());
    }

    #[test]
    fn test_edid_lenient_nibbles() {
        // 'z' and '!' are outside the hex ranges and decode as 0.
        let mut hex = String::new();
        hex.push_str("ffz!");
        hex.push_str(&"00".repeat(EDID_BLOCK_SIZE - 2));
        let body = format!("wfd_display_edid: 0001 {}\r\n", hex);
        let msg = WfdMessage::parse(body.as_bytes()).unwrap();
        let edid = msg.display_edid.unwrap();
        assert!(edid.supported);
        let payload = edid.payload.unwrap();
        assert_eq!(payload.len(), EDID_BLOCK_SIZE);
        assert_eq!(payload[0], 0xff);
        assert_eq!(payload[1], 0x00);
    }

    #[test]
    fn test_edid_block_count_out_of_range() {
        let body = b"wfd_display_edid: 0101 00\r\n";
        let msg = WfdMessage::parse(body).unwrap();
        let edid = msg.display_edid.unwrap();
        assert_eq!(edid.block_count, 0x101);
        assert!(edid.payload.is_none());
    }

    #[test]
    fn test_trigger_and_hdcp() {
        let body = b"wfd_trigger_method: SETUP\r\nwfd_content_protection: HDCP2.1 port=1189\r\n";
        let msg = WfdMessage::parse(body).unwrap();
        assert_eq!(msg.trigger_method, Some(TriggerMethod::Setup));
        let cp = msg.content_protection.unwrap();
        assert_eq!(cp.hdcp, HdcpVersion::V2_1);
        assert_eq!(cp.tcp_port, Some(1189));
    }
}
