//! Canonical text renderers for [`WfdMessage`].
//!
//! Two emitters exist on purpose: the full-value form carries negotiated
//! or advertised values (M4 request, M3 response), while the names-only
//! form asks the peer to disclose the named parameters (M3 request).

use std::fmt::Write;

use super::*;

/// Renders every present field with canonical token widths, CRLF per line.
pub(super) fn as_text(msg: &WfdMessage) -> String {
    let mut lines = String::new();

    if let Some(ref codecs) = msg.audio_codecs {
        lines.push_str(KEY_AUDIO_CODECS);
        if !codecs.is_empty() {
            lines.push(':');
            for (i, c) in codecs.iter().enumerate() {
                let _ = write!(lines, " {} {:08x} {:02x}", c.format.as_str(), c.modes, c.latency);
                if i + 1 < codecs.len() {
                    lines.push(',');
                }
            }
        }
        lines.push_str("\r\n");
    }

    if let Some(ref v) = msg.video_formats {
        let _ = write!(
            lines,
            "{}: {:02x} {:02x} {:02x} {:02x} {:08x} {:08x} {:08x} {:02x} {:04x} {:04x} {:02x}",
            KEY_VIDEO_FORMATS,
            v.native,
            v.preferred_display_mode_supported,
            v.profile,
            v.level,
            v.cea_support,
            v.vesa_support,
            v.hh_support,
            v.latency,
            v.min_slice_size,
            v.slice_enc_params,
            v.frame_rate_control,
        );
        match v.max_hres {
            0 => lines.push_str(" none"),
            hres => {
                let _ = write!(lines, " {:04x}", hres);
            }
        }
        match v.max_vres {
            0 => lines.push_str(" none"),
            vres => {
                let _ = write!(lines, " {:04x}", vres);
            }
        }
        lines.push_str("\r\n");
    }

    if let Some(ref cp) = msg.content_protection {
        lines.push_str(KEY_CONTENT_PROTECTION);
        lines.push(':');
        match (cp.hdcp, cp.tcp_port) {
            (HdcpVersion::None, _) | (_, None) => lines.push_str(" none"),
            (version, Some(port)) => {
                let _ = write!(lines, " {} port={}", version.as_str(), port);
            }
        }
        lines.push_str("\r\n");
    }

    if let Some(ref edid) = msg.display_edid {
        lines.push_str(KEY_DISPLAY_EDID);
        lines.push(':');
        match (edid.supported, &edid.payload) {
            (true, Some(payload))
                if (1..=EDID_BLOCK_COUNT_MAX).contains(&edid.block_count) =>
            {
                let _ = write!(lines, " {:04x} ", edid.block_count);
                for b in payload.iter() {
                    let _ = write!(lines, "{:02x}", b);
                }
            }
            _ => lines.push_str(" none"),
        }
        lines.push_str("\r\n");
    }

    if let Some(ref cs) = msg.coupled_sink {
        lines.push_str(KEY_COUPLED_SINK);
        lines.push(':');
        match &cs.cap {
            Some(cap) => {
                let _ = write!(lines, " {:02x}", cap.status);
                match &cap.sink_address {
                    Some(addr) => {
                        let _ = write!(lines, " {}", addr);
                    }
                    None => lines.push_str(" none"),
                }
            }
            None => lines.push_str(" none"),
        }
        lines.push_str("\r\n");
    }

    if let Some(trigger) = msg.trigger_method {
        let _ = write!(lines, "{}: {}\r\n", KEY_TRIGGER_METHOD, trigger.as_str());
    }

    if let Some(ref url) = msg.presentation_url {
        lines.push_str(KEY_PRESENTATION_URL);
        lines.push(':');
        for u in [&url.url0, &url.url1] {
            match u {
                Some(u) => {
                    let _ = write!(lines, " {}", u);
                }
                None => lines.push_str(" none"),
            }
        }
        lines.push_str("\r\n");
    }

    if let Some(ref ports) = msg.client_rtp_ports {
        let _ = write!(
            lines,
            "{}: {} {} {} {}\r\n",
            KEY_CLIENT_RTP_PORTS, ports.profile, ports.rtp_port0, ports.rtp_port1, ports.mode,
        );
    }

    if let Some(ref route) = msg.route {
        let _ = write!(lines, "{}: {}\r\n", KEY_ROUTE, route.destination);
    }

    if let Some(ref i2c) = msg.i2c {
        lines.push_str(KEY_I2C);
        lines.push(':');
        match i2c.port {
            Some(port) => {
                let _ = write!(lines, " {:x}", port);
            }
            None => lines.push_str(" none"),
        }
        lines.push_str("\r\n");
    }

    if let Some(ref timing) = msg.av_format_change_timing {
        let _ = write!(
            lines,
            "{}: {:010x} {:010x}\r\n",
            KEY_AV_FORMAT_CHANGE_TIMING, timing.pts, timing.dts,
        );
    }

    if let Some(ref mode) = msg.preferred_display_mode {
        lines.push_str(KEY_PREFERRED_DISPLAY_MODE);
        lines.push(':');
        if mode.supported {
            let _ = write!(
                lines,
                " {:06x} {:04x} {:04x} {:04x} {:04x} {:04x} {:04x} {:04x} {:04x} {:02x} {:02x} {:02x}",
                mode.p_clock,
                mode.h,
                mode.hb,
                mode.hspol_hsoff,
                mode.hsw,
                mode.v,
                mode.vb,
                mode.vspol_vsoff,
                mode.vsw,
                mode.vbs3d,
                mode.v2d_s3d_modes,
                mode.p_depth,
            );
        } else {
            lines.push_str(" none");
        }
        lines.push_str("\r\n");
    }

    if let Some(ref standby) = msg.standby_resume_capability {
        let _ = write!(
            lines,
            "{}: {}\r\n",
            KEY_STANDBY_RESUME_CAPABILITY,
            if standby.supported { "supported" } else { "none" },
        );
    }

    if msg.standby {
        lines.push_str(KEY_STANDBY);
        lines.push_str("\r\n");
    }

    if let Some(ref connector) = msg.connector_type {
        lines.push_str(KEY_CONNECTOR_TYPE);
        lines.push(':');
        match connector.connector {
            0 => lines.push_str(" none"),
            c => {
                let _ = write!(lines, " {:02x}", c);
            }
        }
        lines.push_str("\r\n");
    }

    if msg.idr_request {
        lines.push_str(KEY_IDR_REQUEST);
        lines.push_str("\r\n");
    }

    lines
}

/// Renders only the keys of the present fields, one per CRLF line.
pub(super) fn param_names_as_text(msg: &WfdMessage) -> String {
    let mut lines = String::new();
    let mut name = |present: bool, key: &str| {
        if present {
            lines.push_str(key);
            lines.push_str("\r\n");
        }
    };

    name(msg.audio_codecs.is_some(), KEY_AUDIO_CODECS);
    name(msg.video_formats.is_some(), KEY_VIDEO_FORMATS);
    name(msg.content_protection.is_some(), KEY_CONTENT_PROTECTION);
    name(msg.display_edid.is_some(), KEY_DISPLAY_EDID);
    name(msg.coupled_sink.is_some(), KEY_COUPLED_SINK);
    name(msg.trigger_method.is_some(), KEY_TRIGGER_METHOD);
    name(msg.presentation_url.is_some(), KEY_PRESENTATION_URL);
    name(msg.client_rtp_ports.is_some(), KEY_CLIENT_RTP_PORTS);
    name(msg.route.is_some(), KEY_ROUTE);
    name(msg.i2c.is_some(), KEY_I2C);
    name(
        msg.av_format_change_timing.is_some(),
        KEY_AV_FORMAT_CHANGE_TIMING,
    );
    name(
        msg.preferred_display_mode.is_some(),
        KEY_PREFERRED_DISPLAY_MODE,
    );
    name(
        msg.standby_resume_capability.is_some(),
        KEY_STANDBY_RESUME_CAPABILITY,
    );
    name(msg.standby, KEY_STANDBY);
    name(msg.connector_type.is_some(), KEY_CONNECTOR_TYPE);
    name(msg.idr_request, KEY_IDR_REQUEST);

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_codec_widths() {
        let msg = WfdMessage {
            audio_codecs: Some(vec![AudioCodec {
                format: AudioFormat::Aac,
                modes: 2,
                latency: 0,
            }]),
            ..Default::default()
        };
        assert_eq!(msg.as_text(), "wfd_audio_codecs: AAC 00000002 00\r\n");
    }

    #[test]
    fn test_audio_codec_list_separator() {
        let msg = WfdMessage {
            audio_codecs: Some(vec![
                AudioCodec {
                    format: AudioFormat::Aac,
                    modes: 2,
                    latency: 0,
                },
                AudioCodec {
                    format: AudioFormat::Lpcm,
                    modes: 6,
                    latency: 0,
                },
            ]),
            ..Default::default()
        };
        assert_eq!(
            msg.as_text(),
            "wfd_audio_codecs: AAC 00000002 00, LPCM 00000006 00\r\n"
        );
    }

    #[test]
    fn test_video_formats_none_tail() {
        let msg = WfdMessage {
            video_formats: Some(VideoFormats {
                native: 0x30,
                profile: 0x02,
                level: 0x08,
                cea_support: 0x40,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            msg.as_text(),
            "wfd_video_formats: 30 00 02 08 00000040 00000000 00000000 00 0000 0000 00 none none\r\n"
        );
    }

    #[test]
    fn test_rtp_ports_are_decimal() {
        let msg = WfdMessage {
            client_rtp_ports: Some(ClientRtpPorts {
                profile: "RTP/AVP/UDP;unicast".to_string(),
                rtp_port0: 19000,
                rtp_port1: 0,
                mode: "mode=play".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(
            msg.as_text(),
            "wfd_client_rtp_ports: RTP/AVP/UDP;unicast 19000 0 mode=play\r\n"
        );
    }

    #[test]
    fn test_trigger_body() {
        let msg = WfdMessage {
            trigger_method: Some(TriggerMethod::Setup),
            ..Default::default()
        };
        assert_eq!(msg.as_text(), "wfd_trigger_method: SETUP\r\n");
    }

    #[test]
    fn test_av_timing_width() {
        let msg = WfdMessage {
            av_format_change_timing: Some(AvFormatChangeTiming { pts: 0x1234, dts: 0 }),
            ..Default::default()
        };
        assert_eq!(
            msg.as_text(),
            "wfd_av_format_change_timing: 0000001234 0000000000\r\n"
        );
    }
}
