//! Construction of the source -> encoder -> TS-mux -> RTP-pay graph.
//!
//! The builder assembles one `srcbin` container holding a video sub-bin
//! (one of several capture variants), an audio sub-bin (encoder or LPCM
//! pass-through), the WFD-mode MPEG-TS muxer and the RTP payloader. The
//! muxer's elementary PIDs are fixed by the WFD specification: video on
//! 0x1011, audio on 0x1100, addressed through the `sink_4113` and
//! `sink_4352` request pads. The payloader always runs payload type 33.

use std::fs::OpenOptions;
use std::io::Write as IoWrite;
use std::sync::Arc;

use log::{info, warn};

use crate::caps::NegotiatedConfig;
use crate::config::{SourceConfig, VideoSrcVariant};
use crate::error::{Result, WfdError};
use crate::graph::{
    ElementId, GraphState, MediaGraph, PadId, ProbeData, ProbeReturn, ProbeType, PropertyValue,
};

/// Muxer request pad carrying the video elementary stream, PID 0x1011.
pub const VIDEO_PID_PAD: &str = "sink_4113";
/// Muxer request pad carrying the audio elementary stream, PID 0x1100.
pub const AUDIO_PID_PAD: &str = "sink_4352";
/// RTP payload type for MPEG-TS.
pub const RTP_PAYLOAD_TYPE: i64 = 33;

const MUX_QUEUE_MAX_BUFFERS: i64 = 20000;
const AUDIO_ENC_BITRATE: i64 = 128_000;
const AUDIO_ENC_TOLERANCE_NS: i64 = 400_000_000;
const LPCM_BLOCK_SIZE: i64 = 1920;
const VIDEO_ENC_BITRATE: i64 = 512;
const CAPTURE_ENC_BITRATE: i64 = 200_000;
const IDR_PERIOD_FRAMES: i64 = 120;
const ENC_SKIP_INBUF: i64 = 5;
const DUMP_TS_PATH: &str = "/root/probe.ts";

/// Handles into a built streaming pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// The outer container bin
    pub srcbin: ElementId,
    /// The video capture sub-bin
    pub video_bin: ElementId,
    /// The audio capture sub-bin
    pub audio_bin: ElementId,
    /// The MPEG-TS muxer
    pub mux: ElementId,
    /// The queue between muxer and payloader
    pub mux_queue: ElementId,
    /// The RTP MP2T payloader
    pub payloader: ElementId,
    /// Source pad of the muxer queue, the live input to the payloader
    pub mux_queue_src: PadId,
    /// Sink pad of the payloader, the hot-swap point
    pub payloader_sink: PadId,
    /// The muxer's video request pad (`sink_4113`)
    pub mux_video_pad: PadId,
    /// The muxer's audio request pad (`sink_4352`)
    pub mux_audio_pad: PadId,
}

/// Builds a [`Pipeline`] from a [`SourceConfig`] against a graph runtime.
pub struct PipelineBuilder {
    graph: Arc<dyn MediaGraph>,
    config: SourceConfig,
    audio_frequency: u32,
    framerate: u32,
}

impl PipelineBuilder {
    /// Creates a builder for the given runtime and configuration.
    pub fn new(graph: Arc<dyn MediaGraph>, config: SourceConfig) -> Self {
        Self {
            graph,
            config,
            audio_frequency: 48000,
            framerate: 30,
        }
    }

    /// Overrides resolution, framerate and audio parameters with the
    /// outcome of capability negotiation.
    pub fn with_negotiated(mut self, negotiated: &NegotiatedConfig) -> Self {
        self.config.negotiated_resolution =
            (negotiated.video.mode.width, negotiated.video.mode.height);
        self.framerate = negotiated.video.mode.framerate;
        self.audio_frequency = negotiated.audio.frequency;
        self.config.audio_codec = match negotiated.audio.format {
            crate::message::AudioFormat::Lpcm => crate::caps::AUDIO_LPCM,
            crate::message::AudioFormat::Aac => crate::caps::AUDIO_AAC,
            crate::message::AudioFormat::Ac3 => crate::caps::AUDIO_AC3,
        };
        self.config.mtu_size = self.config.mtu_size.max(576);
        self
    }

    /// Assembles the full graph. Any element-creation or link failure
    /// tears the partially built bins down and reports `BuildFailed`.
    pub fn build(&self) -> Result<Pipeline> {
        let srcbin = self.graph.make_bin("srcbin")?;
        match self.build_into(srcbin) {
            Ok(pipeline) => {
                info!(
                    "built srcbin: {:?} @ {}x{}",
                    self.config.video_src_variant,
                    self.config.negotiated_resolution.0,
                    self.config.negotiated_resolution.1,
                );
                Ok(pipeline)
            }
            Err(e) => {
                let _ = self.graph.destroy(srcbin);
                Err(e)
            }
        }
    }

    fn build_into(&self, srcbin: ElementId) -> Result<Pipeline> {
        let (video_bin, video_queue) = self.build_video_bin()?;
        self.graph.add(srcbin, video_bin)?;

        let (audio_bin, audio_queue) = self.build_audio_bin()?;
        self.graph.add(srcbin, audio_bin)?;

        let mux = self.make(srcbin, "mpegtsmux", "tsmux")?;
        self.graph
            .set_property(mux, "wfd-mode", PropertyValue::Bool(true))?;

        let mux_queue = self.make(srcbin, "queue", "muxer-queue")?;
        self.graph.set_property(
            mux_queue,
            "max-size-buffers",
            PropertyValue::Int(MUX_QUEUE_MAX_BUFFERS),
        )?;

        let payloader = self.make(srcbin, "rtpmp2tpay", "pay0")?;
        self.graph
            .set_property(payloader, "pt", PropertyValue::Int(RTP_PAYLOAD_TYPE))?;
        self.graph.set_property(
            payloader,
            "mtu",
            PropertyValue::UInt(self.config.mtu_size as u64),
        )?;
        self.graph
            .set_property(payloader, "rtp-flush", PropertyValue::Bool(true))?;

        self.graph.link_many(&[mux, mux_queue, payloader])?;

        // Elementary PIDs are fixed: video 0x1011, audio 0x1100.
        let mux_video_pad = self.graph.request_pad(mux, VIDEO_PID_PAD)?;
        let video_src = self.graph.static_pad(video_queue, "src")?;
        let video_ghost = self.graph.ghost_pad(video_bin, "src", video_src)?;
        self.graph.link_pads(video_ghost, mux_video_pad)?;

        let mux_audio_pad = self.graph.request_pad(mux, AUDIO_PID_PAD)?;
        let audio_src = self.graph.static_pad(audio_queue, "src")?;
        let audio_ghost = self.graph.ghost_pad(audio_bin, "src", audio_src)?;
        self.graph.link_pads(audio_ghost, mux_audio_pad)?;

        if self.config.dump_ts {
            self.attach_dump_probe(mux)?;
        }

        Ok(Pipeline {
            srcbin,
            video_bin,
            audio_bin,
            mux,
            mux_queue,
            payloader,
            mux_queue_src: self.graph.static_pad(mux_queue, "src")?,
            payloader_sink: self.graph.static_pad(payloader, "sink")?,
            mux_video_pad,
            mux_audio_pad,
        })
    }

    /// Creates an element and places it into `bin` in one step.
    fn make(&self, bin: ElementId, factory: &str, name: &str) -> Result<ElementId> {
        let element = self.graph.make_element(factory, name).map_err(|e| {
            WfdError::BuildFailed(format!("failed to create {} ({}): {}", name, factory, e))
        })?;
        if let Err(e) = self.graph.add(bin, element) {
            let _ = self.graph.destroy(element);
            return Err(e);
        }
        Ok(element)
    }

    fn raw_video_caps(&self, format: Option<&str>) -> PropertyValue {
        let (width, height) = self.config.negotiated_resolution;
        let format = format.map(|f| format!(",format={}", f)).unwrap_or_default();
        PropertyValue::Caps(format!(
            "video/x-raw{},width={},height={},framerate={}/1",
            format, width, height, self.framerate,
        ))
    }

    fn make_h264_parser(&self, bin: ElementId) -> Result<ElementId> {
        let parser = self.make(bin, "h264parse", "videoparse")?;
        self.graph
            .set_property(parser, "config-interval", PropertyValue::Int(1))?;
        Ok(parser)
    }

    fn make_video_encoder(&self, bin: ElementId) -> Result<ElementId> {
        let encoder = self.make(bin, &self.config.video_encoder_name, "videoenc")?;
        self.graph
            .set_property(encoder, "byte-stream", PropertyValue::Int(1))?;
        Ok(encoder)
    }

    fn build_video_bin(&self) -> Result<(ElementId, ElementId)> {
        let bin = self.graph.make_bin("video-src-bin")?;
        let result = match &self.config.video_src_variant {
            VideoSrcVariant::XCapture => self.build_x_capture(bin),
            VideoSrcVariant::XvCapture => self.build_xv_capture(bin),
            VideoSrcVariant::Camera => self.build_camera(bin),
            VideoSrcVariant::VideoTest => self.build_videotest(bin),
            VideoSrcVariant::Wayland => self.build_wayland(bin),
            VideoSrcVariant::FileDemux(uri) => self.build_file_demux(bin, uri),
        };
        match result {
            Ok(queue) => Ok((bin, queue)),
            Err(e) => {
                let _ = self.graph.destroy(bin);
                Err(e)
            }
        }
    }

    fn build_x_capture(&self, bin: ElementId) -> Result<ElementId> {
        let src = self.make(bin, "ximagesrc", "videosrc")?;
        let scale = self.make(bin, "videoscale", "videoscale")?;
        let convert = self.make(bin, "videoconvert", "videoconvert")?;
        let caps = self.make(bin, "capsfilter", "videocaps")?;
        self.graph
            .set_property(caps, "caps", self.raw_video_caps(None))?;

        let encoder = self.make_video_encoder(bin)?;
        self.graph
            .set_property(encoder, "aud", PropertyValue::Int(0))?;
        self.graph
            .set_property(encoder, "bitrate", PropertyValue::Int(VIDEO_ENC_BITRATE))?;

        let enc_caps = self.make(bin, "capsfilter", "venc_caps")?;
        self.graph.set_property(
            enc_caps,
            "caps",
            PropertyValue::Caps("video/x-h264,profile=baseline".to_string()),
        )?;

        let parser = self.make_h264_parser(bin)?;
        let queue = self.make(bin, "queue", "video-queue")?;

        self.graph
            .link_many(&[src, scale, convert, caps, encoder, enc_caps, parser, queue])?;
        Ok(queue)
    }

    fn build_xv_capture(&self, bin: ElementId) -> Result<ElementId> {
        let src = self.make(bin, "xvimagesrc", "videosrc")?;
        let caps = self.make(bin, "capsfilter", "videocaps")?;
        self.graph
            .set_property(caps, "caps", self.raw_video_caps(Some("SN12")))?;

        let encoder = self.make_video_encoder(bin)?;
        self.graph.set_property(
            encoder,
            "bitrate",
            PropertyValue::Int(CAPTURE_ENC_BITRATE),
        )?;
        self.graph
            .set_property(encoder, "append-dci", PropertyValue::Int(1))?;
        self.graph
            .set_property(encoder, "idr-period", PropertyValue::Int(IDR_PERIOD_FRAMES))?;
        self.graph
            .set_property(encoder, "skip-inbuf", PropertyValue::Int(ENC_SKIP_INBUF))?;

        let parser = self.make_h264_parser(bin)?;
        let queue = self.make(bin, "queue", "video-queue")?;

        self.graph.link_many(&[src, caps, encoder, parser, queue])?;
        Ok(queue)
    }

    fn build_camera(&self, bin: ElementId) -> Result<ElementId> {
        let src = self.make(bin, "camerasrc", "videosrc")?;
        let caps = self.make(bin, "capsfilter", "videocaps")?;
        self.graph
            .set_property(caps, "caps", self.raw_video_caps(Some("SN12")))?;

        let encoder = self.make_video_encoder(bin)?;
        self.graph.set_property(
            encoder,
            "bitrate",
            PropertyValue::Int(CAPTURE_ENC_BITRATE),
        )?;
        self.graph
            .set_property(encoder, "append-dci", PropertyValue::Int(1))?;

        let parser = self.make_h264_parser(bin)?;
        let queue = self.make(bin, "queue", "video-queue")?;

        self.graph.link_many(&[src, caps, encoder, parser, queue])?;
        Ok(queue)
    }

    fn build_videotest(&self, bin: ElementId) -> Result<ElementId> {
        let src = self.make(bin, "videotestsrc", "videosrc")?;
        let caps = self.make(bin, "capsfilter", "videocaps")?;
        self.graph
            .set_property(caps, "caps", self.raw_video_caps(Some("I420")))?;

        let convert = self.make(bin, "videoconvert", "videoconvert")?;
        let sn12_caps = self.make(bin, "capsfilter", "videocaps2")?;
        self.graph
            .set_property(sn12_caps, "caps", self.raw_video_caps(Some("SN12")))?;

        let encoder = self.make_video_encoder(bin)?;
        self.graph
            .set_property(encoder, "aud", PropertyValue::Int(0))?;
        self.graph
            .set_property(encoder, "bitrate", PropertyValue::Int(VIDEO_ENC_BITRATE))?;

        let parser = self.make_h264_parser(bin)?;
        let queue = self.make(bin, "queue", "video-queue")?;

        self.graph
            .link_many(&[src, caps, convert, sn12_caps, encoder, parser, queue])?;
        Ok(queue)
    }

    fn build_wayland(&self, bin: ElementId) -> Result<ElementId> {
        let src = self.make(bin, "waylandsrc", "videosrc")?;
        let caps = self.make(bin, "capsfilter", "videocaps")?;
        self.graph
            .set_property(caps, "caps", self.raw_video_caps(Some("SN12")))?;

        let encoder = self.make_video_encoder(bin)?;
        self.graph.set_property(
            encoder,
            "bitrate",
            PropertyValue::Int(CAPTURE_ENC_BITRATE),
        )?;

        let parser = self.make_h264_parser(bin)?;
        let queue = self.make(bin, "queue", "video-queue")?;

        self.graph.link_many(&[src, caps, encoder, parser, queue])?;
        Ok(queue)
    }

    /// Pre-recorded playback: the decodebin's encoded video pad is linked
    /// into the parser when it appears.
    fn build_file_demux(&self, bin: ElementId, uri: &str) -> Result<ElementId> {
        let src = self.make(bin, "uridecodebin", "videosrc")?;
        self.graph
            .set_property(src, "uri", PropertyValue::Str(uri.to_string()))?;

        let parser = self.make_h264_parser(bin)?;
        let queue = self.make(bin, "queue", "video-queue")?;
        self.graph.link(parser, queue)?;

        let graph = self.graph.clone();
        let parser_sink = self.graph.static_pad(parser, "sink")?;
        self.graph.connect_pad_added(
            src,
            Box::new(move |pad, caps| {
                if caps.contains("h264") || caps.contains("video") {
                    if let Err(e) = graph.link_pads(pad, parser_sink) {
                        warn!("failed to link demuxed video pad: {}", e);
                    }
                }
            }),
        )?;

        Ok(queue)
    }

    fn build_audio_bin(&self) -> Result<(ElementId, ElementId)> {
        let bin = self.graph.make_bin("audio-src-bin")?;
        let result = if self.config.audio_codec == crate::caps::AUDIO_LPCM {
            self.build_audio_lpcm(bin)
        } else {
            self.build_audio_encoded(bin)
        };
        match result {
            Ok(queue) => Ok((bin, queue)),
            Err(e) => {
                let _ = self.graph.destroy(bin);
                Err(e)
            }
        }
    }

    fn make_audio_source(&self, bin: ElementId) -> Result<ElementId> {
        let src = self.make(bin, "pulsesrc", "audiosrc")?;
        self.graph.set_property(
            src,
            "device",
            PropertyValue::Str(self.config.audio_device.clone()),
        )?;
        self.graph.set_property(
            src,
            "buffer-time",
            PropertyValue::Int(self.config.audio_buffer_time as i64),
        )?;
        self.graph.set_property(
            src,
            "latency-time",
            PropertyValue::Int(self.config.audio_latency_time as i64),
        )?;
        self.graph.set_property(
            src,
            "do-timestamp",
            PropertyValue::Bool(self.config.audio_do_timestamp),
        )?;
        self.graph
            .set_property(src, "provide-clock", PropertyValue::Bool(false))?;
        self.graph
            .set_property(src, "is-live", PropertyValue::Bool(true))?;
        Ok(src)
    }

    fn build_audio_encoded(&self, bin: ElementId) -> Result<ElementId> {
        let src = self.make_audio_source(bin)?;

        let caps = self.make(bin, "capsfilter", "audiocaps")?;
        self.graph.set_property(
            caps,
            "caps",
            PropertyValue::Caps(format!(
                "audio/x-raw,format=S16LE,rate={},channels=2",
                self.audio_frequency,
            )),
        )?;

        let factory = if self.config.audio_codec == crate::caps::AUDIO_AC3 {
            &self.config.audio_encoder_ac3_name
        } else {
            &self.config.audio_encoder_aac_name
        };
        let encoder = self.make(bin, factory, "audioenc")?;
        self.graph
            .set_property(encoder, "compliance", PropertyValue::Int(-2))?;
        self.graph.set_property(
            encoder,
            "tolerance",
            PropertyValue::Int(AUDIO_ENC_TOLERANCE_NS),
        )?;
        self.graph
            .set_property(encoder, "bitrate", PropertyValue::Int(AUDIO_ENC_BITRATE))?;
        self.graph
            .set_property(encoder, "rate-control", PropertyValue::Int(2))?;

        let queue = self.make(bin, "queue", "audio-queue")?;
        self.graph.link_many(&[src, caps, encoder, queue])?;
        Ok(queue)
    }

    /// Raw LPCM pass-through, big endian as the TS muxer expects.
    fn build_audio_lpcm(&self, bin: ElementId) -> Result<ElementId> {
        let src = self.make_audio_source(bin)?;
        self.graph
            .set_property(src, "blocksize", PropertyValue::Int(LPCM_BLOCK_SIZE))?;

        let setter = self.make(bin, "capssetter", "audio_convert")?;
        self.graph.set_property(
            setter,
            "caps",
            PropertyValue::Caps(
                "audio/x-lpcm,width=16,rate=48000,channels=2,dynamic_range=0,\
                 emphasis=false,mute=false"
                    .to_string(),
            ),
        )?;
        self.graph
            .set_property(setter, "join", PropertyValue::Bool(false))?;
        self.graph
            .set_property(setter, "replace", PropertyValue::Bool(true))?;

        let caps = self.make(bin, "capsfilter", "audiocaps")?;
        self.graph.set_property(
            caps,
            "caps",
            PropertyValue::Caps("audio/x-raw,format=S16BE,rate=48000,channels=2".to_string()),
        )?;

        let queue = self.make(bin, "queue", "audio-queue")?;
        self.graph.link_many(&[src, setter, caps, queue])?;
        Ok(queue)
    }

    fn attach_dump_probe(&self, mux: ElementId) -> Result<()> {
        let pad = self.graph.static_pad(mux, "src")?;
        self.graph.add_probe(
            pad,
            ProbeType::Buffer,
            Box::new(|info| {
                if let ProbeData::Buffer(ref data) = info.data {
                    if let Ok(mut file) =
                        OpenOptions::new().create(true).append(true).open(DUMP_TS_PATH)
                    {
                        let _ = file.write_all(data);
                    }
                }
                ProbeReturn::Ok
            }),
        )?;
        Ok(())
    }
}

/// Sets the whole pipeline to the given state.
pub fn set_pipeline_state(
    graph: &Arc<dyn MediaGraph>,
    pipeline: &Pipeline,
    state: GraphState,
) -> Result<()> {
    graph.set_state(pipeline.srcbin, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::TestGraph;

    fn test_config() -> SourceConfig {
        SourceConfig {
            dump_ts: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_videotest_topology() {
        let concrete = Arc::new(TestGraph::new());
        let graph: Arc<dyn MediaGraph> = concrete.clone();
        let pipeline = PipelineBuilder::new(graph, test_config()).build().unwrap();

        assert_eq!(concrete.factory_of(pipeline.mux).as_deref(), Some("mpegtsmux"));
        assert_eq!(
            concrete.factory_of(pipeline.payloader).as_deref(),
            Some("rtpmp2tpay")
        );
        assert!(concrete.elements_linked(pipeline.mux, pipeline.mux_queue));
        assert!(concrete.elements_linked(pipeline.mux_queue, pipeline.payloader));

        assert_eq!(
            concrete.pad_name(pipeline.mux_video_pad).as_deref(),
            Some(VIDEO_PID_PAD)
        );
        assert_eq!(
            concrete.pad_name(pipeline.mux_audio_pad).as_deref(),
            Some(AUDIO_PID_PAD)
        );

        assert_eq!(concrete.prop_u64(pipeline.payloader, "pt"), 33);
        let videosrc = concrete.element_by_name("videosrc").unwrap();
        assert_eq!(concrete.factory_of(videosrc).as_deref(), Some("videotestsrc"));
    }

    #[test]
    fn test_lpcm_audio_branch() {
        let concrete = Arc::new(TestGraph::new());
        let graph: Arc<dyn MediaGraph> = concrete.clone();
        let config = SourceConfig {
            audio_codec: crate::caps::AUDIO_LPCM,
            ..test_config()
        };
        PipelineBuilder::new(graph, config).build().unwrap();

        let setter = concrete.element_by_name("audio_convert").unwrap();
        assert_eq!(concrete.factory_of(setter).as_deref(), Some("capssetter"));
        let src = concrete.element_by_name("audiosrc").unwrap();
        assert_eq!(concrete.prop_u64(src, "blocksize"), 1920);
        assert!(concrete.element_by_name("audioenc").is_none());
    }

    #[test]
    fn test_build_failure_tears_down_partial_bins() {
        let concrete = Arc::new(TestGraph::new());
        concrete.fail_factory("mpegtsmux");
        let graph: Arc<dyn MediaGraph> = concrete.clone();

        let err = PipelineBuilder::new(graph, test_config())
            .build()
            .unwrap_err();
        assert!(matches!(err, WfdError::BuildFailed(_)));
        assert!(concrete.element_by_name("srcbin").is_none());
        assert!(concrete.element_by_name("videosrc").is_none());
    }

    #[test]
    fn test_xv_capture_encoder_knobs() {
        let concrete = Arc::new(TestGraph::new());
        let graph: Arc<dyn MediaGraph> = concrete.clone();
        let config = SourceConfig {
            video_src_variant: VideoSrcVariant::XvCapture,
            video_encoder_name: "omxh264enc".to_string(),
            ..test_config()
        };
        PipelineBuilder::new(graph, config).build().unwrap();

        let encoder = concrete.element_by_name("videoenc").unwrap();
        assert_eq!(concrete.prop_u64(encoder, "append-dci"), 1);
        assert_eq!(concrete.prop_u64(encoder, "idr-period"), 120);
        assert_eq!(concrete.prop_u64(encoder, "skip-inbuf"), 5);
    }
}
