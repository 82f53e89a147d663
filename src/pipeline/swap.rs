//! Live pad-swap between the capture pipeline and a file pipeline.
//!
//! Direct streaming substitutes a pre-recorded MPEG-TS stream for the
//! live capture without touching the RTP payloader, so the sink observes
//! one unbroken RTP sequence. The swap happens inside an idle probe on
//! the payloader's sink pad (the only safe moment to relink), guarded by
//! an atomic one-shot flag so concurrent idle notifications from
//! different streaming threads cannot restructure the graph twice. When
//! the file ends, the EOS is swallowed before it can reach the payloader
//! and the reverse swap is deferred onto the runtime's main loop, which
//! is the only thread allowed to tear elements down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use log::{info, warn};
use tokio::sync::oneshot;
use url::Url;

use super::builder::{Pipeline, AUDIO_PID_PAD, VIDEO_PID_PAD};
use super::discover::{discover, Discovery};
use crate::error::{Result, WfdError};
use crate::graph::{
    ElementId, Event, GraphState, MediaGraph, PadId, ProbeData, ProbeReturn, ProbeType,
    PropertyValue, Structure,
};

/// Name of the custom event substituted for the file's EOS.
pub const FILL_EOS_EVENT: &str = "fillEOS";

/// Completion handle for a hot-swap; resolves once the payloader has
/// been fully reattached to the file pipeline.
#[derive(Debug)]
pub struct SwapHandle {
    rx: oneshot::Receiver<Result<()>>,
}

impl SwapHandle {
    /// Waits for the swap to complete.
    pub async fn wait(self) -> Result<()> {
        self.rx
            .await
            .map_err(|_| WfdError::SwapAborted("swap abandoned before completion".into()))?
    }
}

#[derive(Debug)]
struct DirectPipeline {
    bin: ElementId,
    tsmux_src: PadId,
    fakesink: ElementId,
    ghost_src: Option<PadId>,
}

struct SwapShared {
    graph: Arc<dyn MediaGraph>,
    live: Pipeline,
    in_pad_probe: AtomicBool,
    linked: Mutex<bool>,
    cond: Condvar,
    direct: Mutex<Option<DirectPipeline>>,
    last_discovery: Mutex<Option<Discovery>>,
    tmp_fakesink: Mutex<Option<ElementId>>,
    on_direct_stream_end: Mutex<Option<Box<dyn Fn() + Send>>>,
}

/// Coordinates direct streaming for one session's live pipeline.
pub struct DirectStreamer {
    shared: Arc<SwapShared>,
}

impl DirectStreamer {
    /// Creates a coordinator bound to a built live pipeline.
    pub fn new(graph: Arc<dyn MediaGraph>, live: &Pipeline) -> Self {
        Self {
            shared: Arc::new(SwapShared {
                graph,
                live: live.clone(),
                in_pad_probe: AtomicBool::new(false),
                linked: Mutex::new(false),
                cond: Condvar::new(),
                direct: Mutex::new(None),
                last_discovery: Mutex::new(None),
                tmp_fakesink: Mutex::new(None),
                on_direct_stream_end: Mutex::new(None),
            }),
        }
    }

    /// Registers the callback fired after the live pipeline has been
    /// restored and the file pipeline torn down.
    pub fn on_direct_stream_end(&self, callback: Box<dyn Fn() + Send>) {
        *self.shared.on_direct_stream_end.lock().unwrap() = Some(callback);
    }

    /// Whether the payloader is currently fed by the file pipeline.
    pub fn is_active(&self) -> bool {
        self.shared.direct.lock().unwrap().is_some()
    }

    /// The discovery result of the most recent direct stream.
    pub fn last_discovery(&self) -> Option<Discovery> {
        self.shared.last_discovery.lock().unwrap().clone()
    }

    /// Blocks until the forward swap has linked the file pipeline, for
    /// callers living outside the async runtime. Returns false on
    /// timeout.
    pub fn wait_linked(&self, timeout: Duration) -> bool {
        let guard = self.shared.linked.lock().unwrap();
        let (guard, result) = self
            .shared
            .cond
            .wait_timeout_while(guard, timeout, |linked| !*linked)
            .unwrap();
        drop(guard);
        !result.timed_out()
    }

    /// Starts direct streaming of `uri`.
    ///
    /// Discovers the URI, builds the file pipeline and arms the idle
    /// probe that performs the swap. The returned handle resolves when
    /// the payloader has been reattached; restoration back to live
    /// capture happens automatically at file EOS.
    pub async fn start(&self, uri: &str) -> Result<SwapHandle> {
        if self.is_active() {
            return Err(WfdError::SwapAborted("direct stream already active".into()));
        }

        let discovery = discover(&self.shared.graph, uri).await?;
        let direct = self.build_direct_pipeline(&discovery, uri)?;
        *self.shared.last_discovery.lock().unwrap() = Some(discovery);
        *self.shared.direct.lock().unwrap() = Some(direct);

        let (tx, rx) = oneshot::channel();
        let shared = self.shared.clone();
        let mut tx = Some(tx);
        self.shared.graph.add_probe(
            self.shared.live.payloader_sink,
            ProbeType::Idle,
            Box::new(move |_info| {
                // One-shot: concurrent idle notifications must not swap
                // twice.
                if shared.in_pad_probe.swap(true, Ordering::AcqRel) {
                    warn!("swap probe re-entered, ignoring");
                    return ProbeReturn::Ok;
                }

                let result = forward_swap(&shared);
                if result.is_ok() {
                    arm_eos_probe(&shared);
                }
                shared.in_pad_probe.store(false, Ordering::Release);

                if let Some(tx) = tx.take() {
                    let _ = tx.send(result);
                }
                ProbeReturn::Remove
            }),
        )?;

        Ok(SwapHandle { rx })
    }

    /// Builds `source -> demuxer -> parsers -> tsmux -> fakesink`.
    fn build_direct_pipeline(&self, discovery: &Discovery, uri: &str) -> Result<DirectPipeline> {
        let graph = &self.shared.graph;
        let bin = graph.make_bin("direct-pipeline")?;
        match self.build_direct_into(bin, discovery, uri) {
            Ok(direct) => Ok(direct),
            Err(e) => {
                let _ = graph.destroy(bin);
                Err(e)
            }
        }
    }

    fn build_direct_into(
        &self,
        bin: ElementId,
        discovery: &Discovery,
        uri: &str,
    ) -> Result<DirectPipeline> {
        let graph = &self.shared.graph;

        let source_factory = if discovery.source_factory.is_empty() {
            "filesrc"
        } else {
            discovery.source_factory.as_str()
        };
        let source = graph.make_element(source_factory, "direct-src")?;
        graph.add(bin, source)?;
        graph.set_property(source, "location", PropertyValue::Str(uri_location(uri)))?;

        let demux_factory = if discovery.demux_factory.is_empty() {
            "tsdemux"
        } else {
            discovery.demux_factory.as_str()
        };
        let demux = graph.make_element(demux_factory, "direct-demux")?;
        graph.add(bin, demux)?;
        graph.link(source, demux)?;

        let vparse = graph.make_element("h264parse", "direct-vparse")?;
        graph.add(bin, vparse)?;
        graph.set_property(vparse, "config-interval", PropertyValue::Int(1))?;
        let vqueue = graph.make_element("queue", "direct-vqueue")?;
        graph.add(bin, vqueue)?;
        graph.link(vparse, vqueue)?;

        let with_audio = discovery.has_aac || discovery.has_ac3;
        let aparse_sink = if with_audio {
            let aparse = graph.make_element("aacparse", "direct-aparse")?;
            graph.add(bin, aparse)?;
            let aqueue = graph.make_element("queue", "direct-aqueue")?;
            graph.add(bin, aqueue)?;
            graph.link(aparse, aqueue)?;
            Some((graph.static_pad(aparse, "sink")?, aqueue))
        } else {
            None
        };

        let tsmux = graph.make_element("mpegtsmux", "direct-tsmux")?;
        graph.add(bin, tsmux)?;
        graph.set_property(tsmux, "wfd-mode", PropertyValue::Bool(true))?;

        let mux_video = graph.request_pad(tsmux, VIDEO_PID_PAD)?;
        graph.link_pads(graph.static_pad(vqueue, "src")?, mux_video)?;
        if let Some((_, aqueue)) = aparse_sink {
            let mux_audio = graph.request_pad(tsmux, AUDIO_PID_PAD)?;
            graph.link_pads(graph.static_pad(aqueue, "src")?, mux_audio)?;
        }

        let fakesink = graph.make_element("fakesink", "direct-fakesink")?;
        graph.add(bin, fakesink)?;
        graph.link(tsmux, fakesink)?;

        // The demuxer's pads appear only once data flows; sniff caps to
        // route them.
        let pad_graph = graph.clone();
        let vparse_sink = graph.static_pad(vparse, "sink")?;
        let audio_sink = aparse_sink.map(|(sink, _)| sink);
        graph.connect_pad_added(
            demux,
            Box::new(move |pad, caps| {
                let target = if caps.contains("h264") || caps.contains("video") {
                    Some(vparse_sink)
                } else if caps.contains("audio") {
                    audio_sink
                } else {
                    None
                };
                if let Some(target) = target {
                    if let Err(e) = pad_graph.link_pads(pad, target) {
                        warn!("failed to link demuxer pad ({}): {}", caps, e);
                    }
                }
            }),
        )?;

        graph.set_state(bin, GraphState::Playing)?;

        Ok(DirectPipeline {
            bin,
            tsmux_src: graph.static_pad(tsmux, "src")?,
            fakesink,
            ghost_src: None,
        })
    }
}

/// The forward swap body, executed inside the idle probe on a streaming
/// thread.
fn forward_swap(shared: &Arc<SwapShared>) -> Result<()> {
    let graph = &shared.graph;
    let live = &shared.live;

    // Copy the handles out; no lock may be held across graph calls.
    let (bin, tsmux_src, fakesink) = {
        let direct = shared.direct.lock().unwrap();
        let direct = direct
            .as_ref()
            .ok_or_else(|| WfdError::SwapAborted("no direct pipeline prepared".into()))?;
        (direct.bin, direct.tsmux_src, direct.fakesink)
    };

    graph.unlink_pads(live.mux_queue_src, live.payloader_sink)?;

    // The preroll fakesink has done its job; the tsmux now feeds the
    // payloader through a ghost pad.
    let fakesink_sink = graph.static_pad(fakesink, "sink")?;
    graph.unlink_pads(tsmux_src, fakesink_sink)?;
    graph.destroy(fakesink)?;

    let ghost = graph.ghost_pad(bin, "src", tsmux_src)?;
    graph.link_pads(ghost, live.payloader_sink)?;
    if let Some(direct) = shared.direct.lock().unwrap().as_mut() {
        direct.ghost_src = Some(ghost);
    }

    // Keep the idled live branch flowing into a drain so it does not
    // accumulate backpressure before it is paused.
    let drain = graph.make_element("fakesink", "live-drain")?;
    graph.add(live.srcbin, drain)?;
    let drain_sink = graph.static_pad(drain, "sink")?;
    graph.link_pads(live.mux_queue_src, drain_sink)?;
    *shared.tmp_fakesink.lock().unwrap() = Some(drain);

    for element in [live.video_bin, live.audio_bin, live.mux, live.mux_queue] {
        graph.set_state(element, GraphState::Paused)?;
    }

    let mut linked = shared.linked.lock().unwrap();
    *linked = true;
    shared.cond.notify_all();
    drop(linked);

    info!("direct stream linked into payloader");
    Ok(())
}

/// Installs the EOS-swallowing event probe on the payloader sink pad.
fn arm_eos_probe(shared: &Arc<SwapShared>) {
    let probe_shared = shared.clone();
    let result = shared.graph.add_probe(
        shared.live.payloader_sink,
        ProbeType::EventDownstream,
        Box::new(move |info| {
            if !matches!(info.data, ProbeData::Event(Event::Eos)) {
                return ProbeReturn::Ok;
            }
            if probe_shared.direct.lock().unwrap().is_none() {
                return ProbeReturn::Ok;
            }

            // The payloader must never see EOS; substitute a marker the
            // sink side ignores and restore live capture off the
            // streaming thread.
            let restore_shared = probe_shared.clone();
            probe_shared
                .graph
                .call_when_idle(Box::new(move || begin_restore(&restore_shared)));
            info.replace_event(Event::Custom(Structure::new(FILL_EOS_EVENT)));
            ProbeReturn::Remove
        }),
    );
    if let Err(e) = result {
        warn!("failed to install EOS probe: {}", e);
    }
}

/// First half of the reverse swap, dispatched on the main loop: wake the
/// live branches and arm the idle probe that relinks them.
fn begin_restore(shared: &Arc<SwapShared>) {
    let graph = &shared.graph;
    let live = &shared.live;

    for element in [live.video_bin, live.audio_bin, live.mux, live.mux_queue] {
        if let Err(e) = graph.sync_state_with_parent(element) {
            warn!("failed to resume live branch: {}", e);
        }
    }

    let probe_shared = shared.clone();
    let result = graph.add_probe(
        live.payloader_sink,
        ProbeType::Idle,
        Box::new(move |_info| {
            if probe_shared.in_pad_probe.swap(true, Ordering::AcqRel) {
                return ProbeReturn::Ok;
            }
            if let Err(e) = reverse_swap(&probe_shared) {
                warn!("reverse swap failed: {}", e);
            }
            probe_shared.in_pad_probe.store(false, Ordering::Release);
            ProbeReturn::Remove
        }),
    );
    if let Err(e) = result {
        warn!("failed to arm reverse swap probe: {}", e);
    }
}

/// The reverse swap body: put the live muxer queue back in front of the
/// payloader and defer file-pipeline teardown to the main loop.
fn reverse_swap(shared: &Arc<SwapShared>) -> Result<()> {
    let graph = &shared.graph;
    let live = &shared.live;

    let direct = shared
        .direct
        .lock()
        .unwrap()
        .take()
        .ok_or_else(|| WfdError::SwapAborted("no direct pipeline to remove".into()))?;

    if let Some(ghost) = direct.ghost_src {
        graph.unlink_pads(ghost, live.payloader_sink)?;
    }

    if let Some(drain) = shared.tmp_fakesink.lock().unwrap().take() {
        let drain_sink = graph.static_pad(drain, "sink")?;
        let _ = graph.unlink_pads(live.mux_queue_src, drain_sink);
        graph.destroy(drain)?;
    }

    graph.link_pads(live.mux_queue_src, live.payloader_sink)?;

    let mut linked = shared.linked.lock().unwrap();
    *linked = false;
    shared.cond.notify_all();
    drop(linked);

    // Element teardown must not run on a streaming thread.
    let teardown_shared = shared.clone();
    let bin = direct.bin;
    graph.call_when_idle(Box::new(move || {
        let _ = teardown_shared.graph.set_state(bin, GraphState::Null);
        let _ = teardown_shared.graph.destroy(bin);
        if let Some(callback) = teardown_shared.on_direct_stream_end.lock().unwrap().as_ref() {
            callback();
        }
        info!("direct stream ended, live capture restored");
    }));

    Ok(())
}

/// Maps a URI to the `location` property of the discovered source.
fn uri_location(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(url) if url.scheme() == "file" => url.path().to_string(),
        _ => uri.to_string(),
    }
}
