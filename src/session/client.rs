//! The source-side WFD session: negotiation state machine, keepalive and
//! lifecycle.
//!
//! WFD inverts the usual RTSP roles: the server (source) sends requests
//! to the client (sink) over the sink-initiated connection. One
//! [`SourceSession`] owns that connection and drives the capability
//! handshake:
//!
//! ```text
//! Init -> M1Sent -> M2Received -> M3Sent -> M3Received -> M4Sent
//!      -> M4Received -> Ready -> (Setup -> Playing | Paused) -> Teardown
//! ```
//!
//! M1 is the source's OPTIONS, M2 the sink's OPTIONS back, M3 the
//! capability probe, M4 the negotiated commit, M5 the SETUP trigger.
//! After PLAY the session ticks two timers: the M16 keepalive every 55 s
//! (with a 5 s response budget) and an RTP statistics sample every 2 s.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::time::Instant;

use super::ports::{PortPair, PortPool};
use super::stats::{StatsCollector, STATS_INTERVAL};
use crate::caps::{self, NegotiatedConfig, SinkCaps, SourceCaps};
use crate::config::{SourceConfig, WFD_TIMEOUT_SECS};
use crate::error::{Result, WfdError};
use crate::graph::{GraphState, MediaGraph};
use crate::message::{
    ClientRtpPorts, ContentProtection, DisplayEdid, HdcpVersion, TriggerMethod, VideoFormats,
    WfdMessage,
};
use crate::pipeline::{set_pipeline_state, DirectStreamer, Pipeline, PipelineBuilder, SwapHandle};
use crate::rtsp::{Connection, Method, Request, Response, RtspMessage, WFD_FEATURE};

/// Time between M16 keepalive requests.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(WFD_TIMEOUT_SECS - 5);
/// Budget for the sink to answer a keepalive.
pub const KEEPALIVE_BUDGET: Duration = Duration::from_secs(5);
/// Budget for the sink to answer any other source request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(WFD_TIMEOUT_SECS);

/// Keepalives go to this literal URI regardless of the session host.
const KEEPALIVE_URI: &str = "rtsp://localhost/wfd1.0";

static SESSION_IDS: AtomicU32 = AtomicU32::new(0);

/// Where the state machine currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, nothing sent
    Init,
    /// M1 OPTIONS sent to the sink
    M1Sent,
    /// Sink's own OPTIONS answered
    M2Received,
    /// M3 capability probe sent
    M3Sent,
    /// Sink capabilities parsed and stored
    M3Received,
    /// M4 commit sent
    M4Sent,
    /// Sink acknowledged M4
    M4Received,
    /// SETUP trigger sent, waiting for the sink
    Ready,
    /// Transport established, pipeline built
    Setup,
    /// Streaming
    Playing,
    /// Paused by the sink
    Paused,
    /// Torn down
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    M1,
    M3,
    M4,
    Trigger(TriggerMethod),
    Keepalive,
}

#[derive(Debug)]
struct Pending {
    cseq: u32,
    kind: PendingKind,
    deadline: Instant,
}

/// Typed observer callbacks for session milestones.
#[derive(Default)]
pub struct SessionEvents {
    /// The sink's OPTIONS (M2) was answered
    pub on_options_request: Option<Box<dyn Fn() + Send + Sync>>,
    /// The sink's M3 capability answer was parsed
    pub on_get_parameter_request: Option<Box<dyn Fn(&SinkCaps) + Send + Sync>>,
    /// A keepalive round-trip exceeded its budget
    pub on_keepalive_fail: Option<Box<dyn Fn() + Send + Sync>>,
    /// The sink's PLAY was handled and streaming started
    pub on_playing_done: Option<Box<dyn Fn() + Send + Sync>>,
    /// Direct streaming ended and live capture was restored
    pub on_direct_stream_end: Option<Arc<dyn Fn() + Send + Sync>>,
}

enum Wake {
    Msg(RtspMessage),
    Keepalive,
    KeepaliveCheck,
    Stats,
    PendingTimeout,
}

/// Protocol hooks of a WFD session.
///
/// [`SourceSession`] implements the complete source behavior; embedders
/// with a divergent sink can wrap the session and intercept these.
#[async_trait]
pub trait SessionHandler {
    /// Answers the sink's OPTIONS (M2) and advances to M3.
    async fn handle_options(&mut self, request: Request) -> Result<()>;
    /// Answers a GET_PARAMETER from the sink (liveness probe).
    async fn handle_get_parameter(&mut self, request: Request) -> Result<()>;
    /// Answers a SET_PARAMETER from the sink (keepalive, IDR request).
    async fn handle_set_parameter(&mut self, request: Request) -> Result<()>;
    /// Handles the sink's PLAY (M7).
    async fn handle_play_request(&mut self, request: Request) -> Result<()>;
    /// Correlates a sink response with the outstanding source request.
    async fn handle_response(&mut self, response: Response) -> Result<()>;
    /// The local presentation path for a request URI.
    fn make_path(&self, uri: &str) -> String;
    /// Builds the media pipeline once transport is being set up.
    async fn configure_media(&mut self) -> Result<()>;
}

/// One per-sink WFD source session.
pub struct SourceSession {
    conn: Connection,
    config: SourceConfig,
    graph: Arc<dyn MediaGraph>,
    state: SessionState,
    cseq: u32,
    outstanding: Vec<Pending>,
    m1_done: bool,
    m3_done: bool,
    m4_done: bool,
    keepalive_flag: Arc<Mutex<bool>>,
    keepalive_deadline: Option<Instant>,
    sink_caps: Option<SinkCaps>,
    negotiated: Option<NegotiatedConfig>,
    pipeline: Option<Pipeline>,
    streamer: Option<DirectStreamer>,
    stats: Option<Arc<StatsCollector>>,
    port_pool: Option<Arc<PortPool>>,
    server_ports: Option<PortPair>,
    session_id: Option<String>,
    events: SessionEvents,
    torn_down: bool,
}

impl SourceSession {
    /// Creates a session over an accepted sink connection.
    pub fn new(conn: Connection, config: SourceConfig, graph: Arc<dyn MediaGraph>) -> Self {
        Self {
            conn,
            config,
            graph,
            state: SessionState::Init,
            cseq: 0,
            outstanding: Vec::new(),
            m1_done: false,
            m3_done: false,
            m4_done: false,
            keepalive_flag: Arc::new(Mutex::new(false)),
            keepalive_deadline: None,
            sink_caps: None,
            negotiated: None,
            pipeline: None,
            streamer: None,
            stats: None,
            port_pool: None,
            server_ports: None,
            session_id: None,
            events: SessionEvents::default(),
            torn_down: false,
        }
    }

    /// Attaches a server-side UDP port pool used during SETUP.
    pub fn with_port_pool(mut self, pool: Arc<PortPool>) -> Self {
        self.port_pool = Some(pool);
        self
    }

    /// Mutable access to the observer callbacks.
    pub fn events_mut(&mut self) -> &mut SessionEvents {
        &mut self.events
    }

    /// Current state of the state machine.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The negotiated configuration, once M3 has been answered.
    pub fn negotiated(&self) -> Option<&NegotiatedConfig> {
        self.negotiated.as_ref()
    }

    /// The parsed sink capabilities, once M3 has been answered.
    pub fn sink_caps(&self) -> Option<&SinkCaps> {
        self.sink_caps.as_ref()
    }

    /// Whether the M1/M3/M4 exchange has fully completed.
    pub fn is_established(&self) -> bool {
        self.m1_done && self.m3_done && self.m4_done
    }

    fn next_cseq(&mut self) -> u32 {
        self.cseq += 1;
        self.cseq
    }

    /// Kicks off the handshake by sending M1.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Init {
            return Err(WfdError::Transport("session already started".into()));
        }
        let cseq = self.next_cseq();
        let request = Request::new(Method::Options, "*")
            .header("CSeq", &cseq.to_string())
            .header("Require", WFD_FEATURE);
        debug!("sending M1 (OPTIONS)");
        self.send_source_request(request, cseq, PendingKind::M1)
            .await?;
        self.state = SessionState::M1Sent;
        Ok(())
    }

    /// Drives the session until teardown, fatal error or connection
    /// drop. Always tears the session down before returning.
    pub async fn run(&mut self) -> Result<()> {
        let result = self.run_loop().await;
        if let Err(ref e) = result {
            error!("session failed: {}", e);
        }
        self.teardown().await;
        result
    }

    async fn run_loop(&mut self) -> Result<()> {
        let mut keepalive_ticks: Option<tokio::time::Interval> = None;
        let mut stats_ticks: Option<tokio::time::Interval> = None;

        loop {
            if self.state == SessionState::Teardown {
                return Ok(());
            }

            if self.state == SessionState::Playing && keepalive_ticks.is_none() {
                let now = Instant::now();
                keepalive_ticks = Some(tokio::time::interval_at(
                    now + KEEPALIVE_INTERVAL,
                    KEEPALIVE_INTERVAL,
                ));
                stats_ticks = Some(tokio::time::interval_at(
                    now + STATS_INTERVAL,
                    STATS_INTERVAL,
                ));
            }

            let keepalive_check = self.keepalive_deadline;
            let pending_deadline = self.outstanding.iter().map(|p| p.deadline).min();
            let far = Instant::now() + Duration::from_secs(3600);
            let keepalive_armed = keepalive_ticks.is_some();
            let stats_armed = stats_ticks.is_some();

            let wake = tokio::select! {
                msg = self.conn.read_message() => Wake::Msg(msg?),
                _ = async { keepalive_ticks.as_mut().unwrap().tick().await },
                    if keepalive_armed => Wake::Keepalive,
                _ = async { stats_ticks.as_mut().unwrap().tick().await },
                    if stats_armed => Wake::Stats,
                _ = tokio::time::sleep_until(keepalive_check.unwrap_or(far)),
                    if keepalive_check.is_some() => Wake::KeepaliveCheck,
                _ = tokio::time::sleep_until(pending_deadline.unwrap_or(far)),
                    if pending_deadline.is_some() => Wake::PendingTimeout,
            };

            match wake {
                Wake::Msg(message) => self.handle_message(message).await?,
                Wake::Keepalive => self.send_keepalive().await?,
                Wake::KeepaliveCheck => self.check_keepalive()?,
                Wake::Stats => {
                    if let Some(ref stats) = self.stats {
                        stats.sample();
                    }
                }
                Wake::PendingTimeout => {
                    let now = Instant::now();
                    if let Some(expired) =
                        self.outstanding.iter().find(|p| p.deadline <= now)
                    {
                        return Err(WfdError::Transport(format!(
                            "no response to {:?} within {:?}",
                            expired.kind, REQUEST_TIMEOUT,
                        )));
                    }
                }
            }
        }
    }

    /// Handles a single incoming message. Exposed for tests driving the
    /// session message by message.
    pub async fn handle_message(&mut self, message: RtspMessage) -> Result<()> {
        match message {
            RtspMessage::Request(request) => match request.method {
                Method::Options => self.handle_options(request).await,
                Method::GetParameter => self.handle_get_parameter(request).await,
                Method::SetParameter => self.handle_set_parameter(request).await,
                Method::Setup => self.handle_setup(request).await,
                Method::Play => self.handle_play_request(request).await,
                Method::Pause => self.handle_pause(request).await,
                Method::Teardown => self.handle_teardown_request(request).await,
            },
            RtspMessage::Response(response) => self.handle_response(response).await,
        }
    }

    async fn send_source_request(
        &mut self,
        request: Request,
        cseq: u32,
        kind: PendingKind,
    ) -> Result<()> {
        self.conn.send(&request.to_bytes()).await?;
        self.outstanding.push(Pending {
            cseq,
            kind,
            deadline: Instant::now() + REQUEST_TIMEOUT,
        });
        Ok(())
    }

    async fn send_response(&mut self, response: Response) -> Result<()> {
        self.conn.send(&response.to_bytes()).await
    }

    /// Sends M3: a GET_PARAMETER asking the sink to disclose the five
    /// negotiable parameters.
    async fn send_m3(&mut self) -> Result<()> {
        let mut probe = WfdMessage::new();
        probe.audio_codecs = Some(Vec::new());
        probe.video_formats = Some(VideoFormats::default());
        probe.display_edid = Some(DisplayEdid {
            supported: false,
            block_count: 0,
            payload: None,
        });
        probe.content_protection = Some(ContentProtection {
            hdcp: HdcpVersion::None,
            tcp_port: None,
        });
        probe.client_rtp_ports = Some(ClientRtpPorts {
            profile: String::new(),
            rtp_port0: 0,
            rtp_port1: 0,
            mode: String::new(),
        });

        let cseq = self.next_cseq();
        let uri = format!("rtsp://{}/wfd1.0", self.config.host_address);
        let request = Request::new(Method::GetParameter, &uri)
            .header("CSeq", &cseq.to_string())
            .header("Content-Type", "text/parameters")
            .body(probe.param_names_as_text());
        debug!("sending M3 (GET_PARAMETER probe)");
        self.send_source_request(request, cseq, PendingKind::M3)
            .await?;
        self.state = SessionState::M3Sent;
        Ok(())
    }

    /// Sends M4: a SET_PARAMETER carrying the negotiated configuration.
    async fn send_m4(&mut self) -> Result<()> {
        let negotiated = self
            .negotiated
            .as_ref()
            .ok_or_else(|| WfdError::NegotiationFailed("no negotiated config".into()))?;
        let body = negotiated.to_message().as_text();

        let cseq = self.next_cseq();
        let uri = format!("rtsp://{}/wfd1.0", self.config.host_address);
        let request = Request::new(Method::SetParameter, &uri)
            .header("CSeq", &cseq.to_string())
            .header("Content-Type", "text/parameters")
            .body(body);
        debug!("sending M4 (SET_PARAMETER commit)");
        self.send_source_request(request, cseq, PendingKind::M4)
            .await?;
        self.state = SessionState::M4Sent;
        Ok(())
    }

    /// Sends a trigger (M5 for SETUP): the sink initiates the named RTSP
    /// method in response.
    pub async fn trigger(&mut self, method: TriggerMethod) -> Result<()> {
        let body = WfdMessage {
            trigger_method: Some(method),
            ..Default::default()
        }
        .as_text();

        let cseq = self.next_cseq();
        let uri = format!("rtsp://{}/wfd1.0", self.config.host_address);
        let mut request = Request::new(Method::SetParameter, &uri)
            .header("CSeq", &cseq.to_string())
            .header("Content-Type", "text/parameters");
        if let Some(ref id) = self.session_id {
            request = request.header("Session", id);
        }
        let request = request.body(body);
        debug!("sending trigger {:?}", method);
        self.send_source_request(request, cseq, PendingKind::Trigger(method))
            .await
    }

    /// Sends M16 and arms the 5 s response check.
    async fn send_keepalive(&mut self) -> Result<()> {
        let cseq = self.next_cseq();
        let mut request =
            Request::new(Method::GetParameter, KEEPALIVE_URI).header("CSeq", &cseq.to_string());
        if let Some(ref id) = self.session_id {
            request = request.header("Session", id);
        }
        debug!("sending M16 keepalive");
        self.send_source_request(request, cseq, PendingKind::Keepalive)
            .await?;

        *self.keepalive_flag.lock().unwrap() = false;
        self.keepalive_deadline = Some(Instant::now() + KEEPALIVE_BUDGET);
        Ok(())
    }

    fn check_keepalive(&mut self) -> Result<()> {
        self.keepalive_deadline = None;
        if *self.keepalive_flag.lock().unwrap() {
            return Ok(());
        }
        warn!("sink missed the keepalive budget");
        if let Some(ref callback) = self.events.on_keepalive_fail {
            callback();
        }
        Err(WfdError::KeepaliveTimeout)
    }

    async fn handle_setup(&mut self, request: Request) -> Result<()> {
        info!("sink initiated SETUP");
        self.configure_media().await?;

        let session_id = format!("{:08X}", SESSION_IDS.fetch_add(1, Ordering::SeqCst) + 1);

        let mut transport = request
            .get_header("Transport")
            .unwrap_or("RTP/AVP/UDP;unicast")
            .to_string();
        if let Some(pool) = self.port_pool.as_ref() {
            if let Some(pair) = pool.acquire() {
                transport = format!("{};server_port={}-{}", transport, pair.rtp, pair.rtcp);
                self.server_ports = Some(pair);
            }
        }

        let response = Response::for_request(200, &request)
            .header("Session", &format!("{};timeout={}", session_id, WFD_TIMEOUT_SECS))
            .header("Transport", &transport);
        self.send_response(response).await?;

        self.session_id = Some(session_id);
        self.state = SessionState::Setup;
        Ok(())
    }

    async fn handle_pause(&mut self, request: Request) -> Result<()> {
        let response = Response::for_request(200, &request);
        self.send_response(response).await?;
        if let Some(ref pipeline) = self.pipeline {
            set_pipeline_state(&self.graph, pipeline, GraphState::Paused)?;
        }
        self.state = SessionState::Paused;
        Ok(())
    }

    async fn handle_teardown_request(&mut self, request: Request) -> Result<()> {
        let response = Response::for_request(200, &request);
        self.send_response(response).await?;
        self.state = SessionState::Teardown;
        Ok(())
    }

    fn negotiate(&mut self) -> Result<()> {
        let sink = self
            .sink_caps
            .as_ref()
            .ok_or_else(|| WfdError::NegotiationFailed("no sink capabilities".into()))?;
        let source = SourceCaps {
            audio_codecs: self.config.audio_codec,
            video_resolution_supported: self.config.video_resolution_supported,
            video_native_family: self.config.video_native_resolution,
        };
        let negotiated = caps::negotiate(&source, sink, &self.config.host_address)?;
        self.config.negotiated_resolution =
            (negotiated.video.mode.width, negotiated.video.mode.height);
        self.negotiated = Some(negotiated);
        Ok(())
    }

    /// Swaps a pre-recorded file into the running session. The returned
    /// handle resolves when the payloader is fed by the file pipeline.
    pub async fn start_direct_stream(&mut self, uri: &str) -> Result<SwapHandle> {
        let streamer = self
            .streamer
            .as_ref()
            .ok_or_else(|| WfdError::SwapAborted("no pipeline to swap".into()))?;
        streamer.start(uri).await
    }

    /// Tears the session down: pipeline to Null and destroyed, ports
    /// released, timers cleared. Safe to call more than once.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        info!("tearing down session");

        self.outstanding.clear();
        self.keepalive_deadline = None;
        self.streamer = None;
        self.stats = None;

        if let Some(pipeline) = self.pipeline.take() {
            let _ = set_pipeline_state(&self.graph, &pipeline, GraphState::Null);
            let _ = self.graph.destroy(pipeline.srcbin);
        }

        if let (Some(pool), Some(pair)) = (self.port_pool.as_ref(), self.server_ports.take()) {
            pool.release(pair);
        }

        self.state = SessionState::Teardown;
    }
}

#[async_trait]
impl SessionHandler for SourceSession {
    /// M2: answer with the source's method list plus the WFD feature
    /// token, echoing the sink's User-Agent.
    async fn handle_options(&mut self, request: Request) -> Result<()> {
        let public = [
            Method::Options.as_str(),
            Method::Pause.as_str(),
            Method::Play.as_str(),
            Method::Setup.as_str(),
            Method::GetParameter.as_str(),
            Method::SetParameter.as_str(),
            Method::Teardown.as_str(),
            WFD_FEATURE,
        ]
        .join(", ");

        let mut response = Response::for_request(200, &request).header("Public", &public);
        if let Some(agent) = request.get_header("User-Agent") {
            response = response.header("User-Agent", agent);
        }
        self.send_response(response).await?;
        debug!("answered M2 (sink OPTIONS)");

        if self.state == SessionState::M1Sent || self.state == SessionState::Init {
            self.state = SessionState::M2Received;
        }
        if let Some(ref callback) = self.events.on_options_request {
            callback();
        }

        self.send_m3().await
    }

    async fn handle_get_parameter(&mut self, request: Request) -> Result<()> {
        // An empty GET_PARAMETER is a liveness probe.
        let response = Response::for_request(200, &request);
        self.send_response(response).await
    }

    async fn handle_set_parameter(&mut self, request: Request) -> Result<()> {
        if !request.body.is_empty() {
            let body = String::from_utf8_lossy(&request.body);
            if body.contains("wfd_idr_request") {
                info!("sink requested an IDR frame");
            }
        }
        let response = Response::for_request(200, &request);
        self.send_response(response).await
    }

    /// M7: start streaming, keepalive and statistics.
    async fn handle_play_request(&mut self, request: Request) -> Result<()> {
        let response = Response::for_request(200, &request);
        self.send_response(response).await?;

        if let Some(ref pipeline) = self.pipeline {
            set_pipeline_state(&self.graph, pipeline, GraphState::Playing)?;
        }
        self.state = SessionState::Playing;
        info!("streaming started");

        if let Some(ref callback) = self.events.on_playing_done {
            callback();
        }
        Ok(())
    }

    async fn handle_response(&mut self, response: Response) -> Result<()> {
        let cseq = match response.cseq() {
            Some(cseq) => cseq,
            None => {
                warn!("response without CSeq, dropping");
                return Ok(());
            }
        };
        let position = match self.outstanding.iter().position(|p| p.cseq == cseq) {
            Some(position) => position,
            None => {
                warn!("response with unknown CSeq {}, dropping", cseq);
                return Ok(());
            }
        };
        let pending = self.outstanding.remove(position);

        if !response.is_ok() {
            match pending.kind {
                PendingKind::M1 | PendingKind::M3 | PendingKind::M4 => {
                    return Err(WfdError::Transport(format!(
                        "sink answered {:?} with status {}",
                        pending.kind, response.status,
                    )));
                }
                PendingKind::Trigger(method) => {
                    warn!("sink rejected trigger {:?}: {}", method, response.status);
                    return Ok(());
                }
                PendingKind::Keepalive => return Ok(()),
            }
        }

        match pending.kind {
            PendingKind::M1 => {
                info!("M1 done");
                self.m1_done = true;
            }
            PendingKind::M3 => {
                let message = WfdMessage::parse(&response.body)?;
                let sink = SinkCaps::from_message(&message);
                info!(
                    "M3 done: {} audio codecs, video {}",
                    sink.audio.len(),
                    if sink.video.is_some() { "yes" } else { "no" },
                );
                self.sink_caps = Some(sink);
                self.m3_done = true;
                self.state = SessionState::M3Received;
                if let Some(ref callback) = self.events.on_get_parameter_request {
                    if let Some(ref caps) = self.sink_caps {
                        callback(caps);
                    }
                }
                self.negotiate()?;
                self.send_m4().await?;
            }
            PendingKind::M4 => {
                info!("M4 done, triggering SETUP");
                self.m4_done = true;
                self.state = SessionState::M4Received;
                self.trigger(TriggerMethod::Setup).await?;
                self.state = SessionState::Ready;
            }
            PendingKind::Trigger(method) => {
                debug!("trigger {:?} acknowledged", method);
            }
            PendingKind::Keepalive => {
                debug!("M16 response received");
                *self.keepalive_flag.lock().unwrap() = true;
                self.keepalive_deadline = None;
            }
        }

        Ok(())
    }

    fn make_path(&self, _uri: &str) -> String {
        "/wfd1.0/streamid=0".to_string()
    }

    async fn configure_media(&mut self) -> Result<()> {
        let mut builder = PipelineBuilder::new(self.graph.clone(), self.config.clone());
        if let Some(ref negotiated) = self.negotiated {
            builder = builder.with_negotiated(negotiated);
        }
        let pipeline = builder.build()?;

        self.stats = Some(StatsCollector::attach(
            self.graph.clone(),
            pipeline.payloader,
            pipeline.payloader,
        )?);

        let streamer = DirectStreamer::new(self.graph.clone(), &pipeline);
        if let Some(ref callback) = self.events.on_direct_stream_end {
            let callback = callback.clone();
            streamer.on_direct_stream_end(Box::new(move || callback()));
        }
        self.streamer = Some(streamer);
        self.pipeline = Some(pipeline);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_constants() {
        assert_eq!(KEEPALIVE_INTERVAL, Duration::from_secs(55));
        assert_eq!(KEEPALIVE_BUDGET, Duration::from_secs(5));
        assert_eq!(REQUEST_TIMEOUT, Duration::from_secs(60));
    }
}
