//! End-to-end negotiation tests: a simulated sink drives a real
//! [`SourceSession`] over a loopback TCP connection through the M1..M5
//! handshake, playback control and keepalive failure.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

use wfdio::caps::{AUDIO_AAC, AUDIO_LPCM};
use wfdio::config::SourceConfig;
use wfdio::error::WfdError;
use wfdio::graph::testing::TestGraph;
use wfdio::graph::MediaGraph;
use wfdio::rtsp::{Connection, Method, Request, Response, RtspMessage};
use wfdio::session::{SessionState, SourceSession};

const SINK_CAPS_BODY: &str = "wfd_audio_codecs: AAC 0000000e 00\r\n\
    wfd_video_formats: 30 00 02 02 00000040 00000000 00000000 00 0000 0000 00 none none\r\n\
    wfd_client_rtp_ports: RTP/AVP/UDP;unicast 19000 0 mode=play\r\n\
    wfd_display_edid: none\r\n\
    wfd_content_protection: none\r\n";

fn source_config() -> SourceConfig {
    SourceConfig {
        host_address: "192.0.2.1".to_string(),
        audio_codec: AUDIO_AAC | AUDIO_LPCM,
        // 1280x720p30 in the CEA table
        video_resolution_supported: 0x40,
        ..Default::default()
    }
}

/// Accepts a session on one end and hands the sink the other end of the
/// connection, with M1 already read and verified byte-exactly.
async fn start_session() -> (SourceSession, Connection, Arc<TestGraph>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let connect = TcpStream::connect(addr);
    let accept = listener.accept();
    let (sink_stream, accepted) = tokio::join!(connect, accept);
    let mut sink_stream = sink_stream.unwrap();
    let (source_stream, _) = accepted.unwrap();

    let concrete = Arc::new(TestGraph::new());
    let graph: Arc<dyn MediaGraph> = concrete.clone();
    let mut session = SourceSession::new(
        Connection::new(source_stream).unwrap(),
        source_config(),
        graph,
    );
    session.start().await.unwrap();

    // Scenario: the first bytes on the wire are exactly M1.
    let expected = b"OPTIONS * RTSP/1.0\r\nCSeq: 1\r\nRequire: org.wfa.wfd1.0\r\n\r\n";
    let mut m1 = vec![0u8; expected.len()];
    sink_stream.read_exact(&mut m1).await.unwrap();
    assert_eq!(m1, expected);

    (session, Connection::new(sink_stream).unwrap(), concrete)
}

async fn read_request(sink: &mut Connection) -> Request {
    match sink.read_message().await.unwrap() {
        RtspMessage::Request(request) => request,
        other => panic!("expected request, got {:?}", other),
    }
}

async fn read_response(sink: &mut Connection) -> Response {
    match sink.read_message().await.unwrap() {
        RtspMessage::Response(response) => response,
        other => panic!("expected response, got {:?}", other),
    }
}

async fn respond_ok(sink: &mut Connection, cseq: u32) {
    let response = Response {
        status: 200,
        reason: "OK".to_string(),
        headers: vec![("CSeq".to_string(), cseq.to_string())],
        body: bytes::Bytes::new(),
    };
    sink.send(&response.to_bytes()).await.unwrap();
}

async fn respond_with_body(sink: &mut Connection, cseq: u32, body: &str) {
    let response = Response {
        status: 200,
        reason: "OK".to_string(),
        headers: vec![
            ("CSeq".to_string(), cseq.to_string()),
            ("Content-Type".to_string(), "text/parameters".to_string()),
            ("Content-Length".to_string(), body.len().to_string()),
        ],
        body: bytes::Bytes::copy_from_slice(body.as_bytes()),
    };
    sink.send(&response.to_bytes()).await.unwrap();
}

/// Walks the sink through M1..M5 and returns once the SETUP trigger has
/// been acknowledged.
async fn drive_to_ready(sink: &mut Connection) {
    // Answer M1.
    respond_ok(sink, 1).await;

    // M2: the sink probes the source's methods.
    let options = Request::new(Method::Options, "*")
        .header("CSeq", "2")
        .header("User-Agent", "SinkX/1.0");
    sink.send(&options.to_bytes()).await.unwrap();

    let m2 = read_response(sink).await;
    assert_eq!(m2.status, 200);
    assert_eq!(m2.get_header("User-Agent"), Some("SinkX/1.0"));
    let public = m2.get_header("Public").unwrap();
    for token in [
        "OPTIONS",
        "PAUSE",
        "PLAY",
        "SETUP",
        "GET_PARAMETER",
        "SET_PARAMETER",
        "TEARDOWN",
        "org.wfa.wfd1.0",
    ] {
        assert!(public.contains(token), "Public is missing {}", token);
    }

    // M3: the capability probe body names exactly five parameters.
    let m3 = read_request(sink).await;
    assert_eq!(m3.method, Method::GetParameter);
    assert_eq!(m3.uri, "rtsp://192.0.2.1/wfd1.0");
    assert_eq!(m3.get_header("Content-Type"), Some("text/parameters"));
    let body = String::from_utf8(m3.body.to_vec()).unwrap();
    let mut lines: Vec<&str> = body.split("\r\n").filter(|l| !l.is_empty()).collect();
    lines.sort_unstable();
    assert_eq!(
        lines,
        vec![
            "wfd_audio_codecs",
            "wfd_client_rtp_ports",
            "wfd_content_protection",
            "wfd_display_edid",
            "wfd_video_formats",
        ]
    );
    let m3_cseq = m3.cseq().unwrap();
    respond_with_body(sink, m3_cseq, SINK_CAPS_BODY).await;

    // M4 carries the negotiated single-valued configuration.
    let m4 = read_request(sink).await;
    assert_eq!(m4.method, Method::SetParameter);
    let body = String::from_utf8(m4.body.to_vec()).unwrap();
    assert!(body.contains("wfd_audio_codecs: AAC 00000002 00\r\n"));
    assert!(body.contains("wfd_presentation_URL: rtsp://192.0.2.1/wfd1.0/streamid=0 none\r\n"));
    assert!(body.contains("wfd_client_rtp_ports: RTP/AVP/UDP;unicast 19000 0 mode=play\r\n"));
    assert!(body.contains("wfd_video_formats:"));
    assert!(body.contains("00000040"));
    respond_ok(sink, m4.cseq().unwrap()).await;

    // M5: the source asks the sink to SETUP.
    let m5 = read_request(sink).await;
    assert_eq!(m5.method, Method::SetParameter);
    assert_eq!(&m5.body[..], b"wfd_trigger_method: SETUP\r\n");
    respond_ok(sink, m5.cseq().unwrap()).await;
}

/// Performs SETUP and PLAY from the sink side.
async fn drive_to_playing(sink: &mut Connection) -> String {
    let setup = Request::new(Method::Setup, "rtsp://192.0.2.1/wfd1.0/streamid=0")
        .header("CSeq", "3")
        .header("Transport", "RTP/AVP/UDP;unicast;client_port=19000-19001");
    sink.send(&setup.to_bytes()).await.unwrap();
    let setup_resp = read_response(sink).await;
    assert_eq!(setup_resp.status, 200);
    let session_header = setup_resp.get_header("Session").unwrap().to_string();
    assert!(session_header.contains("timeout=60"));
    let session_id = session_header.split(';').next().unwrap().to_string();

    let play = Request::new(Method::Play, "rtsp://192.0.2.1/wfd1.0/streamid=0")
        .header("CSeq", "4")
        .header("Session", &session_id);
    sink.send(&play.to_bytes()).await.unwrap();
    let play_resp = read_response(sink).await;
    assert_eq!(play_resp.status, 200);

    session_id
}

#[tokio::test]
async fn test_full_negotiation_to_teardown() {
    let (mut session, mut sink, graph) = start_session().await;

    let played = Arc::new(AtomicU32::new(0));
    let played_counter = played.clone();
    session.events_mut().on_playing_done = Some(Box::new(move || {
        played_counter.fetch_add(1, Ordering::SeqCst);
    }));

    let session_task = tokio::spawn(async move {
        let result = session.run().await;
        (session, result)
    });

    drive_to_ready(&mut sink).await;
    let session_id = drive_to_playing(&mut sink).await;
    assert!(!session_id.is_empty());

    // The media pipeline exists and streams.
    let payloader = graph.element_by_name("pay0").unwrap();
    assert_eq!(graph.factory_of(payloader).as_deref(), Some("rtpmp2tpay"));
    assert_eq!(graph.prop_u64(payloader, "pt"), 33);

    let teardown = Request::new(Method::Teardown, "rtsp://192.0.2.1/wfd1.0/streamid=0")
        .header("CSeq", "5")
        .header("Session", &session_id);
    sink.send(&teardown.to_bytes()).await.unwrap();
    let teardown_resp = read_response(&mut sink).await;
    assert_eq!(teardown_resp.status, 200);

    let (session, result) = session_task.await.unwrap();
    result.unwrap();
    assert_eq!(session.state(), SessionState::Teardown);
    assert!(session.is_established());
    assert_eq!(played.load(Ordering::SeqCst), 1);

    // The pipeline was released during teardown.
    assert!(graph.element_by_name("srcbin").is_none());
}

#[tokio::test]
async fn test_negotiated_resolution_expansion() {
    let (mut session, mut sink, _graph) = start_session().await;

    let session_task = tokio::spawn(async move {
        let result = session.run().await;
        (session, result)
    });

    drive_to_ready(&mut sink).await;
    drop(sink);

    let (session, result) = session_task.await.unwrap();
    assert!(result.is_err());

    let negotiated = session.negotiated().unwrap();
    assert_eq!(negotiated.video.mode.width, 1280);
    assert_eq!(negotiated.video.mode.height, 720);
    assert_eq!(negotiated.video.mode.framerate, 30);
    assert!(!negotiated.video.mode.interleaved);
    assert_eq!(negotiated.audio.frequency, 48000);
    assert_eq!(negotiated.audio.channels, 2);
    assert_eq!(negotiated.rtp_port0, 19000);
}

#[tokio::test]
async fn test_negotiation_failure_tears_session_down() {
    let (mut session, mut sink, _graph) = start_session().await;

    let session_task = tokio::spawn(async move {
        let result = session.run().await;
        (session, result)
    });

    respond_ok(&mut sink, 1).await;
    let options = Request::new(Method::Options, "*").header("CSeq", "2");
    sink.send(&options.to_bytes()).await.unwrap();
    let _m2 = read_response(&mut sink).await;

    let m3 = read_request(&mut sink).await;
    // The sink only decodes a resolution the source cannot produce.
    let body = "wfd_audio_codecs: AAC 0000000e 00\r\n\
        wfd_video_formats: 30 00 02 02 00000080 00000000 00000000 00 0000 0000 00 none none\r\n\
        wfd_client_rtp_ports: RTP/AVP/UDP;unicast 19000 0 mode=play\r\n";
    respond_with_body(&mut sink, m3.cseq().unwrap(), body).await;

    let (session, result) = session_task.await.unwrap();
    assert!(matches!(result, Err(WfdError::NegotiationFailed(_))));
    assert_eq!(session.state(), SessionState::Teardown);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_failure_fires_once() {
    let (mut session, mut sink, _graph) = start_session().await;

    let failures = Arc::new(AtomicU32::new(0));
    let failure_counter = failures.clone();
    session.events_mut().on_keepalive_fail = Some(Box::new(move || {
        failure_counter.fetch_add(1, Ordering::SeqCst);
    }));

    let session_task = tokio::spawn(async move {
        let result = session.run().await;
        (session, result)
    });

    drive_to_ready(&mut sink).await;
    drive_to_playing(&mut sink).await;

    // The sink stops responding. 55 s later the source sends M16, and
    // 5 s after that the keepalive check fails.
    let m16 = read_request(&mut sink).await;
    assert_eq!(m16.method, Method::GetParameter);
    assert_eq!(m16.uri, "rtsp://localhost/wfd1.0");
    assert!(m16.body.is_empty());

    let (session, result) = session_task.await.unwrap();
    assert!(matches!(result, Err(WfdError::KeepaliveTimeout)));
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(session.state(), SessionState::Teardown);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_answered_keeps_session_alive() {
    let (mut session, mut sink, _graph) = start_session().await;

    let failures = Arc::new(AtomicU32::new(0));
    let failure_counter = failures.clone();
    session.events_mut().on_keepalive_fail = Some(Box::new(move || {
        failure_counter.fetch_add(1, Ordering::SeqCst);
    }));

    let session_task = tokio::spawn(async move {
        let result = session.run().await;
        (session, result)
    });

    drive_to_ready(&mut sink).await;
    let session_id = drive_to_playing(&mut sink).await;

    // Answer two keepalive rounds, then tear down cleanly.
    for _ in 0..2 {
        let m16 = read_request(&mut sink).await;
        respond_ok(&mut sink, m16.cseq().unwrap()).await;
    }
    assert_eq!(failures.load(Ordering::SeqCst), 0);

    let teardown = Request::new(Method::Teardown, "rtsp://192.0.2.1/wfd1.0/streamid=0")
        .header("CSeq", "9")
        .header("Session", &session_id);
    sink.send(&teardown.to_bytes()).await.unwrap();
    let _ = read_response(&mut sink).await;

    let (_session, result) = session_task.await.unwrap();
    result.unwrap();
    assert_eq!(failures.load(Ordering::SeqCst), 0);
}
