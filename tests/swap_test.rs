//! Hot-swap tests: direct streaming substitutes a file pipeline for the
//! live capture while the RTP payloader keeps counting, and restores the
//! capture at file EOS without ever emitting an RTP-visible EOS.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use wfdio::config::SourceConfig;
use wfdio::error::WfdError;
use wfdio::graph::testing::TestGraph;
use wfdio::graph::{Event, GraphState, MediaGraph, Structure};
use wfdio::pipeline::{set_pipeline_state, DirectStreamer, Pipeline, PipelineBuilder};

fn build_live(concrete: &Arc<TestGraph>) -> Pipeline {
    let graph: Arc<dyn MediaGraph> = concrete.clone();
    let pipeline = PipelineBuilder::new(graph.clone(), SourceConfig::default())
        .build()
        .unwrap();
    set_pipeline_state(&graph, &pipeline, GraphState::Playing).unwrap();
    pipeline
}

/// Runs discovery for `uri` against the simulated runtime: a file source
/// feeding a TS demuxer with H.264 video and AAC audio.
async fn start_direct(
    concrete: &Arc<TestGraph>,
    streamer: &Arc<DirectStreamer>,
    uri: &str,
) -> wfdio::pipeline::SwapHandle {
    let task = {
        let streamer = streamer.clone();
        let uri = uri.to_string();
        tokio::spawn(async move { streamer.start(&uri).await })
    };
    tokio::task::yield_now().await;

    let bin = concrete.element_by_name("discover-bin").unwrap();
    let decodebin = concrete.element_by_name("discover-decodebin").unwrap();
    concrete.emit_element_added(bin, "filesrc");
    concrete.emit_element_added(bin, "tsdemux");
    concrete.emit_element_added(bin, "avdec_h264");
    concrete.emit_element_added(bin, "avdec_aac");
    concrete.emit_pad_added(decodebin, "src_0", "video/x-h264");
    concrete.emit_no_more_pads(decodebin);

    task.await.unwrap().unwrap()
}

#[tokio::test]
async fn test_hot_swap_keeps_rtp_sequence_continuous() {
    let concrete = Arc::new(TestGraph::new());
    let pipeline = build_live(&concrete);
    let graph: Arc<dyn MediaGraph> = concrete.clone();

    // Live traffic advances the payloader's sequence counter.
    assert!(concrete.push_buffer(pipeline.payloader_sink, Bytes::from_static(b"live-ts-1")));
    assert!(concrete.push_buffer(pipeline.payloader_sink, Bytes::from_static(b"live-ts-2")));
    assert_eq!(concrete.prop_u64(pipeline.payloader, "seqnum"), 2);

    let streamer = Arc::new(DirectStreamer::new(graph.clone(), &pipeline));
    let ended = Arc::new(AtomicU32::new(0));
    let ended_counter = ended.clone();
    streamer.on_direct_stream_end(Box::new(move || {
        ended_counter.fetch_add(1, Ordering::SeqCst);
    }));

    let handle = start_direct(&concrete, &streamer, "file:///tmp/clip.ts").await;

    // The direct pipeline exists; its demuxer pads route by caps.
    let demux = concrete.element_by_name("direct-demux").unwrap();
    concrete.emit_pad_added(demux, "video_0", "video/x-h264");
    concrete.emit_pad_added(demux, "audio_0", "audio/mpeg");
    let vparse = concrete.element_by_name("direct-vparse").unwrap();
    let aparse = concrete.element_by_name("direct-aparse").unwrap();
    assert!(concrete.elements_linked(demux, vparse) || concrete.peer(
        concrete.static_pad(vparse, "sink").unwrap()).is_some());
    assert!(concrete
        .peer(concrete.static_pad(aparse, "sink").unwrap())
        .is_some());

    // The swap happens inside the payloader's idle probe.
    concrete.trigger_idle(pipeline.payloader_sink);
    handle.wait().await.unwrap();
    assert!(streamer.is_active());
    assert!(streamer.wait_linked(std::time::Duration::from_millis(10)));
    let discovery = streamer.last_discovery().unwrap();
    assert!(discovery.has_h264 && discovery.has_aac);

    // The payloader is now fed by the direct pipeline's ghost pad and
    // never left Playing; the live branches are paused into a drain.
    let direct_bin = concrete.element_by_name("direct-pipeline").unwrap();
    let peer = concrete.peer(pipeline.payloader_sink).unwrap();
    assert_eq!(concrete.pad_owner(peer), Some(direct_bin));
    assert_eq!(
        concrete.state(pipeline.payloader).unwrap(),
        GraphState::Playing
    );
    assert_eq!(
        concrete.state(pipeline.video_bin).unwrap(),
        GraphState::Paused
    );
    let drain = concrete.element_by_name("live-drain").unwrap();
    assert!(concrete.elements_linked(pipeline.mux_queue, drain));

    // Sequence continuity: the next packet is N+1, carrying file TS.
    assert!(concrete.push_buffer(pipeline.payloader_sink, Bytes::from_static(b"file-ts-1")));
    assert_eq!(concrete.prop_u64(pipeline.payloader, "seqnum"), 3);

    // File EOS: swallowed, replaced by a fillEOS marker, and the
    // reverse swap is deferred onto the main loop.
    let out = concrete.push_event(pipeline.payloader_sink, Event::Eos);
    assert_eq!(out, Some(Event::Custom(Structure::new("fillEOS"))));

    concrete.run_idle_tasks();
    concrete.trigger_idle(pipeline.payloader_sink);
    concrete.run_idle_tasks();

    // Live capture is back in front of the payloader; the direct
    // pipeline and the drain are gone.
    assert!(!streamer.is_active());
    assert_eq!(
        concrete.peer(pipeline.payloader_sink),
        Some(pipeline.mux_queue_src)
    );
    assert!(concrete.element_by_name("direct-pipeline").is_none());
    assert!(concrete.element_by_name("live-drain").is_none());
    assert_eq!(
        concrete.state(pipeline.video_bin).unwrap(),
        GraphState::Playing
    );
    assert_eq!(ended.load(Ordering::SeqCst), 1);

    // Continuity after restore: no reset, no gap.
    assert!(concrete.push_buffer(pipeline.payloader_sink, Bytes::from_static(b"live-ts-3")));
    assert_eq!(concrete.prop_u64(pipeline.payloader, "seqnum"), 4);
}

#[tokio::test]
async fn test_second_direct_stream_is_refused_while_active() {
    let concrete = Arc::new(TestGraph::new());
    let pipeline = build_live(&concrete);
    let graph: Arc<dyn MediaGraph> = concrete.clone();

    let streamer = Arc::new(DirectStreamer::new(graph, &pipeline));
    let handle = start_direct(&concrete, &streamer, "file:///tmp/clip.ts").await;
    concrete.trigger_idle(pipeline.payloader_sink);
    handle.wait().await.unwrap();

    let err = streamer.start("file:///tmp/other.ts").await.unwrap_err();
    assert!(matches!(err, WfdError::SwapAborted(_)));

    // The live pipeline is untouched by the refused swap.
    let direct_bin = concrete.element_by_name("direct-pipeline").unwrap();
    let peer = concrete.peer(pipeline.payloader_sink).unwrap();
    assert_eq!(concrete.pad_owner(peer), Some(direct_bin));
}

#[tokio::test]
async fn test_unknown_uri_fails_type_detection() {
    let concrete = Arc::new(TestGraph::new());
    let pipeline = build_live(&concrete);
    let graph: Arc<dyn MediaGraph> = concrete.clone();
    let streamer = Arc::new(DirectStreamer::new(graph, &pipeline));

    let task = {
        let streamer = streamer.clone();
        tokio::spawn(async move { streamer.start("file:///tmp/garbage.bin").await })
    };
    tokio::task::yield_now().await;

    let decodebin = concrete.element_by_name("discover-decodebin").unwrap();
    concrete.emit_no_more_pads(decodebin);

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, WfdError::TypeDetectionFailed(_)));

    // The session continues: the live link is intact.
    assert_eq!(
        concrete.peer(pipeline.payloader_sink),
        Some(pipeline.mux_queue_src)
    );
    assert!(!streamer.is_active());
}
