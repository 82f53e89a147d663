//! URI discovery for direct streaming.
//!
//! Before a file can be swapped into the live session its container must
//! be understood: which source element reads the URI, which demuxer
//! splits it, and whether H.264 video and AAC/AC3 audio actually come
//! out. A throw-away graph (`uridecodebin` feeding a queue and fakesink
//! per produced pad) is spun up just to observe which elements the
//! runtime plugs in, then destroyed again.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use url::Url;

use crate::error::{Result, WfdError};
use crate::graph::{MediaGraph, PropertyValue};

/// How long discovery waits for the decodebin to settle.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// What discovery learned about a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Factory name of the element reading the URI
    pub source_factory: String,
    /// Factory name of the container demuxer
    pub demux_factory: String,
    /// Whether an H.264 video stream was produced
    pub has_h264: bool,
    /// Whether an AAC audio stream was produced
    pub has_aac: bool,
    /// Whether an AC3 audio stream was produced
    pub has_ac3: bool,
}

enum Seen {
    Element(String),
    Done,
    Error(String),
}

/// Probes `uri` with a throw-away decode graph.
///
/// Exits when the decodebin announces no-more-pads, on a bus error, or
/// after a timeout; fails with `TypeDetectionFailed` when neither a
/// source nor a demuxer could be identified.
pub async fn discover(graph: &Arc<dyn MediaGraph>, uri: &str) -> Result<Discovery> {
    Url::parse(uri)
        .map_err(|e| WfdError::TypeDetectionFailed(format!("bad uri {:?}: {}", uri, e)))?;

    let bin = graph.make_bin("discover-bin")?;
    let result = run_discovery(graph, bin, uri).await;
    let _ = graph.destroy(bin);
    result
}

async fn run_discovery(
    graph: &Arc<dyn MediaGraph>,
    bin: crate::graph::ElementId,
    uri: &str,
) -> Result<Discovery> {
    let decodebin = graph.make_element("uridecodebin", "discover-decodebin")?;
    graph.add(bin, decodebin)?;
    graph.set_property(decodebin, "uri", PropertyValue::Str(uri.to_string()))?;

    let (tx, mut rx) = mpsc::unbounded_channel();

    let element_tx = tx.clone();
    graph.connect_element_added(
        bin,
        Box::new(move |factory| {
            let _ = element_tx.send(Seen::Element(factory.to_string()));
        }),
    )?;

    let done_tx = tx.clone();
    graph.connect_no_more_pads(
        decodebin,
        Box::new(move || {
            let _ = done_tx.send(Seen::Done);
        }),
    )?;

    let error_tx = tx.clone();
    graph.connect_signal(
        bin,
        "error",
        Box::new(move |structure| {
            let _ = error_tx.send(Seen::Error(structure.name.clone()));
        }),
    )?;

    // Each produced pad drains into queue -> fakesink so the decodebin
    // can preroll without backpressure.
    let pad_graph = graph.clone();
    let pad_tx = tx;
    graph.connect_pad_added(
        decodebin,
        Box::new(move |pad, caps| {
            debug!("discovery pad appeared with caps {}", caps);
            let queue = match pad_graph.make_element("queue", "discover-queue") {
                Ok(q) => q,
                Err(_) => return,
            };
            let sink = match pad_graph.make_element("fakesink", "discover-sink") {
                Ok(s) => s,
                Err(_) => return,
            };
            let _ = pad_graph.add(bin, queue);
            let _ = pad_graph.add(bin, sink);
            let _ = pad_graph.link(queue, sink);
            if let Ok(queue_sink) = pad_graph.static_pad(queue, "sink") {
                if pad_graph.link_pads(pad, queue_sink).is_err() {
                    let _ = pad_tx.send(Seen::Error("pad link failed".to_string()));
                }
            }
        }),
    )?;

    let mut discovery = Discovery {
        source_factory: String::new(),
        demux_factory: String::new(),
        has_h264: false,
        has_aac: false,
        has_ac3: false,
    };

    loop {
        let seen = tokio::time::timeout(DISCOVERY_TIMEOUT, rx.recv()).await;
        match seen {
            Ok(Some(Seen::Element(factory))) => classify(&mut discovery, &factory),
            Ok(Some(Seen::Done)) | Err(_) => break,
            Ok(Some(Seen::Error(reason))) => {
                debug!("discovery bus error: {}", reason);
                break;
            }
            Ok(None) => break,
        }
    }

    if discovery.source_factory.is_empty() && discovery.demux_factory.is_empty() {
        return Err(WfdError::TypeDetectionFailed(format!(
            "no usable source or demuxer for {:?}",
            uri
        )));
    }

    info!(
        "discovered source={:?} demux={:?} h264={} aac={} ac3={}",
        discovery.source_factory,
        discovery.demux_factory,
        discovery.has_h264,
        discovery.has_aac,
        discovery.has_ac3,
    );

    Ok(discovery)
}

fn classify(discovery: &mut Discovery, factory: &str) {
    let lower = factory.to_ascii_lowercase();
    if lower.contains("h264") {
        discovery.has_h264 = true;
    }
    if lower.contains("aac") {
        discovery.has_aac = true;
    }
    if lower.contains("ac3") {
        discovery.has_ac3 = true;
    }
    if lower.contains("demux") && discovery.demux_factory.is_empty() {
        discovery.demux_factory = factory.to_string();
    } else if lower.ends_with("src") && discovery.source_factory.is_empty() {
        discovery.source_factory = factory.to_string();
    }
}
