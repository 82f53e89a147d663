//! RTP transmit statistics and RTCP receiver-report aggregation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::info;

use crate::error::Result;
use crate::graph::{ElementId, MediaGraph, Structure};

/// Interval between transmit-counter samples.
pub const STATS_INTERVAL: Duration = Duration::from_secs(2);

/// Aggregated RTP/RTCP statistics for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpStats {
    /// Payloader byte counter at the previous sample
    pub last_sent_bytes: u64,
    /// Payloader sequence number at the previous sample
    pub last_seqnum: u16,
    /// Fraction of packets lost reported by the last receiver report
    pub fraction_lost: u8,
    /// Cumulative packets lost reported by the sink
    pub cumulative_lost: u32,
    /// Extended highest sequence number received by the sink
    pub max_seqnum: u16,
    /// Interarrival jitter
    pub jitter: u32,
    /// Last sender-report timestamp
    pub lsr: u32,
    /// Delay since last sender report
    pub dlsr: u32,
    /// Round-trip time
    pub rtt: u32,
}

/// Samples the payloader's transmit counters and merges RTCP receiver
/// reports delivered through the runtime's `rtcp-statistics` signal.
pub struct StatsCollector {
    graph: Arc<dyn MediaGraph>,
    payloader: ElementId,
    stats: Mutex<RtpStats>,
    rtcp_enabled: AtomicBool,
}

impl StatsCollector {
    /// Creates a collector and subscribes it to the RTP element's
    /// receiver-report signal.
    pub fn attach(
        graph: Arc<dyn MediaGraph>,
        payloader: ElementId,
        rtp_element: ElementId,
    ) -> Result<Arc<Self>> {
        let collector = Arc::new(Self {
            graph: graph.clone(),
            payloader,
            stats: Mutex::new(RtpStats::default()),
            rtcp_enabled: AtomicBool::new(false),
        });

        let signal_target = collector.clone();
        graph.connect_signal(
            rtp_element,
            "rtcp-statistics",
            Box::new(move |structure| signal_target.merge_rtcp(structure)),
        )?;

        Ok(collector)
    }

    /// Reads the payloader counters, logs the deltas since the previous
    /// tick and stores the new values.
    pub fn sample(&self) {
        let seqnum = self
            .graph
            .property(self.payloader, "seqnum")
            .ok()
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u16;
        let bytes = self
            .graph
            .property(self.payloader, "bytes-sent")
            .ok()
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let mut stats = self.stats.lock().unwrap();
        info!(
            "sent {} RTP packets, {} bytes",
            seqnum.wrapping_sub(stats.last_seqnum),
            bytes.saturating_sub(stats.last_sent_bytes),
        );
        stats.last_seqnum = seqnum;
        stats.last_sent_bytes = bytes;

        if self.rtcp_enabled.load(Ordering::Acquire) {
            info!(
                "sink reports: fraction lost {}, cumulative lost {}, max seq {}, jitter {}, rtt {}",
                stats.fraction_lost,
                stats.cumulative_lost,
                stats.max_seqnum,
                stats.jitter,
                stats.rtt,
            );
        }
    }

    fn merge_rtcp(&self, structure: &Structure) {
        let mut stats = self.stats.lock().unwrap();
        stats.fraction_lost = structure.get_uint("rb-fractionlost") as u8;
        stats.cumulative_lost = structure.get_uint("rb-packetslost") as u32;
        stats.max_seqnum = structure.get_uint("rb-exthighestseq") as u16;
        stats.jitter = structure.get_uint("rb-jitter") as u32;
        stats.lsr = structure.get_uint("rb-lsr") as u32;
        stats.dlsr = structure.get_uint("rb-dlsr") as u32;
        stats.rtt = structure.get_uint("rb-round-trip") as u32;
        drop(stats);

        self.rtcp_enabled.store(true, Ordering::Release);
    }

    /// Whether at least one receiver report has arrived.
    pub fn rtcp_enabled(&self) -> bool {
        self.rtcp_enabled.load(Ordering::Acquire)
    }

    /// A copy of the current statistics.
    pub fn snapshot(&self) -> RtpStats {
        self.stats.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::TestGraph;
    use crate::graph::PropertyValue;
    use bytes::Bytes;

    #[test]
    fn test_sample_tracks_payloader_counters() {
        let concrete = Arc::new(TestGraph::new());
        let graph: Arc<dyn MediaGraph> = concrete.clone();
        let payloader = graph.make_element("rtpmp2tpay", "pay0").unwrap();
        let pad = graph.static_pad(payloader, "sink").unwrap();

        let collector = StatsCollector::attach(graph, payloader, payloader).unwrap();

        concrete.push_buffer(pad, Bytes::from_static(b"0123456789"));
        concrete.push_buffer(pad, Bytes::from_static(b"01234"));
        collector.sample();

        let stats = collector.snapshot();
        assert_eq!(stats.last_seqnum, 2);
        assert_eq!(stats.last_sent_bytes, 15);
    }

    #[test]
    fn test_rtcp_merge_enables_reporting() {
        let concrete = Arc::new(TestGraph::new());
        let graph: Arc<dyn MediaGraph> = concrete.clone();
        let payloader = graph.make_element("rtpmp2tpay", "pay0").unwrap();

        let collector = StatsCollector::attach(graph, payloader, payloader).unwrap();
        assert!(!collector.rtcp_enabled());

        let report = Structure::new("rtcp-statistics")
            .set("rb-fractionlost", PropertyValue::UInt(3))
            .set("rb-packetslost", PropertyValue::UInt(17))
            .set("rb-exthighestseq", PropertyValue::UInt(4242))
            .set("rb-jitter", PropertyValue::UInt(9))
            .set("rb-round-trip", PropertyValue::UInt(120));
        concrete.emit_signal(payloader, "rtcp-statistics", &report);

        assert!(collector.rtcp_enabled());
        let stats = collector.snapshot();
        assert_eq!(stats.fraction_lost, 3);
        assert_eq!(stats.cumulative_lost, 17);
        assert_eq!(stats.max_seqnum, 4242);
        assert_eq!(stats.rtt, 120);
    }
}
