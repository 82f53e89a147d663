//! An in-memory [`MediaGraph`] used by the test suite.
//!
//! `TestGraph` records topology (elements, bins, pads, links, properties)
//! and lets tests drive the runtime side of the contract: pushing buffers
//! and events through pads, firing idle probes, emitting signals and
//! dynamic-pad notifications, and draining the main-loop task queue.
//!
//! Payloader emulation: an element created from the `rtpmp2tpay` factory
//! gets `seqnum` and `bytes-sent` counters that advance for every buffer
//! its sink pad accepts, which is what the sequence-continuity tests
//! observe across hot-swaps.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use super::*;
use crate::error::WfdError;

#[derive(Debug)]
struct TestElement {
    factory: String,
    name: String,
    parent: Option<u32>,
    props: HashMap<String, PropertyValue>,
    state: GraphState,
}

#[derive(Debug)]
struct TestPad {
    element: u32,
    name: String,
    peer: Option<u32>,
    ghost_target: Option<u32>,
}

#[derive(Default)]
struct Inner {
    elements: HashMap<u32, TestElement>,
    pads: HashMap<u32, TestPad>,
    fail_factories: Vec<String>,
}

struct ProbeEntry {
    pad: u32,
    ty: ProbeType,
    callback: Option<ProbeCallback>,
}

type SharedSignal = Arc<dyn Fn(&Structure) + Send + Sync>;
type SharedPadAdded = Arc<dyn Fn(PadId, &str) + Send + Sync>;
type SharedElementAdded = Arc<dyn Fn(&str) + Send + Sync>;
type SharedNoMorePads = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Hooks {
    pad_added: HashMap<u32, Vec<SharedPadAdded>>,
    element_added: HashMap<u32, Vec<SharedElementAdded>>,
    no_more_pads: HashMap<u32, Vec<SharedNoMorePads>>,
    signals: HashMap<(u32, String), Vec<SharedSignal>>,
}

/// In-memory graph runtime for tests.
#[derive(Default)]
pub struct TestGraph {
    inner: Mutex<Inner>,
    hooks: Mutex<Hooks>,
    probes: Mutex<HashMap<u32, ProbeEntry>>,
    idle_tasks: Mutex<Vec<IdleTask>>,
    next_id: AtomicU32,
}

impl TestGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Makes every future `make_element` call for `factory` fail, for
    /// exercising build-failure paths.
    pub fn fail_factory(&self, factory: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_factories
            .push(factory.to_string());
    }

    /// Finds an element by its instance name.
    pub fn element_by_name(&self, name: &str) -> Option<ElementId> {
        let inner = self.inner.lock().unwrap();
        inner
            .elements
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(id, _)| ElementId(*id))
    }

    /// The factory an element was created from.
    pub fn factory_of(&self, element: ElementId) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.elements.get(&element.0).map(|e| e.factory.clone())
    }

    /// The name of a pad.
    pub fn pad_name(&self, pad: PadId) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.pads.get(&pad.0).map(|p| p.name.clone())
    }

    /// The element a pad belongs to.
    pub fn pad_owner(&self, pad: PadId) -> Option<ElementId> {
        let inner = self.inner.lock().unwrap();
        inner.pads.get(&pad.0).map(|p| ElementId(p.element))
    }

    /// Whether `src`'s src pad is linked (directly) to `dst`'s sink pad.
    pub fn elements_linked(&self, src: ElementId, dst: ElementId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.pads.values().any(|pad| {
            pad.element == src.0
                && pad
                    .peer
                    .and_then(|peer| inner.pads.get(&peer))
                    .map(|peer| peer.element == dst.0)
                    .unwrap_or(false)
        })
    }

    /// Unsigned property helper for assertions.
    pub fn prop_u64(&self, element: ElementId, name: &str) -> u64 {
        self.property(element, name)
            .ok()
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    /// Pushes a buffer through a pad, running its buffer probes. Returns
    /// false when a probe dropped the buffer. A surviving buffer advances
    /// the payloader counters when the pad belongs to an `rtpmp2tpay`.
    pub fn push_buffer(&self, pad: PadId, data: Bytes) -> bool {
        let len = data.len() as u64;
        let mut info = ProbeInfo {
            pad,
            data: ProbeData::Buffer(data),
        };
        if !self.run_probes(pad, ProbeType::Buffer, &mut info) {
            return false;
        }

        let mut inner = self.inner.lock().unwrap();
        let element = match inner.pads.get(&pad.0) {
            Some(p) => p.element,
            None => return false,
        };
        if let Some(e) = inner.elements.get_mut(&element) {
            if e.factory == "rtpmp2tpay" {
                let seq = e
                    .props
                    .get("seqnum")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                e.props
                    .insert("seqnum".to_string(), PropertyValue::UInt(seq + 1));
                let sent = e
                    .props
                    .get("bytes-sent")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                e.props
                    .insert("bytes-sent".to_string(), PropertyValue::UInt(sent + len));
            }
        }
        true
    }

    /// Pushes a downstream event through a pad, running its event probes.
    /// Returns the event that continued downstream, or `None` when a
    /// probe dropped it.
    pub fn push_event(&self, pad: PadId, event: Event) -> Option<Event> {
        let mut info = ProbeInfo {
            pad,
            data: ProbeData::Event(event),
        };
        let passed = self.run_probes(pad, ProbeType::EventDownstream, &mut info);
        match (passed, info.data) {
            (true, ProbeData::Event(ev)) => Some(ev),
            _ => None,
        }
    }

    /// Fires the idle probes installed on a pad.
    pub fn trigger_idle(&self, pad: PadId) {
        let mut info = ProbeInfo {
            pad,
            data: ProbeData::Idle,
        };
        self.run_probes(pad, ProbeType::Idle, &mut info);
    }

    /// Drains the deferred main-loop tasks, including tasks enqueued by
    /// the tasks themselves.
    pub fn run_idle_tasks(&self) {
        loop {
            let tasks: Vec<IdleTask> = self.idle_tasks.lock().unwrap().drain(..).collect();
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                task();
            }
        }
    }

    /// Count of probes currently installed on a pad.
    pub fn probe_count(&self, pad: PadId) -> usize {
        self.probes
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.pad == pad.0)
            .count()
    }

    /// Emits a named signal on an element.
    pub fn emit_signal(&self, element: ElementId, signal: &str, data: &Structure) {
        let callbacks: Vec<SharedSignal> = {
            let hooks = self.hooks.lock().unwrap();
            hooks
                .signals
                .get(&(element.0, signal.to_string()))
                .cloned()
                .unwrap_or_default()
        };
        for cb in callbacks {
            cb(data);
        }
    }

    /// Adds a dynamic pad to an element and notifies pad-added watchers.
    pub fn emit_pad_added(&self, element: ElementId, pad_name: &str, caps: &str) -> PadId {
        let pad = PadId(self.next());
        self.inner.lock().unwrap().pads.insert(
            pad.0,
            TestPad {
                element: element.0,
                name: pad_name.to_string(),
                peer: None,
                ghost_target: None,
            },
        );
        let callbacks: Vec<SharedPadAdded> = {
            let hooks = self.hooks.lock().unwrap();
            hooks
                .pad_added
                .get(&element.0)
                .cloned()
                .unwrap_or_default()
        };
        for cb in callbacks {
            cb(pad, caps);
        }
        pad
    }

    /// Notifies element-added watchers of `bin`.
    pub fn emit_element_added(&self, bin: ElementId, factory: &str) {
        let callbacks: Vec<SharedElementAdded> = {
            let hooks = self.hooks.lock().unwrap();
            hooks
                .element_added
                .get(&bin.0)
                .cloned()
                .unwrap_or_default()
        };
        for cb in callbacks {
            cb(factory);
        }
    }

    /// Notifies no-more-pads watchers of an element.
    pub fn emit_no_more_pads(&self, element: ElementId) {
        let callbacks: Vec<SharedNoMorePads> = {
            let hooks = self.hooks.lock().unwrap();
            hooks
                .no_more_pads
                .get(&element.0)
                .cloned()
                .unwrap_or_default()
        };
        for cb in callbacks {
            cb();
        }
    }

    /// Runs matching probes on a pad. Probes installed by a running probe
    /// are not fired in the same pass. Returns false when any probe
    /// dropped the item.
    fn run_probes(&self, pad: PadId, ty: ProbeType, info: &mut ProbeInfo) -> bool {
        let ids: Vec<u32> = {
            let probes = self.probes.lock().unwrap();
            probes
                .iter()
                .filter(|(_, p)| p.pad == pad.0 && p.ty == ty)
                .map(|(id, _)| *id)
                .collect()
        };

        let mut passed = true;
        for id in ids {
            // Take the callback out so it can re-enter the graph (and the
            // probe table) without deadlocking.
            let mut callback = {
                let mut probes = self.probes.lock().unwrap();
                match probes.get_mut(&id) {
                    Some(entry) => match entry.callback.take() {
                        Some(cb) => cb,
                        None => continue,
                    },
                    None => continue,
                }
            };

            let verdict = callback(info);

            let mut probes = self.probes.lock().unwrap();
            match verdict {
                ProbeReturn::Remove => {
                    probes.remove(&id);
                }
                other => {
                    if let Some(entry) = probes.get_mut(&id) {
                        entry.callback = Some(callback);
                    }
                    if other == ProbeReturn::Drop {
                        passed = false;
                    }
                }
            }
        }
        passed
    }

    fn get_or_make_pad(&self, element: ElementId, name: &str) -> PadId {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner
            .pads
            .iter()
            .find(|(_, p)| p.element == element.0 && p.name == name)
            .map(|(id, _)| PadId(*id));
        if let Some(pad) = existing {
            return pad;
        }
        let id = self.next();
        inner.pads.insert(
            id,
            TestPad {
                element: element.0,
                name: name.to_string(),
                peer: None,
                ghost_target: None,
            },
        );
        PadId(id)
    }
}

impl MediaGraph for TestGraph {
    fn make_element(&self, factory: &str, name: &str) -> Result<ElementId> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_factories.iter().any(|f| f == factory) {
            return Err(WfdError::BuildFailed(format!(
                "no such factory {:?}",
                factory
            )));
        }
        let id = self.next();
        let mut props = HashMap::new();
        if factory == "rtpmp2tpay" {
            props.insert("seqnum".to_string(), PropertyValue::UInt(0));
            props.insert("bytes-sent".to_string(), PropertyValue::UInt(0));
        }
        inner.elements.insert(
            id,
            TestElement {
                factory: factory.to_string(),
                name: name.to_string(),
                parent: None,
                props,
                state: GraphState::Null,
            },
        );
        Ok(ElementId(id))
    }

    fn make_bin(&self, name: &str) -> Result<ElementId> {
        let id = self.next();
        self.inner.lock().unwrap().elements.insert(
            id,
            TestElement {
                factory: "bin".to_string(),
                name: name.to_string(),
                parent: None,
                props: HashMap::new(),
                state: GraphState::Null,
            },
        );
        Ok(ElementId(id))
    }

    fn add(&self, bin: ElementId, element: ElementId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.elements.contains_key(&bin.0) {
            return Err(WfdError::BuildFailed("no such bin".into()));
        }
        match inner.elements.get_mut(&element.0) {
            Some(e) => {
                e.parent = Some(bin.0);
                Ok(())
            }
            None => Err(WfdError::BuildFailed("no such element".into())),
        }
    }

    fn destroy(&self, element: ElementId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let mut doomed = vec![element.0];
        let mut index = 0;
        while index < doomed.len() {
            let parent = doomed[index];
            let children: Vec<u32> = inner
                .elements
                .iter()
                .filter(|(_, e)| e.parent == Some(parent))
                .map(|(id, _)| *id)
                .collect();
            doomed.extend(children);
            index += 1;
        }
        for id in &doomed {
            inner.elements.remove(id);
        }
        let orphan_pads: Vec<u32> = inner
            .pads
            .iter()
            .filter(|(_, p)| doomed.contains(&p.element))
            .map(|(id, _)| *id)
            .collect();
        for pad in orphan_pads {
            if let Some(peer) = inner.pads.get(&pad).and_then(|p| p.peer) {
                if let Some(peer_pad) = inner.pads.get_mut(&peer) {
                    peer_pad.peer = None;
                }
            }
            inner.pads.remove(&pad);
        }
        Ok(())
    }

    fn set_property(&self, element: ElementId, name: &str, value: PropertyValue) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.elements.get_mut(&element.0) {
            Some(e) => {
                e.props.insert(name.to_string(), value);
                Ok(())
            }
            None => Err(WfdError::BuildFailed("no such element".into())),
        }
    }

    fn property(&self, element: ElementId, name: &str) -> Result<PropertyValue> {
        let inner = self.inner.lock().unwrap();
        inner
            .elements
            .get(&element.0)
            .and_then(|e| e.props.get(name))
            .cloned()
            .ok_or_else(|| WfdError::BuildFailed(format!("no property {:?}", name)))
    }

    fn link(&self, src: ElementId, dst: ElementId) -> Result<()> {
        let src_pad = self.get_or_make_pad(src, "src");
        let sink_pad = self.get_or_make_pad(dst, "sink");
        self.link_pads(src_pad, sink_pad)
    }

    fn static_pad(&self, element: ElementId, name: &str) -> Result<PadId> {
        if !self
            .inner
            .lock()
            .unwrap()
            .elements
            .contains_key(&element.0)
        {
            return Err(WfdError::BuildFailed("no such element".into()));
        }
        Ok(self.get_or_make_pad(element, name))
    }

    fn request_pad(&self, element: ElementId, name: &str) -> Result<PadId> {
        self.static_pad(element, name)
    }

    fn ghost_pad(&self, bin: ElementId, name: &str, target: PadId) -> Result<PadId> {
        let pad = self.static_pad(bin, name)?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.pads.get_mut(&pad.0) {
            p.ghost_target = Some(target.0);
        }
        Ok(pad)
    }

    fn link_pads(&self, src: PadId, sink: PadId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.pads.contains_key(&src.0) || !inner.pads.contains_key(&sink.0) {
            return Err(WfdError::BuildFailed("no such pad".into()));
        }
        if inner.pads[&src.0].peer.is_some() || inner.pads[&sink.0].peer.is_some() {
            return Err(WfdError::BuildFailed("pad already linked".into()));
        }
        inner.pads.get_mut(&src.0).unwrap().peer = Some(sink.0);
        inner.pads.get_mut(&sink.0).unwrap().peer = Some(src.0);
        Ok(())
    }

    fn unlink_pads(&self, src: PadId, sink: PadId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let linked = inner.pads.get(&src.0).map(|p| p.peer) == Some(Some(sink.0));
        if !linked {
            return Err(WfdError::BuildFailed("pads not linked".into()));
        }
        inner.pads.get_mut(&src.0).unwrap().peer = None;
        inner.pads.get_mut(&sink.0).unwrap().peer = None;
        Ok(())
    }

    fn peer(&self, pad: PadId) -> Option<PadId> {
        let inner = self.inner.lock().unwrap();
        inner.pads.get(&pad.0).and_then(|p| p.peer).map(PadId)
    }

    fn set_state(&self, element: ElementId, state: GraphState) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.elements.contains_key(&element.0) {
            return Err(WfdError::BuildFailed("no such element".into()));
        }
        // State changes cascade into children, as bins do.
        let mut targets = vec![element.0];
        let mut index = 0;
        while index < targets.len() {
            let parent = targets[index];
            let children: Vec<u32> = inner
                .elements
                .iter()
                .filter(|(_, e)| e.parent == Some(parent))
                .map(|(id, _)| *id)
                .collect();
            targets.extend(children);
            index += 1;
        }
        for id in targets {
            if let Some(e) = inner.elements.get_mut(&id) {
                e.state = state;
            }
        }
        Ok(())
    }

    fn state(&self, element: ElementId) -> Result<GraphState> {
        let inner = self.inner.lock().unwrap();
        inner
            .elements
            .get(&element.0)
            .map(|e| e.state)
            .ok_or_else(|| WfdError::BuildFailed("no such element".into()))
    }

    fn sync_state_with_parent(&self, element: ElementId) -> Result<()> {
        let parent_state = {
            let inner = self.inner.lock().unwrap();
            let e = inner
                .elements
                .get(&element.0)
                .ok_or_else(|| WfdError::BuildFailed("no such element".into()))?;
            e.parent
                .and_then(|p| inner.elements.get(&p))
                .map(|p| p.state)
                .unwrap_or(GraphState::Playing)
        };
        self.set_state(element, parent_state)
    }

    fn add_probe(&self, pad: PadId, ty: ProbeType, callback: ProbeCallback) -> Result<ProbeId> {
        if !self.inner.lock().unwrap().pads.contains_key(&pad.0) {
            return Err(WfdError::BuildFailed("no such pad".into()));
        }
        let id = self.next();
        self.probes.lock().unwrap().insert(
            id,
            ProbeEntry {
                pad: pad.0,
                ty,
                callback: Some(callback),
            },
        );
        Ok(ProbeId(id))
    }

    fn remove_probe(&self, probe: ProbeId) {
        self.probes.lock().unwrap().remove(&probe.0);
    }

    fn connect_pad_added(&self, element: ElementId, callback: PadAddedCallback) -> Result<()> {
        self.hooks
            .lock()
            .unwrap()
            .pad_added
            .entry(element.0)
            .or_default()
            .push(Arc::from(callback));
        Ok(())
    }

    fn connect_element_added(&self, bin: ElementId, callback: ElementAddedCallback) -> Result<()> {
        self.hooks
            .lock()
            .unwrap()
            .element_added
            .entry(bin.0)
            .or_default()
            .push(Arc::from(callback));
        Ok(())
    }

    fn connect_no_more_pads(&self, element: ElementId, callback: NoMorePadsCallback) -> Result<()> {
        self.hooks
            .lock()
            .unwrap()
            .no_more_pads
            .entry(element.0)
            .or_default()
            .push(Arc::from(callback));
        Ok(())
    }

    fn connect_signal(
        &self,
        element: ElementId,
        signal: &str,
        callback: SignalCallback,
    ) -> Result<()> {
        self.hooks
            .lock()
            .unwrap()
            .signals
            .entry((element.0, signal.to_string()))
            .or_default()
            .push(Arc::from(callback));
        Ok(())
    }

    fn call_when_idle(&self, task: IdleTask) {
        self.idle_tasks.lock().unwrap().push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_recording() {
        let graph = TestGraph::new();
        let bin = graph.make_bin("srcbin").unwrap();
        let src = graph.make_element("videotestsrc", "videosrc").unwrap();
        let queue = graph.make_element("queue", "video-queue").unwrap();
        graph.add(bin, src).unwrap();
        graph.add(bin, queue).unwrap();
        graph.link(src, queue).unwrap();

        assert!(graph.elements_linked(src, queue));
        assert!(!graph.elements_linked(queue, src));
        assert_eq!(graph.element_by_name("videosrc"), Some(src));

        graph.set_state(bin, GraphState::Playing).unwrap();
        assert_eq!(graph.state(src).unwrap(), GraphState::Playing);
    }

    #[test]
    fn test_failed_factory() {
        let graph = TestGraph::new();
        graph.fail_factory("mpegtsmux");
        assert!(graph.make_element("mpegtsmux", "tsmux").is_err());
    }

    #[test]
    fn test_probe_take_and_reinsert() {
        let graph = TestGraph::new();
        let elem = graph.make_element("queue", "q").unwrap();
        let pad = graph.static_pad(elem, "sink").unwrap();

        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        graph
            .add_probe(
                pad,
                ProbeType::Buffer,
                Box::new(move |_info| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ProbeReturn::Ok
                }),
            )
            .unwrap();

        assert!(graph.push_buffer(pad, Bytes::from_static(b"x")));
        assert!(graph.push_buffer(pad, Bytes::from_static(b"y")));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_payloader_counters() {
        let graph = TestGraph::new();
        let pay = graph.make_element("rtpmp2tpay", "pay0").unwrap();
        let pad = graph.static_pad(pay, "sink").unwrap();

        graph.push_buffer(pad, Bytes::from_static(b"1234"));
        graph.push_buffer(pad, Bytes::from_static(b"56"));
        assert_eq!(graph.prop_u64(pay, "seqnum"), 2);
        assert_eq!(graph.prop_u64(pay, "bytes-sent"), 6);
    }

    #[test]
    fn test_event_replacement() {
        let graph = TestGraph::new();
        let elem = graph.make_element("queue", "q").unwrap();
        let pad = graph.static_pad(elem, "sink").unwrap();

        graph
            .add_probe(
                pad,
                ProbeType::EventDownstream,
                Box::new(|info| {
                    info.replace_event(Event::Custom(Structure::new("fillEOS")));
                    ProbeReturn::Remove
                }),
            )
            .unwrap();

        let out = graph.push_event(pad, Event::Eos).unwrap();
        assert_eq!(out, Event::Custom(Structure::new("fillEOS")));
        assert_eq!(graph.probe_count(pad), 0);

        // Probe removed itself; the next EOS passes through untouched.
        assert_eq!(graph.push_event(pad, Event::Eos), Some(Event::Eos));
    }
}
