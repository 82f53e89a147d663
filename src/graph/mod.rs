//! # Media Graph Runtime Interface
//!
//! The streaming pipeline runs on an external media-processing runtime:
//! encoders, muxers and payloaders live behind the [`MediaGraph`] trait,
//! which exposes exactly the surface the pipeline builder and the hot-swap
//! coordinator consume: element creation, linking, pad requests, state
//! changes, pad probes, dynamic-pad callbacks and idle dispatch onto the
//! runtime's main loop.
//!
//! [`testing::TestGraph`] is an in-memory implementation used by the test
//! suite; production deployments bind these calls to their actual graph
//! runtime.

pub mod testing;

use bytes::Bytes;

use crate::error::Result;

/// Opaque handle to an element (or bin) owned by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u32);

/// Opaque handle to a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PadId(pub u32);

/// Opaque handle to an installed pad probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeId(pub u32);

/// Element state, ordered from torn-down to running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GraphState {
    /// No resources held
    Null,
    /// Resources allocated, clock stopped
    Ready,
    /// Prerolled, not producing
    Paused,
    /// Producing data
    Playing,
}

/// A typed element property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// String value
    Str(String),
    /// Numerator/denominator pair
    Fraction(i32, i32),
    /// A caps description string, e.g. `video/x-raw,width=1280`
    Caps(String),
}

impl PropertyValue {
    /// The unsigned value, when this is a `UInt` or non-negative `Int`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropertyValue::UInt(v) => Some(*v),
            PropertyValue::Int(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }
}

/// A named bag of typed fields, the vocabulary of signals and custom
/// events.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    /// The structure name, e.g. `fillEOS` or `rtcp-statistics`
    pub name: String,
    fields: Vec<(String, PropertyValue)>,
}

impl Structure {
    /// Creates an empty structure with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Sets a field, replacing any previous value with the same name.
    pub fn set(mut self, name: &str, value: PropertyValue) -> Self {
        self.fields.retain(|(n, _)| n != name);
        self.fields.push((name.to_string(), value));
        self
    }

    /// Looks up a field by name.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Looks up an unsigned field, defaulting to 0.
    pub fn get_uint(&self, name: &str) -> u64 {
        self.get(name).and_then(|v| v.as_u64()).unwrap_or(0)
    }
}

/// Events travelling downstream through pads.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// End of stream
    Eos,
    /// A custom downstream event
    Custom(Structure),
}

/// What a probe is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeType {
    /// Buffers pushed through the pad
    Buffer,
    /// The pad going idle, the safe moment to restructure the graph
    Idle,
    /// Downstream events
    EventDownstream,
}

/// What happens to the probed item after the callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReturn {
    /// Pass the item on
    Ok,
    /// Drop the item
    Drop,
    /// Pass the item on and remove this probe
    Remove,
}

/// The item a probe callback observes. Event probes may substitute the
/// event before it continues downstream.
#[derive(Debug)]
pub struct ProbeInfo {
    /// The pad the probe fired on
    pub pad: PadId,
    /// The probed item
    pub data: ProbeData,
}

/// Payload of a [`ProbeInfo`].
#[derive(Debug)]
pub enum ProbeData {
    /// A buffer travelling through the pad
    Buffer(Bytes),
    /// An event travelling downstream
    Event(Event),
    /// An idle notification, no payload
    Idle,
}

impl ProbeInfo {
    /// Replaces the probed event; no-op for buffer and idle probes.
    pub fn replace_event(&mut self, event: Event) {
        if matches!(self.data, ProbeData::Event(_)) {
            self.data = ProbeData::Event(event);
        }
    }
}

/// Callback invoked by the runtime when a probed item passes the pad.
pub type ProbeCallback = Box<dyn FnMut(&mut ProbeInfo) -> ProbeReturn + Send>;

/// Callback for dynamic pads appearing on an element; receives the new
/// pad and its caps description.
pub type PadAddedCallback = Box<dyn Fn(PadId, &str) + Send + Sync>;

/// Callback for elements appearing inside a bin; receives the factory
/// name.
pub type ElementAddedCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Callback for an element announcing it will add no more pads.
pub type NoMorePadsCallback = Box<dyn Fn() + Send + Sync>;

/// Callback for a named element signal.
pub type SignalCallback = Box<dyn Fn(&Structure) + Send + Sync>;

/// A deferred closure executed on the runtime's main loop.
pub type IdleTask = Box<dyn FnOnce() + Send>;

/// The pluggable media-graph runtime the pipeline is built against.
///
/// Implementations must tolerate calls from streaming threads; probe
/// callbacks in particular run on whatever thread pushes data through the
/// probed pad.
pub trait MediaGraph: Send + Sync {
    /// Instantiates an element from a factory name.
    fn make_element(&self, factory: &str, name: &str) -> Result<ElementId>;

    /// Creates an empty container bin.
    fn make_bin(&self, name: &str) -> Result<ElementId>;

    /// Places an element inside a bin.
    fn add(&self, bin: ElementId, element: ElementId) -> Result<()>;

    /// Removes an element (and, for bins, its children) from the graph
    /// entirely.
    fn destroy(&self, element: ElementId) -> Result<()>;

    /// Sets an element property.
    fn set_property(&self, element: ElementId, name: &str, value: PropertyValue) -> Result<()>;

    /// Reads an element property.
    fn property(&self, element: ElementId, name: &str) -> Result<PropertyValue>;

    /// Links the source of `src` to the sink of `dst`.
    fn link(&self, src: ElementId, dst: ElementId) -> Result<()>;

    /// Links a chain of elements front to back.
    fn link_many(&self, chain: &[ElementId]) -> Result<()> {
        for pair in chain.windows(2) {
            self.link(pair[0], pair[1])?;
        }
        Ok(())
    }

    /// Fetches an always-present pad by name (`src`, `sink`).
    fn static_pad(&self, element: ElementId, name: &str) -> Result<PadId>;

    /// Requests an on-demand pad by template name, e.g. `sink_4113`.
    fn request_pad(&self, element: ElementId, name: &str) -> Result<PadId>;

    /// Exposes an inner pad on the surface of a bin.
    fn ghost_pad(&self, bin: ElementId, name: &str, target: PadId) -> Result<PadId>;

    /// Links two pads directly.
    fn link_pads(&self, src: PadId, sink: PadId) -> Result<()>;

    /// Unlinks two pads.
    fn unlink_pads(&self, src: PadId, sink: PadId) -> Result<()>;

    /// The pad currently linked to `pad`, if any.
    fn peer(&self, pad: PadId) -> Option<PadId>;

    /// Changes an element's state.
    fn set_state(&self, element: ElementId, state: GraphState) -> Result<()>;

    /// Current state of an element.
    fn state(&self, element: ElementId) -> Result<GraphState>;

    /// Re-synchronizes an element with the state of its parent bin.
    fn sync_state_with_parent(&self, element: ElementId) -> Result<()>;

    /// Installs a probe on a pad.
    fn add_probe(&self, pad: PadId, ty: ProbeType, callback: ProbeCallback) -> Result<ProbeId>;

    /// Removes a probe.
    fn remove_probe(&self, probe: ProbeId);

    /// Watches for dynamic pads on an element.
    fn connect_pad_added(&self, element: ElementId, callback: PadAddedCallback) -> Result<()>;

    /// Watches for elements added anywhere below a bin.
    fn connect_element_added(&self, bin: ElementId, callback: ElementAddedCallback) -> Result<()>;

    /// Watches for the no-more-pads notification of an element.
    fn connect_no_more_pads(&self, element: ElementId, callback: NoMorePadsCallback) -> Result<()>;

    /// Subscribes to a named signal of an element.
    fn connect_signal(
        &self,
        element: ElementId,
        signal: &str,
        callback: SignalCallback,
    ) -> Result<()>;

    /// Defers a closure onto the runtime's main loop. Graph restructuring
    /// that cannot run on a streaming thread goes through here.
    fn call_when_idle(&self, task: IdleTask);
}
