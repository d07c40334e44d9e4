//! The in-memory CTF trace/stream schema tree: `Trace ⊃ StreamClass ⊃ EventClass`,
//! `Trace ⊃ ClockClass`. Ownership is downward-exclusive via `Arc`; back-pointers
//! (`EventClass -> StreamClass`, `StreamClass -> Trace`) are `Weak` so the tree never
//! forms a reference cycle. Nodes are immutable after a trace is [`Trace::mark_static`],
//! except for a `StreamClass`'s event class list, which the sink may extend lazily.

use crate::identity::{Identity, ObjectId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

/// A single field in a packet/event header, context, or payload layout.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FieldType {
    /// Unsigned integer, `bits` wide (8, 16, 32, or 64), optionally clock-mapped.
    UInt { bits: u8, clock: Option<ClockRef> },
    /// Signed integer, `bits` wide (8, 16, 32, or 64).
    Int { bits: u8 },
    /// Null-terminated UTF-8 string.
    Str,
}

/// Identifies which of the trace's clock classes a `timestamp`-like integer field maps onto,
/// by index into `Trace::clock_classes` at parse time.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ClockRef(pub usize);

pub type Layout = Vec<FieldSpec>;

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum FieldValue {
    UInt(u64),
    Int(i64),
    Str(String),
}

pub type FieldValues = BTreeMap<String, FieldValue>;

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum EnvValue {
    Integer(i64),
    String(String),
}

/// A clock class: identified by identity (not name/uuid) within one trace, per the data model.
#[derive(Debug)]
pub struct ClockClass {
    pub name: String,
    pub frequency: u64,
    pub offset_cycles: i64,
    pub uuid: Option<Uuid>,
}

impl Identity for Arc<ClockClass> {
    fn identity(&self) -> ObjectId {
        ObjectId::of(self)
    }
}

/// What to do with a `timestamp_begin` (or any clock snapshot) that decodes to a negative
/// number of nanoseconds since the Unix epoch.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum PreEpochPolicy {
    /// Drop the timestamp (treat as absent). Matches the reference implementation's default.
    #[default]
    Drop,
    /// Saturate to zero instead of dropping.
    Saturate,
}

impl ClockClass {
    /// Convert a raw clock tick count to nanoseconds since the Unix epoch, honoring `policy`
    /// for the pre-epoch (negative) case.
    pub fn ns_from_epoch(&self, raw: u64, policy: PreEpochPolicy) -> Option<u64> {
        if self.frequency == 0 {
            return None;
        }
        let cycles = raw as i128 + self.offset_cycles as i128;
        let ns = cycles * 1_000_000_000i128 / self.frequency as i128;
        if ns < 0 {
            match policy {
                PreEpochPolicy::Drop => None,
                PreEpochPolicy::Saturate => Some(0),
            }
        } else {
            Some(ns as u64)
        }
    }
}

/// `(StreamClass.id, EventClass.id)` is globally unique; `name` is informational.
#[derive(Debug)]
pub struct EventClass {
    pub id: u64,
    pub name: Option<String>,
    pub specific_context_layout: Layout,
    pub payload_layout: Layout,
    pub stream_class: Weak<StreamClass>,
}

impl Identity for Arc<EventClass> {
    fn identity(&self) -> ObjectId {
        ObjectId::of(self)
    }
}

/// `id` is unique within a trace; may be absent in packet headers when the trace has exactly
/// one stream class (§4.2).
#[derive(Debug)]
pub struct StreamClass {
    pub id: u64,
    pub packet_context_layout: Layout,
    pub event_header_layout: Layout,
    pub event_common_context_layout: Layout,
    /// Lazily extended by the sink on first occurrence of a previously-unseen event class id.
    pub event_classes: Mutex<Vec<Arc<EventClass>>>,
    pub trace: Weak<Trace>,
}

impl Identity for Arc<StreamClass> {
    fn identity(&self) -> ObjectId {
        ObjectId::of(self)
    }
}

impl StreamClass {
    pub fn event_class_by_id(&self, id: u64) -> Option<Arc<EventClass>> {
        self.event_classes
            .lock()
            .unwrap()
            .iter()
            .find(|ec| ec.id == id)
            .cloned()
    }

    pub fn push_event_class(&self, ec: Arc<EventClass>) {
        self.event_classes.lock().unwrap().push(ec);
    }

    /// `Some(self.id)` if the owning trace has more than one stream class (so the fixed
    /// packet header must carry `stream_id` to disambiguate), `None` if it's the trace's sole
    /// stream class and `stream_id` may be omitted (§4.2).
    pub fn id_in_fixed_header(&self) -> Option<u64> {
        match self.trace.upgrade() {
            Some(trace) if trace.stream_classes.lock().unwrap().len() > 1 => Some(self.id),
            _ => None,
        }
    }
}

/// The root of the schema tree. Once [`Trace::mark_static`] has been called, adding a new
/// `StreamClass` is a programming error (the set of stream classes is considered closed).
#[derive(Debug)]
pub struct Trace {
    pub name: String,
    pub uuid: Option<Uuid>,
    pub env: BTreeMap<String, EnvValue>,
    pub stream_classes: Mutex<Vec<Arc<StreamClass>>>,
    pub clock_classes: Mutex<Vec<Arc<ClockClass>>>,
    is_static: AtomicBool,
}

impl Identity for Arc<Trace> {
    fn identity(&self) -> ObjectId {
        ObjectId::of(self)
    }
}

impl Trace {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::from_parts(name, None, BTreeMap::new())
    }

    pub fn from_parts(
        name: impl Into<String>,
        uuid: Option<Uuid>,
        env: BTreeMap<String, EnvValue>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            uuid,
            env,
            stream_classes: Mutex::new(Vec::new()),
            clock_classes: Mutex::new(Vec::new()),
            is_static: AtomicBool::new(false),
        })
    }

    pub fn stream_class_by_id(&self, id: u64) -> Option<Arc<StreamClass>> {
        self.stream_classes
            .lock()
            .unwrap()
            .iter()
            .find(|sc| sc.id == id)
            .cloned()
    }

    pub fn sole_stream_class(&self) -> Option<Arc<StreamClass>> {
        let scs = self.stream_classes.lock().unwrap();
        if scs.len() == 1 {
            scs.first().cloned()
        } else {
            None
        }
    }

    /// Adds a stream class. Panics in debug builds (and is a silent no-op in release builds,
    /// per the "programming error" classification in §4.4) if the trace is already static.
    pub fn add_stream_class(self: &Arc<Self>, sc: Arc<StreamClass>) {
        debug_assert!(
            !self.is_static.load(SeqCst),
            "attempted to add a stream class to a trace marked static"
        );
        self.stream_classes.lock().unwrap().push(sc);
    }

    pub fn add_clock_class(&self, cc: Arc<ClockClass>) {
        self.clock_classes.lock().unwrap().push(cc);
    }

    /// Adds `offset_s` seconds and `offset_ns` nanoseconds to every clock class's offset,
    /// converting to cycles at each clock's own frequency. A no-op when both are zero. Must be
    /// called before anything takes a `ClockRef` snapshot that assumes a fixed `ClockClass`
    /// identity list ordering is otherwise unaffected: classes are replaced in place, same index.
    pub fn apply_clock_offset(&self, offset_s: i64, offset_ns: i64) {
        if offset_s == 0 && offset_ns == 0 {
            return;
        }
        let offset_total_ns = offset_s as i128 * 1_000_000_000i128 + offset_ns as i128;
        let mut classes = self.clock_classes.lock().unwrap();
        for cc in classes.iter_mut() {
            let added_cycles = offset_total_ns * cc.frequency as i128 / 1_000_000_000i128;
            *cc = Arc::new(ClockClass {
                name: cc.name.clone(),
                frequency: cc.frequency,
                offset_cycles: cc.offset_cycles + added_cycles as i64,
                uuid: cc.uuid,
            });
        }
    }

    pub fn clock_class_by_name(&self, name: &str) -> Option<Arc<ClockClass>> {
        self.clock_classes
            .lock()
            .unwrap()
            .iter()
            .find(|cc| cc.name == name)
            .cloned()
    }

    pub fn mark_static(&self) {
        self.is_static.store(true, SeqCst);
    }

    pub fn is_static(&self) -> bool {
        self.is_static.load(SeqCst)
    }
}

/// Assigns every clock class of a trace a priority, currently always 0 — a placeholder for a
/// future cross-stream ordering policy. Built once, after the trace's schema is loaded.
#[derive(Debug, Default)]
pub struct ClockClassPriorityMap {
    priorities: HashMap<ObjectId, u64>,
}

impl ClockClassPriorityMap {
    pub fn build(trace: &Trace) -> Self {
        let mut priorities = HashMap::new();
        for cc in trace.clock_classes.lock().unwrap().iter() {
            priorities.insert(cc.identity(), 0);
        }
        Self { priorities }
    }

    pub fn priority_of(&self, cc: &Arc<ClockClass>) -> Option<u64> {
        self.priorities.get(&cc.identity()).copied()
    }

    pub fn len(&self) -> usize {
        self.priorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty()
    }
}

/// A logical sequence of packets sharing a `StreamClass`. May span multiple files (source side)
/// and is created lazily on first `PacketBegin` (sink side).
#[derive(Debug)]
pub struct Stream {
    pub instance_id: Option<u64>,
    pub class: Arc<StreamClass>,
}

impl Identity for Arc<Stream> {
    fn identity(&self) -> ObjectId {
        ObjectId::of(self)
    }
}

impl Stream {
    pub fn new(class: Arc<StreamClass>, instance_id: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            instance_id,
            class,
        })
    }
}

/// A bounded section of a stream, carrying packet-context field values. Transient: appears only
/// in the notification stream.
#[derive(Clone, Debug)]
pub struct Packet {
    pub stream: Arc<Stream>,
    pub context: FieldValues,
}

/// A single decoded event, transient like [`Packet`].
#[derive(Clone, Debug)]
pub struct Event {
    pub stream: Arc<Stream>,
    pub class: Arc<EventClass>,
    pub header: FieldValues,
    pub common_context: FieldValues,
    pub specific_context: FieldValues,
    pub payload: FieldValues,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_cannot_grow_stream_classes_once_static() {
        let trace = Trace::new("t");
        let sc = Arc::new(StreamClass {
            id: 0,
            packet_context_layout: vec![],
            event_header_layout: vec![],
            event_common_context_layout: vec![],
            event_classes: Mutex::new(vec![]),
            trace: Arc::downgrade(&trace),
        });
        trace.add_stream_class(sc);
        trace.mark_static();
        assert!(trace.is_static());
        // mutation after mark_static is only a debug_assert!, exercised via release-mode
        // callers that check `is_static()` themselves before calling add_stream_class.
    }

    #[test]
    fn clock_class_priority_map_covers_every_clock_exactly_once() {
        let trace = Trace::new("t");
        trace.add_clock_class(Arc::new(ClockClass {
            name: "a".into(),
            frequency: 1_000_000_000,
            offset_cycles: 0,
            uuid: None,
        }));
        trace.add_clock_class(Arc::new(ClockClass {
            name: "b".into(),
            frequency: 1_000_000_000,
            offset_cycles: 0,
            uuid: None,
        }));
        let map = ClockClassPriorityMap::build(&trace);
        assert_eq!(map.len(), 2);
        for cc in trace.clock_classes.lock().unwrap().iter() {
            assert_eq!(map.priority_of(cc), Some(0));
        }
    }

    #[test]
    fn apply_clock_offset_shifts_every_clock_in_place() {
        let trace = Trace::new("t");
        trace.add_clock_class(Arc::new(ClockClass {
            name: "a".into(),
            frequency: 1_000_000_000,
            offset_cycles: 0,
            uuid: None,
        }));
        trace.add_clock_class(Arc::new(ClockClass {
            name: "b".into(),
            frequency: 500_000_000,
            offset_cycles: 0,
            uuid: None,
        }));

        trace.apply_clock_offset(2, -1);

        let classes = trace.clock_classes.lock().unwrap();
        assert_eq!(classes[0].offset_cycles, 1_999_999_999);
        assert_eq!(classes[1].offset_cycles, 999_999_999);
        assert_eq!(classes[0].name, "a");
        assert_eq!(classes[1].name, "b");
    }

    #[test]
    fn apply_clock_offset_is_a_no_op_when_zero() {
        let trace = Trace::new("t");
        let original = Arc::new(ClockClass {
            name: "a".into(),
            frequency: 1_000_000_000,
            offset_cycles: 7,
            uuid: None,
        });
        trace.add_clock_class(original.clone());

        trace.apply_clock_offset(0, 0);

        let classes = trace.clock_classes.lock().unwrap();
        assert!(Arc::ptr_eq(&classes[0], &original));
    }

    #[test]
    fn ns_from_epoch_pre_epoch_policy() {
        let cc = ClockClass {
            name: "a".into(),
            frequency: 1_000_000_000,
            offset_cycles: -10,
            uuid: None,
        };
        assert_eq!(cc.ns_from_epoch(5, PreEpochPolicy::Drop), None);
        assert_eq!(cc.ns_from_epoch(5, PreEpochPolicy::Saturate), Some(0));
        assert_eq!(cc.ns_from_epoch(20, PreEpochPolicy::Drop), Some(10));
    }
}
