//! Mirrors an input trace's schema and stream data into an output directory on the fly,
//! keyed entirely by identity of the input objects (§4.6).

use crate::error::SinkError;
use crate::identity::{Identity, ObjectId};
use crate::metadata;
use crate::schema::{Event, EventClass, FieldValues, Packet, Stream, StreamClass, Trace};
use crate::writer::BinaryPacketWriter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum StreamState {
    Uninit,
    PacketOpen,
    PacketClosed,
    Final,
}

struct OutputTrace {
    writer: Mutex<BinaryPacketWriter>,
    out_trace: Arc<Trace>,
    sc_to_sc: Mutex<HashMap<ObjectId, Arc<StreamClass>>>,
    stream_to_stream: Mutex<HashMap<ObjectId, (Arc<Stream>, StreamState)>>,
    seen_clocks: Mutex<Vec<String>>,
}

/// Mirrors notifications from any number of input traces into per-trace output directories
/// under `output_base`, each named `"<trace_name_base>_<NNN>"`.
pub struct SinkMirror {
    output_base: PathBuf,
    trace_to_writer: Mutex<HashMap<ObjectId, Arc<OutputTrace>>>,
    next_dir_index: Mutex<u32>,
}

impl SinkMirror {
    pub fn new(output_base: PathBuf) -> Self {
        Self {
            output_base,
            trace_to_writer: Mutex::new(HashMap::new()),
            next_dir_index: Mutex::new(0),
        }
    }

    fn resolve_output_trace(&self, in_trace: &Arc<Trace>) -> Result<Arc<OutputTrace>, SinkError> {
        let id = in_trace.identity();
        if let Some(existing) = self.trace_to_writer.lock().unwrap().get(&id) {
            return Ok(existing.clone());
        }

        let idx = {
            let mut next = self.next_dir_index.lock().unwrap();
            let idx = *next;
            *next += 1;
            idx
        };
        let base_name = sanitize_trace_name(&in_trace.name);
        let dir_name = format!("{base_name}_{idx:03}");
        let dir = self.output_base.join(dir_name);

        let out_trace = Trace::from_parts(in_trace.name.clone(), in_trace.uuid, in_trace.env.clone());
        let writer = BinaryPacketWriter::create(dir, out_trace.clone())?;

        let out = Arc::new(OutputTrace {
            writer: Mutex::new(writer),
            out_trace,
            sc_to_sc: Mutex::new(HashMap::new()),
            stream_to_stream: Mutex::new(HashMap::new()),
            seen_clocks: Mutex::new(Vec::new()),
        });
        self.trace_to_writer.lock().unwrap().insert(id, out.clone());
        Ok(out)
    }

    fn resolve_stream_class(
        &self,
        out: &Arc<OutputTrace>,
        in_sc: &Arc<StreamClass>,
    ) -> Result<Arc<StreamClass>, SinkError> {
        let id = in_sc.identity();
        if let Some(existing) = out.sc_to_sc.lock().unwrap().get(&id) {
            return Ok(existing.clone());
        }

        if let Some(in_trace) = in_sc.trace.upgrade() {
            let mut seen = out.seen_clocks.lock().unwrap();
            for cc in in_trace.clock_classes.lock().unwrap().iter() {
                if !seen.contains(&cc.name) {
                    out.out_trace.add_clock_class(cc.clone());
                    seen.push(cc.name.clone());
                }
            }
        }

        let out_sc = Arc::new(StreamClass {
            id: in_sc.id,
            packet_context_layout: in_sc.packet_context_layout.clone(),
            event_header_layout: in_sc.event_header_layout.clone(),
            event_common_context_layout: in_sc.event_common_context_layout.clone(),
            event_classes: Mutex::new(Vec::new()),
            trace: Arc::downgrade(&out.out_trace),
        });
        out.out_trace.add_stream_class(out_sc.clone());
        out.sc_to_sc.lock().unwrap().insert(id, out_sc.clone());
        Ok(out_sc)
    }

    fn resolve_stream(
        &self,
        out: &Arc<OutputTrace>,
        in_stream: &Arc<Stream>,
        out_sc: &Arc<StreamClass>,
    ) -> Arc<Stream> {
        let id = in_stream.identity();
        let mut map = out.stream_to_stream.lock().unwrap();
        if let Some((existing, _)) = map.get(&id) {
            return existing.clone();
        }
        let out_stream = Stream::new(out_sc.clone(), in_stream.instance_id);
        map.insert(id, (out_stream.clone(), StreamState::Uninit));
        out_stream
    }

    pub fn on_packet_begin(&self, packet: &Packet) -> Result<(), SinkError> {
        let in_stream = &packet.stream;
        let in_sc = &in_stream.class;
        let in_trace = in_sc
            .trace
            .upgrade()
            .expect("a live packet must reference a live trace");

        let out = self.resolve_output_trace(&in_trace)?;
        let out_sc = self.resolve_stream_class(&out, in_sc)?;
        let out_stream = self.resolve_stream(&out, in_stream, &out_sc);

        {
            let mut map = out.stream_to_stream.lock().unwrap();
            let entry = map.get_mut(&in_stream.identity()).unwrap();
            match entry.1 {
                StreamState::Uninit | StreamState::PacketClosed => entry.1 = StreamState::PacketOpen,
                StreamState::PacketOpen => return Err(SinkError::PacketBeginWhilePacketOpen),
                StreamState::Final => return Err(SinkError::PacketBeginWhilePacketOpen),
            }
        }

        out.writer
            .lock()
            .unwrap()
            .begin_packet(&out_stream, packet.context.clone())
    }

    pub fn on_event(&self, event: &Event) -> Result<(), SinkError> {
        let in_stream = &event.stream;
        let in_sc = &in_stream.class;
        let in_trace = in_sc
            .trace
            .upgrade()
            .expect("a live event must reference a live trace");

        let out = self
            .trace_to_writer
            .lock()
            .unwrap()
            .get(&in_trace.identity())
            .cloned()
            .ok_or(SinkError::EventBeforePacketBegin)?;

        let out_sc = out
            .sc_to_sc
            .lock()
            .unwrap()
            .get(&in_sc.identity())
            .cloned()
            .ok_or(SinkError::EventBeforePacketBegin)?;

        let out_stream = {
            let map = out.stream_to_stream.lock().unwrap();
            match map.get(&in_stream.identity()) {
                Some((s, StreamState::PacketOpen)) => s.clone(),
                Some(_) => return Err(SinkError::EventBeforePacketBegin),
                None => return Err(SinkError::EventBeforePacketBegin),
            }
        };

        let out_ec = resolve_event_class(&out_sc, &event.class);

        let translated = Event {
            stream: out_stream.clone(),
            class: out_ec,
            header: event.header.clone(),
            common_context: event.common_context.clone(),
            specific_context: event.specific_context.clone(),
            payload: event.payload.clone(),
        };

        out.writer.lock().unwrap().write_event(&out_stream, &translated)
    }

    pub fn on_packet_end(&self, packet: &Packet) -> Result<(), SinkError> {
        let in_stream = &packet.stream;
        let in_trace = in_stream
            .class
            .trace
            .upgrade()
            .expect("a live packet must reference a live trace");

        let out = self
            .trace_to_writer
            .lock()
            .unwrap()
            .get(&in_trace.identity())
            .cloned()
            .ok_or(SinkError::PacketEndWithoutBegin)?;

        let out_stream = {
            let mut map = out.stream_to_stream.lock().unwrap();
            let entry = map
                .get_mut(&in_stream.identity())
                .ok_or(SinkError::PacketEndWithoutBegin)?;
            if entry.1 != StreamState::PacketOpen {
                return Err(SinkError::PacketEndWithoutBegin);
            }
            entry.1 = StreamState::PacketClosed;
            entry.0.clone()
        };

        out.writer.lock().unwrap().flush_packet(&out_stream)
    }

    /// Flushes every writer's schema to disk and marks every tracked stream `Final`.
    /// Idempotent: traces with no streams produce no output directory content beyond the
    /// directory itself.
    pub fn finalize(&self) -> Result<(), SinkError> {
        for out in self.trace_to_writer.lock().unwrap().values() {
            out.writer.lock().unwrap().finalize()?;
            for (_, state) in out.stream_to_stream.lock().unwrap().values_mut() {
                *state = StreamState::Final;
            }
        }
        Ok(())
    }
}

fn resolve_event_class(out_sc: &Arc<StreamClass>, in_ec: &Arc<EventClass>) -> Arc<EventClass> {
    if let Some(existing) = out_sc.event_class_by_id(in_ec.id) {
        return existing;
    }
    let out_ec = Arc::new(EventClass {
        id: in_ec.id,
        name: in_ec.name.clone(),
        specific_context_layout: in_ec.specific_context_layout.clone(),
        payload_layout: in_ec.payload_layout.clone(),
        stream_class: Arc::downgrade(out_sc),
    });
    out_sc.push_event_class(out_ec.clone());
    out_ec
}

fn sanitize_trace_name(name: &str) -> String {
    let s: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if s.is_empty() {
        "trace".to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;
    use crate::notification::Notification;
    use crate::reader::{BinaryStreamFileReader, ReadOutcome, StreamFileReader};
    use crate::schema::{FieldValue, Stream as SchemaStream};
    use std::collections::BTreeMap;

    const SAMPLE: &str = r#"/* CTF 1.8 */

trace {
    name = "roundtrip";
};

stream {
    id = 0;
    packet.context = seq:uint32;
    event.header = id:uint32;
    event.context = ;
};

event {
    stream_id = 0;
    id = 0;
    name = "tick";
    context = ;
    fields = n:uint32;
};
"#;

    #[test]
    fn mirrors_one_packet_with_one_event() {
        let trace = metadata::parse(SAMPLE).unwrap();
        let sc = trace.stream_class_by_id(0).unwrap();
        let ec = sc.event_class_by_id(0).unwrap();
        let stream = SchemaStream::new(sc.clone(), None);

        let mut ctx = FieldValues::new();
        ctx.insert("seq".into(), FieldValue::UInt(1));
        let packet = Packet {
            stream: stream.clone(),
            context: ctx,
        };

        let mut payload = FieldValues::new();
        payload.insert("n".into(), FieldValue::UInt(42));
        let event = Event {
            stream: stream.clone(),
            class: ec,
            header: BTreeMap::new(),
            common_context: BTreeMap::new(),
            specific_context: BTreeMap::new(),
            payload,
        };

        let tmp = tempfile::tempdir().unwrap();
        let sink = SinkMirror::new(tmp.path().to_path_buf());
        sink.on_packet_begin(&packet).unwrap();
        sink.on_event(&event).unwrap();
        sink.on_packet_end(&packet).unwrap();
        sink.finalize().unwrap();

        let out_dir = tmp.path().join("roundtrip_000");
        assert!(out_dir.join("metadata").is_file());
        let stream_file = out_dir.join(format!("stream_{}", sc.id));
        assert!(stream_file.is_file());

        let out_trace = metadata::parse(&metadata::read_metadata_file(&out_dir.join("metadata")).unwrap().0).unwrap();
        let out_sc = out_trace.stream_class_by_id(0).unwrap();
        let out_stream = SchemaStream::new(out_sc, None);
        let mut reader = BinaryStreamFileReader::open(&stream_file, out_stream).unwrap();
        let first = reader.next().unwrap();
        assert!(matches!(first, ReadOutcome::Notification(Notification::PacketBegin(_))));
        let second = reader.next().unwrap();
        assert!(matches!(second, ReadOutcome::Notification(Notification::Event(_))));
        let third = reader.next().unwrap();
        assert!(matches!(third, ReadOutcome::Notification(Notification::PacketEnd(_))));
    }
}
