//! Reads just enough of a stream file's first packet to classify it (§4.2): which
//! `StreamClass` it belongs to, which instance of that stream class it is, and when its
//! first packet begins.

use crate::error::InspectError;
use crate::reader::{read_fixed_packet_header, PACKET_MAGIC};
use crate::schema::{FieldType, PreEpochPolicy, StreamClass, Trace};
use bytes::{Buf, Bytes};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// The result of inspecting one stream file's leading packet.
pub struct Inspection {
    pub stream_class: Arc<StreamClass>,
    pub stream_instance_id: Option<u64>,
    pub begin_ns: Option<u64>,
}

pub fn inspect(
    path: &Path,
    trace: &Arc<Trace>,
    policy: PreEpochPolicy,
) -> Result<Inspection, InspectError> {
    let bytes = fs::read(path).map_err(|e| InspectError::Open(path.to_path_buf(), e))?;
    if bytes.is_empty() {
        return Err(InspectError::EmptyFile(path.to_path_buf()));
    }
    let mut buf = Bytes::from(bytes);

    if buf.remaining() < 4 {
        return Err(InspectError::ShortRead(path.to_path_buf()));
    }
    let magic = buf.get_u32_le();
    if magic != PACKET_MAGIC {
        return Err(InspectError::ShortRead(path.to_path_buf()));
    }

    let (stream_id, stream_instance_id) =
        read_fixed_packet_header(&mut buf).map_err(|_| InspectError::ShortRead(path.to_path_buf()))?;

    let stream_class = match stream_id {
        Some(id) => trace
            .stream_class_by_id(id)
            .ok_or_else(|| InspectError::UnknownStreamClass(path.to_path_buf(), id))?,
        None => trace
            .sole_stream_class()
            .ok_or_else(|| InspectError::AmbiguousStreamClass(path.to_path_buf()))?,
    };

    let context = crate::codec::decode_layout(&stream_class.packet_context_layout, &mut buf)
        .map_err(|_| InspectError::ShortRead(path.to_path_buf()))?;

    let begin_ns = stream_class
        .packet_context_layout
        .iter()
        .find(|f| f.name == "timestamp_begin")
        .and_then(|f| match f.ty {
            FieldType::UInt {
                clock: Some(crate::schema::ClockRef(idx)),
                ..
            } => {
                let raw = match context.get("timestamp_begin") {
                    Some(crate::schema::FieldValue::UInt(v)) => *v,
                    _ => return None,
                };
                let cc = trace.clock_classes.lock().unwrap().get(idx).cloned()?;
                cc.ns_from_epoch(raw, policy)
            }
            _ => None,
        });

    Ok(Inspection {
        stream_class,
        stream_instance_id,
        begin_ns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;
    use crate::schema::{FieldValue, FieldValues};
    use crate::writer::BinaryPacketWriter;
    use crate::schema::Stream as SchemaStream;

    const SAMPLE: &str = r#"/* CTF 1.8 */

trace {
    name = "t";
};

clock {
    name = monotonic;
    freq = 1000000000;
    offset = 0;
};

stream {
    id = 0;
    packet.context = timestamp_begin:uint64@monotonic;
    event.header = id:uint32;
    event.context = ;
};
"#;

    #[test]
    fn inspects_sole_stream_class_and_begin_ns() {
        let trace = metadata::parse(SAMPLE).unwrap();
        let sc = trace.stream_class_by_id(0).unwrap();
        let stream = SchemaStream::new(sc.clone(), Some(7));
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = BinaryPacketWriter::create(tmp.path().to_path_buf(), trace.clone()).unwrap();
        let mut context = FieldValues::new();
        context.insert("timestamp_begin".into(), FieldValue::UInt(5_000_000_000));
        writer.begin_packet(&stream, context).unwrap();
        writer.flush_packet(&stream).unwrap();
        writer.finalize().unwrap();

        let file_path = tmp.path().join(format!("stream_{}_{}", sc.id, 7));
        let inspection = inspect(&file_path, &trace, PreEpochPolicy::Drop).unwrap();
        assert_eq!(inspection.stream_instance_id, Some(7));
        assert_eq!(inspection.begin_ns, Some(5_000_000_000));
    }
}
