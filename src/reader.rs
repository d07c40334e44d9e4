//! The per-file binary event decoder. [`BinaryStreamFileReader`] is the reference
//! implementation, reading the format [`crate::writer::BinaryPacketWriter`] produces.

use crate::codec::decode_layout;
use crate::error::SourceError;
use crate::notification::Notification;
use crate::schema::{Event, Packet, Stream};
use bytes::{Buf, Bytes};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const PACKET_MAGIC: u32 = 0xC7F0_0001;

pub enum ReadOutcome {
    Notification(Notification),
    End,
}

/// Reads the fixed, schema-independent packet header that precedes every packet's
/// stream-class-specific context: `[has_stream_id:u8][stream_id:u64?][has_instance_id:u8]
/// [stream_instance_id:u64?]`. Schema-independent so `DataStreamInspector` (§4.2) can resolve
/// a file's owning `StreamClass` before it knows which context layout to decode with.
pub fn read_fixed_packet_header(buf: &mut Bytes) -> Result<(Option<u64>, Option<u64>), String> {
    if buf.remaining() < 1 {
        return Err("truncated packet header (stream_id presence flag)".into());
    }
    let stream_id = if buf.get_u8() != 0 {
        if buf.remaining() < 8 {
            return Err("truncated packet header (stream_id)".into());
        }
        Some(buf.get_u64_le())
    } else {
        None
    };
    if buf.remaining() < 1 {
        return Err("truncated packet header (instance_id presence flag)".into());
    }
    let instance_id = if buf.get_u8() != 0 {
        if buf.remaining() < 8 {
            return Err("truncated packet header (instance_id)".into());
        }
        Some(buf.get_u64_le())
    } else {
        None
    };
    Ok((stream_id, instance_id))
}

/// The per-stream-file decoder a `SourceIterator` delegates to. A fresh reader over a
/// non-empty file must yield a `PacketBegin` on its first `next()` call (§4.5's invariant).
pub trait StreamFileReader {
    fn next(&mut self) -> Result<ReadOutcome, SourceError>;
}

enum State {
    NeedPacket,
    InPacket {
        packet: Packet,
        events_left: u32,
        buf: Bytes,
    },
    AtEof,
}

/// Reads the reference binary layout: a sequence of packets, each
/// `[magic:u32][context][event_count:u32][event]*`, where each event is
/// `[header][event_class_id:u64][common_context][specific_context][payload]`.
pub struct BinaryStreamFileReader {
    path: PathBuf,
    buf: Bytes,
    stream: Arc<Stream>,
    state: State,
}

impl BinaryStreamFileReader {
    pub fn open(path: &Path, stream: Arc<Stream>) -> Result<Self, SourceError> {
        let bytes = fs::read(path).map_err(|e| SourceError::Open(path.to_path_buf(), e))?;
        Ok(Self {
            path: path.to_path_buf(),
            buf: Bytes::from(bytes),
            stream,
            state: State::NeedPacket,
        })
    }

    fn decode_err(&self, msg: impl Into<String>) -> SourceError {
        SourceError::Decode(self.path.clone(), msg.into())
    }
}

impl StreamFileReader for BinaryStreamFileReader {
    fn next(&mut self) -> Result<ReadOutcome, SourceError> {
        loop {
            match std::mem::replace(&mut self.state, State::AtEof) {
                State::NeedPacket => {
                    if self.buf.is_empty() {
                        self.state = State::AtEof;
                        return Ok(ReadOutcome::End);
                    }
                    if self.buf.remaining() < 4 {
                        return Err(self.decode_err("truncated packet magic"));
                    }
                    let magic = self.buf.get_u32_le();
                    if magic != PACKET_MAGIC {
                        return Err(self.decode_err(format!("bad packet magic {magic:#x}")));
                    }
                    // The stream this file belongs to is already known (from stream-file
                    // grouping), so the fixed header is consumed and discarded here.
                    read_fixed_packet_header(&mut self.buf).map_err(|e| self.decode_err(e))?;
                    let sc = self.stream.class.clone();
                    let context = decode_layout(&sc.packet_context_layout, &mut self.buf)
                        .map_err(|e| self.decode_err(e.to_string()))?;
                    if self.buf.remaining() < 4 {
                        return Err(self.decode_err("truncated event count"));
                    }
                    let event_count = self.buf.get_u32_le();
                    let packet = Packet {
                        stream: self.stream.clone(),
                        context,
                    };
                    let remaining_buf = self.buf.clone();
                    self.state = State::InPacket {
                        packet: packet.clone(),
                        events_left: event_count,
                        buf: remaining_buf,
                    };
                    return Ok(ReadOutcome::Notification(Notification::PacketBegin(packet)));
                }
                State::InPacket {
                    packet,
                    events_left,
                    mut buf,
                } => {
                    if events_left == 0 {
                        self.buf = buf;
                        self.state = State::NeedPacket;
                        return Ok(ReadOutcome::Notification(Notification::PacketEnd(packet)));
                    }
                    let sc = self.stream.class.clone();
                    let header = decode_layout(&sc.event_header_layout, &mut buf)
                        .map_err(|e| self.decode_err(e.to_string()))?;
                    if buf.remaining() < 8 {
                        return Err(self.decode_err("truncated event class id"));
                    }
                    let event_class_id = buf.get_u64_le();
                    let ec = sc.event_class_by_id(event_class_id).ok_or_else(|| {
                        self.decode_err(format!("unknown event class id {event_class_id}"))
                    })?;
                    let common_context = decode_layout(&sc.event_common_context_layout, &mut buf)
                        .map_err(|e| self.decode_err(e.to_string()))?;
                    let specific_context = decode_layout(&ec.specific_context_layout, &mut buf)
                        .map_err(|e| self.decode_err(e.to_string()))?;
                    let payload = decode_layout(&ec.payload_layout, &mut buf)
                        .map_err(|e| self.decode_err(e.to_string()))?;
                    let event = Event {
                        stream: self.stream.clone(),
                        class: ec,
                        header,
                        common_context,
                        specific_context,
                        payload,
                    };
                    self.state = State::InPacket {
                        packet,
                        events_left: events_left - 1,
                        buf,
                    };
                    return Ok(ReadOutcome::Notification(Notification::Event(event)));
                }
                State::AtEof => return Ok(ReadOutcome::End),
            }
        }
    }
}
