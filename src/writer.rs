//! The CTF packet writer. [`BinaryPacketWriter`] is the reference implementation,
//! writing the format [`crate::reader::BinaryStreamFileReader`] reads.

use crate::codec::encode_layout;
use crate::error::SinkError;
use crate::identity::{Identity, ObjectId};
use crate::reader::PACKET_MAGIC;
use crate::schema::{Event, FieldValues, Stream, Trace};
use bytes::{BufMut, BytesMut};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct OpenStream {
    file: File,
    file_name: String,
    pending_context: Option<FieldValues>,
    pending_events: BytesMut,
    pending_event_count: u32,
}

/// Owns one output trace directory: the rendered `metadata` file plus one binary file per
/// output `Stream`. Buffers a stream's current packet (context + events) in memory between
/// `begin_packet` and `flush_packet`, which writes the packet's bytes to disk in one shot.
pub struct BinaryPacketWriter {
    output_dir: PathBuf,
    out_trace: Arc<Trace>,
    streams: HashMap<ObjectId, OpenStream>,
}

impl BinaryPacketWriter {
    pub fn create(output_dir: PathBuf, out_trace: Arc<Trace>) -> Result<Self, SinkError> {
        fs::create_dir_all(&output_dir)
            .map_err(|e| SinkError::CreateOutputDir(output_dir.clone(), e))?;
        Ok(Self {
            output_dir,
            out_trace,
            streams: HashMap::new(),
        })
    }

    pub fn out_trace(&self) -> &Arc<Trace> {
        &self.out_trace
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn ensure_open(&mut self, out_stream: &Arc<Stream>) -> Result<&mut OpenStream, SinkError> {
        let id = out_stream.identity();
        if !self.streams.contains_key(&id) {
            let file_name = match out_stream.instance_id {
                Some(instance) => format!("stream_{}_{}", out_stream.class.id, instance),
                None => format!("stream_{}", out_stream.class.id),
            };
            let path = self.output_dir.join(&file_name);
            let file = File::create(&path).map_err(|e| SinkError::Write(path.clone(), e))?;
            self.streams.insert(
                id,
                OpenStream {
                    file,
                    file_name,
                    pending_context: None,
                    pending_events: BytesMut::new(),
                    pending_event_count: 0,
                },
            );
        }
        Ok(self.streams.get_mut(&id).unwrap())
    }

    /// Begins buffering a new packet for `out_stream`; its context is held until
    /// [`Self::flush_packet`].
    pub fn begin_packet(
        &mut self,
        out_stream: &Arc<Stream>,
        context: FieldValues,
    ) -> Result<(), SinkError> {
        let entry = self.ensure_open(out_stream)?;
        entry.pending_context = Some(context);
        entry.pending_events = BytesMut::new();
        entry.pending_event_count = 0;
        Ok(())
    }

    /// Buffers an event's encoded bytes into the currently-open packet for `out_stream`.
    pub fn write_event(&mut self, out_stream: &Arc<Stream>, event: &Event) -> Result<(), SinkError> {
        let sc = out_stream.class.clone();
        let entry = self.ensure_open(out_stream)?;
        encode_layout(&sc.event_header_layout, &event.header, &mut entry.pending_events)
            .map_err(|e| SinkError::Write(PathBuf::from(&entry.file_name), io_err(e)))?;
        entry.pending_events.extend_from_slice(&event.class.id.to_le_bytes());
        encode_layout(
            &sc.event_common_context_layout,
            &event.common_context,
            &mut entry.pending_events,
        )
        .map_err(|e| SinkError::Write(PathBuf::from(&entry.file_name), io_err(e)))?;
        encode_layout(
            &event.class.specific_context_layout,
            &event.specific_context,
            &mut entry.pending_events,
        )
        .map_err(|e| SinkError::Write(PathBuf::from(&entry.file_name), io_err(e)))?;
        encode_layout(&event.class.payload_layout, &event.payload, &mut entry.pending_events)
            .map_err(|e| SinkError::Write(PathBuf::from(&entry.file_name), io_err(e)))?;
        entry.pending_event_count += 1;
        Ok(())
    }

    /// Writes the buffered packet for `out_stream` to disk.
    pub fn flush_packet(&mut self, out_stream: &Arc<Stream>) -> Result<(), SinkError> {
        let sc = out_stream.class.clone();
        let id = out_stream.identity();
        let entry = self
            .streams
            .get_mut(&id)
            .expect("flush_packet called on a stream with no open packet");
        let context = entry
            .pending_context
            .take()
            .expect("flush_packet called without a preceding begin_packet");

        let mut out = BytesMut::new();
        out.extend_from_slice(&PACKET_MAGIC.to_le_bytes());
        match sc.id_in_fixed_header() {
            Some(id) => {
                out.put_u8(1);
                out.put_u64_le(id);
            }
            None => out.put_u8(0),
        }
        match out_stream.instance_id {
            Some(instance) => {
                out.put_u8(1);
                out.put_u64_le(instance);
            }
            None => out.put_u8(0),
        }
        encode_layout(&sc.packet_context_layout, &context, &mut out)
            .map_err(|e| SinkError::Write(PathBuf::from(&entry.file_name), io_err(e)))?;
        out.extend_from_slice(&entry.pending_event_count.to_le_bytes());
        out.extend_from_slice(&entry.pending_events);

        entry
            .file
            .write_all(&out)
            .map_err(|e| SinkError::Write(PathBuf::from(&entry.file_name), e))?;
        entry.pending_events = BytesMut::new();
        entry.pending_event_count = 0;
        Ok(())
    }

    /// Flushes the rendered `metadata` file and syncs every open stream file. Idempotent.
    pub fn finalize(&mut self) -> Result<(), SinkError> {
        if !self.streams.is_empty() {
            let text = crate::metadata::render(&self.out_trace);
            let path = self.output_dir.join("metadata");
            fs::write(&path, text).map_err(|e| SinkError::Write(path, e))?;
        }
        for entry in self.streams.values_mut() {
            let _ = entry.file.flush();
        }
        Ok(())
    }
}

fn io_err(e: crate::codec::CodecError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
}
