//! The CTF metadata codec.
//!
//! This is *not* a full CTF TSDL grammar implementation. It speaks a deliberately small,
//! line-oriented subset that's sufficient to round-trip everything this crate's schema model
//! (`crate::schema`) cares about: environment entries, clock classes, stream classes, and
//! event classes with flat field layouts. A real deployment would swap this module for a
//! proper TSDL parser/printer without touching anything else in the crate.

use crate::error::MetadataError;
use crate::schema::{ClockClass, ClockRef, EnvValue, EventClass, FieldSpec, FieldType, Layout, StreamClass, Trace};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const CTF_SIGNATURE: &str = "/* CTF 1.8";
const PACKETIZED_MAGIC: u32 = 0x75D1_1D57;

/// Reads a metadata file from disk, de-packetizing it first if necessary.
///
/// Returns the raw text (always prefixed with [`CTF_SIGNATURE`]) and whether the on-disk
/// representation was packetized. Used both by [`parse`] and by the `metadata-info` query (§4.7).
pub fn read_metadata_file(path: &Path) -> Result<(String, bool), MetadataError> {
    let bytes = fs::read(path).map_err(|e| MetadataError::Read(path.to_path_buf(), e))?;
    let (mut text, is_packetized) = if is_packetized(&bytes) {
        (depacketize(&bytes, path)?, true)
    } else {
        (
            String::from_utf8_lossy(&bytes).into_owned(),
            false,
        )
    };
    if !text.starts_with(CTF_SIGNATURE) {
        text = format!("{CTF_SIGNATURE} */\n{text}");
    }
    Ok((text, is_packetized))
}

pub fn is_packetized(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) == PACKETIZED_MAGIC
}

fn depacketize(bytes: &[u8], path: &Path) -> Result<String, MetadataError> {
    if bytes.len() < 8 {
        return Err(MetadataError::Depacketize(
            path.to_path_buf(),
            "packetized metadata shorter than its header".into(),
        ));
    }
    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let content = bytes.get(8..8 + len).ok_or_else(|| {
        MetadataError::Depacketize(
            path.to_path_buf(),
            "declared content length exceeds file size".into(),
        )
    })?;
    Ok(String::from_utf8_lossy(content).into_owned())
}

/// Packetizes `text` using this codec's reference on-disk representation.
pub fn packetize(text: &str) -> Vec<u8> {
    let body = text.as_bytes();
    let mut out = Vec::with_capacity(8 + body.len());
    out.extend_from_slice(&PACKETIZED_MAGIC.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// Parses metadata text (as returned by [`read_metadata_file`]) into a schema tree.
pub fn parse(text: &str) -> Result<Arc<Trace>, MetadataError> {
    let blocks = split_blocks(text)?;

    let mut trace_name = "unnamed".to_string();
    let mut trace_uuid = None;
    let mut env: BTreeMap<String, EnvValue> = BTreeMap::new();
    let mut clock_specs = Vec::new();
    let mut stream_specs = Vec::new();
    let mut event_specs = Vec::new();

    for block in &blocks {
        match block.keyword.as_str() {
            "trace" => {
                for (k, v) in parse_statements(&block.body, block.line)? {
                    match k.as_str() {
                        "name" => trace_name = unquote(&v),
                        "uuid" => {
                            trace_uuid = Some(Uuid::parse_str(&unquote(&v)).map_err(|e| {
                                MetadataError::Malformed {
                                    line: block.line,
                                    message: format!("invalid trace uuid: {e}"),
                                }
                            })?)
                        }
                        _ => {}
                    }
                }
            }
            "env" => {
                for (k, v) in parse_statements(&block.body, block.line)? {
                    env.insert(k, parse_env_value(&v));
                }
            }
            "clock" => clock_specs.push(block.clone()),
            "stream" => stream_specs.push(block.clone()),
            "event" => event_specs.push(block.clone()),
            other => {
                return Err(MetadataError::Malformed {
                    line: block.line,
                    message: format!("unknown top-level block '{other}'"),
                })
            }
        }
    }

    let trace = Trace::from_parts(trace_name, trace_uuid, env);

    let mut clock_names: Vec<String> = Vec::with_capacity(clock_specs.len());
    for block in &clock_specs {
        let mut name = None;
        let mut frequency = 1_000_000_000u64;
        let mut offset_cycles = 0i64;
        let mut uuid = None;
        for (k, v) in parse_statements(&block.body, block.line)? {
            match k.as_str() {
                "name" => name = Some(unquote(&v)),
                "freq" => {
                    frequency = v.trim().parse().map_err(|_| MetadataError::Malformed {
                        line: block.line,
                        message: format!("invalid clock freq '{v}'"),
                    })?
                }
                "offset" => {
                    offset_cycles = v.trim().parse().map_err(|_| MetadataError::Malformed {
                        line: block.line,
                        message: format!("invalid clock offset '{v}'"),
                    })?
                }
                "uuid" => {
                    uuid = Some(Uuid::parse_str(&unquote(&v)).map_err(|e| {
                        MetadataError::Malformed {
                            line: block.line,
                            message: format!("invalid clock uuid: {e}"),
                        }
                    })?)
                }
                _ => {}
            }
        }
        let name = name.ok_or_else(|| MetadataError::Malformed {
            line: block.line,
            message: "clock block missing 'name'".into(),
        })?;
        clock_names.push(name.clone());
        trace.add_clock_class(Arc::new(ClockClass {
            name,
            frequency,
            offset_cycles,
            uuid,
        }));
    }

    for block in &stream_specs {
        let mut id = 0u64;
        let mut packet_context_layout = Layout::new();
        let mut event_header_layout = Layout::new();
        let mut event_common_context_layout = Layout::new();
        for (k, v) in parse_statements(&block.body, block.line)? {
            match k.as_str() {
                "id" => {
                    id = v.trim().parse().map_err(|_| MetadataError::Malformed {
                        line: block.line,
                        message: format!("invalid stream id '{v}'"),
                    })?
                }
                "packet.context" => {
                    packet_context_layout = parse_layout(&v, &clock_names, block.line)?
                }
                "event.header" => {
                    event_header_layout = parse_layout(&v, &clock_names, block.line)?
                }
                "event.context" => {
                    event_common_context_layout = parse_layout(&v, &clock_names, block.line)?
                }
                _ => {}
            }
        }
        let sc = Arc::new(StreamClass {
            id,
            packet_context_layout,
            event_header_layout,
            event_common_context_layout,
            event_classes: Mutex::new(Vec::new()),
            trace: Arc::downgrade(&trace),
        });
        trace.add_stream_class(sc);
    }

    for block in &event_specs {
        let mut stream_id = None;
        let mut id = 0u64;
        let mut name = None;
        let mut specific_context_layout = Layout::new();
        let mut payload_layout = Layout::new();
        for (k, v) in parse_statements(&block.body, block.line)? {
            match k.as_str() {
                "stream_id" => {
                    stream_id = Some(v.trim().parse::<u64>().map_err(|_| {
                        MetadataError::Malformed {
                            line: block.line,
                            message: format!("invalid event stream_id '{v}'"),
                        }
                    })?)
                }
                "id" => {
                    id = v.trim().parse().map_err(|_| MetadataError::Malformed {
                        line: block.line,
                        message: format!("invalid event id '{v}'"),
                    })?
                }
                "name" => name = Some(unquote(&v)),
                "context" => specific_context_layout = parse_layout(&v, &clock_names, block.line)?,
                "fields" => payload_layout = parse_layout(&v, &clock_names, block.line)?,
                _ => {}
            }
        }
        let stream_id = stream_id.ok_or_else(|| MetadataError::Malformed {
            line: block.line,
            message: "event block missing 'stream_id'".into(),
        })?;
        let sc = trace.stream_class_by_id(stream_id).ok_or_else(|| {
            MetadataError::Malformed {
                line: block.line,
                message: format!("event references unknown stream_id {stream_id}"),
            }
        })?;
        let ec = Arc::new(EventClass {
            id,
            name,
            specific_context_layout,
            payload_layout,
            stream_class: Arc::downgrade(&sc),
        });
        sc.push_event_class(ec);
    }

    Ok(trace)
}

/// Renders a schema tree back to metadata text, in the same subset [`parse`] understands.
/// Stream classes and event classes are emitted in id order for deterministic output.
pub fn render(trace: &Trace) -> String {
    let mut out = String::new();
    out.push_str(CTF_SIGNATURE);
    out.push_str(" */\n\n");

    out.push_str("trace {\n");
    out.push_str(&format!("    name = \"{}\";\n", trace.name));
    if let Some(uuid) = trace.uuid {
        out.push_str(&format!("    uuid = \"{uuid}\";\n"));
    }
    out.push_str("};\n\n");

    if !trace.env.is_empty() {
        out.push_str("env {\n");
        for (k, v) in &trace.env {
            match v {
                EnvValue::Integer(i) => out.push_str(&format!("    {k} = {i};\n")),
                EnvValue::String(s) => out.push_str(&format!("    {k} = \"{s}\";\n")),
            }
        }
        out.push_str("};\n\n");
    }

    let clocks = trace.clock_classes.lock().unwrap();
    let clock_names: Vec<String> = clocks.iter().map(|cc| cc.name.clone()).collect();
    for cc in clocks.iter() {
        out.push_str("clock {\n");
        out.push_str(&format!("    name = {};\n", cc.name));
        out.push_str(&format!("    freq = {};\n", cc.frequency));
        out.push_str(&format!("    offset = {};\n", cc.offset_cycles));
        if let Some(uuid) = cc.uuid {
            out.push_str(&format!("    uuid = \"{uuid}\";\n"));
        }
        out.push_str("};\n\n");
    }
    drop(clocks);

    let mut scs = trace.stream_classes.lock().unwrap().clone();
    scs.sort_by_key(|sc| sc.id);
    for sc in &scs {
        out.push_str("stream {\n");
        out.push_str(&format!("    id = {};\n", sc.id));
        out.push_str(&format!(
            "    packet.context = {};\n",
            render_layout(&sc.packet_context_layout, &clock_names)
        ));
        out.push_str(&format!(
            "    event.header = {};\n",
            render_layout(&sc.event_header_layout, &clock_names)
        ));
        out.push_str(&format!(
            "    event.context = {};\n",
            render_layout(&sc.event_common_context_layout, &clock_names)
        ));
        out.push_str("};\n\n");

        let mut ecs = sc.event_classes.lock().unwrap().clone();
        ecs.sort_by_key(|ec| ec.id);
        for ec in &ecs {
            out.push_str("event {\n");
            out.push_str(&format!("    stream_id = {};\n", sc.id));
            out.push_str(&format!("    id = {};\n", ec.id));
            if let Some(name) = &ec.name {
                out.push_str(&format!("    name = \"{name}\";\n"));
            }
            out.push_str(&format!(
                "    context = {};\n",
                render_layout(&ec.specific_context_layout, &clock_names)
            ));
            out.push_str(&format!(
                "    fields = {};\n",
                render_layout(&ec.payload_layout, &clock_names)
            ));
            out.push_str("};\n\n");
        }
    }

    out
}

fn parse_env_value(raw: &str) -> EnvValue {
    let raw = raw.trim();
    if let Some(stripped) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        EnvValue::String(stripped.to_string())
    } else if let Ok(i) = raw.parse::<i64>() {
        EnvValue::Integer(i)
    } else {
        EnvValue::String(raw.to_string())
    }
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
        .to_string()
}

fn render_layout(layout: &Layout, clock_names: &[String]) -> String {
    layout
        .iter()
        .map(|f| match f.ty {
            FieldType::UInt { bits, clock: None } => format!("{}:uint{}", f.name, bits),
            FieldType::UInt {
                bits,
                clock: Some(ClockRef(idx)),
            } => format!("{}:uint{}@{}", f.name, bits, clock_names[idx]),
            FieldType::Int { bits } => format!("{}:int{}", f.name, bits),
            FieldType::Str => format!("{}:string", f.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_layout(raw: &str, clock_names: &[String], line: usize) -> Result<Layout, MetadataError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Layout::new());
    }
    raw.split(',')
        .map(|field| parse_field_spec(field.trim(), clock_names, line))
        .collect()
}

fn parse_field_spec(
    field: &str,
    clock_names: &[String],
    line: usize,
) -> Result<FieldSpec, MetadataError> {
    let (name, ty) = field.split_once(':').ok_or_else(|| MetadataError::Malformed {
        line,
        message: format!("field spec '{field}' missing ':type'"),
    })?;
    let (ty_name, clock_ref) = match ty.split_once('@') {
        Some((ty_name, clock_name)) => {
            let idx = clock_names
                .iter()
                .position(|n| n == clock_name)
                .ok_or_else(|| MetadataError::UnknownClockClass(clock_name.to_string()))?;
            (ty_name, Some(ClockRef(idx)))
        }
        None => (ty, None),
    };
    let ty = match ty_name {
        "uint8" => FieldType::UInt { bits: 8, clock: clock_ref },
        "uint16" => FieldType::UInt { bits: 16, clock: clock_ref },
        "uint32" => FieldType::UInt { bits: 32, clock: clock_ref },
        "uint64" => FieldType::UInt { bits: 64, clock: clock_ref },
        "int8" => FieldType::Int { bits: 8 },
        "int16" => FieldType::Int { bits: 16 },
        "int32" => FieldType::Int { bits: 32 },
        "int64" => FieldType::Int { bits: 64 },
        "string" => FieldType::Str,
        other => {
            return Err(MetadataError::Malformed {
                line,
                message: format!("unknown field type '{other}'"),
            })
        }
    };
    Ok(FieldSpec {
        name: name.trim().to_string(),
        ty,
    })
}

#[derive(Clone)]
struct Block {
    keyword: String,
    body: String,
    line: usize,
}

/// Splits the metadata body (after the leading `/* CTF 1.8 */` comment) into top-level
/// `keyword { ... };` blocks via balanced-brace scanning.
fn split_blocks(text: &str) -> Result<Vec<Block>, MetadataError> {
    let text = text.strip_prefix(CTF_SIGNATURE).map(|rest| {
        rest.splitn(2, "*/").nth(1).unwrap_or(rest)
    }).unwrap_or(text);

    let mut blocks = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut line = 1usize;
    let mut cursor = 0usize;
    while let Some(&(_, c)) = chars.peek() {
        if c == '\n' {
            line += 1;
            chars.next();
            cursor += 1;
            continue;
        }
        if c.is_whitespace() {
            chars.next();
            cursor += 1;
            continue;
        }
        // read keyword up to '{'
        let start = cursor;
        let mut keyword = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if c == '{' {
                break;
            }
            keyword.push(c);
            if c == '\n' {
                line += 1;
            }
            chars.next();
            cursor += 1;
        }
        let keyword = keyword.trim().to_string();
        if keyword.is_empty() {
            return Err(MetadataError::Malformed {
                line,
                message: "expected a block keyword before '{'".into(),
            });
        }
        chars.next(); // consume '{'
        cursor += 1;
        let block_start_line = line;

        let mut depth = 1usize;
        let mut body = String::new();
        while let Some(&(_, c)) = chars.peek() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        chars.next();
                        cursor += 1;
                        break;
                    }
                }
                '\n' => line += 1,
                _ => {}
            }
            body.push(c);
            chars.next();
            cursor += 1;
        }
        if depth != 0 {
            return Err(MetadataError::Malformed {
                line: block_start_line,
                message: format!("unterminated '{keyword}' block"),
            });
        }
        // consume trailing ';' and whitespace
        while let Some(&(_, c)) = chars.peek() {
            if c == ';' {
                chars.next();
                cursor += 1;
                break;
            } else if c.is_whitespace() {
                if c == '\n' {
                    line += 1;
                }
                chars.next();
                cursor += 1;
            } else {
                break;
            }
        }
        let _ = start;
        blocks.push(Block {
            keyword,
            body,
            line: block_start_line,
        });
    }
    Ok(blocks)
}

fn parse_statements(body: &str, block_line: usize) -> Result<Vec<(String, String)>, MetadataError> {
    let mut out = Vec::new();
    for (idx, stmt) in body.split(';').enumerate() {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        let (k, v) = stmt.split_once('=').ok_or_else(|| MetadataError::Malformed {
            line: block_line + idx,
            message: format!("statement '{stmt}' missing '='"),
        })?;
        out.push((k.trim().to_string(), v.trim().to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"/* CTF 1.8 */

trace {
    name = "my-trace";
    uuid = "4f6a9b3a-9b0f-4a0e-9f0a-000000000001";
};

env {
    hostname = "dev-box";
    version = 2;
};

clock {
    name = monotonic;
    freq = 1000000000;
    offset = 0;
    uuid = "4f6a9b3a-9b0f-4a0e-9f0a-000000000002";
};

stream {
    id = 0;
    packet.context = ts_begin:uint64@monotonic, ts_end:uint64@monotonic;
    event.header = id:uint32, timestamp:uint64@monotonic;
    event.context = cpu_id:uint32;
};

event {
    stream_id = 0;
    id = 0;
    name = "sched_switch";
    context = prio:int32;
    fields = comm:string, pid:uint32;
};
"#;

    #[test]
    fn parses_full_sample() {
        let trace = parse(SAMPLE).unwrap();
        assert_eq!(trace.name, "my-trace");
        assert!(trace.uuid.is_some());
        assert_eq!(trace.env.len(), 2);
        assert_eq!(trace.clock_classes.lock().unwrap().len(), 1);
        let scs = trace.stream_classes.lock().unwrap();
        assert_eq!(scs.len(), 1);
        let sc = &scs[0];
        assert_eq!(sc.packet_context_layout.len(), 2);
        assert_eq!(sc.event_header_layout.len(), 2);
        let ecs = sc.event_classes.lock().unwrap();
        assert_eq!(ecs.len(), 1);
        assert_eq!(ecs[0].name.as_deref(), Some("sched_switch"));
        assert_eq!(ecs[0].payload_layout.len(), 2);
    }

    #[test]
    fn render_then_parse_round_trips() {
        let trace = parse(SAMPLE).unwrap();
        let rendered = render(&trace);
        assert!(rendered.starts_with(CTF_SIGNATURE));
        assert!(rendered.contains("@monotonic"), "rendered:\n{rendered}");
        let reparsed = parse(&rendered).unwrap();
        assert_eq!(reparsed.name, trace.name);
        assert_eq!(
            reparsed.stream_classes.lock().unwrap().len(),
            trace.stream_classes.lock().unwrap().len()
        );
        let sc = &reparsed.stream_classes.lock().unwrap()[0];
        assert_eq!(sc.packet_context_layout.len(), 2);
        assert!(matches!(
            sc.packet_context_layout[0].ty,
            FieldType::UInt { clock: Some(ClockRef(0)), .. }
        ));
    }

    #[test]
    fn packetize_round_trips() {
        let packed = packetize(SAMPLE);
        assert!(is_packetized(&packed));
        let (text, was_packetized) = {
            let tmp = tempfile::NamedTempFile::new().unwrap();
            std::fs::write(tmp.path(), &packed).unwrap();
            read_metadata_file(tmp.path()).unwrap()
        };
        assert!(was_packetized);
        assert!(text.starts_with(CTF_SIGNATURE));
    }

    #[test]
    fn missing_ctf_signature_is_prepended() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "trace {\n    name = \"x\";\n};\n").unwrap();
        let (text, is_packetized) = read_metadata_file(tmp.path()).unwrap();
        assert!(!is_packetized);
        assert!(text.starts_with(CTF_SIGNATURE));
    }
}
