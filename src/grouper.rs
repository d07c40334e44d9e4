//! Partitions a trace's stream files into [`StreamFileGroup`]s keyed by `(stream_class,
//! stream_instance_id)`, each ordered by ascending `begin_ns` (§4.3).

use crate::error::GrouperError;
use crate::identity::{Identity, ObjectId};
use crate::inspector::inspect;
use crate::schema::{PreEpochPolicy, StreamClass, Trace};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One file in a group, with the classification [`crate::inspector::inspect`] produced for it.
#[derive(Clone, Debug)]
pub struct StreamFileInfo {
    pub path: PathBuf,
    pub begin_ns: Option<u64>,
}

/// All the files that make up one logical stream instance, in playback order.
#[derive(Clone, Debug)]
pub struct StreamFileGroup {
    pub stream_class: Arc<StreamClass>,
    pub stream_instance_id: Option<u64>,
    pub files: Vec<StreamFileInfo>,
}

struct GroupKey {
    stream_class: ObjectId,
    stream_instance_id: Option<u64>,
}

pub fn group(
    trace: &Arc<Trace>,
    paths: &[PathBuf],
    policy: PreEpochPolicy,
) -> Result<Vec<StreamFileGroup>, GrouperError> {
    let mut groups: Vec<(GroupKey, StreamFileGroup)> = Vec::new();

    for path in paths {
        if is_excluded(path) {
            continue;
        }
        let inspection = inspect(path, trace, policy)?;
        // No ordering key means no sharing: every such file gets its own singleton group.
        let instance_id = if inspection.begin_ns.is_none() {
            None
        } else {
            inspection.stream_instance_id
        };

        let info = StreamFileInfo {
            path: path.clone(),
            begin_ns: inspection.begin_ns,
        };

        let existing = instance_id.and_then(|_| {
            groups.iter_mut().find(|(key, _)| {
                key.stream_class == inspection.stream_class.identity()
                    && key.stream_instance_id == instance_id
            })
        });

        match existing {
            Some((_, existing_group)) => insert_ordered(existing_group, info),
            None => groups.push((
                GroupKey {
                    stream_class: inspection.stream_class.identity(),
                    stream_instance_id: instance_id,
                },
                StreamFileGroup {
                    stream_class: inspection.stream_class,
                    stream_instance_id: instance_id,
                    files: vec![info],
                },
            )),
        }
    }

    Ok(groups.into_iter().map(|(_, g)| g).collect())
}

fn is_excluded(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name == "metadata" || name.starts_with('.')
}

/// Inserts `info` keeping `group.files` sorted by ascending `begin_ns`; ties keep the order
/// files were encountered in.
fn insert_ordered(group: &mut StreamFileGroup, info: StreamFileInfo) {
    let pos = group
        .files
        .iter()
        .position(|existing| existing.begin_ns > info.begin_ns)
        .unwrap_or(group.files.len());
    group.files.insert(pos, info);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;
    use crate::schema::{FieldValue, FieldValues, Stream as SchemaStream};
    use crate::writer::BinaryPacketWriter;

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

    fn write_packet(
        dir: &Path,
        trace: &Arc<Trace>,
        sc: &Arc<StreamClass>,
        instance: u64,
        begin_ns: u64,
        file_name: &str,
    ) -> PathBuf {
        let stream = SchemaStream::new(sc.clone(), Some(instance));
        let mut writer = BinaryPacketWriter::create(dir.to_path_buf(), trace.clone()).unwrap();
        let mut context = FieldValues::new();
        context.insert("timestamp_begin".into(), FieldValue::UInt(begin_ns));
        writer.begin_packet(&stream, context).unwrap();
        writer.flush_packet(&stream).unwrap();
        writer.finalize().unwrap();
        let default_name = dir.join(format!("stream_{}_{}", sc.id, instance));
        let renamed = dir.join(file_name);
        if default_name != renamed {
            std::fs::rename(&default_name, &renamed).unwrap();
        }
        renamed
    }

    #[test]
    fn groups_by_instance_and_orders_by_begin_ns() {
        let trace = metadata::parse(SAMPLE).unwrap();
        let sc = trace.stream_class_by_id(0).unwrap();
        let tmp = tempfile::tempdir().unwrap();

        let second = write_packet(tmp.path(), &trace, &sc, 1, 200, "b");
        let first = write_packet(tmp.path(), &trace, &sc, 1, 100, "a");

        let groups = group(&trace, &[second, first], PreEpochPolicy::Drop).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].stream_instance_id, Some(1));
        assert_eq!(groups[0].files[0].begin_ns, Some(100));
        assert_eq!(groups[0].files[1].begin_ns, Some(200));
    }
}
