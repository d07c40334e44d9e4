//! Builds a trace's in-memory schema and assigns one output port per stream file group
//! (§4.4), then drives each port via [`iterator::SourceIterator`].

pub mod iterator;

pub use iterator::SourceIterator;

use crate::discovery::DiscoveredTrace;
use crate::error::Error;
use crate::grouper::{self, StreamFileGroup};
use crate::metadata;
use crate::schema::{ClockClassPriorityMap, PreEpochPolicy, Trace};
use std::fs;
use std::sync::Arc;

/// One discovered trace, fully loaded: its schema tree, clock priority map, and the ports
/// (stream file groups) a runtime should create for it.
pub struct SourceTrace {
    pub display_name: String,
    pub trace: Arc<Trace>,
    pub clock_priorities: ClockClassPriorityMap,
    pub ports: Vec<StreamFileGroup>,
}

/// Loads every discovered trace under `root`, building its schema and stream file groups.
/// A trace that fails to load (bad metadata, ungroupable files) is skipped with a logged
/// error rather than aborting the whole discovery pass (§7's schema-error policy).
/// `offset_s`/`offset_ns` are added to every clock class the source creates (§6's parameter map).
pub fn load_traces(
    discovered: Vec<DiscoveredTrace>,
    policy: PreEpochPolicy,
    offset_s: i64,
    offset_ns: i64,
) -> Vec<SourceTrace> {
    let mut traces = Vec::new();
    for d in discovered {
        match load_one_trace(&d, policy, offset_s, offset_ns) {
            Ok(t) => traces.push(t),
            Err(e) => {
                tracing::error!(trace = %d.display_name, error = %e, "skipping trace");
            }
        }
    }
    traces
}

fn load_one_trace(
    d: &DiscoveredTrace,
    policy: PreEpochPolicy,
    offset_s: i64,
    offset_ns: i64,
) -> Result<SourceTrace, Error> {
    let metadata_path = d.path.join("metadata");
    let (text, _is_packetized) = metadata::read_metadata_file(&metadata_path)?;
    let trace = metadata::parse(&text)?;
    trace.apply_clock_offset(offset_s, offset_ns);

    let clock_priorities = ClockClassPriorityMap::build(&trace);

    let mut file_paths = Vec::new();
    for entry in fs::read_dir(&d.path).map_err(|e| crate::error::DiscoveryError::Io {
        path: d.path.clone(),
        source: e,
    })? {
        let entry = entry.map_err(|e| crate::error::DiscoveryError::Io {
            path: d.path.clone(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.metadata().map(|m| m.len()).unwrap_or(0) == 0 {
            continue;
        }
        file_paths.push(path);
    }

    let ports = grouper::group(&trace, &file_paths, policy)?;

    // Once every stream class has been parsed from metadata and every port assigned, the
    // schema is considered closed; the sink is the only thing still allowed to grow it.
    trace.mark_static();

    Ok(SourceTrace {
        display_name: d.display_name.clone(),
        trace,
        clock_priorities,
        ports,
    })
}
