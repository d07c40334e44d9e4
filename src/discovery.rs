//! Finds CTF trace directories under a root path (§4.1). A directory is a trace directory
//! iff it directly contains a regular file named `metadata`; the walk does not descend
//! further once one is found.

use crate::error::DiscoveryError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One discovered trace directory, paired with a display name derived relative to the
/// longest common prefix of every discovered path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscoveredTrace {
    pub path: PathBuf,
    pub display_name: String,
}

pub fn discover(root_path: &Path) -> Result<Vec<DiscoveredTrace>, DiscoveryError> {
    let root = root_path
        .canonicalize()
        .map_err(|_| DiscoveryError::RootNotFound(root_path.to_path_buf()))?;

    if root.parent().is_none() {
        return Err(DiscoveryError::RootIsFilesystemRoot);
    }

    let mut trace_dirs = Vec::new();
    let mut walker = WalkDir::new(&root).into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable path during discovery");
                continue;
            }
        };
        if entry.file_type().is_dir() && is_trace_dir(entry.path()) {
            trace_dirs.push(entry.path().to_path_buf());
            // A trace directory's own contents (including any nested `metadata` files) are
            // never themselves discovered; don't descend past it.
            walker.skip_current_dir();
        }
    }

    if trace_dirs.is_empty() {
        return Err(DiscoveryError::EmptyResult(root));
    }

    trace_dirs.sort();
    let prefix = common_prefix_at_boundary(&trace_dirs);
    let traces = trace_dirs
        .into_iter()
        .map(|path| {
            let display_name = path
                .strip_prefix(&prefix)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            DiscoveredTrace { path, display_name }
        })
        .collect();
    Ok(traces)
}

fn is_trace_dir(path: &Path) -> bool {
    path.join("metadata").is_file()
}

/// The longest common prefix across `paths` that ends on a path-component boundary.
fn common_prefix_at_boundary(paths: &[PathBuf]) -> PathBuf {
    let mut components: Vec<Vec<std::ffi::OsString>> = paths
        .iter()
        .map(|p| p.components().map(|c| c.as_os_str().to_os_string()).collect())
        .collect();
    if components.is_empty() {
        return PathBuf::new();
    }
    let shortest_len = components.iter().map(|c| c.len()).min().unwrap_or(0);
    let first = components.remove(0);
    let mut prefix_len = 0;
    for i in 0..shortest_len {
        if components.iter().all(|c| c[i] == first[i]) {
            prefix_len = i + 1;
        } else {
            break;
        }
    }
    first.into_iter().take(prefix_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_nested_trace_dirs_and_stops_descending() {
        let tmp = tempfile::tempdir().unwrap();
        let trace_a = tmp.path().join("host-1").join("trace-a");
        let trace_b = tmp.path().join("host-2").join("trace-b");
        fs::create_dir_all(&trace_a).unwrap();
        fs::create_dir_all(&trace_b).unwrap();
        fs::write(trace_a.join("metadata"), "trace {};").unwrap();
        fs::write(trace_b.join("metadata"), "trace {};").unwrap();
        // A subdirectory under a trace dir must not itself be discovered.
        fs::create_dir_all(trace_a.join("nested")).unwrap();
        fs::write(trace_a.join("nested").join("metadata"), "trace {};").unwrap();

        let found = discover(tmp.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|t| t.display_name == "host-1/trace-a"));
        assert!(found.iter().any(|t| t.display_name == "host-2/trace-b"));
    }

    #[test]
    fn empty_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover(tmp.path()),
            Err(DiscoveryError::EmptyResult(_))
        ));
    }

    #[test]
    fn filesystem_root_is_rejected() {
        assert!(matches!(
            discover(Path::new("/")),
            Err(DiscoveryError::RootIsFilesystemRoot)
        ));
    }
}
