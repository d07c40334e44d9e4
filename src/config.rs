//! Configuration surface: the parameter maps a host passes at init, expressed as
//! `serde::Deserialize` structs so they can be embedded in a larger config document, plus the
//! merge-with-CLI-opts convention `modality-ctf-plugins`'s `CtfConfig` used.

use crate::error::Error;
use crate::opts::{SinkOpts, SourceOpts};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Init parameters for the filesystem source (`ctf-fs.fs` in the original plugin naming).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceParams {
    /// Root directory to discover CTF trace directories under.
    pub path: PathBuf,

    /// Add `offset_s` seconds to the offset of all clock classes the source creates.
    #[serde(default)]
    pub offset_s: i64,

    /// Add `offset_ns` nanoseconds to the offset of all clock classes the source creates.
    #[serde(default)]
    pub offset_ns: i64,
}

impl SourceParams {
    pub fn merge_with_opts(opts: SourceOpts) -> Self {
        Self {
            path: opts.path,
            offset_s: opts.offset_s.unwrap_or(0),
            offset_ns: opts.offset_ns.unwrap_or(0),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, Error> {
        load_toml(path)
    }
}

/// Init parameters for the filesystem sink.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SinkParams {
    /// Output directory under which `"<trace_name_base>_<NNN>"` directories are created.
    pub output_base: PathBuf,
}

impl SinkParams {
    pub fn merge_with_opts(opts: SinkOpts) -> Self {
        Self {
            output_base: opts.output_base,
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, Error> {
        load_toml(path)
    }
}

fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read config file '{}': {e}", path.display())))?;
    toml::from_str(&text).map_err(|e| Error::Config(format!("invalid config file '{}': {e}", path.display())))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn source_params_from_toml() {
        let toml = r#"
path = "/traces/host-a"
offset-s = 2
offset-ns = -1
"#;
        let params: SourceParams = toml::from_str(toml).unwrap();
        assert_eq!(
            params,
            SourceParams {
                path: PathBuf::from("/traces/host-a"),
                offset_s: 2,
                offset_ns: -1,
            }
        );
    }

    #[test]
    fn source_params_offsets_default_to_zero() {
        let toml = r#"path = "/traces""#;
        let params: SourceParams = toml::from_str(toml).unwrap();
        assert_eq!(params.offset_s, 0);
        assert_eq!(params.offset_ns, 0);
    }
}
