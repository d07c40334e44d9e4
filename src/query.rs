//! The `metadata-info` query (§4.7): read a trace's `metadata` file back out as text, mirroring
//! whatever on-disk representation (packetized or raw) it was stored in.

use crate::error::MetadataError;
use crate::metadata::read_metadata_file;
use serde::Serialize;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MetadataInfo {
    pub text: String,
    pub is_packetized: bool,
}

pub fn metadata_info(path: &Path) -> Result<MetadataInfo, MetadataError> {
    let (text, is_packetized) = read_metadata_file(path)?;
    Ok(MetadataInfo { text, is_packetized })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::packetize;
    use std::fs;

    #[test]
    fn reads_raw_metadata() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        fs::write(tmp.path(), "/* CTF 1.8 */\n\ntrace { name = \"t\"; };\n").unwrap();
        let info = metadata_info(tmp.path()).unwrap();
        assert!(!info.is_packetized);
        assert!(info.text.starts_with("/* CTF 1.8"));
    }

    #[test]
    fn reads_packetized_metadata() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let packed = packetize("/* CTF 1.8 */\n\ntrace { name = \"t\"; };\n");
        fs::write(tmp.path(), packed).unwrap();
        let info = metadata_info(tmp.path()).unwrap();
        assert!(info.is_packetized);
    }
}
