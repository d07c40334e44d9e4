use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct SourceOpts {
    /// Use configuration from file
    #[clap(long = "config", name = "config file", env = "CTF_FS_CONFIG", help_heading = "SOURCE CONFIGURATION")]
    pub config_file: Option<PathBuf>,

    /// Add offset-s seconds to the offset of all the clock classes that the source creates
    #[clap(long, name = "offset-s", help_heading = "SOURCE CONFIGURATION")]
    pub offset_s: Option<i64>,

    /// Add offset-ns nanoseconds to the offset of all the clock classes that the source creates
    #[clap(long, name = "offset-ns", help_heading = "SOURCE CONFIGURATION")]
    pub offset_ns: Option<i64>,

    /// Root path to search for CTF trace directories
    #[clap(name = "path", help_heading = "SOURCE CONFIGURATION")]
    pub path: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct SinkOpts {
    /// Use configuration from file
    #[clap(long = "config", name = "config file", env = "CTF_FS_CONFIG", help_heading = "SINK CONFIGURATION")]
    pub config_file: Option<PathBuf>,

    /// Output directory to write mirrored trace directories into
    #[clap(name = "output", help_heading = "SINK CONFIGURATION")]
    pub output_base: PathBuf,
}
