use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while walking a root path for CTF trace directories.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Root path '{0}' does not exist or is not readable")]
    RootNotFound(PathBuf),

    #[error("Root path resolves to the filesystem root '/', refusing to scan the whole disk")]
    RootIsFilesystemRoot,

    #[error("No CTF trace directories were found under '{0}'")]
    EmptyResult(PathBuf),

    #[error("I/O error while walking '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while parsing or rendering CTF metadata text.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read metadata file '{0}': {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Malformed metadata at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Metadata references unknown clock class '{0}'")]
    UnknownClockClass(String),

    #[error("Failed to de-packetize metadata '{0}': {1}")]
    Depacketize(PathBuf, String),
}

/// Errors raised while inspecting a single stream file's first packet.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("Failed to open stream file '{0}': {1}")]
    Open(PathBuf, #[source] std::io::Error),

    #[error("Stream file '{0}' is empty")]
    EmptyFile(PathBuf),

    #[error("Stream file '{0}' ended before a complete packet header/context could be read")]
    ShortRead(PathBuf),

    #[error(
        "Stream file '{0}' has no stream_id and the trace declares more than one stream class"
    )]
    AmbiguousStreamClass(PathBuf),

    #[error("Stream file '{0}' references unknown stream class id {1}")]
    UnknownStreamClass(PathBuf, u64),
}

/// Errors raised while partitioning stream files into groups.
#[derive(Debug, Error)]
pub enum GrouperError {
    #[error(transparent)]
    Inspect(#[from] InspectError),
}

/// Errors raised while a `SourceIterator` pulls notifications from disk.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open stream file '{0}': {1}")]
    Open(PathBuf, #[source] std::io::Error),

    #[error("I/O error decoding stream file '{0}': {1}")]
    Decode(PathBuf, String),

    #[error(
        "Invariant violation: stream file '{0}' yielded no notifications, \
         a fresh non-empty stream file must begin with PacketBegin"
    )]
    EmptyFreshFile(PathBuf),
}

/// Errors raised by the sink's notification handlers.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Received an Event before any PacketBegin for this stream")]
    EventBeforePacketBegin,

    #[error("Received a PacketEnd without a matching PacketBegin for this stream")]
    PacketEndWithoutBegin,

    #[error("Received a PacketBegin while a packet was already open for this stream")]
    PacketBeginWhilePacketOpen,

    #[error("Failed to create output directory '{0}': {1}")]
    CreateOutputDir(PathBuf, #[source] std::io::Error),

    #[error("Failed to write output file '{0}': {1}")]
    Write(PathBuf, #[source] std::io::Error),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Inspect(#[from] InspectError),

    #[error(transparent)]
    Grouper(#[from] GrouperError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(String),
}
