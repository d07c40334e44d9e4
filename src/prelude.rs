pub use crate::config::{SinkParams, SourceParams};
pub use crate::discovery::{discover, DiscoveredTrace};
pub use crate::error::Error;
pub use crate::grouper::StreamFileGroup;
pub use crate::interrupt::Interruptor;
pub use crate::notification::Notification;
pub use crate::opts::{SinkOpts, SourceOpts};
pub use crate::schema::{Event, Packet, PreEpochPolicy, Stream, Trace};
pub use crate::sink::SinkMirror;
pub use crate::source::{load_traces, SourceIterator, SourceTrace};
