use crate::schema::{Event, Packet};

/// One message out of a `SourceIterator`, per §3/§6. For a single stream, notifications
/// follow `(PacketBegin, Event*, PacketEnd)+`.
#[derive(Clone, Debug)]
pub enum Notification {
    PacketBegin(Packet),
    Event(Event),
    PacketEnd(Packet),
}

impl Notification {
    pub fn is_packet_begin(&self) -> bool {
        matches!(self, Notification::PacketBegin(_))
    }

    pub fn is_packet_end(&self) -> bool {
        matches!(self, Notification::PacketEnd(_))
    }
}
