//! Minimal reference threading glue standing in for the out-of-scope pipeline runtime (§5).
//! `run_copy` spawns one thread per discovered port, each pulling from its `SourceIterator`
//! and forwarding notifications to a single consumer thread that drives the `SinkMirror`.

use crate::error::Error;
use crate::interrupt::Interruptor;
use crate::notification::Notification;
use crate::sink::SinkMirror;
use crate::source::iterator::NextOutcome;
use crate::source::SourceIterator;
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread;

const CHANNEL_CAPACITY: usize = 64;

/// Drains every `SourceIterator` into `sink`, honoring `interruptor` between `next()` calls.
/// Per-port errors are logged and end that port's thread early; the first such error is
/// returned once all ports and the sink have finished.
pub fn run_copy(
    iterators: Vec<SourceIterator>,
    sink: Arc<SinkMirror>,
    interruptor: Interruptor,
) -> Result<(), Error> {
    let (tx, rx) = sync_channel::<Notification>(CHANNEL_CAPACITY);

    let producers: Vec<_> = iterators
        .into_iter()
        .enumerate()
        .map(|(port_idx, mut iter)| {
            let tx = tx.clone();
            let interruptor = interruptor.clone();
            thread::spawn(move || -> Result<(), Error> {
                loop {
                    if interruptor.is_set() {
                        break;
                    }
                    match iter.next()? {
                        NextOutcome::Notification(n) => {
                            if tx.send(n).is_err() {
                                break;
                            }
                        }
                        NextOutcome::End => break,
                    }
                }
                iter.finalize();
                tracing::debug!(port = port_idx, "source port finished");
                Ok(())
            })
        })
        .collect();
    drop(tx);

    let consumer = thread::spawn(move || -> Result<(), Error> {
        while let Ok(notification) = rx.recv() {
            match &notification {
                Notification::PacketBegin(p) => sink.on_packet_begin(p)?,
                Notification::Event(e) => sink.on_event(e)?,
                Notification::PacketEnd(p) => sink.on_packet_end(p)?,
            }
        }
        sink.finalize()?;
        Ok(())
    });

    let mut first_err = None;
    for producer in producers {
        match producer.join().expect("source thread panicked") {
            Ok(()) => {}
            Err(e) if first_err.is_none() => first_err = Some(e),
            Err(_) => {}
        }
    }
    match consumer.join().expect("sink thread panicked") {
        Ok(()) => {}
        Err(e) if first_err.is_none() => first_err = Some(e),
        Err(_) => {}
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
