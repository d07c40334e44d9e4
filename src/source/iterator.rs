use crate::error::SourceError;
use crate::grouper::StreamFileGroup;
use crate::notification::Notification;
use crate::reader::{BinaryStreamFileReader, ReadOutcome, StreamFileReader};
use crate::schema::Stream;
use std::sync::Arc;

pub enum NextOutcome {
    Notification(Notification),
    End,
}

/// The per-port cursor described in §4.5: walks `group.files` in order, handing each one to a
/// fresh [`StreamFileReader`] and crossing file boundaries transparently.
pub struct SourceIterator {
    group: StreamFileGroup,
    stream: Arc<Stream>,
    file_idx: usize,
    reader: Option<Box<dyn StreamFileReader + Send>>,
}

impl SourceIterator {
    pub fn new(group: StreamFileGroup) -> Result<Self, SourceError> {
        let stream = Stream::new(group.stream_class.clone(), group.stream_instance_id);
        let mut iter = Self {
            group,
            stream,
            file_idx: 0,
            reader: None,
        };
        iter.open_current()?;
        Ok(iter)
    }

    fn open_current(&mut self) -> Result<(), SourceError> {
        match self.group.files.get(self.file_idx) {
            Some(info) => {
                let reader = BinaryStreamFileReader::open(&info.path, self.stream.clone())?;
                self.reader = Some(Box::new(reader));
                Ok(())
            }
            None => {
                self.reader = None;
                Ok(())
            }
        }
    }

    pub fn next(&mut self) -> Result<NextOutcome, SourceError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(NextOutcome::End);
        };

        match reader.next()? {
            ReadOutcome::Notification(n) => Ok(NextOutcome::Notification(n)),
            ReadOutcome::End => {
                self.reader = None;
                self.file_idx += 1;
                if self.file_idx >= self.group.files.len() {
                    return Ok(NextOutcome::End);
                }
                self.open_current()?;
                let reader = self.reader.as_mut().expect("just opened");
                match reader.next()? {
                    ReadOutcome::Notification(n) => Ok(NextOutcome::Notification(n)),
                    ReadOutcome::End => Err(SourceError::EmptyFreshFile(
                        self.group.files[self.file_idx].path.clone(),
                    )),
                }
            }
        }
    }

    /// Releases the current reader. Idempotent; safe to call after the iterator has reached
    /// its natural end.
    pub fn finalize(&mut self) {
        self.reader = None;
    }
}
