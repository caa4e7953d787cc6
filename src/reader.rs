//! Timestamp ordered merge of several stream inputs.

use crate::attrs::{AttrValue, TraceAttrKey};
use crate::error::Error;
use crate::event::EventDefinition;
use crate::metadata::{EnvValue, TraceMetadata};
use crate::stream::StreamInput;
use crate::types::LostEventsPolicy;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Merges the events of its streams into one sequence ordered by timestamp.
///
/// Every stream holds its next event. The reader's current event is the
/// earliest of those, ties going to the stream that was added first, and
/// [`TraceReader::advance`] only ever moves that one stream forward.
#[derive(Debug)]
pub struct TraceReader {
    streams: Vec<StreamInput>,
    // (timestamp of the stream's current event, stream priority)
    queue: BinaryHeap<Reverse<(u64, usize)>>,
    failed_inputs: Vec<(PathBuf, Error)>,
}

impl TraceReader {
    /// Merge already opened streams, stream priority follows their order.
    pub fn new(streams: Vec<StreamInput>) -> Result<Self, Error> {
        if streams.is_empty() {
            return Err(Error::NoStreams);
        }
        let mut reader = Self {
            streams,
            queue: BinaryHeap::new(),
            failed_inputs: Vec::new(),
        };
        for priority in 0..reader.streams.len() {
            let first = reader.streams[priority].advance().map(|e| e.map(|e| e.timestamp()));
            reader.requeue(priority, first);
        }
        Ok(reader)
    }

    pub fn open<I, P>(metadata: Arc<TraceMetadata>, paths: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::open_with_policy(metadata, paths, LostEventsPolicy::default())
    }

    /// Open every stream file of a trace.
    ///
    /// Files that cannot be opened are skipped with a warning and reported by
    /// [`TraceReader::failed_inputs`].
    pub fn open_with_policy<I, P>(
        metadata: Arc<TraceMetadata>,
        paths: I,
        policy: LostEventsPolicy,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut streams = Vec::new();
        let mut failed_inputs = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match StreamInput::open_with_policy(path, metadata.clone(), policy) {
                Ok(s) => streams.push(s),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping stream file");
                    failed_inputs.push((path.to_path_buf(), e));
                }
            }
        }
        let mut reader = Self::new(streams)?;
        reader.failed_inputs = failed_inputs;
        Ok(reader)
    }

    pub fn streams(&self) -> &[StreamInput] {
        &self.streams
    }

    /// Stream files that could not be opened, with the reason.
    pub fn failed_inputs(&self) -> &[(PathBuf, Error)] {
        &self.failed_inputs
    }

    pub fn has_more_events(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn current_stream(&self) -> Option<&StreamInput> {
        self.queue
            .peek()
            .and_then(|Reverse((_, p))| self.streams.get(*p))
    }

    pub fn current_event_def(&self) -> Option<&EventDefinition> {
        self.current_stream().and_then(StreamInput::current_event)
    }

    /// Move past the current event, returning whether another one is available.
    ///
    /// When a stream fails to decode its next event the rest of that packet is
    /// dropped, the stream resumes at its following packet and the error is
    /// returned. A stream failing again right away is removed from the merge.
    pub fn advance(&mut self) -> Result<bool, Error> {
        let priority = match self.queue.pop() {
            Some(Reverse((_, p))) => p,
            None => return Ok(false),
        };
        match self.streams[priority].advance() {
            Ok(Some(e)) => {
                let ts = e.timestamp();
                self.queue.push(Reverse((ts, priority)));
                Ok(true)
            }
            Ok(None) => Ok(self.has_more_events()),
            Err(e) => {
                warn!(
                    path = %self.streams[priority].path().display(),
                    error = %e,
                    "Skipping the rest of a packet"
                );
                let next = self.streams[priority].advance().map(|e| e.map(|e| e.timestamp()));
                self.requeue(priority, next);
                Err(e)
            }
        }
    }

    /// Position every stream on its first event at or after `timestamp`.
    pub fn seek(&mut self, timestamp: u64) -> bool {
        self.queue.clear();
        for priority in 0..self.streams.len() {
            let first = self.streams[priority]
                .seek(timestamp)
                .map(|e| e.map(|e| e.timestamp()));
            self.requeue(priority, first);
        }
        self.has_more_events()
    }

    pub fn timestamp_begin(&self) -> Option<u64> {
        self.streams
            .iter()
            .filter_map(|s| s.packet_index().timestamp_begin())
            .min()
    }

    pub fn timestamp_end(&self) -> Option<u64> {
        self.streams
            .iter()
            .filter_map(|s| s.packet_index().timestamp_end())
            .max()
    }

    pub fn metadata(&self) -> Option<&Arc<TraceMetadata>> {
        self.streams.first().map(StreamInput::metadata)
    }

    pub fn properties(&self) -> Vec<(TraceAttrKey, AttrValue)> {
        let mut props = Vec::new();
        if let Some(m) = self.metadata() {
            if let Some(uuid) = m.uuid() {
                props.push((TraceAttrKey::Uuid, uuid.to_string().into()));
            }
            props.push((TraceAttrKey::ByteOrder, m.byte_order().to_string().into()));
            for (k, v) in m.env() {
                let v = match v {
                    EnvValue::Integer(i) => AttrValue::from(*i),
                    EnvValue::String(s) => s.as_str().into(),
                };
                props.push((TraceAttrKey::Env(k.clone()), v));
            }
        }
        props.push((
            TraceAttrKey::StreamCount,
            (self.streams.len() as u64).into(),
        ));
        props
    }

    fn requeue(&mut self, priority: usize, next: Result<Option<u64>, Error>) {
        match next {
            Ok(Some(ts)) => self.queue.push(Reverse((ts, priority))),
            Ok(None) => (),
            Err(e) => warn!(
                path = %self.streams[priority].path().display(),
                error = %e,
                "Removing stream from the merge"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ByteOrder;

    #[test]
    fn requires_a_stream() {
        assert!(matches!(TraceReader::new(Vec::new()), Err(Error::NoStreams)));
    }

    #[test]
    fn unreadable_inputs_are_not_streams() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty_0");
        std::fs::File::create(&empty).unwrap();
        let missing = dir.path().join("missing_0");

        let metadata = Arc::new(TraceMetadata::new(ByteOrder::LittleEndian));
        let res = TraceReader::open(metadata, [empty, missing]);
        assert!(matches!(res, Err(Error::NoStreams)));
    }
}
