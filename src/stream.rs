//! Sequential decoding of the events of one stream file.

use crate::attrs::{AttrValue, StreamAttrKey};
use crate::cursor::BitCursor;
use crate::definition::{Definition, IntegerDefinition, StructDefinition};
use crate::error::Error;
use crate::event::{EventDefinition, LostEventFactory};
use crate::metadata::{StreamDeclaration, TraceMetadata};
use crate::packet::{decode_preamble, read_region, PacketIndex, PacketIndexEntry};
use crate::scope::{self, DynamicScope, ScopeCheckpoint, ScopeTree};
use crate::types::LostEventsPolicy;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// The packet events are currently decoded from.
#[derive(Debug)]
struct PacketState {
    index: usize,
    bytes: Vec<u8>,
    position_bits: u64,
    checkpoint: ScopeCheckpoint,
    last_timestamp: u64,
    context: Option<Arc<Definition>>,
}

#[derive(Debug)]
pub struct StreamInput {
    path: PathBuf,
    file: File,
    metadata: Arc<TraceMetadata>,
    stream: Arc<StreamDeclaration>,
    index: PacketIndex,
    scopes: ScopeTree,
    base: ScopeCheckpoint,
    lost_events: LostEventFactory,
    packet: Option<PacketState>,
    next_packet: usize,
    current: Option<EventDefinition>,
}

impl StreamInput {
    pub fn open<P: AsRef<Path>>(path: P, metadata: Arc<TraceMetadata>) -> Result<Self, Error> {
        Self::open_with_policy(path, metadata, LostEventsPolicy::default())
    }

    /// Open a stream file and index its packets.
    ///
    /// Fails when the file cannot be read, has no packets, or its first
    /// packet does not decode.
    pub fn open_with_policy<P: AsRef<Path>>(
        path: P,
        metadata: Arc<TraceMetadata>,
        policy: LostEventsPolicy,
    ) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_size = file.metadata()?.len();
        if file_size == 0 {
            return Err(Error::EmptyStream(path));
        }

        let (index, stream) = PacketIndex::build(&mut file, file_size, &metadata, policy)?;
        let stream = match stream {
            Some(s) if !index.is_empty() => s,
            _ => return Err(Error::EmptyStream(path)),
        };

        let mut scopes = ScopeTree::new();
        metadata.bind_env(&mut scopes)?;
        let base = scopes.checkpoint();
        let lost_events = LostEventFactory::new(metadata.byte_order())?;

        debug!(
            path = %path.display(),
            stream_id = stream.id(),
            packets = index.len(),
            "Opened stream"
        );

        Ok(Self {
            path,
            file,
            metadata,
            stream,
            index,
            scopes,
            base,
            lost_events,
            packet: None,
            next_packet: 0,
            current: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stream_id(&self) -> u64 {
        self.stream.id()
    }

    pub fn stream_declaration(&self) -> &Arc<StreamDeclaration> {
        &self.stream
    }

    pub fn metadata(&self) -> &Arc<TraceMetadata> {
        &self.metadata
    }

    pub fn packet_index(&self) -> &PacketIndex {
        &self.index
    }

    /// The event returned by the last call to [`StreamInput::advance`].
    pub fn current_event(&self) -> Option<&EventDefinition> {
        self.current.as_ref()
    }

    /// Index entry of the packet currently being decoded.
    pub fn current_packet(&self) -> Option<&PacketIndexEntry> {
        self.packet.as_ref().and_then(|p| self.index.get(p.index))
    }

    /// Decode the next event, `None` once every packet has been read.
    ///
    /// A packet starting with newly lost events first yields a lost-event
    /// record. After a decode error the rest of the packet is skipped and the
    /// next call continues with the following packet.
    pub fn advance(&mut self) -> Result<Option<&EventDefinition>, Error> {
        self.current = None;
        loop {
            if self.packet.is_none() {
                if self.next_packet >= self.index.len() {
                    return Ok(None);
                }
                let i = self.next_packet;
                self.next_packet += 1;
                self.load_packet(i)?;
                if let Some(record) = self.lost_event_record(i) {
                    self.current = Some(record);
                    return Ok(self.current.as_ref());
                }
            }

            match self.read_event() {
                Ok(Some(event)) => {
                    self.current = Some(event);
                    return Ok(self.current.as_ref());
                }
                Ok(None) => self.packet = None,
                Err(e) => {
                    self.packet = None;
                    return Err(e);
                }
            }
        }
    }

    /// Position the stream on its first event at or after `timestamp`.
    pub fn seek(&mut self, timestamp: u64) -> Result<Option<&EventDefinition>, Error> {
        self.packet = None;
        self.current = None;
        self.next_packet = self
            .index
            .search(timestamp)
            .unwrap_or_else(|| self.index.len());
        loop {
            let before = matches!(self.advance()?, Some(e) if e.timestamp() < timestamp);
            if !before {
                break;
            }
        }
        Ok(self.current.as_ref())
    }

    /// Resolve a field path against the scopes of the current event.
    pub fn resolve(&self, path: &str) -> Result<Arc<Definition>, Error> {
        scope::resolve(
            &self.scopes,
            self.scopes.root(DynamicScope::EventFields),
            path,
        )
    }

    pub fn properties(&self) -> Vec<(StreamAttrKey, AttrValue)> {
        let mut props = Vec::new();
        if let Some(name) = self.path.file_name() {
            props.push((StreamAttrKey::Name, name.to_string_lossy().into_owned().into()));
        }
        props.push((
            StreamAttrKey::Path,
            self.path.display().to_string().into(),
        ));
        props.push((StreamAttrKey::Id, self.stream.id().into()));
        props.push((StreamAttrKey::PacketCount, (self.index.len() as u64).into()));
        if let Some(ts) = self.index.timestamp_begin() {
            props.push((StreamAttrKey::TimestampBegin, ts.into()));
        }
        if let Some(ts) = self.index.timestamp_end() {
            props.push((StreamAttrKey::TimestampEnd, ts.into()));
        }
        props.push((StreamAttrKey::LostEvents, self.index.lost_events().into()));
        if let Some(target) = self.index.get(0).map(|e| e.target()) {
            if let Some(name) = target.name() {
                props.push((StreamAttrKey::TargetName, name.into()));
            }
            if target.is_known() {
                props.push((StreamAttrKey::TargetId, target.id().into()));
            }
        }
        props
    }

    fn load_packet(&mut self, i: usize) -> Result<(), Error> {
        let Some(entry) = self.index.get(i) else {
            return Ok(());
        };
        let offset_bytes = entry.offset_bytes();
        let len = (entry.packet_size_bits() + 7) / 8;
        let content_size_bits = entry.content_size_bits();
        let timestamp_begin = entry.timestamp_begin();

        let bytes = read_region(&mut self.file, offset_bytes, len)?;
        self.scopes.rewind(self.base);
        let mut cursor = BitCursor::new(&bytes).with_limit(content_size_bits);
        let preamble = decode_preamble(&self.metadata, &mut self.scopes, &mut cursor, offset_bytes)?;
        if preamble.stream.id() != self.stream.id() {
            return Err(Error::StreamIdMismatch {
                offset_bytes,
                found: preamble.stream.id(),
                expected: self.stream.id(),
            });
        }
        let position_bits = cursor.position();

        self.packet = Some(PacketState {
            index: i,
            bytes,
            position_bits,
            checkpoint: self.scopes.checkpoint(),
            last_timestamp: timestamp_begin,
            context: preamble.context,
        });
        Ok(())
    }

    fn lost_event_record(&self, i: usize) -> Option<EventDefinition> {
        let entry = self.index.get(i)?;
        if entry.lost_events() == 0 {
            return None;
        }
        let previous_end = i
            .checked_sub(1)
            .and_then(|p| self.index.get(p))
            .map(|p| p.timestamp_end())
            .filter(|end| *end != u64::MAX)
            .unwrap_or_else(|| entry.timestamp_begin());
        Some(self.lost_events.record(
            self.scopes.root(DynamicScope::EventFields),
            self.stream.id(),
            i,
            entry.target().clone(),
            entry.timestamp_begin(),
            entry.lost_events(),
            entry.timestamp_begin().saturating_sub(previous_end),
            self.packet.as_ref().and_then(|p| p.context.clone()),
        ))
    }

    fn read_event(&mut self) -> Result<Option<EventDefinition>, Error> {
        let packet = match self.packet.as_mut() {
            Some(p) => p,
            None => return Ok(None),
        };
        let entry = match self.index.get(packet.index) {
            Some(e) => e,
            None => return Ok(None),
        };
        let mut cursor = BitCursor::new(&packet.bytes).with_limit(entry.content_size_bits());
        cursor.seek(packet.position_bits)?;
        if cursor.remaining() == 0 {
            return Ok(None);
        }
        let start_bits = cursor.position();
        let scopes = &mut self.scopes;
        scopes.rewind(packet.checkpoint);

        let header = self
            .stream
            .event_header()
            .map(|d| d.decode_root(scopes, DynamicScope::StreamEventHeader, &mut cursor))
            .transpose()?;
        let (id, timestamp) = header
            .as_deref()
            .and_then(Definition::as_struct)
            .map(header_id_and_timestamp)
            .unwrap_or((None, None));

        let declaration = match id {
            Some(id) => self.stream.event(id).ok_or(Error::UnknownEventId(id))?,
            None => self.stream.single_event().ok_or(Error::UnknownEventId(0))?,
        }
        .clone();

        if let Some(ts) = timestamp {
            packet.last_timestamp =
                reconstruct_timestamp(packet.last_timestamp, ts.raw(), ts.declaration().size());
        }

        let stream_context = self
            .stream
            .event_context()
            .map(|d| d.decode_root(scopes, DynamicScope::StreamEventContext, &mut cursor))
            .transpose()?;
        let context = declaration
            .context()
            .map(|d| d.decode_root(scopes, DynamicScope::EventContext, &mut cursor))
            .transpose()?;
        let fields = declaration
            .fields()
            .map(|d| d.decode_root(scopes, DynamicScope::EventFields, &mut cursor))
            .transpose()?;

        if cursor.position() == start_bits {
            return Err(Error::malformed(format!(
                "event '{}' of stream {} occupies no bits",
                declaration.name(),
                self.stream.id()
            )));
        }
        packet.position_bits = cursor.position();

        Ok(Some(EventDefinition {
            name: declaration.name().to_owned(),
            declaration: Some(declaration),
            stream_id: self.stream.id(),
            timestamp: packet.last_timestamp,
            packet_index: packet.index,
            target: entry.target().clone(),
            header,
            stream_context,
            context,
            fields,
            packet_context: packet.context.clone(),
            lost_events: None,
        }))
    }
}

/// Event ID and timestamp fields of an event header. Fields of the structure
/// selected by a variant named `v` take precedence over top level ones.
fn header_id_and_timestamp(header: &StructDefinition) -> (Option<u64>, Option<IntegerDefinition>) {
    let mut id = header.field("id").and_then(|d| d.unsigned_value());
    let mut timestamp = header.lookup_integer("timestamp").cloned();
    if let Some(extended) = header
        .lookup_variant("v")
        .and_then(|v| v.current_field().as_struct())
    {
        if let Some(v) = extended.field("id").and_then(|d| d.unsigned_value()) {
            id = Some(v);
        }
        if let Some(ts) = extended.lookup_integer("timestamp") {
            timestamp = Some(ts.clone());
        }
    }
    (id, timestamp)
}

/// Rebuild a full timestamp from the `bits` low order bits carried by an event
/// header, given the previous full timestamp of the stream.
pub(crate) fn reconstruct_timestamp(last: u64, value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        return value;
    }
    let modulus = 1_u64 << bits;
    let mask = modulus - 1;
    let ts = (last & !mask) | (value & mask);
    if ts < last {
        ts.wrapping_add(modulus)
    } else {
        ts
    }
}
