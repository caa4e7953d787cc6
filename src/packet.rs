//! Packet descriptors and the per-stream packet index.
//!
//! The index is built once when a stream file is opened by decoding the
//! packet header and packet context of every packet in the file. Each entry
//! records where the packet lives, how much of it holds events, which time
//! range it covers and how many events the tracer dropped while writing it.

use crate::attrs::AttrValue;
use crate::cursor::BitCursor;
use crate::definition::{Definition, StructDefinition};
use crate::error::Error;
use crate::metadata::{StreamDeclaration, TraceMetadata, CTF_MAGIC};
use crate::scope::{DynamicScope, ScopeTree};
use crate::types::LostEventsPolicy;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CONTENT_SIZE: &str = "content_size";
pub const PACKET_SIZE: &str = "packet_size";
pub const TIMESTAMP_BEGIN: &str = "timestamp_begin";
pub const TIMESTAMP_END: &str = "timestamp_end";
pub const EVENTS_DISCARDED: &str = "events_discarded";
pub const DEVICE: &str = "device";
pub const CPU_ID: &str = "cpu_id";

/// Initial number of bytes read when decoding a packet's header and context.
const INDEX_WINDOW_BYTES: u64 = 64 * 1024;

/// The CPU or device a packet was recorded on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    name: Option<String>,
    id: i64,
}

impl Target {
    pub const UNKNOWN_ID: i64 = -1;

    pub fn new(name: Option<String>, id: i64) -> Self {
        Self { name, id }
    }

    pub fn unknown() -> Self {
        Self::new(None, Self::UNKNOWN_ID)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn is_known(&self) -> bool {
        self.name.is_some() || self.id != Self::UNKNOWN_ID
    }

    /// A `device` attribute wins over the legacy `cpu_id` attribute.
    fn from_attributes(attributes: &BTreeMap<String, AttrValue>) -> Self {
        if let Some(device) = attributes.get(DEVICE) {
            match device {
                AttrValue::Integer(v) => Self::new(Some(v.to_string()), *v as i64),
                AttrValue::Enum { label, value } => Self::new(
                    Some(label.clone().unwrap_or_else(|| value.to_string())),
                    *value as i64,
                ),
                AttrValue::String(s) => Self::new(
                    Some(s.clone()),
                    device_number(s).unwrap_or(Self::UNKNOWN_ID),
                ),
                AttrValue::Float(v) => Self::new(Some(v.to_string()), Self::UNKNOWN_ID),
            }
        } else if let Some(cpu_id) = attributes.get(CPU_ID).and_then(AttrValue::as_integer) {
            Self::new(Some(format!("CPU{cpu_id}")), cpu_id as i64)
        } else {
            Self::unknown()
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(n) => f.write_str(n),
            None if self.id != Self::UNKNOWN_ID => write!(f, "{}", self.id),
            None => f.write_str("unknown"),
        }
    }
}

/// The number in a device name made of a non-digit prefix followed only by
/// digits, e.g. `CPU3` or `cpu-12`.
fn device_number(name: &str) -> Option<i64> {
    let digits = name.trim_start_matches(|c: char| !c.is_ascii_digit());
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PacketIndexEntry {
    offset_bits: u64,
    stream_id: u64,
    packet_size_bits: u64,
    content_size_bits: u64,
    payload_start_bits: u64,
    timestamp_begin: u64,
    timestamp_end: u64,
    lost_events: u64,
    events_discarded: Option<u64>,
    target: Target,
    attributes: BTreeMap<String, AttrValue>,
}

impl PacketIndexEntry {
    /// Describe the packet starting at `offset_bytes` from its decoded packet
    /// context.
    ///
    /// `payload_start_bits` is relative to the start of the packet and
    /// `lost_so_far` is the discarded event counter carried over from the
    /// previous packet of the stream.
    pub fn from_context(
        offset_bytes: u64,
        stream_id: u64,
        payload_start_bits: u64,
        context: Option<&StructDefinition>,
        file_size_bytes: u64,
        lost_so_far: u64,
        policy: LostEventsPolicy,
    ) -> Result<Self, Error> {
        let attributes = context.map(attribute_map).unwrap_or_default();
        let unsigned = |name: &str| attributes.get(name).and_then(AttrValue::as_unsigned);
        let remaining_bits = file_size_bytes.saturating_sub(offset_bytes) * 8;

        let content_size_bits = unsigned(CONTENT_SIZE)
            .or_else(|| unsigned(PACKET_SIZE))
            .unwrap_or(remaining_bits);
        let packet_size_bits = match unsigned(PACKET_SIZE) {
            Some(s) => s,
            None if content_size_bits != 0 => content_size_bits,
            None => remaining_bits,
        };
        if payload_start_bits > content_size_bits || content_size_bits > packet_size_bits {
            return Err(Error::InconsistentPacketSize {
                offset_bytes,
                payload_start_bits,
                content_size_bits,
                packet_size_bits,
            });
        }
        if packet_size_bits > remaining_bits {
            return Err(Error::TruncatedPacket {
                offset_bytes,
                declared_bits: packet_size_bits,
                available_bits: remaining_bits,
            });
        }

        let timestamp_begin = unsigned(TIMESTAMP_BEGIN).unwrap_or(0);
        // An all-ones end timestamp, like a missing one, leaves the packet open ended
        let timestamp_end = unsigned(TIMESTAMP_END).unwrap_or(u64::MAX);
        if timestamp_end < timestamp_begin {
            return Err(Error::InvalidTimestampRange {
                offset_bytes,
                timestamp_begin,
                timestamp_end,
            });
        }

        let events_discarded = unsigned(EVENTS_DISCARDED);
        let lost_events = match events_discarded {
            Some(counter) if counter >= lost_so_far => counter - lost_so_far,
            Some(counter) => match policy {
                LostEventsPolicy::Clamp => {
                    warn!(
                        offset_bytes,
                        counter,
                        lost_so_far,
                        "Discarded event counter went backwards, assuming no events were lost"
                    );
                    0
                }
                LostEventsPolicy::Error => {
                    return Err(Error::InconsistentLostEvents {
                        offset_bytes,
                        counter,
                        lost_so_far,
                    })
                }
            },
            None => 0,
        };

        let target = Target::from_attributes(&attributes);

        Ok(Self {
            offset_bits: offset_bytes * 8,
            stream_id,
            packet_size_bits,
            content_size_bits,
            payload_start_bits,
            timestamp_begin,
            timestamp_end,
            lost_events,
            events_discarded,
            target,
            attributes,
        })
    }

    pub fn offset_bits(&self) -> u64 {
        self.offset_bits
    }

    pub fn offset_bytes(&self) -> u64 {
        self.offset_bits / 8
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub fn packet_size_bits(&self) -> u64 {
        self.packet_size_bits
    }

    pub fn content_size_bits(&self) -> u64 {
        self.content_size_bits
    }

    pub fn payload_start_bits(&self) -> u64 {
        self.payload_start_bits
    }

    pub fn timestamp_begin(&self) -> u64 {
        self.timestamp_begin
    }

    /// `u64::MAX` while the end of the packet is unknown.
    pub fn timestamp_end(&self) -> u64 {
        self.timestamp_end
    }

    /// Events dropped by the tracer since the previous packet of the stream.
    pub fn lost_events(&self) -> u64 {
        self.lost_events
    }

    /// Raw cumulative discarded event counter, when the context has one.
    pub fn events_discarded(&self) -> Option<u64> {
        self.events_discarded
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn includes(&self, timestamp: u64) -> bool {
        self.timestamp_begin <= timestamp && timestamp <= self.timestamp_end
    }

    /// Byte offset of the packet following this one.
    pub fn next_offset_bytes(&self) -> u64 {
        self.offset_bytes() + (self.packet_size_bits + 7) / 8
    }

    fn is_open_ended(&self) -> bool {
        self.timestamp_end == u64::MAX
    }
}

/// Scalar fields of a packet context, keyed by field name.
fn attribute_map(context: &StructDefinition) -> BTreeMap<String, AttrValue> {
    context
        .fields()
        .iter()
        .filter_map(|(name, def)| {
            let v = match def.as_ref() {
                Definition::Integer(i) => AttrValue::Integer(i.value()),
                Definition::Float(f) => AttrValue::Float(f.value()),
                Definition::Enum(e) => AttrValue::Enum {
                    label: e.label().map(str::to_owned),
                    value: e.value(),
                },
                Definition::String(s) => AttrValue::String(s.value().to_owned()),
                _ => return None,
            };
            Some((name.clone(), v))
        })
        .collect()
}

/// Packet entries of one stream file, in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PacketIndex {
    entries: Vec<PacketIndexEntry>,
}

impl PacketIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next packet of the stream.
    ///
    /// The previous entry's open end, if any, becomes this packet's begin
    /// timestamp.
    pub fn append(&mut self, entry: PacketIndexEntry) -> Result<(), Error> {
        if let Some(last) = self.entries.last_mut() {
            if entry.timestamp_begin < last.timestamp_begin {
                return Err(Error::PacketOrder {
                    offset_bytes: entry.offset_bytes(),
                    timestamp_begin: entry.timestamp_begin,
                    previous_begin: last.timestamp_begin,
                });
            }
            if last.is_open_ended() {
                last.timestamp_end = entry.timestamp_begin;
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[PacketIndexEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PacketIndexEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first packet that may hold events at or after `timestamp`.
    pub fn search(&self, timestamp: u64) -> Option<usize> {
        let i = self
            .entries
            .partition_point(|e| e.timestamp_end < timestamp);
        (i < self.entries.len()).then_some(i)
    }

    pub fn timestamp_begin(&self) -> Option<u64> {
        self.entries.first().map(|e| e.timestamp_begin)
    }

    pub fn timestamp_end(&self) -> Option<u64> {
        self.entries.last().map(|e| e.timestamp_end)
    }

    /// Total number of events the tracer reported as discarded.
    pub fn lost_events(&self) -> u64 {
        self.entries.iter().map(|e| e.lost_events).sum()
    }

    /// Index every packet of a stream file of `file_size` bytes, returning the
    /// stream class its packets belong to (`None` for a file without packets).
    ///
    /// A packet that fails to decode ends the index with a warning, unless it
    /// is the first packet of the file. Inconsistencies between well formed
    /// packets are always errors.
    pub fn build<R: Read + Seek>(
        reader: &mut R,
        file_size: u64,
        metadata: &TraceMetadata,
        policy: LostEventsPolicy,
    ) -> Result<(Self, Option<Arc<StreamDeclaration>>), Error> {
        let mut scopes = ScopeTree::new();
        metadata.bind_env(&mut scopes)?;
        let base = scopes.checkpoint();

        let mut index = PacketIndex::new();
        let mut stream: Option<Arc<StreamDeclaration>> = None;
        let mut offset_bytes = 0;
        let mut lost_so_far = 0;

        while offset_bytes < file_size {
            scopes.rewind(base);
            let indexed = index_packet(
                reader,
                &mut scopes,
                metadata,
                offset_bytes,
                file_size,
                lost_so_far,
                policy,
            )
            .and_then(|(entry, s)| match &stream {
                Some(expected) if expected.id() != s.id() => Err(Error::StreamIdMismatch {
                    offset_bytes,
                    found: s.id(),
                    expected: expected.id(),
                }),
                _ => Ok((entry, s)),
            });
            let (entry, s) = match indexed {
                Ok(indexed) => indexed,
                Err(e) if stream.is_some() && is_trailing_garbage(&e) => {
                    warn!(
                        offset_bytes,
                        error = %e,
                        "Ignoring trailing data that does not decode as a complete packet"
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            debug!(
                offset_bytes,
                packet_size_bits = entry.packet_size_bits(),
                content_size_bits = entry.content_size_bits(),
                timestamp_begin = entry.timestamp_begin(),
                lost_events = entry.lost_events(),
                "Indexed packet"
            );

            if stream.is_none() {
                stream = Some(s);
            }
            if entry.packet_size_bits() == 0 {
                break;
            }
            offset_bytes = entry.next_offset_bytes();
            lost_so_far = entry.events_discarded().unwrap_or(lost_so_far);
            index.append(entry)?;
        }

        Ok((index, stream))
    }
}

fn is_trailing_garbage(e: &Error) -> bool {
    matches!(
        e,
        Error::BufferOverrun { .. }
            | Error::TruncatedPacket { .. }
            | Error::InconsistentPacketSize { .. }
            | Error::InvalidTimestampRange { .. }
            | Error::BadMagic { .. }
            | Error::UuidMismatch { .. }
            | Error::StreamIdMismatch { .. }
            | Error::UnknownStreamId(_)
            | Error::ScopeResolution { .. }
            | Error::VariantSelection { .. }
    )
}

/// Decode the header and context of the packet at `offset_bytes`, growing the
/// read window until they fit.
fn index_packet<R: Read + Seek>(
    reader: &mut R,
    scopes: &mut ScopeTree,
    metadata: &TraceMetadata,
    offset_bytes: u64,
    file_size: u64,
    lost_so_far: u64,
    policy: LostEventsPolicy,
) -> Result<(PacketIndexEntry, Arc<StreamDeclaration>), Error> {
    let remaining = file_size - offset_bytes;
    let checkpoint = scopes.checkpoint();
    let mut window = INDEX_WINDOW_BYTES.min(remaining);
    loop {
        let bytes = read_region(reader, offset_bytes, window)?;
        let mut cursor = BitCursor::new(&bytes);
        match decode_preamble(metadata, scopes, &mut cursor, offset_bytes) {
            Ok(preamble) => {
                let entry = PacketIndexEntry::from_context(
                    offset_bytes,
                    preamble.stream.id(),
                    preamble.payload_start_bits,
                    preamble.context.as_deref().and_then(Definition::as_struct),
                    file_size,
                    lost_so_far,
                    policy,
                )?;
                return Ok((entry, preamble.stream));
            }
            Err(Error::BufferOverrun { .. }) if window < remaining => {
                scopes.rewind(checkpoint);
                window = (window * 2).min(remaining);
            }
            Err(e) => return Err(e),
        }
    }
}

pub(crate) fn read_region<R: Read + Seek>(
    reader: &mut R,
    offset_bytes: u64,
    len: u64,
) -> Result<Vec<u8>, Error> {
    reader.seek(SeekFrom::Start(offset_bytes))?;
    let mut bytes = vec![0; len as usize];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Packet header and context of one packet.
pub(crate) struct Preamble {
    pub(crate) stream: Arc<StreamDeclaration>,
    pub(crate) context: Option<Arc<Definition>>,
    pub(crate) payload_start_bits: u64,
}

/// Decode `trace.packet.header` and `stream.packet.context` at the cursor
/// position, which must be the start of a packet.
pub(crate) fn decode_preamble(
    metadata: &TraceMetadata,
    scopes: &mut ScopeTree,
    cursor: &mut BitCursor<'_>,
    offset_bytes: u64,
) -> Result<Preamble, Error> {
    let mut stream_id = None;
    if let Some(decl) = metadata.packet_header() {
        let header = decl.decode_root(scopes, DynamicScope::TracePacketHeader, cursor)?;
        if let Some(h) = header.as_struct() {
            if let Some(magic) = h.field("magic").and_then(|m| m.unsigned_value()) {
                if magic != CTF_MAGIC {
                    return Err(Error::BadMagic {
                        offset_bytes,
                        magic,
                    });
                }
            }
            if let (Some(found), Some(expected)) = (header_uuid(h), metadata.uuid()) {
                if found != expected {
                    return Err(Error::UuidMismatch {
                        offset_bytes,
                        found,
                        expected,
                    });
                }
            }
            stream_id = h.field("stream_id").and_then(|s| s.unsigned_value());
        }
    }

    let stream = match stream_id {
        Some(id) => metadata.stream(id)?,
        None => metadata.single_stream()?,
    }
    .clone();

    let context = stream
        .packet_context()
        .map(|decl| decl.decode_root(scopes, DynamicScope::StreamPacketContext, cursor))
        .transpose()?;

    Ok(Preamble {
        stream,
        context,
        payload_start_bits: cursor.position(),
    })
}

fn header_uuid(header: &StructDefinition) -> Option<Uuid> {
    let elements = header.lookup_array("uuid")?;
    let bytes: Vec<u8> = elements
        .iter()
        .map(|e| e.unsigned_value().and_then(|v| u8::try_from(v).ok()))
        .collect::<Option<_>>()?;
    Uuid::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{Declaration, IntegerDeclaration, StringDeclaration, StructDeclaration};
    use crate::types::ByteOrder;
    use pretty_assertions::assert_eq;

    fn context_decl(fields: &[(&str, bool)]) -> Declaration {
        StructDeclaration::from_fields(
            8,
            fields.iter().map(|(name, is_string)| {
                let decl: Declaration = if *is_string {
                    StringDeclaration::default().into()
                } else {
                    IntegerDeclaration::new(64, false, ByteOrder::LittleEndian)
                        .unwrap()
                        .into()
                };
                (*name, decl)
            }),
        )
        .unwrap()
        .into()
    }

    fn decode_context(decl: &Declaration, bytes: &[u8]) -> Arc<Definition> {
        let mut scopes = ScopeTree::new();
        let mut cursor = BitCursor::new(bytes);
        decl.decode_root(&mut scopes, DynamicScope::StreamPacketContext, &mut cursor)
            .unwrap()
    }

    fn u64s(values: &[u64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn entry(
        fields: &[&str],
        values: &[u64],
        file_size: u64,
        lost_so_far: u64,
    ) -> Result<PacketIndexEntry, Error> {
        let decl = context_decl(&fields.iter().map(|f| (*f, false)).collect::<Vec<_>>());
        let def = decode_context(&decl, &u64s(values));
        PacketIndexEntry::from_context(
            0,
            0,
            values.len() as u64 * 64,
            def.as_struct(),
            file_size,
            lost_so_far,
            LostEventsPolicy::Clamp,
        )
    }

    #[test]
    fn sizes_and_timestamps() {
        let e = entry(
            &[TIMESTAMP_BEGIN, TIMESTAMP_END, CONTENT_SIZE, PACKET_SIZE],
            &[10, 20, 512, 1024],
            4096,
            0,
        )
        .unwrap();
        assert_eq!(e.content_size_bits(), 512);
        assert_eq!(e.packet_size_bits(), 1024);
        assert_eq!(e.payload_start_bits(), 256);
        assert_eq!(e.timestamp_begin(), 10);
        assert_eq!(e.timestamp_end(), 20);
        assert_eq!(e.next_offset_bytes(), 128);
        assert!(e.includes(10));
        assert!(e.includes(20));
        assert!(!e.includes(9));
        assert!(!e.includes(21));
        assert_eq!(e.target(), &Target::unknown());
    }

    #[test]
    fn size_precedence() {
        // packet_size only: content is the whole packet
        let e = entry(&[PACKET_SIZE], &[256], 100, 0).unwrap();
        assert_eq!(e.content_size_bits(), 256);
        assert_eq!(e.packet_size_bits(), 256);

        // content_size only: the packet ends with its content
        let e = entry(&[CONTENT_SIZE], &[128], 100, 0).unwrap();
        assert_eq!(e.packet_size_bits(), 128);

        // neither: the rest of the file
        let e = entry(&[TIMESTAMP_BEGIN], &[1], 100, 0).unwrap();
        assert_eq!(e.content_size_bits(), 800);
        assert_eq!(e.packet_size_bits(), 800);
        assert_eq!(e.timestamp_end(), u64::MAX);
    }

    #[test]
    fn open_end_sentinel() {
        let e = entry(&[TIMESTAMP_BEGIN, TIMESTAMP_END], &[5, u64::MAX], 100, 0).unwrap();
        assert_eq!(e.timestamp_end(), u64::MAX);
        assert!(e.includes(u64::MAX));
    }

    #[test]
    fn inconsistent_packets() {
        assert!(matches!(
            entry(&[CONTENT_SIZE, PACKET_SIZE], &[1024, 512], 4096, 0),
            Err(Error::InconsistentPacketSize { .. })
        ));
        // the payload starts after the 128 bit context
        assert!(matches!(
            entry(&[CONTENT_SIZE, PACKET_SIZE], &[64, 512], 4096, 0),
            Err(Error::InconsistentPacketSize { .. })
        ));
        assert!(matches!(
            entry(&[PACKET_SIZE], &[8192], 100, 0),
            Err(Error::TruncatedPacket { .. })
        ));
        assert!(matches!(
            entry(&[TIMESTAMP_BEGIN, TIMESTAMP_END], &[20, 10], 100, 0),
            Err(Error::InvalidTimestampRange { .. })
        ));
    }

    #[test]
    fn lost_events() {
        let e = entry(&[EVENTS_DISCARDED], &[12], 100, 5).unwrap();
        assert_eq!(e.lost_events(), 7);
        assert_eq!(e.events_discarded(), Some(12));

        let e = entry(&[EVENTS_DISCARDED], &[3], 100, 5).unwrap();
        assert_eq!(e.lost_events(), 0);

        let decl = context_decl(&[(EVENTS_DISCARDED, false)]);
        let def = decode_context(&decl, &u64s(&[3]));
        assert!(matches!(
            PacketIndexEntry::from_context(
                0,
                0,
                64,
                def.as_struct(),
                100,
                5,
                LostEventsPolicy::Error
            ),
            Err(Error::InconsistentLostEvents {
                counter: 3,
                lost_so_far: 5,
                ..
            })
        ));

        let e = entry(&[TIMESTAMP_BEGIN], &[0], 100, 5).unwrap();
        assert_eq!(e.lost_events(), 0);
        assert_eq!(e.events_discarded(), None);
    }

    #[test]
    fn targets() {
        let decl = context_decl(&[(DEVICE, true)]);
        let def = decode_context(&decl, b"CPU3\0");
        let e = PacketIndexEntry::from_context(
            0,
            0,
            40,
            def.as_struct(),
            100,
            0,
            LostEventsPolicy::Clamp,
        )
        .unwrap();
        assert_eq!(e.target(), &Target::new(Some("CPU3".to_owned()), 3));
        assert_eq!(e.target().to_string(), "CPU3");

        let e = entry(&[CPU_ID], &[5], 100, 0).unwrap();
        assert_eq!(e.target(), &Target::new(Some("CPU5".to_owned()), 5));

        let e = entry(&[TIMESTAMP_BEGIN], &[0], 100, 0).unwrap();
        assert_eq!(e.target().id(), Target::UNKNOWN_ID);
        assert_eq!(e.target().name(), None);
        assert!(!e.target().is_known());

        assert_eq!(device_number("cpu-12"), Some(12));
        assert_eq!(device_number("CPU3a"), None);
        assert_eq!(device_number("eth"), None);
        assert_eq!(device_number("7"), Some(7));
    }

    #[test]
    fn index_revises_open_ends_and_searches() {
        let mut index = PacketIndex::new();
        let open = entry(&[TIMESTAMP_BEGIN, PACKET_SIZE], &[10, 128], 100, 0).unwrap();
        let closed = entry(&[TIMESTAMP_BEGIN, TIMESTAMP_END, PACKET_SIZE], &[30, 40, 192], 100, 0)
            .unwrap();
        let last = entry(&[TIMESTAMP_BEGIN, PACKET_SIZE], &[50, 128], 100, 0).unwrap();
        index.append(open).unwrap();
        index.append(closed).unwrap();
        index.append(last).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.get(0).unwrap().timestamp_end(), 30);
        assert_eq!(index.get(1).unwrap().timestamp_end(), 40);
        assert_eq!(index.timestamp_begin(), Some(10));
        assert_eq!(index.timestamp_end(), Some(u64::MAX));

        assert_eq!(index.search(0), Some(0));
        assert_eq!(index.search(30), Some(0));
        assert_eq!(index.search(31), Some(1));
        assert_eq!(index.search(45), Some(2));

        let mut earlier = entry(&[TIMESTAMP_BEGIN, PACKET_SIZE], &[20, 128], 100, 0).unwrap();
        earlier.offset_bits = 8 * 64;
        match index.append(earlier) {
            Err(Error::PacketOrder {
                offset_bytes,
                timestamp_begin,
                previous_begin,
            }) => {
                assert_eq!(offset_bytes, 64);
                assert_eq!(timestamp_begin, 20);
                assert_eq!(previous_begin, 50);
            }
            other => panic!("unexpected result {other:?}"),
        }

        let mut closed_index = PacketIndex::new();
        closed_index
            .append(entry(&[TIMESTAMP_BEGIN, TIMESTAMP_END], &[1, 2], 100, 0).unwrap())
            .unwrap();
        assert_eq!(closed_index.search(3), None);
    }
}
