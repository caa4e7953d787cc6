#![allow(dead_code)]

use ctf_reader::declaration::{
    EnumDeclaration, IntegerDeclaration, StringDeclaration, StructDeclaration, VariantDeclaration,
};
use ctf_reader::metadata::{EventDeclaration, StreamDeclaration, TraceMetadata, CTF_MAGIC};
use ctf_reader::types::ByteOrder;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TICK: u32 = 0;
pub const NOTE: u32 = 1;
/// Not declared by [`metadata`]
pub const UNKNOWN: u32 = 7;

/// Bytes before the first event of every packet.
pub const PREAMBLE_BYTES: usize = 8 + 5 * 8 + 4;

#[derive(Clone, Debug)]
pub enum Event {
    Tick { timestamp: u64, value: u32 },
    Note { timestamp: u64, text: &'static str },
    /// Header of an event id the metadata does not declare
    Unknown { timestamp: u64 },
}

#[derive(Clone, Debug)]
pub struct Packet {
    pub stream_id: u32,
    pub begin: u64,
    pub end: u64,
    pub discarded: u64,
    pub cpu: u32,
    pub events: Vec<Event>,
    /// Zero bytes after the content
    pub padding: usize,
}

impl Packet {
    pub fn new(begin: u64, end: u64) -> Self {
        Self {
            stream_id: 0,
            begin,
            end,
            discarded: 0,
            cpu: 0,
            events: Vec::new(),
            padding: 0,
        }
    }

    pub fn ticks(mut self, timestamps: &[u64]) -> Self {
        for (i, ts) in timestamps.iter().enumerate() {
            self.events.push(Event::Tick {
                timestamp: *ts,
                value: i as u32,
            });
        }
        self
    }

    pub fn note(mut self, timestamp: u64, text: &'static str) -> Self {
        self.events.push(Event::Note { timestamp, text });
        self
    }

    pub fn unknown(mut self, timestamp: u64) -> Self {
        self.events.push(Event::Unknown { timestamp });
        self
    }

    pub fn discarded(mut self, counter: u64) -> Self {
        self.discarded = counter;
        self
    }

    pub fn cpu(mut self, cpu: u32) -> Self {
        self.cpu = cpu;
        self
    }

    pub fn padding(mut self, bytes: usize) -> Self {
        self.padding = bytes;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        for e in self.events.iter() {
            match e {
                Event::Tick { timestamp, value } => {
                    payload.extend_from_slice(&TICK.to_le_bytes());
                    payload.extend_from_slice(&timestamp.to_le_bytes());
                    payload.extend_from_slice(&value.to_le_bytes());
                }
                Event::Note { timestamp, text } => {
                    payload.extend_from_slice(&NOTE.to_le_bytes());
                    payload.extend_from_slice(&timestamp.to_le_bytes());
                    payload.extend_from_slice(text.as_bytes());
                    payload.push(0);
                }
                Event::Unknown { timestamp } => {
                    payload.extend_from_slice(&UNKNOWN.to_le_bytes());
                    payload.extend_from_slice(&timestamp.to_le_bytes());
                }
            }
        }
        let content = (PREAMBLE_BYTES + payload.len()) as u64 * 8;
        let packet = content + self.padding as u64 * 8;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(CTF_MAGIC as u32).to_le_bytes());
        bytes.extend_from_slice(&self.stream_id.to_le_bytes());
        bytes.extend_from_slice(&self.begin.to_le_bytes());
        bytes.extend_from_slice(&self.end.to_le_bytes());
        bytes.extend_from_slice(&content.to_le_bytes());
        bytes.extend_from_slice(&packet.to_le_bytes());
        bytes.extend_from_slice(&self.discarded.to_le_bytes());
        bytes.extend_from_slice(&self.cpu.to_le_bytes());
        bytes.extend_from_slice(&payload);
        bytes.resize(bytes.len() + self.padding, 0);
        bytes
    }
}

fn int(size: u32) -> IntegerDeclaration {
    IntegerDeclaration::new(size, false, ByteOrder::LittleEndian).unwrap()
}

pub fn metadata() -> Arc<TraceMetadata> {
    let header = StructDeclaration::from_fields(
        1,
        [("magic", int(32).into()), ("stream_id", int(32).into())],
    )
    .unwrap();
    let context = StructDeclaration::from_fields(
        1,
        [
            ("timestamp_begin", int(64).into()),
            ("timestamp_end", int(64).into()),
            ("content_size", int(64).into()),
            ("packet_size", int(64).into()),
            ("events_discarded", int(64).into()),
            ("cpu_id", int(32).into()),
        ],
    )
    .unwrap();
    let event_header = StructDeclaration::from_fields(
        1,
        [("id", int(32).into()), ("timestamp", int(64).into())],
    )
    .unwrap();
    let tick = EventDeclaration::new(TICK.into(), "tick")
        .with_fields(
            StructDeclaration::from_fields(1, [("value", int(32).into())])
                .unwrap()
                .into(),
        )
        .unwrap();
    let note = EventDeclaration::new(NOTE.into(), "note")
        .with_fields(
            StructDeclaration::from_fields(1, [("text", StringDeclaration::default().into())])
                .unwrap()
                .into(),
        )
        .unwrap();

    let mut metadata = TraceMetadata::new(ByteOrder::LittleEndian)
        .with_packet_header(header.into())
        .unwrap();
    for id in 0..2 {
        let stream = StreamDeclaration::new(id)
            .with_packet_context(context.clone().into())
            .unwrap()
            .with_event_header(event_header.clone().into())
            .unwrap()
            .add_event(tick.clone())
            .unwrap()
            .add_event(note.clone())
            .unwrap();
        metadata = metadata.add_stream(stream).unwrap();
    }
    Arc::new(metadata)
}

/// Event header of a stream using both header layouts.
#[derive(Clone, Copy, Debug)]
pub enum Header {
    /// 5 bit id and the 27 low order bits of the timestamp
    Compact { id: u32, timestamp: u32 },
    /// 5 bit id of 31 followed by a 32 bit id and a full timestamp
    Extended { id: u32, timestamp: u64 },
}

pub const EXTENDED_ID: u32 = 31;
pub const COMPACT_TIMESTAMP_BITS: u32 = 27;

/// Single stream without a packet header whose event header selects between
/// a compact and an extended layout. Its `tick` event carries an 8 bit value.
pub fn compact_metadata() -> Arc<TraceMetadata> {
    let context = StructDeclaration::from_fields(
        1,
        [
            ("timestamp_begin", int(64).into()),
            ("timestamp_end", int(64).into()),
            ("content_size", int(64).into()),
            ("packet_size", int(64).into()),
        ],
    )
    .unwrap();
    let id = EnumDeclaration::new(int(5))
        .add(0, i128::from(EXTENDED_ID) - 1, "compact")
        .unwrap()
        .add(EXTENDED_ID.into(), EXTENDED_ID.into(), "extended")
        .unwrap();
    let compact =
        StructDeclaration::from_fields(1, [("timestamp", int(COMPACT_TIMESTAMP_BITS).into())])
            .unwrap();
    let extended = StructDeclaration::from_fields(
        1,
        [("id", int(32).into()), ("timestamp", int(64).into())],
    )
    .unwrap();
    let v = VariantDeclaration::new("id")
        .unwrap()
        .add_option("compact", compact.into())
        .unwrap()
        .add_option("extended", extended.into())
        .unwrap();
    let event_header =
        StructDeclaration::from_fields(1, [("id", id.into()), ("v", v.into())]).unwrap();
    let tick = EventDeclaration::new(TICK.into(), "tick")
        .with_fields(
            StructDeclaration::from_fields(1, [("value", int(8).into())])
                .unwrap()
                .into(),
        )
        .unwrap();
    let stream = StreamDeclaration::new(0)
        .with_packet_context(context.into())
        .unwrap()
        .with_event_header(event_header.into())
        .unwrap()
        .add_event(tick)
        .unwrap();
    Arc::new(
        TraceMetadata::new(ByteOrder::LittleEndian)
            .add_stream(stream)
            .unwrap(),
    )
}

/// A packet of [`compact_metadata`], each event's value is its position.
pub fn compact_packet(begin: u64, end: u64, headers: &[Header]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (i, h) in headers.iter().enumerate() {
        match *h {
            Header::Compact { id, timestamp } => {
                let bits = id | (timestamp << 5);
                payload.extend_from_slice(&bits.to_le_bytes());
            }
            Header::Extended { id, timestamp } => {
                // 3 bits of padding align the extended struct on its 32 bit id
                payload.push(EXTENDED_ID as u8);
                payload.extend_from_slice(&id.to_le_bytes());
                payload.extend_from_slice(&timestamp.to_le_bytes());
            }
        }
        payload.push(i as u8);
    }
    let size = (4 * 8 + payload.len()) as u64 * 8;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&begin.to_le_bytes());
    bytes.extend_from_slice(&end.to_le_bytes());
    bytes.extend_from_slice(&size.to_le_bytes());
    bytes.extend_from_slice(&size.to_le_bytes());
    bytes.extend_from_slice(&payload);
    bytes
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut f = File::create(&path).unwrap();
    f.write_all(bytes).unwrap();
    f.flush().unwrap();
    path
}

pub fn write_stream(dir: &Path, name: &str, packets: &[Packet]) -> PathBuf {
    let bytes: Vec<u8> = packets.iter().flat_map(|p| p.to_bytes()).collect();
    write_file(dir, name, &bytes)
}
