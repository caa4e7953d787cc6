use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Encountered an IO error. {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer overrun at bit {position}: requested {requested} bits but only {available} remain")]
    BufferOverrun {
        position: u64,
        requested: u64,
        available: u64,
    },

    #[error("Malformed declaration. {0}")]
    MalformedDeclaration(String),

    #[error("The field path '{path}' does not resolve to an already decoded {expected} field")]
    ScopeResolution { path: String, expected: &'static str },

    #[error("The variant tag '{tag}' has no alternative for label {label:?}")]
    VariantSelection { tag: String, label: Option<String> },

    #[error("Packet at byte offset {offset_bytes} declares {declared_bits} bits but only {available_bits} bits remain in the file")]
    TruncatedPacket {
        offset_bytes: u64,
        declared_bits: u64,
        available_bits: u64,
    },

    #[error("Packet at byte offset {offset_bytes} has inconsistent sizes: payload starts at bit {payload_start_bits}, content is {content_size_bits} bits, packet is {packet_size_bits} bits")]
    InconsistentPacketSize {
        offset_bytes: u64,
        payload_start_bits: u64,
        content_size_bits: u64,
        packet_size_bits: u64,
    },

    #[error("Packet at byte offset {offset_bytes} reports a discarded event counter of {counter} which is below the {lost_so_far} events already accounted for")]
    InconsistentLostEvents {
        offset_bytes: u64,
        counter: u64,
        lost_so_far: u64,
    },

    #[error("Packet at byte offset {offset_bytes} ends at timestamp {timestamp_end}, before it begins at {timestamp_begin}")]
    InvalidTimestampRange {
        offset_bytes: u64,
        timestamp_begin: u64,
        timestamp_end: u64,
    },

    #[error("Packet at byte offset {offset_bytes} begins at timestamp {timestamp_begin}, before the previous packet's begin timestamp {previous_begin}")]
    PacketOrder {
        offset_bytes: u64,
        timestamp_begin: u64,
        previous_begin: u64,
    },

    #[error("Packet at byte offset {offset_bytes} has a bad magic number {magic:#x}")]
    BadMagic { offset_bytes: u64, magic: u64 },

    #[error("Packet at byte offset {offset_bytes} carries trace UUID {found}, expected {expected}")]
    UuidMismatch {
        offset_bytes: u64,
        found: uuid::Uuid,
        expected: uuid::Uuid,
    },

    #[error("Packet at byte offset {offset_bytes} belongs to stream ID {found}, expected stream ID {expected}")]
    StreamIdMismatch {
        offset_bytes: u64,
        found: u64,
        expected: u64,
    },

    #[error("The event header references event ID {0} which is not declared for this stream")]
    UnknownEventId(u64),

    #[error("The packet header references stream ID {0} which is not declared in the metadata")]
    UnknownStreamId(u64),

    #[error("None of the provided inputs could be opened as a CTF stream")]
    NoStreams,

    #[error("The stream file '{}' does not contain any packets", .0.display())]
    EmptyStream(PathBuf),

    #[error("Encountered a TOML parsing error. {0}")]
    Schema(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedDeclaration(msg.into())
    }
}
