//! # Overview
//!
//! Reader for Common Trace Format (CTF 1.8) binary traces.
//!
//! Conceptually CTF data is organized as followed:
//! * Trace, described by its metadata (the declarations of every stream and event)
//!   - One or more streams, each stored in its own file as a series of packets
//!     * Packets, a header and context followed by a series of events
//!
//! The metadata arrives as already built declarations ([`metadata::TraceMetadata`]),
//! either from a metadata parser or from a TOML [`schema::TraceSchema`].
//! A [`stream::StreamInput`] indexes the packets of one stream file and decodes
//! its events in order, and a [`reader::TraceReader`] merges several streams by
//! timestamp.
//!
//! # Attrs Mappings
//!
//! Trace Attrs
//! * trace.uuid
//! * trace.byte_order
//! * trace.stream_count
//! * trace.env.`<fields>`
//!
//! Stream Attrs
//! * stream.id
//! * stream.name
//! * stream.path
//! * stream.packet_count
//! * stream.timestamp_begin
//! * stream.timestamp_end
//! * stream.lost_events
//! * stream.target.name
//! * stream.target.id
//!
//! Event Attrs
//! * event.name
//! * event.timestamp
//! * event.stream_id
//! * event.id
//! * event.log_level
//! * event.header.<possibly.nested.fields>
//! * event.common_context.<possibly.nested.fields>
//! * event.specific_context.<possibly.nested.fields>
//! * event.packet_context.<possibly.nested.fields>
//! * event.<possibly.nested.fields>
//!
//! # Mapping Conventions
//!
//! ## Enumerations
//!
//! Enumerations are given an Attr for the container value and a `.label` Attr
//! when the value has a label mapping.
//!
//! Example: `my_enum` has value 5 and label mapping "RUNNING"
//! * event.my_enum = 5
//! * event.my_enum.label = "RUNNING"
//!
//! ## Arrays and sequences
//!
//! Elements are suffixed with their index, `event.my_array.0`, `event.my_array.1`, ...
//! Integer arrays with a text encoding are given a single string Attr.
//!
//! ## Variants
//!
//! Only the selected alternative is present, keyed by its label:
//! `event.my_variant.<label>`.

pub mod attrs;
pub mod config;
pub mod cursor;
pub mod declaration;
pub mod decode;
pub mod definition;
pub mod error;
pub mod event;
pub mod metadata;
pub mod opts;
pub mod packet;
pub mod prelude;
pub mod reader;
pub mod schema;
pub mod scope;
pub mod stream;
pub mod tracing;
pub mod types;

pub use crate::attrs::{EventAttrKey, StreamAttrKey, TraceAttrKey};
pub use crate::config::CtfConfig;
pub use crate::error::Error;
pub use crate::event::EventDefinition;
pub use crate::metadata::TraceMetadata;
pub use crate::opts::ReaderOpts;
pub use crate::reader::TraceReader;
pub use crate::stream::StreamInput;
pub use crate::types::Interruptor;
