//! TOML description of trace metadata.
//!
//! A schema file describes the declarations of a trace directly, one table per
//! dynamic scope. Field types are tagged with `type`:
//!
//! ```toml
//! byte-order = "le"
//!
//! [env]
//! hostname = "target-a"
//!
//! [[packet-header.fields]]
//! name = "magic"
//! type = "integer"
//! size = 32
//!
//! [[streams]]
//! id = 0
//!
//! [[streams.events]]
//! id = 0
//! name = "sched_switch"
//! fields = { fields = [
//!     { name = "prev_comm", type = "array", length = 16, element = { type = "integer", size = 8, encoding = "utf8" } },
//!     { name = "prev_tid", type = "integer", size = 32, signed = true },
//! ] }
//! ```

use crate::declaration::{
    ArrayDeclaration, Declaration, EnumDeclaration, FloatDeclaration, IntegerDeclaration,
    SequenceDeclaration, StringDeclaration, StructDeclaration, VariantDeclaration,
};
use crate::error::Error;
use crate::metadata::{EnvValue, EventDeclaration, StreamDeclaration, TraceMetadata};
use crate::types::{ByteOrder, Encoding};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TraceSchema {
    /// Default byte order of every scalar, the host's when omitted
    #[serde(default)]
    pub byte_order: ByteOrder,
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,
    pub packet_header: Option<StructSpec>,
    #[serde(default)]
    pub streams: Vec<StreamSchema>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StreamSchema {
    #[serde(default)]
    pub id: u64,
    pub packet_context: Option<StructSpec>,
    pub event_header: Option<StructSpec>,
    pub event_context: Option<StructSpec>,
    #[serde(default)]
    pub events: Vec<EventSchema>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventSchema {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub log_level: Option<i64>,
    pub context: Option<StructSpec>,
    pub fields: Option<StructSpec>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StructSpec {
    #[serde(default = "default_align")]
    pub min_align: u64,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// A named structure field or variant option.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub ty: TypeSpec,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TypeSpec {
    Integer(IntegerSpec),
    #[serde(rename_all = "kebab-case")]
    Float {
        exponent_bits: u32,
        mantissa_bits: u32,
        byte_order: Option<ByteOrder>,
        align: Option<u64>,
    },
    Enum {
        container: IntegerSpec,
        #[serde(default)]
        mappings: Vec<MappingSpec>,
    },
    String {
        #[serde(default = "default_string_encoding")]
        encoding: Encoding,
    },
    Struct(StructSpec),
    Array {
        length: u64,
        element: Box<TypeSpec>,
    },
    Sequence {
        length: String,
        element: Box<TypeSpec>,
    },
    Variant {
        tag: String,
        #[serde(default)]
        options: Vec<FieldSpec>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IntegerSpec {
    pub size: u32,
    #[serde(default)]
    pub signed: bool,
    pub byte_order: Option<ByteOrder>,
    #[serde(default = "default_base")]
    pub base: u32,
    pub align: Option<u64>,
    #[serde(default)]
    pub encoding: Encoding,
}

/// Label for the inclusive range `value..=end`, `end` defaulting to `value`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MappingSpec {
    pub label: String,
    pub value: i64,
    pub end: Option<i64>,
}

fn default_align() -> u64 {
    1
}

fn default_base() -> u32 {
    10
}

fn default_string_encoding() -> Encoding {
    Encoding::Utf8
}

impl TraceSchema {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Build the metadata declarations this schema describes.
    pub fn to_metadata(&self) -> Result<TraceMetadata, Error> {
        let order = self.byte_order;
        let mut metadata = TraceMetadata::new(order);
        if let Some(uuid) = self.uuid {
            metadata = metadata.with_uuid(uuid);
        }
        for (k, v) in self.env.iter() {
            metadata = metadata.with_env(k.as_str(), v.clone());
        }
        if let Some(s) = &self.packet_header {
            metadata = metadata.with_packet_header(s.declaration(order)?)?;
        }
        for s in self.streams.iter() {
            metadata = metadata.add_stream(s.declaration(order)?)?;
        }
        Ok(metadata)
    }
}

impl FromStr for TraceSchema {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl StreamSchema {
    fn declaration(&self, order: ByteOrder) -> Result<StreamDeclaration, Error> {
        let mut stream = StreamDeclaration::new(self.id);
        if let Some(s) = &self.packet_context {
            stream = stream.with_packet_context(s.declaration(order)?)?;
        }
        if let Some(s) = &self.event_header {
            stream = stream.with_event_header(s.declaration(order)?)?;
        }
        if let Some(s) = &self.event_context {
            stream = stream.with_event_context(s.declaration(order)?)?;
        }
        for e in self.events.iter() {
            let mut event = EventDeclaration::new(e.id, e.name.as_str());
            if let Some(level) = e.log_level {
                event = event.with_log_level(level);
            }
            if let Some(s) = &e.context {
                event = event.with_context(s.declaration(order)?)?;
            }
            if let Some(s) = &e.fields {
                event = event.with_fields(s.declaration(order)?)?;
            }
            stream = stream.add_event(event)?;
        }
        Ok(stream)
    }
}

impl StructSpec {
    pub fn declaration(&self, order: ByteOrder) -> Result<Declaration, Error> {
        let fields = self
            .fields
            .iter()
            .map(|f| Ok((f.name.as_str(), f.ty.declaration(order)?)))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(StructDeclaration::from_fields(self.min_align, fields)?.into())
    }
}

impl IntegerSpec {
    fn declaration(&self, order: ByteOrder) -> Result<IntegerDeclaration, Error> {
        let align = self
            .align
            .unwrap_or(if self.size % 8 == 0 { 8 } else { 1 });
        IntegerDeclaration::with_layout(
            self.size,
            self.signed,
            self.byte_order.unwrap_or(order),
            self.base,
            align,
            self.encoding,
        )
    }
}

impl TypeSpec {
    /// `order` applies to scalars that do not name their own byte order.
    pub fn declaration(&self, order: ByteOrder) -> Result<Declaration, Error> {
        Ok(match self {
            TypeSpec::Integer(i) => i.declaration(order)?.into(),
            TypeSpec::Float {
                exponent_bits,
                mantissa_bits,
                byte_order,
                align,
            } => {
                let size = exponent_bits + mantissa_bits;
                let align = align.unwrap_or(if size % 8 == 0 { 8 } else { 1 });
                FloatDeclaration::new(
                    *exponent_bits,
                    *mantissa_bits,
                    byte_order.unwrap_or(order),
                    align,
                )?
                .into()
            }
            TypeSpec::Enum {
                container,
                mappings,
            } => {
                let mut decl = EnumDeclaration::new(container.declaration(order)?);
                for m in mappings.iter() {
                    let end = m.end.unwrap_or(m.value);
                    decl = decl.add(m.value.into(), end.into(), m.label.as_str())?;
                }
                decl.into()
            }
            TypeSpec::String { encoding } => StringDeclaration::new(*encoding).into(),
            TypeSpec::Struct(s) => s.declaration(order)?,
            TypeSpec::Array { length, element } => {
                ArrayDeclaration::new(*length, element.declaration(order)?).into()
            }
            TypeSpec::Sequence { length, element } => {
                SequenceDeclaration::new(length.as_str(), element.declaration(order)?)?.into()
            }
            TypeSpec::Variant { tag, options } => {
                let mut decl = VariantDeclaration::new(tag.as_str())?;
                for o in options.iter() {
                    decl = decl.add_option(o.name.as_str(), o.ty.declaration(order)?)?;
                }
                decl.into()
            }
        })
    }
}
