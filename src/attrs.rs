use derive_more::Display;
use std::fmt;

/// Scalar value of a flattened field or of a packet context attribute.
#[derive(Clone, PartialEq, Debug)]
pub enum AttrValue {
    Integer(i128),
    Float(f64),
    /// Enumerations keep the numeric value, `label` is absent for unmapped values
    Enum { label: Option<String>, value: i128 },
    String(String),
}

impl AttrValue {
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            AttrValue::Integer(v) => Some(*v),
            AttrValue::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        self.as_integer().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Integer(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Enum {
                label: Some(l),
                value,
            } => write!(f, "{l} ({value})"),
            AttrValue::Enum { label: None, value } => write!(f, "{value}"),
            AttrValue::String(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<i128> for AttrValue {
    fn from(v: i128) -> Self {
        AttrValue::Integer(v)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::Integer(v.into())
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Integer(v.into())
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_owned())
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum TraceAttrKey {
    #[display(fmt = "trace.uuid")]
    Uuid,
    #[display(fmt = "trace.byte_order")]
    ByteOrder,
    #[display(fmt = "trace.stream_count")]
    StreamCount,
    #[display(fmt = "trace.env.{_0}")]
    Env(String),
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum StreamAttrKey {
    #[display(fmt = "stream.name")]
    Name,
    #[display(fmt = "stream.path")]
    Path,
    #[display(fmt = "stream.id")]
    Id,
    #[display(fmt = "stream.packet_count")]
    PacketCount,
    #[display(fmt = "stream.timestamp_begin")]
    TimestampBegin,
    #[display(fmt = "stream.timestamp_end")]
    TimestampEnd,
    #[display(fmt = "stream.lost_events")]
    LostEvents,
    #[display(fmt = "stream.target.name")]
    TargetName,
    #[display(fmt = "stream.target.id")]
    TargetId,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum EventAttrKey {
    #[display(fmt = "event.name")]
    Name,
    #[display(fmt = "event.timestamp")]
    Timestamp,

    #[display(fmt = "event.stream_id")]
    StreamId,
    #[display(fmt = "event.id")]
    Id,
    #[display(fmt = "event.log_level")]
    LogLevel,

    #[display(fmt = "event.header.{_0}")]
    Header(String),
    #[display(fmt = "event.common_context.{_0}")]
    CommonContext(String),
    #[display(fmt = "event.specific_context.{_0}")]
    SpecificContext(String),
    #[display(fmt = "event.packet_context.{_0}")]
    PacketContext(String),

    #[display(fmt = "event.{_0}")]
    Field(String),
}
