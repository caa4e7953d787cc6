use derive_more::Display;
use serde::Deserialize;
use std::convert::TryFrom;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::Arc;

#[derive(Clone, Debug)]
#[repr(transparent)]
pub struct Interruptor(Arc<AtomicBool>);

impl Interruptor {
    pub fn new() -> Self {
        Interruptor(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(SeqCst)
    }
}

impl Default for Interruptor {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte order of a scalar field.
///
/// Also decides the bit order of fields that are not byte aligned: little-endian
/// fields are filled from the least significant bit of each byte, big-endian
/// fields from the most significant bit.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Deserialize)]
#[serde(try_from = "String")]
pub enum ByteOrder {
    #[display(fmt = "le")]
    LittleEndian,
    #[display(fmt = "be")]
    BigEndian,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::native()
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "le" | "little" | "little-endian" => Ok(ByteOrder::LittleEndian),
            "be" | "big" | "big-endian" | "network" => Ok(ByteOrder::BigEndian),
            "native" => Ok(ByteOrder::native()),
            _ => Err(format!("'{s}' is not a valid byte order")),
        }
    }
}

impl TryFrom<String> for ByteOrder {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        ByteOrder::from_str(&s)
    }
}

/// Character encoding of strings and of integer arrays holding text.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Deserialize, Default)]
#[serde(try_from = "String")]
pub enum Encoding {
    #[default]
    #[display(fmt = "none")]
    None,
    #[display(fmt = "UTF8")]
    Utf8,
    #[display(fmt = "ASCII")]
    Ascii,
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Encoding::None),
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "ascii" => Ok(Encoding::Ascii),
            _ => Err(format!("'{s}' is not a valid encoding")),
        }
    }
}

impl TryFrom<String> for Encoding {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        Encoding::from_str(&s)
    }
}

/// What to do when a packet's cumulative discarded-event counter is lower than
/// the number of lost events already accounted for (counter reset, or packets
/// written out of order).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Deserialize, Default)]
#[serde(try_from = "String")]
pub enum LostEventsPolicy {
    /// Log a warning and report zero lost events for the packet
    #[default]
    #[display(fmt = "clamp")]
    Clamp,
    /// Fail index construction with `Error::InconsistentLostEvents`
    #[display(fmt = "error")]
    Error,
}

impl FromStr for LostEventsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clamp" => Ok(LostEventsPolicy::Clamp),
            "error" => Ok(LostEventsPolicy::Error),
            _ => Err(format!(
                "'{s}' is not a valid lost events policy, expected 'clamp' or 'error'"
            )),
        }
    }
}

impl TryFrom<String> for LostEventsPolicy {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        LostEventsPolicy::from_str(&s)
    }
}
