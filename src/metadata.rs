//! Trace, stream and event declarations as handed over by the metadata layer.

use crate::declaration::{Declaration, IntegerDeclaration, StringDeclaration};
use crate::definition::{Definition, IntegerDefinition, StringDefinition};
use crate::error::Error;
use crate::scope::{DynamicScope, ScopeTree};
use crate::types::ByteOrder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Magic number found at the start of every packet header declaring a `magic` field.
pub const CTF_MAGIC: u64 = 0xC1FC_1FC1;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Integer(i64),
    String(String),
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Integer(v) => write!(f, "{v}"),
            EnvValue::String(v) => write!(f, "\"{v}\""),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventDeclaration {
    id: u64,
    name: String,
    context: Option<Declaration>,
    fields: Option<Declaration>,
    log_level: Option<i64>,
}

impl EventDeclaration {
    pub fn new<S: Into<String>>(id: u64, name: S) -> Self {
        Self {
            id,
            name: name.into(),
            context: None,
            fields: None,
            log_level: None,
        }
    }

    pub fn with_context(mut self, context: Declaration) -> Result<Self, Error> {
        self.context = Some(expect_struct(DynamicScope::EventContext, context)?);
        Ok(self)
    }

    pub fn with_fields(mut self, fields: Declaration) -> Result<Self, Error> {
        self.fields = Some(expect_struct(DynamicScope::EventFields, fields)?);
        Ok(self)
    }

    pub fn with_log_level(mut self, log_level: i64) -> Self {
        self.log_level = Some(log_level);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> Option<&Declaration> {
        self.context.as_ref()
    }

    pub fn fields(&self) -> Option<&Declaration> {
        self.fields.as_ref()
    }

    pub fn log_level(&self) -> Option<i64> {
        self.log_level
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StreamDeclaration {
    id: u64,
    packet_context: Option<Declaration>,
    event_header: Option<Declaration>,
    event_context: Option<Declaration>,
    events: BTreeMap<u64, Arc<EventDeclaration>>,
}

impl StreamDeclaration {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            packet_context: None,
            event_header: None,
            event_context: None,
            events: BTreeMap::new(),
        }
    }

    pub fn with_packet_context(mut self, decl: Declaration) -> Result<Self, Error> {
        self.packet_context = Some(expect_struct(DynamicScope::StreamPacketContext, decl)?);
        Ok(self)
    }

    pub fn with_event_header(mut self, decl: Declaration) -> Result<Self, Error> {
        self.event_header = Some(expect_struct(DynamicScope::StreamEventHeader, decl)?);
        Ok(self)
    }

    pub fn with_event_context(mut self, decl: Declaration) -> Result<Self, Error> {
        self.event_context = Some(expect_struct(DynamicScope::StreamEventContext, decl)?);
        Ok(self)
    }

    pub fn add_event(mut self, event: EventDeclaration) -> Result<Self, Error> {
        if self.events.contains_key(&event.id) {
            return Err(Error::malformed(format!(
                "stream {} already declares an event with ID {}",
                self.id, event.id
            )));
        }
        self.events.insert(event.id, Arc::new(event));
        Ok(self)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn packet_context(&self) -> Option<&Declaration> {
        self.packet_context.as_ref()
    }

    pub fn event_header(&self) -> Option<&Declaration> {
        self.event_header.as_ref()
    }

    pub fn event_context(&self) -> Option<&Declaration> {
        self.event_context.as_ref()
    }

    pub fn events(&self) -> &BTreeMap<u64, Arc<EventDeclaration>> {
        &self.events
    }

    pub fn event(&self, id: u64) -> Option<&Arc<EventDeclaration>> {
        self.events.get(&id)
    }

    /// The event class used when an event header carries no ID.
    pub fn single_event(&self) -> Option<&Arc<EventDeclaration>> {
        if self.events.len() == 1 {
            self.events.values().next()
        } else {
            None
        }
    }
}

/// Everything the decoder needs to know about a trace.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceMetadata {
    byte_order: ByteOrder,
    uuid: Option<Uuid>,
    env: BTreeMap<String, EnvValue>,
    packet_header: Option<Declaration>,
    streams: BTreeMap<u64, Arc<StreamDeclaration>>,
}

impl TraceMetadata {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            uuid: None,
            env: BTreeMap::new(),
            packet_header: None,
            streams: BTreeMap::new(),
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn with_env<S: Into<String>>(mut self, key: S, value: EnvValue) -> Self {
        self.env.insert(key.into(), value);
        self
    }

    pub fn with_packet_header(mut self, decl: Declaration) -> Result<Self, Error> {
        self.packet_header = Some(expect_struct(DynamicScope::TracePacketHeader, decl)?);
        Ok(self)
    }

    pub fn add_stream(mut self, stream: StreamDeclaration) -> Result<Self, Error> {
        if self.streams.contains_key(&stream.id) {
            return Err(Error::malformed(format!(
                "the trace already declares a stream with ID {}",
                stream.id
            )));
        }
        self.streams.insert(stream.id, Arc::new(stream));
        Ok(self)
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn env(&self) -> &BTreeMap<String, EnvValue> {
        &self.env
    }

    pub fn packet_header(&self) -> Option<&Declaration> {
        self.packet_header.as_ref()
    }

    pub fn streams(&self) -> &BTreeMap<u64, Arc<StreamDeclaration>> {
        &self.streams
    }

    pub fn stream(&self, id: u64) -> Result<&Arc<StreamDeclaration>, Error> {
        self.streams.get(&id).ok_or(Error::UnknownStreamId(id))
    }

    /// The stream class used when a packet header carries no stream ID.
    pub fn single_stream(&self) -> Result<&Arc<StreamDeclaration>, Error> {
        if self.streams.len() == 1 {
            self.streams.values().next().ok_or(Error::UnknownStreamId(0))
        } else {
            self.stream(0)
        }
    }

    /// Register the environment entries under the `env` scope root.
    pub fn bind_env(&self, scopes: &mut ScopeTree) -> Result<(), Error> {
        let root = scopes.root(DynamicScope::Env);
        scopes.clear_children(root);

        let int_decl = Arc::new(IntegerDeclaration::new(64, true, self.byte_order)?);
        let str_decl = Arc::new(StringDeclaration::default());
        for (key, value) in self.env.iter() {
            let def = match value {
                EnvValue::Integer(v) => {
                    Definition::Integer(IntegerDefinition::new(int_decl.clone(), 0, *v as u64))
                }
                EnvValue::String(s) => {
                    Definition::String(StringDefinition::new(str_decl.clone(), 0, s.clone()))
                }
            };
            let node = scopes.add_child(root, key);
            scopes.bind(node, Arc::new(def));
        }
        Ok(())
    }
}

fn expect_struct(scope: DynamicScope, decl: Declaration) -> Result<Declaration, Error> {
    if decl.as_struct().is_some() {
        Ok(decl)
    } else {
        Err(Error::malformed(format!(
            "the {scope} scope must be a structure, found {}",
            decl.kind()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::StructDeclaration;
    use crate::scope::resolve;
    use pretty_assertions::assert_eq;

    fn u32_decl() -> Declaration {
        IntegerDeclaration::new(32, false, ByteOrder::LittleEndian)
            .unwrap()
            .into()
    }

    #[test]
    fn dynamic_scopes_must_be_structures() {
        match StreamDeclaration::new(0).with_packet_context(u32_decl()) {
            Err(Error::MalformedDeclaration(msg)) => assert_eq!(
                msg,
                "the stream.packet.context scope must be a structure, found integer"
            ),
            other => panic!("unexpected result {other:?}"),
        }
        let s: Declaration = StructDeclaration::from_fields(8, vec![("id", u32_decl())])
            .unwrap()
            .into();
        assert!(EventDeclaration::new(0, "e").with_fields(s).is_ok());
    }

    #[test]
    fn duplicate_ids() {
        let stream = StreamDeclaration::new(0)
            .add_event(EventDeclaration::new(1, "a"))
            .unwrap();
        assert!(stream.clone().add_event(EventDeclaration::new(1, "b")).is_err());
        assert_eq!(stream.single_event().unwrap().name(), "a");

        let trace = TraceMetadata::new(ByteOrder::LittleEndian)
            .add_stream(stream)
            .unwrap();
        assert!(trace.clone().add_stream(StreamDeclaration::new(0)).is_err());
        assert_eq!(trace.single_stream().unwrap().id(), 0);
        assert!(matches!(trace.stream(4), Err(Error::UnknownStreamId(4))));
    }

    #[test]
    fn env_scope() {
        let trace = TraceMetadata::new(ByteOrder::LittleEndian)
            .with_env("tracer_major", EnvValue::Integer(2))
            .with_env("hostname", EnvValue::String("box".to_owned()));
        let mut scopes = ScopeTree::new();
        trace.bind_env(&mut scopes).unwrap();
        let start = scopes.root(DynamicScope::EventFields);

        assert_eq!(
            resolve(&scopes, start, "env.tracer_major")
                .unwrap()
                .integer_value(),
            Some(2)
        );
        assert_eq!(
            resolve(&scopes, start, "env.hostname")
                .unwrap()
                .as_string()
                .unwrap()
                .value(),
            "box"
        );
        assert!(resolve(&scopes, start, "env.missing").is_err());
    }
}
