use crate::attrs::{AttrValue, EventAttrKey};
use crate::declaration::{Declaration, IntegerDeclaration, StructDeclaration};
use crate::definition::{Definition, IntegerDefinition, StructDefinition};
use crate::error::Error;
use crate::metadata::EventDeclaration;
use crate::packet::Target;
use crate::scope::ScopeId;
use crate::types::{ByteOrder, Encoding};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name of the synthetic record reporting events dropped by the tracer.
pub const LOST_EVENT_NAME: &str = "Lost event";
/// Field of the synthetic record holding the number of dropped events.
pub const LOST_EVENTS_FIELD: &str = "Lost events";
/// Field of the synthetic record holding the time span the events were dropped in.
pub const LOST_EVENTS_DURATION_FIELD: &str = "duration";

/// One decoded event, or a synthetic lost-event record.
#[derive(Clone, Debug, PartialEq)]
pub struct EventDefinition {
    pub(crate) declaration: Option<Arc<EventDeclaration>>,
    pub(crate) name: String,
    pub(crate) stream_id: u64,
    pub(crate) timestamp: u64,
    pub(crate) packet_index: usize,
    pub(crate) target: Target,
    pub(crate) header: Option<Arc<Definition>>,
    pub(crate) stream_context: Option<Arc<Definition>>,
    pub(crate) context: Option<Arc<Definition>>,
    pub(crate) fields: Option<Arc<Definition>>,
    pub(crate) packet_context: Option<Arc<Definition>>,
    pub(crate) lost_events: Option<u64>,
}

impl EventDefinition {
    /// `None` for lost-event records.
    pub fn declaration(&self) -> Option<&Arc<EventDeclaration>> {
        self.declaration.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<u64> {
        self.declaration.as_ref().map(|d| d.id())
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Position of the event's packet in the stream's packet index.
    pub fn packet_index(&self) -> usize {
        self.packet_index
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn header(&self) -> Option<&Arc<Definition>> {
        self.header.as_ref()
    }

    pub fn stream_context(&self) -> Option<&Arc<Definition>> {
        self.stream_context.as_ref()
    }

    pub fn context(&self) -> Option<&Arc<Definition>> {
        self.context.as_ref()
    }

    pub fn fields(&self) -> Option<&Arc<Definition>> {
        self.fields.as_ref()
    }

    pub fn packet_context(&self) -> Option<&Arc<Definition>> {
        self.packet_context.as_ref()
    }

    pub fn field(&self, name: &str) -> Option<&Arc<Definition>> {
        self.fields
            .as_deref()
            .and_then(Definition::as_struct)
            .and_then(|s| s.field(name))
    }

    /// Number of dropped events a lost-event record stands for.
    pub fn lost_events(&self) -> Option<u64> {
        self.lost_events
    }

    pub fn is_lost_event(&self) -> bool {
        self.lost_events.is_some()
    }

    /// How many events this record accounts for: the dropped count for a
    /// lost-event record, one otherwise.
    pub fn event_count(&self) -> u64 {
        self.lost_events.unwrap_or(1)
    }

    /// Flatten the event into `key = value` attributes.
    pub fn attrs(&self) -> BTreeMap<EventAttrKey, AttrValue> {
        let mut attrs = BTreeMap::new();
        attrs.insert(EventAttrKey::Name, self.name.as_str().into());
        attrs.insert(EventAttrKey::Timestamp, self.timestamp.into());
        attrs.insert(EventAttrKey::StreamId, self.stream_id.into());
        if let Some(d) = &self.declaration {
            attrs.insert(EventAttrKey::Id, d.id().into());
            if let Some(ll) = d.log_level() {
                attrs.insert(EventAttrKey::LogLevel, ll.into());
            }
        }

        let sections: [(&Option<Arc<Definition>>, fn(String) -> EventAttrKey); 5] = [
            (&self.header, EventAttrKey::Header),
            (&self.stream_context, EventAttrKey::CommonContext),
            (&self.context, EventAttrKey::SpecificContext),
            (&self.packet_context, EventAttrKey::PacketContext),
            (&self.fields, EventAttrKey::Field),
        ];
        for (def, key) in sections {
            if let Some(def) = def {
                for (k, v) in FieldToAttrKeysGen::new().generate(def) {
                    attrs.insert(key(k), v);
                }
            }
        }
        attrs
    }
}

impl fmt::Display for EventDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}:", self.timestamp, self.name)?;
        let fields = self.fields.as_deref().and_then(Definition::as_struct);
        for (i, (name, def)) in fields.iter().flat_map(|s| s.fields()).enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{name} = {def}")?;
        }
        Ok(())
    }
}

/// Builds lost-event records for one stream.
#[derive(Clone, Debug)]
pub(crate) struct LostEventFactory {
    count: Arc<IntegerDeclaration>,
    fields: Arc<StructDeclaration>,
}

impl LostEventFactory {
    pub(crate) fn new(byte_order: ByteOrder) -> Result<Self, Error> {
        let count = IntegerDeclaration::new(64, false, byte_order)?;
        let fields = StructDeclaration::from_fields(
            8,
            vec![
                (LOST_EVENTS_FIELD, Declaration::from(count.clone())),
                (LOST_EVENTS_DURATION_FIELD, Declaration::from(count.clone())),
            ],
        )?;
        Ok(Self {
            count: Arc::new(count),
            fields: Arc::new(fields),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn record(
        &self,
        scope: ScopeId,
        stream_id: u64,
        packet_index: usize,
        target: Target,
        timestamp: u64,
        lost_events: u64,
        duration: u64,
        packet_context: Option<Arc<Definition>>,
    ) -> EventDefinition {
        let value = |raw| Arc::new(Definition::Integer(IntegerDefinition::new(self.count.clone(), 0, raw)));
        let fields = Definition::Struct(StructDefinition {
            declaration: self.fields.clone(),
            offset_bits: 0,
            scope,
            fields: vec![
                (LOST_EVENTS_FIELD.to_owned(), value(lost_events)),
                (LOST_EVENTS_DURATION_FIELD.to_owned(), value(duration)),
            ],
        });
        EventDefinition {
            declaration: None,
            name: LOST_EVENT_NAME.to_owned(),
            stream_id,
            timestamp,
            packet_index,
            target,
            header: None,
            stream_context: None,
            context: None,
            fields: Some(Arc::new(fields)),
            packet_context,
            lost_events: Some(lost_events),
        }
    }
}

/// Yields `(possibly.nested.key, value)` pairs for every scalar reachable from
/// a root structure.
#[derive(Debug, Default)]
struct FieldToAttrKeysGen {
    // Key components of the enclosing composites, the root structure is flattened out
    attr_key_stack: Vec<String>,
    attrs: Vec<(String, AttrValue)>,
}

impl FieldToAttrKeysGen {
    fn new() -> Self {
        Self::default()
    }

    fn generate(mut self, root: &Definition) -> Vec<(String, AttrValue)> {
        match root {
            Definition::Struct(s) => self.generate_struct(s),
            other => self.generate_inner("value", other),
        }
        self.attrs
    }

    fn generate_struct(&mut self, s: &StructDefinition) {
        for (name, def) in s.fields() {
            self.generate_inner(name, def);
        }
    }

    fn generate_inner(&mut self, name: &str, def: &Definition) {
        match def {
            Definition::Integer(i) => self.push(name, AttrValue::Integer(i.value())),
            Definition::Float(f) => self.push(name, AttrValue::Float(f.value())),
            Definition::String(s) => self.push(name, s.value().into()),
            // Enums get an extra `.label` attr when the value is mapped
            Definition::Enum(e) => {
                self.push(name, AttrValue::Integer(e.value()));
                if let Some(l) = e.label() {
                    self.begin_nested(name);
                    self.push("label", l.into());
                    self.end_nested();
                }
            }
            Definition::Struct(s) => {
                self.begin_nested(name);
                self.generate_struct(s);
                self.end_nested();
            }
            Definition::Array(_) | Definition::Sequence(_) => {
                if is_text(def) {
                    // Encoded byte arrays render as a quoted string
                    let text = def.to_string();
                    self.push(name, text.trim_matches('"').into());
                } else {
                    self.begin_nested(name);
                    for (i, e) in def.elements().unwrap_or_default().iter().enumerate() {
                        self.generate_inner(&i.to_string(), e);
                    }
                    self.end_nested();
                }
            }
            Definition::Variant(v) => {
                self.begin_nested(name);
                self.generate_inner(v.current_field_name(), v.current_field());
                self.end_nested();
            }
        }
    }

    fn push(&mut self, name: &str, value: AttrValue) {
        let key = self
            .attr_key_stack
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name))
            .collect::<Vec<&str>>()
            .join(".");
        self.attrs.push((key, value));
    }

    fn begin_nested(&mut self, name: &str) {
        self.attr_key_stack.push(name.to_owned());
    }

    fn end_nested(&mut self) {
        let _ = self.attr_key_stack.pop();
    }
}

fn is_text(def: &Definition) -> bool {
    let element = match def {
        Definition::Array(a) => a.declaration().element(),
        Definition::Sequence(s) => s.declaration().element(),
        _ => return false,
    };
    matches!(element, Declaration::Integer(i) if i.size() == 8 && i.encoding() != Encoding::None)
}
