//! Decoded values.
//!
//! A [`Definition`] is the value produced by decoding a [`Declaration`] at a
//! specific bit offset of a packet. Composite definitions keep their children
//! behind `Arc` so the same node can be registered in the scope registry
//! without copying the tree.

use crate::declaration::{
    ArrayDeclaration, Declaration, EnumDeclaration, FloatDeclaration, IntegerDeclaration,
    SequenceDeclaration, StringDeclaration, StructDeclaration, VariantDeclaration,
};
use crate::scope::ScopeId;
use crate::types::Encoding;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum Definition {
    Integer(IntegerDefinition),
    Float(FloatDefinition),
    Enum(EnumDefinition),
    String(StringDefinition),
    Struct(StructDefinition),
    Array(ArrayDefinition),
    Sequence(SequenceDefinition),
    Variant(VariantDefinition),
}

impl Definition {
    pub fn offset_bits(&self) -> u64 {
        match self {
            Definition::Integer(d) => d.offset_bits,
            Definition::Float(d) => d.offset_bits,
            Definition::Enum(d) => d.offset_bits,
            Definition::String(d) => d.offset_bits,
            Definition::Struct(d) => d.offset_bits,
            Definition::Array(d) => d.offset_bits,
            Definition::Sequence(d) => d.offset_bits,
            Definition::Variant(d) => d.offset_bits,
        }
    }

    /// The declaration this value was decoded from.
    pub fn declaration(&self) -> Declaration {
        match self {
            Definition::Integer(d) => Declaration::Integer(d.declaration.clone()),
            Definition::Float(d) => Declaration::Float(d.declaration.clone()),
            Definition::Enum(d) => Declaration::Enum(d.declaration.clone()),
            Definition::String(d) => Declaration::String(d.declaration.clone()),
            Definition::Struct(d) => Declaration::Struct(d.declaration.clone()),
            Definition::Array(d) => Declaration::Array(d.declaration.clone()),
            Definition::Sequence(d) => Declaration::Sequence(d.declaration.clone()),
            Definition::Variant(d) => Declaration::Variant(d.declaration.clone()),
        }
    }

    /// Numeric value of an integer or enumeration definition.
    pub fn integer_value(&self) -> Option<i128> {
        match self {
            Definition::Integer(d) => Some(d.value()),
            Definition::Enum(d) => Some(d.value()),
            _ => None,
        }
    }

    /// Numeric value as an unsigned 64 bit integer, `None` when negative or not numeric.
    pub fn unsigned_value(&self) -> Option<u64> {
        self.integer_value().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_integer(&self) -> Option<&IntegerDefinition> {
        match self {
            Definition::Integer(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<&FloatDefinition> {
        match self {
            Definition::Float(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDefinition> {
        match self {
            Definition::Enum(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringDefinition> {
        match self {
            Definition::String(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructDefinition> {
        match self {
            Definition::Struct(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&VariantDefinition> {
        match self {
            Definition::Variant(d) => Some(d),
            _ => None,
        }
    }

    /// Elements of an array or sequence definition.
    pub fn elements(&self) -> Option<&[Arc<Definition>]> {
        match self {
            Definition::Array(d) => Some(&d.elements),
            Definition::Sequence(d) => Some(&d.elements),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntegerDefinition {
    pub(crate) declaration: Arc<IntegerDeclaration>,
    pub(crate) offset_bits: u64,
    /// Raw bit pattern, sign extended to 64 bits for signed declarations
    pub(crate) raw: u64,
}

impl IntegerDefinition {
    pub fn new(declaration: Arc<IntegerDeclaration>, offset_bits: u64, raw: u64) -> Self {
        Self {
            declaration,
            offset_bits,
            raw,
        }
    }

    pub fn declaration(&self) -> &Arc<IntegerDeclaration> {
        &self.declaration
    }

    pub fn offset_bits(&self) -> u64 {
        self.offset_bits
    }

    pub fn value(&self) -> i128 {
        if self.declaration.is_signed() {
            i128::from(self.raw as i64)
        } else {
            i128::from(self.raw)
        }
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FloatDefinition {
    pub(crate) declaration: Arc<FloatDeclaration>,
    pub(crate) offset_bits: u64,
    pub(crate) value: f64,
}

impl FloatDefinition {
    pub fn declaration(&self) -> &Arc<FloatDeclaration> {
        &self.declaration
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDefinition {
    pub(crate) declaration: Arc<EnumDeclaration>,
    pub(crate) offset_bits: u64,
    pub(crate) integer: IntegerDefinition,
    pub(crate) label: Option<String>,
}

impl EnumDefinition {
    pub fn declaration(&self) -> &Arc<EnumDeclaration> {
        &self.declaration
    }

    pub fn value(&self) -> i128 {
        self.integer.value()
    }

    pub fn integer(&self) -> &IntegerDefinition {
        &self.integer
    }

    /// `None` when the value is not covered by any mapping.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StringDefinition {
    pub(crate) declaration: Arc<StringDeclaration>,
    pub(crate) offset_bits: u64,
    pub(crate) value: String,
}

impl StringDefinition {
    pub fn new(declaration: Arc<StringDeclaration>, offset_bits: u64, value: String) -> Self {
        Self {
            declaration,
            offset_bits,
            value,
        }
    }

    pub fn declaration(&self) -> &Arc<StringDeclaration> {
        &self.declaration
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDefinition {
    pub(crate) declaration: Arc<StructDeclaration>,
    pub(crate) offset_bits: u64,
    pub(crate) scope: ScopeId,
    pub(crate) fields: Vec<(String, Arc<Definition>)>,
}

impl StructDefinition {
    pub fn declaration(&self) -> &Arc<StructDeclaration> {
        &self.declaration
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn fields(&self) -> &[(String, Arc<Definition>)] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&Arc<Definition>> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn lookup_integer(&self, name: &str) -> Option<&IntegerDefinition> {
        self.field(name).and_then(|d| d.as_integer())
    }

    pub fn lookup_float(&self, name: &str) -> Option<&FloatDefinition> {
        self.field(name).and_then(|d| d.as_float())
    }

    pub fn lookup_enum(&self, name: &str) -> Option<&EnumDefinition> {
        self.field(name).and_then(|d| d.as_enum())
    }

    pub fn lookup_string(&self, name: &str) -> Option<&StringDefinition> {
        self.field(name).and_then(|d| d.as_string())
    }

    pub fn lookup_struct(&self, name: &str) -> Option<&StructDefinition> {
        self.field(name).and_then(|d| d.as_struct())
    }

    pub fn lookup_variant(&self, name: &str) -> Option<&VariantDefinition> {
        self.field(name).and_then(|d| d.as_variant())
    }

    /// Elements of an array or sequence field.
    pub fn lookup_array(&self, name: &str) -> Option<&[Arc<Definition>]> {
        self.field(name).and_then(|d| d.elements())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayDefinition {
    pub(crate) declaration: Arc<ArrayDeclaration>,
    pub(crate) offset_bits: u64,
    pub(crate) scope: ScopeId,
    pub(crate) elements: Vec<Arc<Definition>>,
}

impl ArrayDefinition {
    pub fn declaration(&self) -> &Arc<ArrayDeclaration> {
        &self.declaration
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn elements(&self) -> &[Arc<Definition>] {
        &self.elements
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SequenceDefinition {
    pub(crate) declaration: Arc<SequenceDeclaration>,
    pub(crate) offset_bits: u64,
    pub(crate) scope: ScopeId,
    pub(crate) elements: Vec<Arc<Definition>>,
}

impl SequenceDefinition {
    pub fn declaration(&self) -> &Arc<SequenceDeclaration> {
        &self.declaration
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn elements(&self) -> &[Arc<Definition>] {
        &self.elements
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantDefinition {
    pub(crate) declaration: Arc<VariantDeclaration>,
    pub(crate) offset_bits: u64,
    pub(crate) scope: ScopeId,
    pub(crate) label: String,
    pub(crate) current: Arc<Definition>,
}

impl VariantDefinition {
    pub fn declaration(&self) -> &Arc<VariantDeclaration> {
        &self.declaration
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Label of the selected alternative, the tag's label at decode time.
    pub fn current_field_name(&self) -> &str {
        &self.label
    }

    pub fn current_field(&self) -> &Arc<Definition> {
        &self.current
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Integer(d) => fmt::Display::fmt(d, f),
            Definition::Float(d) => write!(f, "{}", d.value),
            Definition::Enum(d) => match &d.label {
                Some(l) => write!(f, "{{ value = {l}, container = {} }}", d.integer),
                None => write!(f, "{{ container = {} }}", d.integer),
            },
            Definition::String(d) => write!(f, "\"{}\"", d.value),
            Definition::Struct(d) => {
                write!(f, "{{ ")?;
                for (i, (name, def)) in d.fields.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} = {def}")?;
                }
                write!(f, " }}")
            }
            Definition::Array(d) => fmt_elements(d.declaration.element(), &d.elements, f),
            Definition::Sequence(d) => fmt_elements(d.declaration.element(), &d.elements, f),
            Definition::Variant(d) => write!(f, "{{ {} = {} }}", d.label, d.current),
        }
    }
}

impl fmt::Display for IntegerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = self.raw & self.declaration.max_value();
        match self.declaration.base() {
            2 => write!(f, "0b{masked:b}"),
            8 => write!(f, "0o{masked:o}"),
            16 => write!(f, "0x{masked:x}"),
            _ => write!(f, "{}", self.value()),
        }
    }
}

/// Byte arrays carrying an encoding render as text up to the first NUL.
fn fmt_elements(
    element: &Declaration,
    elements: &[Arc<Definition>],
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    if let Declaration::Integer(int) = element {
        if int.size() == 8 && int.encoding() != Encoding::None {
            let bytes: Vec<u8> = elements
                .iter()
                .filter_map(|e| e.as_integer().map(|i| i.raw as u8))
                .take_while(|b| *b != 0)
                .collect();
            return write!(f, "\"{}\"", String::from_utf8_lossy(&bytes));
        }
    }
    write!(f, "[")?;
    for (i, e) in elements.iter().enumerate() {
        if i != 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    write!(f, "]")
}
