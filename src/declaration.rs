//! Immutable schema nodes describing how a field is laid out in a packet.
//!
//! Declarations are built once from the trace metadata and shared by every
//! stream input through reference counting. The constructors validate the
//! layout invariants and fail with [`Error::MalformedDeclaration`].

use crate::error::Error;
use crate::types::{ByteOrder, Encoding};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum Declaration {
    Integer(Arc<IntegerDeclaration>),
    Float(Arc<FloatDeclaration>),
    Enum(Arc<EnumDeclaration>),
    String(Arc<StringDeclaration>),
    Struct(Arc<StructDeclaration>),
    Array(Arc<ArrayDeclaration>),
    Sequence(Arc<SequenceDeclaration>),
    Variant(Arc<VariantDeclaration>),
}

impl Declaration {
    /// Alignment in bits applied before decoding a value of this declaration.
    pub fn alignment(&self) -> u64 {
        match self {
            Declaration::Integer(d) => d.alignment(),
            Declaration::Float(d) => d.alignment(),
            Declaration::Enum(d) => d.container().alignment(),
            Declaration::String(_) => 8,
            Declaration::Struct(d) => d.alignment(),
            Declaration::Array(d) => d.element().alignment(),
            Declaration::Sequence(d) => d.element().alignment(),
            // The selected alternative aligns itself.
            Declaration::Variant(_) => 1,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Declaration::Integer(_) => "integer",
            Declaration::Float(_) => "floating point",
            Declaration::Enum(_) => "enumeration",
            Declaration::String(_) => "string",
            Declaration::Struct(_) => "structure",
            Declaration::Array(_) => "array",
            Declaration::Sequence(_) => "sequence",
            Declaration::Variant(_) => "variant",
        }
    }

    pub fn as_struct(&self) -> Option<&Arc<StructDeclaration>> {
        match self {
            Declaration::Struct(d) => Some(d),
            _ => None,
        }
    }
}

impl From<IntegerDeclaration> for Declaration {
    fn from(d: IntegerDeclaration) -> Self {
        Declaration::Integer(Arc::new(d))
    }
}

impl From<FloatDeclaration> for Declaration {
    fn from(d: FloatDeclaration) -> Self {
        Declaration::Float(Arc::new(d))
    }
}

impl From<EnumDeclaration> for Declaration {
    fn from(d: EnumDeclaration) -> Self {
        Declaration::Enum(Arc::new(d))
    }
}

impl From<StringDeclaration> for Declaration {
    fn from(d: StringDeclaration) -> Self {
        Declaration::String(Arc::new(d))
    }
}

impl From<StructDeclaration> for Declaration {
    fn from(d: StructDeclaration) -> Self {
        Declaration::Struct(Arc::new(d))
    }
}

impl From<ArrayDeclaration> for Declaration {
    fn from(d: ArrayDeclaration) -> Self {
        Declaration::Array(Arc::new(d))
    }
}

impl From<SequenceDeclaration> for Declaration {
    fn from(d: SequenceDeclaration) -> Self {
        Declaration::Sequence(Arc::new(d))
    }
}

impl From<VariantDeclaration> for Declaration {
    fn from(d: VariantDeclaration) -> Self {
        Declaration::Variant(Arc::new(d))
    }
}

/// Display base of an integer, only used when rendering values.
pub const VALID_BASES: [u32; 4] = [2, 8, 10, 16];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegerDeclaration {
    size: u32,
    signed: bool,
    byte_order: ByteOrder,
    base: u32,
    alignment: u64,
    encoding: Encoding,
}

impl IntegerDeclaration {
    /// Byte aligned when the size is a multiple of 8, bit aligned otherwise.
    pub fn new(size: u32, signed: bool, byte_order: ByteOrder) -> Result<Self, Error> {
        let alignment = if size % 8 == 0 { 8 } else { 1 };
        Self::with_layout(size, signed, byte_order, 10, alignment, Encoding::None)
    }

    pub fn with_layout(
        size: u32,
        signed: bool,
        byte_order: ByteOrder,
        base: u32,
        alignment: u64,
        encoding: Encoding,
    ) -> Result<Self, Error> {
        if size == 0 || size > 64 {
            return Err(Error::malformed(format!(
                "integer size must be between 1 and 64 bits, got {size}"
            )));
        }
        if alignment == 0 {
            return Err(Error::malformed("integer alignment must be positive"));
        }
        if !VALID_BASES.contains(&base) {
            return Err(Error::malformed(format!("invalid integer base {base}")));
        }
        Ok(Self {
            size,
            signed,
            byte_order,
            base,
            alignment,
            encoding,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Largest value representable by this declaration, as an unsigned bit pattern.
    pub fn max_value(&self) -> u64 {
        if self.size == 64 {
            u64::MAX
        } else {
            (1_u64 << self.size) - 1
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloatDeclaration {
    exponent_bits: u32,
    mantissa_bits: u32,
    byte_order: ByteOrder,
    alignment: u64,
}

impl FloatDeclaration {
    /// `mantissa_bits` counts the implicit leading bit (24 for binary32, 53 for binary64).
    pub fn new(
        exponent_bits: u32,
        mantissa_bits: u32,
        byte_order: ByteOrder,
        alignment: u64,
    ) -> Result<Self, Error> {
        match (exponent_bits, mantissa_bits) {
            (8, 24) | (11, 53) => (),
            _ => {
                return Err(Error::malformed(format!(
                    "unsupported floating point layout: {exponent_bits} exponent bits, {mantissa_bits} mantissa bits"
                )))
            }
        }
        if alignment == 0 {
            return Err(Error::malformed("floating point alignment must be positive"));
        }
        Ok(Self {
            exponent_bits,
            mantissa_bits,
            byte_order,
            alignment,
        })
    }

    pub fn exponent_bits(&self) -> u32 {
        self.exponent_bits
    }

    pub fn mantissa_bits(&self) -> u32 {
        self.mantissa_bits
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumMapping {
    pub low: i128,
    pub high: i128,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDeclaration {
    container: Arc<IntegerDeclaration>,
    mappings: Vec<EnumMapping>,
}

impl EnumDeclaration {
    pub fn new(container: IntegerDeclaration) -> Self {
        Self {
            container: Arc::new(container),
            mappings: Vec::new(),
        }
    }

    /// Append an inclusive value range mapped to `label`. Ranges may overlap,
    /// the first one added wins at lookup time.
    pub fn add<S: Into<String>>(mut self, low: i128, high: i128, label: S) -> Result<Self, Error> {
        let label = label.into();
        if low > high {
            return Err(Error::malformed(format!(
                "enumeration range for '{label}' is inverted ({low} > {high})"
            )));
        }
        self.mappings.push(EnumMapping { low, high, label });
        Ok(self)
    }

    pub fn container(&self) -> &Arc<IntegerDeclaration> {
        &self.container
    }

    pub fn mappings(&self) -> &[EnumMapping] {
        &self.mappings
    }

    pub fn label(&self, value: i128) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.low <= value && value <= m.high)
            .map(|m| m.label.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringDeclaration {
    encoding: Encoding,
}

impl StringDeclaration {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Default for StringDeclaration {
    fn default() -> Self {
        Self::new(Encoding::Utf8)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDeclaration {
    fields: Vec<(String, Declaration)>,
    min_alignment: u64,
}

impl StructDeclaration {
    pub fn new(min_alignment: u64) -> Result<Self, Error> {
        if min_alignment == 0 {
            return Err(Error::malformed("structure alignment must be positive"));
        }
        Ok(Self {
            fields: Vec::new(),
            min_alignment,
        })
    }

    pub fn from_fields<I, S>(min_alignment: u64, fields: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (S, Declaration)>,
        S: Into<String>,
    {
        fields
            .into_iter()
            .try_fold(Self::new(min_alignment)?, |s, (name, decl)| {
                s.add_field(name, decl)
            })
    }

    pub fn add_field<S: Into<String>>(mut self, name: S, decl: Declaration) -> Result<Self, Error> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::malformed("structure field names must not be empty"));
        }
        if self.has_field(&name) {
            return Err(Error::malformed(format!(
                "structure already has a field named '{name}'"
            )));
        }
        self.fields.push((name, decl));
        Ok(self)
    }

    pub fn fields(&self) -> &[(String, Declaration)] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&Declaration> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn alignment(&self) -> u64 {
        self.fields
            .iter()
            .map(|(_, d)| d.alignment())
            .fold(self.min_alignment, u64::max)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayDeclaration {
    length: u64,
    element: Declaration,
}

impl ArrayDeclaration {
    pub fn new(length: u64, element: Declaration) -> Self {
        Self { length, element }
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn element(&self) -> &Declaration {
        &self.element
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SequenceDeclaration {
    length_path: String,
    element: Declaration,
}

impl SequenceDeclaration {
    pub fn new<S: Into<String>>(length_path: S, element: Declaration) -> Result<Self, Error> {
        let length_path = length_path.into();
        check_path(&length_path)?;
        Ok(Self {
            length_path,
            element,
        })
    }

    pub fn length_path(&self) -> &str {
        &self.length_path
    }

    pub fn element(&self) -> &Declaration {
        &self.element
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantDeclaration {
    tag_path: String,
    options: Vec<(String, Declaration)>,
}

impl VariantDeclaration {
    pub fn new<S: Into<String>>(tag_path: S) -> Result<Self, Error> {
        let tag_path = tag_path.into();
        check_path(&tag_path)?;
        Ok(Self {
            tag_path,
            options: Vec::new(),
        })
    }

    pub fn add_option<S: Into<String>>(mut self, label: S, decl: Declaration) -> Result<Self, Error> {
        let label = label.into();
        if self.option(&label).is_some() {
            return Err(Error::malformed(format!(
                "variant already has an alternative labeled '{label}'"
            )));
        }
        self.options.push((label, decl));
        Ok(self)
    }

    pub fn tag_path(&self) -> &str {
        &self.tag_path
    }

    pub fn options(&self) -> &[(String, Declaration)] {
        &self.options
    }

    pub fn option(&self, label: &str) -> Option<&Declaration> {
        self.options.iter().find(|(l, _)| l == label).map(|(_, d)| d)
    }
}

fn check_path(path: &str) -> Result<(), Error> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        Err(Error::malformed(format!("invalid field path '{path}'")))
    } else {
        Ok(())
    }
}
