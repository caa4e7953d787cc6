//! The decode protocol: turn a [`Declaration`] plus a [`BitCursor`] position
//! into a [`Definition`], registering every decoded field in the scope
//! registry as it goes.
//!
//! Structure fields are decoded strictly in declaration order and each one is
//! bound in the registry before the next starts. That ordering is what lets a
//! sequence or variant reference an earlier sibling, and what makes a
//! reference to a later one fail.

use crate::cursor::BitCursor;
use crate::declaration::{Declaration, IntegerDeclaration};
use crate::definition::{
    ArrayDefinition, Definition, EnumDefinition, FloatDefinition, IntegerDefinition,
    SequenceDefinition, StringDefinition, StructDefinition, VariantDefinition,
};
use crate::error::Error;
use crate::scope::{DynamicScope, ScopeId, ScopeTree};
use std::sync::Arc;

impl Declaration {
    /// Decode a value of this declaration as the field `field_name` of the
    /// scope `parent`.
    pub fn decode(
        &self,
        scopes: &mut ScopeTree,
        parent: ScopeId,
        field_name: &str,
        cursor: &mut BitCursor<'_>,
    ) -> Result<Arc<Definition>, Error> {
        cursor.align(self.alignment())?;
        let node = scopes.add_child(parent, field_name);
        self.decode_node(scopes, node, cursor)
    }

    /// Decode a value of this declaration as the content of a dynamic scope
    /// root, replacing whatever that root held before.
    pub fn decode_root(
        &self,
        scopes: &mut ScopeTree,
        root: DynamicScope,
        cursor: &mut BitCursor<'_>,
    ) -> Result<Arc<Definition>, Error> {
        cursor.align(self.alignment())?;
        let node = scopes.root(root);
        scopes.clear_children(node);
        self.decode_node(scopes, node, cursor)
    }

    fn decode_node(
        &self,
        scopes: &mut ScopeTree,
        node: ScopeId,
        cursor: &mut BitCursor<'_>,
    ) -> Result<Arc<Definition>, Error> {
        let offset_bits = cursor.position();
        let def = match self {
            Declaration::Integer(d) => Definition::Integer(decode_integer(d, cursor)?),
            Declaration::Float(d) => Definition::Float(FloatDefinition {
                declaration: d.clone(),
                offset_bits,
                value: cursor.read_float(d.exponent_bits(), d.mantissa_bits(), d.byte_order())?,
            }),
            Declaration::Enum(d) => {
                let integer = decode_integer(d.container(), cursor)?;
                let label = d.label(integer.value()).map(str::to_owned);
                Definition::Enum(EnumDefinition {
                    declaration: d.clone(),
                    offset_bits,
                    integer,
                    label,
                })
            }
            Declaration::String(d) => Definition::String(StringDefinition {
                declaration: d.clone(),
                offset_bits,
                value: cursor.read_string(d.encoding())?,
            }),
            Declaration::Struct(d) => {
                let mut fields = Vec::with_capacity(d.fields().len());
                for (name, decl) in d.fields() {
                    let f = decl.decode(scopes, node, name, cursor)?;
                    fields.push((name.clone(), f));
                }
                Definition::Struct(StructDefinition {
                    declaration: d.clone(),
                    offset_bits,
                    scope: node,
                    fields,
                })
            }
            Declaration::Array(d) => {
                let elements = decode_elements(d.element(), d.length(), scopes, node, cursor)?;
                Definition::Array(ArrayDefinition {
                    declaration: d.clone(),
                    offset_bits,
                    scope: node,
                    elements,
                })
            }
            Declaration::Sequence(d) => {
                let length = scopes
                    .lookup(node, d.length_path())
                    .and_then(|l| l.unsigned_value())
                    .ok_or_else(|| Error::ScopeResolution {
                        path: d.length_path().to_owned(),
                        expected: "unsigned integer",
                    })?;
                let elements = decode_elements(d.element(), length, scopes, node, cursor)?;
                Definition::Sequence(SequenceDefinition {
                    declaration: d.clone(),
                    offset_bits,
                    scope: node,
                    elements,
                })
            }
            Declaration::Variant(d) => {
                let tag = scopes
                    .lookup(node, d.tag_path())
                    .filter(|t| t.as_enum().is_some())
                    .ok_or_else(|| Error::ScopeResolution {
                        path: d.tag_path().to_owned(),
                        expected: "enumeration",
                    })?;
                let label = tag
                    .as_enum()
                    .and_then(|e| e.label())
                    .map(str::to_owned)
                    .ok_or_else(|| Error::VariantSelection {
                        tag: d.tag_path().to_owned(),
                        label: None,
                    })?;
                let selected = d.option(&label).ok_or_else(|| Error::VariantSelection {
                    tag: d.tag_path().to_owned(),
                    label: Some(label.clone()),
                })?;
                let current = selected.decode(scopes, node, &label, cursor)?;
                Definition::Variant(VariantDefinition {
                    declaration: d.clone(),
                    offset_bits,
                    scope: node,
                    label,
                    current,
                })
            }
        };

        let def = Arc::new(def);
        scopes.bind(node, def.clone());
        Ok(def)
    }
}

fn decode_integer(
    decl: &Arc<IntegerDeclaration>,
    cursor: &mut BitCursor<'_>,
) -> Result<IntegerDefinition, Error> {
    let offset_bits = cursor.position();
    let raw = if decl.is_signed() {
        cursor.read_signed(decl.size(), decl.byte_order())? as u64
    } else {
        cursor.read_unsigned(decl.size(), decl.byte_order())?
    };
    Ok(IntegerDefinition::new(decl.clone(), offset_bits, raw))
}

fn decode_elements(
    element: &Declaration,
    length: u64,
    scopes: &mut ScopeTree,
    node: ScopeId,
    cursor: &mut BitCursor<'_>,
) -> Result<Vec<Arc<Definition>>, Error> {
    // Elements may be zero bits wide, the remaining bits only bound the hint
    let mut elements = Vec::with_capacity(length.min(cursor.remaining()) as usize);
    for i in 0..length {
        elements.push(element.decode(scopes, node, &i.to_string(), cursor)?);
    }
    Ok(elements)
}
