//! Schema resolution: turns [`SchemaNode`] trees into reference-free [`Shape`]s.
//!
//! Resolution is a pure recursive descent. `$ref` pointers are followed into
//! the document's [`Definitions`]; the stack of definition names currently
//! being expanded is tracked so that reference cycles fail instead of
//! recursing forever. Each definition is resolved at most once per
//! [`Resolver`], and every reference to it shares the same [`Arc<Shape>`], so
//! the resolved tree stays linear in the size of the document.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::AbiError;
use crate::schema::{
    definition_name, AdditionalProperties, Constraints, Definitions, ObjectNode, Primitive,
    SchemaNode,
};

#[derive(Debug, Clone, PartialEq)]
/// Concrete value shape produced by resolution.
pub enum Shape {
    /// Unconstrained. Any JSON value conforms.
    Any,
    Null,
    Boolean,
    /// `integer` and `number` both resolve here.
    Number(Constraints),
    String(Constraints),
    /// Exactly one permitted value (`const`).
    Literal(JsonValue),
    /// Closed set of permitted values (`enum`), duplicates removed.
    Enum(Vec<JsonValue>),
    Object(ObjectShape),
    /// Fixed-length heterogeneous sequence.
    Tuple(Vec<Arc<Shape>>),
    /// Variable-length homogeneous sequence.
    List {
        items: Arc<Shape>,
        constraints: Constraints,
    },
    /// Value must match at least one alternative.
    Union(Vec<Arc<Shape>>),
    /// Value must match every member.
    Intersection(Vec<Arc<Shape>>),
}

impl Shape {
    /// Returns the permitted values of a closed shape (`const` or `enum`).
    pub fn closed_values(&self) -> Option<&[JsonValue]> {
        match self {
            Shape::Literal(value) => Some(std::slice::from_ref(value)),
            Shape::Enum(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectShape> {
        match self {
            Shape::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectShape {
    /// Declared fields in declaration order.
    pub properties: Vec<(String, PropertyShape)>,
    pub additional: AdditionalProperties<Arc<Shape>>,
}

impl ObjectShape {
    /// An object with no declared properties that accepts any fields.
    pub fn open() -> Self {
        Self {
            properties: Vec::new(),
            additional: AdditionalProperties::Untyped,
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyShape> {
        self.properties
            .iter()
            .find(|(declared, _)| declared == name)
            .map(|(_, prop)| prop)
    }

    pub fn required_names(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, prop)| prop.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn optional_names(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, prop)| !prop.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Overlays `later` onto `self`: fields declared by `later` replace
    /// same-named fields in place, new fields are appended, and its
    /// additional-fields policy replaces ours unless it is the default
    /// untyped policy.
    fn merge(mut self, later: ObjectShape) -> ObjectShape {
        for (name, prop) in later.properties {
            match self.properties.iter_mut().find(|(declared, _)| *declared == name) {
                Some(slot) => slot.1 = prop,
                None => self.properties.push((name, prop)),
            }
        }
        if later.additional != AdditionalProperties::Untyped {
            self.additional = later.additional;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyShape {
    pub shape: Arc<Shape>,
    pub required: bool,
}

/// Resolves `node` against `definitions`.
///
/// Fails only on a `$ref` that names a missing definition
/// ([`AbiError::UnresolvedReference`]) or on a reference cycle
/// ([`AbiError::CyclicReference`]).
pub fn resolve(node: &SchemaNode, definitions: &Definitions) -> Result<Shape, AbiError> {
    Resolver::new(definitions).resolve(node)
}

/// Parses and resolves a raw schema fragment.
pub fn resolve_json(schema: &JsonValue, definitions: &Definitions) -> Result<Shape, AbiError> {
    Resolver::new(definitions).resolve_json(schema)
}

/// Resolves schema nodes against one definitions table, memoizing every
/// definition it finishes so repeated references share one shape.
pub struct Resolver<'a> {
    definitions: &'a Definitions,
    resolved: HashMap<String, Arc<Shape>>,
    /// Definition names currently being expanded, outermost first.
    visiting: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(definitions: &'a Definitions) -> Self {
        Self {
            definitions,
            resolved: HashMap::new(),
            visiting: Vec::new(),
        }
    }

    pub fn resolve_json(&mut self, schema: &JsonValue) -> Result<Shape, AbiError> {
        self.resolve(&SchemaNode::parse(schema))
    }

    pub fn resolve(&mut self, node: &SchemaNode) -> Result<Shape, AbiError> {
        match node {
            SchemaNode::Reference(pointer) => {
                self.resolve_reference(pointer).map(Arc::unwrap_or_clone)
            }
            SchemaNode::Constant(value) => Ok(Shape::Literal(value.clone())),
            SchemaNode::Enumeration(members) => Ok(Shape::Enum(dedup(members.clone()))),
            SchemaNode::Intersection(members) => self.resolve_intersection(members),
            SchemaNode::MultiPrimitive(alternatives) => {
                let mut shapes = Vec::new();
                for alternative in alternatives {
                    let shape = self.resolve(alternative)?;
                    if !shapes.contains(&shape) {
                        shapes.push(shape);
                    }
                }
                Ok(collapse_union(shapes))
            }
            SchemaNode::Object(obj) => self.resolve_object(obj).map(Shape::Object),
            SchemaNode::Tuple(elements) => Ok(Shape::Tuple(
                elements
                    .iter()
                    .map(|element| self.resolve_shared(element))
                    .collect::<Result<_, _>>()?,
            )),
            SchemaNode::List { items, constraints } => {
                let items = match items {
                    Some(item) => self.resolve_shared(item)?,
                    None => Arc::new(Shape::Any),
                };
                Ok(Shape::List {
                    items,
                    constraints: constraints.clone(),
                })
            }
            SchemaNode::Primitive {
                primitive,
                constraints,
            } => Ok(primitive_shape(*primitive, constraints)),
            SchemaNode::Union(alternatives) => {
                let resolved = alternatives
                    .iter()
                    .map(|alt| self.resolve_shared(alt))
                    .collect::<Result<Vec<_>, _>>()?;
                if resolved.is_empty() {
                    return Ok(Shape::Any);
                }
                Ok(Shape::Union(resolved))
            }
            SchemaNode::Unknown => Ok(Shape::Any),
        }
    }

    /// Resolves a child position, reusing the memoized shape for references.
    fn resolve_shared(&mut self, node: &SchemaNode) -> Result<Arc<Shape>, AbiError> {
        match node {
            SchemaNode::Reference(pointer) => self.resolve_reference(pointer),
            other => self.resolve(other).map(Arc::new),
        }
    }

    fn resolve_reference(&mut self, pointer: &str) -> Result<Arc<Shape>, AbiError> {
        let unresolved = || AbiError::UnresolvedReference {
            reference: pointer.to_string(),
        };
        let definitions = self.definitions;
        let name = definition_name(pointer).ok_or_else(unresolved)?;
        let target = definitions.get(name).ok_or_else(unresolved)?;

        // A finished definition reaches no cycle, whatever the current stack.
        if let Some(shape) = self.resolved.get(name) {
            return Ok(Arc::clone(shape));
        }

        if let Some(cycle_start) = self.visiting.iter().position(|n| n == name) {
            let mut cycle = self.visiting[cycle_start..].to_vec();
            cycle.push(name.to_string());
            return Err(AbiError::CyclicReference {
                chain: cycle.join(" -> "),
            });
        }

        self.visiting.push(name.to_string());
        let result = self.resolve_shared(target);
        self.visiting.pop();

        let shape = result?;
        self.resolved.insert(name.to_string(), Arc::clone(&shape));
        Ok(shape)
    }

    fn resolve_intersection(&mut self, members: &[SchemaNode]) -> Result<Shape, AbiError> {
        let mut merged: Option<ObjectShape> = None;
        let mut rest = Vec::new();
        let mut pending: Vec<Shape> = members
            .iter()
            .map(|member| self.resolve(member))
            .collect::<Result<_, _>>()?;
        pending.reverse();

        while let Some(shape) = pending.pop() {
            match shape {
                Shape::Object(obj) => {
                    merged = Some(match merged {
                        Some(acc) => acc.merge(obj),
                        None => obj,
                    });
                }
                Shape::Intersection(inner) => {
                    pending.extend(inner.into_iter().rev().map(Arc::unwrap_or_clone))
                }
                Shape::Any => {}
                other => rest.push(other),
            }
        }

        let mut parts: Vec<Shape> = merged.map(Shape::Object).into_iter().collect();
        parts.extend(rest);
        Ok(match parts.len() {
            0 => Shape::Any,
            1 => parts.remove(0),
            _ => Shape::Intersection(parts.into_iter().map(Arc::new).collect()),
        })
    }

    fn resolve_object(&mut self, obj: &ObjectNode) -> Result<ObjectShape, AbiError> {
        let mut properties = Vec::with_capacity(obj.properties.len());
        for (name, schema) in &obj.properties {
            let required = match &obj.required {
                Some(names) => names.iter().any(|n| n == name),
                None => true,
            };
            properties.push((
                name.clone(),
                PropertyShape {
                    shape: self.resolve_shared(schema)?,
                    required,
                },
            ));
        }

        let additional = match &obj.additional {
            AdditionalProperties::Forbidden => AdditionalProperties::Forbidden,
            AdditionalProperties::Typed(schema) => {
                AdditionalProperties::Typed(self.resolve_shared(schema)?)
            }
            AdditionalProperties::Untyped => AdditionalProperties::Untyped,
        };

        Ok(ObjectShape {
            properties,
            additional,
        })
    }
}

fn primitive_shape(primitive: Primitive, constraints: &Constraints) -> Shape {
    match primitive {
        Primitive::String => Shape::String(constraints.clone()),
        Primitive::Integer | Primitive::Number => Shape::Number(constraints.clone()),
        Primitive::Boolean => Shape::Boolean,
        Primitive::Null => Shape::Null,
    }
}

fn collapse_union(mut alternatives: Vec<Shape>) -> Shape {
    match alternatives.len() {
        0 => Shape::Any,
        1 => alternatives.remove(0),
        _ => Shape::Union(alternatives.into_iter().map(Arc::new).collect()),
    }
}

fn dedup(values: Vec<JsonValue>) -> Vec<JsonValue> {
    let mut out: Vec<JsonValue> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
