//! Schema node parsing, the per-document definitions table, and schema helpers.
//!
//! Recognized keyword subset:
//! - Composition: `$ref`, `const`, `enum`, `allOf`, `oneOf`, `anyOf`
//! - Common: `type` (single tag or list of tags)
//! - Numeric: `minimum`, `maximum`, `exclusiveMinimum`, `exclusiveMaximum`, `format`
//! - String: `minLength`, `maxLength`, `pattern`
//! - Object: `properties`, `required`, `additionalProperties`
//! - Array: `items` (schema or tuple list), `minItems`, `maxItems`
//!
//! Everything else is ignored. A fragment that matches no recognized form
//! parses to [`SchemaNode::Unknown`] rather than failing.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map as JsonMap, Value as JsonValue};

const DEFINITIONS_POINTER: &str = "#/definitions/";
const DEFS_POINTER: &str = "#/$defs/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl Primitive {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Keyword constraints attached to primitive and list nodes.
///
/// Malformed keyword values (for example a string `minimum`) are dropped.
pub struct Constraints {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub format: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Pattern>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
}

impl Constraints {
    fn from_map(map: &JsonMap<String, JsonValue>) -> Self {
        let float = |key: &str| map.get(key).and_then(JsonValue::as_f64);
        let count = |key: &str| map.get(key).and_then(JsonValue::as_u64);
        let text = |key: &str| map.get(key).and_then(JsonValue::as_str).map(str::to_string);
        Self {
            minimum: float("minimum"),
            maximum: float("maximum"),
            exclusive_minimum: float("exclusiveMinimum"),
            exclusive_maximum: float("exclusiveMaximum"),
            format: text("format"),
            min_length: count("minLength"),
            max_length: count("maxLength"),
            pattern: map
                .get("pattern")
                .and_then(JsonValue::as_str)
                .and_then(compile_pattern),
            min_items: count("minItems"),
            max_items: count("maxItems"),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone)]
/// A `pattern` keyword, compiled once when the schema is parsed.
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(|regex| Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

// Patterns the regex engine cannot compile are ignored, like unknown keywords.
fn compile_pattern(source: &str) -> Option<Pattern> {
    match Pattern::new(source) {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            tracing::debug!(pattern = source, error = %e, "skipping uncompilable pattern");
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Policy for object fields beyond the declared properties.
pub enum AdditionalProperties<T> {
    /// `additionalProperties: false`.
    Forbidden,
    /// `additionalProperties: <schema>`.
    Typed(T),
    /// `additionalProperties: true` or absent.
    Untyped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    /// Declared properties in source order.
    pub properties: Vec<(String, SchemaNode)>,
    /// `None` when the schema has no `required` keyword.
    pub required: Option<Vec<String>>,
    pub additional: AdditionalProperties<Box<SchemaNode>>,
}

#[derive(Debug, Clone, PartialEq)]
/// One node of the schema grammar.
///
/// Variants are listed in the order [`SchemaNode::parse`] tests for them.
pub enum SchemaNode {
    /// `$ref` pointer, kept verbatim.
    Reference(String),
    Constant(JsonValue),
    Enumeration(Vec<JsonValue>),
    Intersection(Vec<SchemaNode>),
    /// `type` given as a list of tags. Holds one node per distinct tag, each
    /// parsed from the same fragment narrowed to that single tag.
    MultiPrimitive(Vec<SchemaNode>),
    Object(ObjectNode),
    Tuple(Vec<SchemaNode>),
    List {
        items: Option<Box<SchemaNode>>,
        constraints: Constraints,
    },
    Primitive {
        primitive: Primitive,
        constraints: Constraints,
    },
    Union(Vec<SchemaNode>),
    Unknown,
}

impl SchemaNode {
    /// Classifies a raw schema fragment. Never fails.
    pub fn parse(value: &JsonValue) -> SchemaNode {
        let Some(obj) = value.as_object() else {
            return SchemaNode::Unknown;
        };

        if let Some(pointer) = obj.get("$ref").and_then(JsonValue::as_str) {
            return SchemaNode::Reference(pointer.to_string());
        }

        if let Some(constant) = obj.get("const") {
            return SchemaNode::Constant(constant.clone());
        }

        if let Some(JsonValue::Array(members)) = obj.get("enum") {
            return SchemaNode::Enumeration(members.clone());
        }

        if let Some(JsonValue::Array(members)) = obj.get("allOf") {
            return SchemaNode::Intersection(members.iter().map(SchemaNode::parse).collect());
        }

        let type_tag = match obj.get("type") {
            Some(JsonValue::Array(tags)) => {
                let mut seen: Vec<&str> = Vec::new();
                for tag in tags.iter().filter_map(JsonValue::as_str) {
                    if !seen.contains(&tag) {
                        seen.push(tag);
                    }
                }
                return SchemaNode::MultiPrimitive(
                    seen.into_iter().map(|tag| narrow_to_tag(obj, tag)).collect(),
                );
            }
            Some(JsonValue::String(tag)) => Some(tag.as_str()),
            _ => None,
        };

        if is_object_node(obj, type_tag) {
            return SchemaNode::Object(parse_object_node(obj));
        }

        if type_tag == Some("array") {
            return match obj.get("items") {
                Some(JsonValue::Array(elements)) => {
                    SchemaNode::Tuple(elements.iter().map(SchemaNode::parse).collect())
                }
                Some(item) => SchemaNode::List {
                    items: Some(Box::new(SchemaNode::parse(item))),
                    constraints: Constraints::from_map(obj),
                },
                None => SchemaNode::List {
                    items: None,
                    constraints: Constraints::from_map(obj),
                },
            };
        }

        if let Some(primitive) = type_tag.and_then(Primitive::from_tag) {
            return SchemaNode::Primitive {
                primitive,
                constraints: Constraints::from_map(obj),
            };
        }

        if let Some(JsonValue::Array(alternatives)) = obj.get("oneOf").or_else(|| obj.get("anyOf")) {
            return SchemaNode::Union(alternatives.iter().map(SchemaNode::parse).collect());
        }

        SchemaNode::Unknown
    }
}

/// Re-parses `obj` as if its `type` were the single `tag`, so sibling
/// `properties`/`items`/constraint keywords apply to that alternative.
fn narrow_to_tag(obj: &JsonMap<String, JsonValue>, tag: &str) -> SchemaNode {
    let mut narrowed = obj.clone();
    narrowed.insert("type".to_string(), JsonValue::String(tag.to_string()));
    narrowed.remove("oneOf");
    narrowed.remove("anyOf");
    SchemaNode::parse(&JsonValue::Object(narrowed))
}

fn is_object_node(obj: &JsonMap<String, JsonValue>, type_tag: Option<&str>) -> bool {
    match type_tag {
        Some(tag) => tag == "object",
        None => obj.contains_key("properties") || obj.contains_key("additionalProperties"),
    }
}

fn parse_object_node(obj: &JsonMap<String, JsonValue>) -> ObjectNode {
    let properties = obj
        .get("properties")
        .and_then(JsonValue::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, schema)| (name.clone(), SchemaNode::parse(schema)))
                .collect()
        })
        .unwrap_or_default();

    let required = obj.get("required").and_then(JsonValue::as_array).map(|names| {
        names
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::to_string)
            .collect()
    });

    let additional = match obj.get("additionalProperties") {
        Some(JsonValue::Bool(false)) => AdditionalProperties::Forbidden,
        Some(schema @ JsonValue::Object(_)) => {
            AdditionalProperties::Typed(Box::new(SchemaNode::parse(schema)))
        }
        _ => AdditionalProperties::Untyped,
    };

    ObjectNode {
        properties,
        required,
        additional,
    }
}

/// Extracts the definition name from a local `$ref` pointer.
///
/// Accepts `#/definitions/<Name>` and `#/$defs/<Name>`; anything else
/// (external documents, nested pointers) returns `None`.
pub fn definition_name(pointer: &str) -> Option<&str> {
    let name = pointer
        .strip_prefix(DEFINITIONS_POINTER)
        .or_else(|| pointer.strip_prefix(DEFS_POINTER))?;
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some(name)
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Named schema nodes shared by every `$ref` in one ABI document.
pub struct Definitions {
    nodes: BTreeMap<String, SchemaNode>,
}

impl Definitions {
    /// Parses every raw definition into a [`SchemaNode`].
    pub fn from_raw(raw: &BTreeMap<String, JsonValue>) -> Self {
        Self {
            nodes: raw
                .iter()
                .map(|(name, schema)| (name.clone(), SchemaNode::parse(schema)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Coarse classification of a raw schema fragment.
pub enum SchemaKind<'a> {
    /// Value of a string `type` keyword.
    Type(&'a str),
    /// Value of a `$ref` keyword.
    Ref(&'a str),
    Enum,
    Const,
    Unknown,
}

/// Returns `true` when `schema` carries at least one keyword the resolver acts on.
pub fn is_recognized_schema(schema: &JsonValue) -> bool {
    let Some(obj) = schema.as_object() else {
        return false;
    };
    matches!(obj.get("type"), Some(JsonValue::String(_) | JsonValue::Array(_)))
        || obj.get("$ref").is_some_and(JsonValue::is_string)
        || obj.get("enum").is_some_and(JsonValue::is_array)
        || obj.contains_key("const")
        || ["oneOf", "anyOf", "allOf"]
            .iter()
            .any(|key| obj.get(*key).is_some_and(JsonValue::is_array))
}

pub fn schema_kind(schema: &JsonValue) -> SchemaKind<'_> {
    if let Some(tag) = schema.get("type").and_then(JsonValue::as_str) {
        SchemaKind::Type(tag)
    } else if let Some(pointer) = schema.get("$ref").and_then(JsonValue::as_str) {
        SchemaKind::Ref(pointer)
    } else if schema.get("enum").is_some_and(JsonValue::is_array) {
        SchemaKind::Enum
    } else if schema.get("const").is_some() {
        SchemaKind::Const
    } else {
        SchemaKind::Unknown
    }
}

/// Names listed in the schema's `required` keyword.
pub fn required_properties(schema: &JsonValue) -> Vec<&str> {
    schema
        .get("required")
        .and_then(JsonValue::as_array)
        .map(|names| names.iter().filter_map(JsonValue::as_str).collect())
        .unwrap_or_default()
}

/// Declared properties absent from the schema's `required` keyword.
///
/// Without a `required` keyword every property is mandatory, so the result is empty.
pub fn optional_properties(schema: &JsonValue) -> Vec<&str> {
    let Some(required) = schema.get("required").and_then(JsonValue::as_array) else {
        return Vec::new();
    };
    let Some(props) = schema.get("properties").and_then(JsonValue::as_object) else {
        return Vec::new();
    };
    props
        .keys()
        .map(String::as_str)
        .filter(|name| !required.iter().any(|r| r.as_str() == Some(*name)))
        .collect()
}
