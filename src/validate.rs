//! Validation of JSON values against resolved [`Shape`]s.

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::resolve::{ObjectShape, Shape};
use crate::schema::{AdditionalProperties, Constraints};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
/// A value does not conform to a shape. The message names the failing path.
pub struct ShapeMismatch(pub String);

impl Shape {
    /// Returns `true` when `value` conforms to this shape.
    pub fn accepts(&self, value: &JsonValue) -> bool {
        validate_value(value, self, "$").is_ok()
    }
}

/// Validates `value` against `shape`.
///
/// `path` names the value in error messages (for example `args.a`); nested
/// paths extend it with `.field` and `[index]`.
pub fn validate_value(value: &JsonValue, shape: &Shape, path: &str) -> Result<(), ShapeMismatch> {
    match shape {
        Shape::Any => Ok(()),
        Shape::Null => expect_kind(value.is_null(), "null", value, path),
        Shape::Boolean => expect_kind(value.is_boolean(), "boolean", value, path),
        Shape::Number(constraints) => {
            expect_kind(value.is_number(), "number", value, path)?;
            validate_numeric_keywords(value, constraints, path)
        }
        Shape::String(constraints) => {
            expect_kind(value.is_string(), "string", value, path)?;
            validate_string_keywords(value, constraints, path)
        }
        Shape::Literal(expected) => {
            if value != expected {
                return Err(ShapeMismatch(format!(
                    "const mismatch at {path}: expected {expected}, found {value}"
                )));
            }
            Ok(())
        }
        Shape::Enum(options) => {
            if !options.iter().any(|candidate| candidate == value) {
                return Err(ShapeMismatch(format!(
                    "enum mismatch at {path}: value {value} not in enum set"
                )));
            }
            Ok(())
        }
        Shape::Object(obj) => validate_object(value, obj, path),
        Shape::Tuple(elements) => {
            let arr = value.as_array().ok_or_else(|| type_mismatch("array", value, path))?;
            if arr.len() != elements.len() {
                return Err(ShapeMismatch(format!(
                    "tuple length mismatch at {path}: expected {}, found {}",
                    elements.len(),
                    arr.len()
                )));
            }
            for (idx, (item, element)) in arr.iter().zip(elements).enumerate() {
                validate_value(item, element, &format!("{path}[{idx}]"))?;
            }
            Ok(())
        }
        Shape::List { items, constraints } => {
            let arr = value.as_array().ok_or_else(|| type_mismatch("array", value, path))?;
            validate_item_count(arr.len(), constraints, path)?;
            for (idx, item) in arr.iter().enumerate() {
                validate_value(item, items, &format!("{path}[{idx}]"))?;
            }
            Ok(())
        }
        Shape::Union(alternatives) => {
            if alternatives
                .iter()
                .any(|alt| validate_value(value, alt, path).is_ok())
            {
                return Ok(());
            }
            Err(ShapeMismatch(format!(
                "no alternative matched at {path}: found {}",
                json_type_name(value)
            )))
        }
        Shape::Intersection(members) => {
            for member in members {
                validate_value(value, member, path)?;
            }
            Ok(())
        }
    }
}

fn validate_object(value: &JsonValue, shape: &ObjectShape, path: &str) -> Result<(), ShapeMismatch> {
    let obj = value.as_object().ok_or_else(|| type_mismatch("object", value, path))?;

    for (key, prop) in &shape.properties {
        match obj.get(key) {
            Some(child) => validate_value(child, &prop.shape, &format!("{path}.{key}"))?,
            None if prop.required => {
                return Err(ShapeMismatch(format!(
                    "required property missing at {path}: '{key}'"
                )));
            }
            None => {}
        }
    }

    for (key, child) in obj {
        if shape.property(key).is_some() {
            continue;
        }
        match &shape.additional {
            AdditionalProperties::Forbidden => {
                return Err(ShapeMismatch(format!(
                    "unexpected property at {path}: '{key}'"
                )));
            }
            AdditionalProperties::Typed(extra) => {
                validate_value(child, extra, &format!("{path}.{key}"))?;
            }
            AdditionalProperties::Untyped => {}
        }
    }

    Ok(())
}

fn validate_numeric_keywords(
    value: &JsonValue,
    constraints: &Constraints,
    path: &str,
) -> Result<(), ShapeMismatch> {
    let Some(val) = value.as_f64() else {
        return Ok(());
    };

    if let Some(min) = constraints.minimum {
        if val < min {
            return Err(ShapeMismatch(format!(
                "minimum violation at {path}: {val} < {min}"
            )));
        }
    }
    if let Some(max) = constraints.maximum {
        if val > max {
            return Err(ShapeMismatch(format!(
                "maximum violation at {path}: {val} > {max}"
            )));
        }
    }
    if let Some(min) = constraints.exclusive_minimum {
        if val <= min {
            return Err(ShapeMismatch(format!(
                "exclusiveMinimum violation at {path}: {val} <= {min}"
            )));
        }
    }
    if let Some(max) = constraints.exclusive_maximum {
        if val >= max {
            return Err(ShapeMismatch(format!(
                "exclusiveMaximum violation at {path}: {val} >= {max}"
            )));
        }
    }

    if let Some(format) = constraints.format.as_deref() {
        validate_integer_format(value, format, path)?;
    }

    Ok(())
}

/// 2^127, the smallest magnitude an f64 can hold that no i128 can.
const I128_BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

/// Integer range for NEAR/schemars numeric formats such as `uint32` or `int64`.
///
/// Returns `None` for formats that carry no range (string formats, `double`, ...).
fn integer_format_range(format: &str) -> Option<(i128, i128)> {
    let (signed, bits) = match format {
        "uint" => (false, 64),
        "int" => (true, 64),
        _ => {
            let (signed, digits) = match format.strip_prefix("uint") {
                Some(digits) => (false, digits),
                None => (true, format.strip_prefix("int")?),
            };
            let bits: u32 = digits.parse().ok()?;
            if !matches!(bits, 8 | 16 | 32 | 64 | 128) {
                return None;
            }
            (signed, bits)
        }
    };

    Some(match (signed, bits) {
        (false, 128) => (0, i128::MAX),
        (true, 128) => (i128::MIN, i128::MAX),
        (false, bits) => (0, (1i128 << bits) - 1),
        (true, bits) => (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1),
    })
}

fn validate_integer_format(value: &JsonValue, format: &str, path: &str) -> Result<(), ShapeMismatch> {
    let Some((min, max)) = integer_format_range(format) else {
        return Ok(());
    };

    let out_of_range = || {
        ShapeMismatch(format!(
            "format violation at {path}: {value} out of range for {format}"
        ))
    };

    let n = if let Some(u) = value.as_u64() {
        i128::from(u)
    } else if let Some(i) = value.as_i64() {
        i128::from(i)
    } else {
        let f = value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .ok_or_else(|| {
                ShapeMismatch(format!(
                    "format violation at {path}: {value} is not an integer ({format})"
                ))
            })?;
        // `as` saturates, so anything outside i128 must be rejected first.
        if !(-I128_BOUND..I128_BOUND).contains(&f) {
            return Err(out_of_range());
        }
        f as i128
    };

    if n < min || n > max {
        return Err(out_of_range());
    }
    Ok(())
}

fn validate_string_keywords(
    value: &JsonValue,
    constraints: &Constraints,
    path: &str,
) -> Result<(), ShapeMismatch> {
    let Some(s) = value.as_str() else {
        return Ok(());
    };
    let len = s.chars().count() as u64;

    if let Some(min) = constraints.min_length {
        if len < min {
            return Err(ShapeMismatch(format!(
                "minLength violation at {path}: {len} < {min}"
            )));
        }
    }
    if let Some(max) = constraints.max_length {
        if len > max {
            return Err(ShapeMismatch(format!(
                "maxLength violation at {path}: {len} > {max}"
            )));
        }
    }

    if let Some(pattern) = &constraints.pattern {
        if !pattern.is_match(s) {
            return Err(ShapeMismatch(format!(
                "pattern violation at {path}: '{s}' does not match '{}'",
                pattern.as_str()
            )));
        }
    }

    Ok(())
}

fn validate_item_count(len: usize, constraints: &Constraints, path: &str) -> Result<(), ShapeMismatch> {
    let len = len as u64;
    if let Some(min) = constraints.min_items {
        if len < min {
            return Err(ShapeMismatch(format!(
                "minItems violation at {path}: {len} < {min}"
            )));
        }
    }
    if let Some(max) = constraints.max_items {
        if len > max {
            return Err(ShapeMismatch(format!(
                "maxItems violation at {path}: {len} > {max}"
            )));
        }
    }
    Ok(())
}

fn expect_kind(ok: bool, expected: &str, value: &JsonValue, path: &str) -> Result<(), ShapeMismatch> {
    if ok {
        Ok(())
    } else {
        Err(type_mismatch(expected, value, path))
    }
}

fn type_mismatch(expected: &str, value: &JsonValue, path: &str) -> ShapeMismatch {
    ShapeMismatch(format!(
        "type mismatch at {path}: expected {expected}, found {}",
        json_type_name(value)
    ))
}

fn json_type_name(value: &JsonValue) -> &'static str {
    if value.is_null() {
        "null"
    } else if value.is_boolean() {
        "boolean"
    } else if value.as_i64().is_some() || value.as_u64().is_some() {
        "integer"
    } else if value.is_number() {
        "number"
    } else if value.is_string() {
        "string"
    } else if value.is_array() {
        "array"
    } else {
        "object"
    }
}
