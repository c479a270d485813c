//! Public ABI document model used by the loader and contract APIs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::AbiError;
use crate::verify::{compute_sha256, verify_schema_version};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Parsed ABI document.
pub struct AbiDocument {
    /// Version of the ABI format (for example `0.3.0`).
    pub schema_version: String,
    /// Contract metadata. Preserved, not interpreted.
    #[serde(default)]
    pub metadata: AbiMetadata,
    /// Function list and shared schema definitions.
    pub body: AbiBody,
}

impl AbiDocument {
    /// Returns declared function names in document order.
    pub fn function_names(&self) -> Vec<&str> {
        self.body.functions.iter().map(|f| f.name.as_str()).collect()
    }

    /// Looks up a function descriptor by name.
    pub fn function(&self, name: &str) -> Option<&AbiFunction> {
        self.body.functions.iter().find(|f| f.name == name)
    }

    /// Checks document-level invariants: a supported `schema_version` and
    /// unique function names.
    pub fn check(&self) -> Result<(), AbiError> {
        verify_schema_version(&self.schema_version)?;

        let mut seen = BTreeSet::new();
        for function in &self.body.functions {
            if !seen.insert(function.name.as_str()) {
                return Err(AbiError::DuplicateFunction(function.name.clone()));
            }
        }
        Ok(())
    }

    /// Serializes the document with every object's keys sorted, so the bytes
    /// do not depend on key order in the source text.
    pub fn canonical_json(&self) -> Result<Vec<u8>, AbiError> {
        let mut value =
            serde_json::to_value(self).map_err(|e| AbiError::Document(e.to_string()))?;
        value.sort_all_objects();
        serde_json::to_vec(&value).map_err(|e| AbiError::Document(e.to_string()))
    }

    /// Returns the `sha256:<hex>` digest of [`AbiDocument::canonical_json`].
    pub fn fingerprint(&self) -> Result<String, AbiError> {
        Ok(compute_sha256(&self.canonical_json()?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// `metadata` block of an ABI document.
pub struct AbiMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasm_hash: Option<String>,
    /// Any other metadata keys.
    #[serde(flatten)]
    pub other: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// `body` block: function descriptors plus the root schema.
pub struct AbiBody {
    pub functions: Vec<AbiFunction>,
    pub root_schema: RootSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One callable contract function.
pub struct AbiFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// `view`, `call`, or absent. Absent dispatches like `call`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FunctionKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<FunctionModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<AbiParameters>,
    /// Callback descriptors. Preserved, not interpreted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub callbacks: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AbiType>,
}

impl AbiFunction {
    /// Returns `true` when the function routes to the read-only query path.
    pub fn is_view(&self) -> bool {
        self.kind == Some(FunctionKind::View)
    }

    /// Declared parameters in order. Empty when the function takes none.
    pub fn parameters(&self) -> &[AbiParameter] {
        match &self.params {
            Some(AbiParameters::Json { args }) | Some(AbiParameters::Borsh { args }) => args,
            None => &[],
        }
    }

    /// Returns `true` when callers must supply an arguments object.
    pub fn requires_args(&self) -> bool {
        !self.parameters().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FunctionKind {
    /// Read-only query.
    View,
    /// State-mutating transaction.
    Call,
    /// Any other kind tag, kept verbatim. Dispatches like [`FunctionKind::Call`].
    Other(String),
}

impl FunctionKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::View => "view",
            Self::Call => "call",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for FunctionKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "view" => Self::View,
            "call" => Self::Call,
            _ => Self::Other(tag),
        }
    }
}

impl From<FunctionKind> for String {
    fn from(kind: FunctionKind) -> Self {
        match kind {
            FunctionKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionModifier {
    Init,
    Private,
    Payable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "serialization_type", rename_all = "lowercase")]
/// Parameter block, tagged by argument serialization format.
pub enum AbiParameters {
    Json {
        #[serde(default)]
        args: Vec<AbiParameter>,
    },
    /// Borsh argument schemas are not JSON schemas and resolve to unconstrained.
    Borsh {
        #[serde(default)]
        args: Vec<AbiParameter>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiParameter {
    pub name: String,
    #[serde(default)]
    pub type_schema: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "serialization_type", rename_all = "lowercase")]
/// Result block, tagged by serialization format.
pub enum AbiType {
    Json {
        #[serde(default)]
        type_schema: JsonValue,
    },
    Borsh {
        #[serde(default)]
        type_schema: JsonValue,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// `root_schema` block carrying the shared definitions table.
pub struct RootSchema {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub definitions: BTreeMap<String, JsonValue>,
    #[serde(rename = "$defs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defs: BTreeMap<String, JsonValue>,
    /// Remaining JSON Schema keywords. Preserved, not interpreted.
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl RootSchema {
    /// Collects `definitions` and `$defs` into one raw table.
    ///
    /// `definitions` takes precedence when both declare the same name.
    pub fn raw_definitions(&self) -> BTreeMap<String, JsonValue> {
        let mut out = self.definitions.clone();
        for (name, schema) in &self.defs {
            out.entry(name.clone()).or_insert_with(|| schema.clone());
        }
        out
    }
}

/// Structural check that a raw JSON value has the shape of an ABI document.
pub fn is_abi_document(value: &JsonValue) -> bool {
    let has_version = value
        .get("schema_version")
        .is_some_and(JsonValue::is_string);
    let has_metadata = value.get("metadata").is_some();
    let body = value.get("body");
    let has_functions = body
        .and_then(|b| b.get("functions"))
        .is_some_and(JsonValue::is_array);
    let has_root_schema = body.and_then(|b| b.get("root_schema")).is_some();
    has_version && has_metadata && has_functions && has_root_schema
}
