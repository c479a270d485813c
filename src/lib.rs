pub mod ast;
pub mod contract;
pub mod error;
pub mod resolve;
pub mod schema;
pub mod transport;
pub mod validate;
pub mod verify;

use std::path::Path;
use std::sync::Arc;

pub use ast::{AbiDocument, AbiFunction, FunctionKind};
pub use contract::{CallOptions, Contract, ContractConfig, DispatchEntry};
pub use error::{AbiError, TransportError};
pub use resolve::{resolve, resolve_json, ObjectShape, PropertyShape, Resolver, Shape};
pub use schema::{Definitions, SchemaNode};
pub use transport::{
    CallPath, Deposit, Gas, RecordedCall, RecordingTransport, Transport, TxOptions, WaitPolicy,
};
use verify::verify_hash;

/// Parses ABI JSON text and checks document-level invariants.
pub fn parse_abi(input: &str) -> Result<AbiDocument, AbiError> {
    let doc: AbiDocument =
        serde_json::from_str(input).map_err(|e| AbiError::Document(e.to_string()))?;
    doc.check()?;
    Ok(doc)
}

/// Reads and parses an ABI file.
pub fn load_abi_from_path(path: impl AsRef<Path>) -> Result<AbiDocument, AbiError> {
    let input = std::fs::read_to_string(path.as_ref())?;
    parse_abi(&input)
}

/// Parses ABI JSON text and verifies its fingerprint against `expected_hash`
/// (`sha256:<hex>`).
///
/// The fingerprint covers the parsed document, so formatting and key order in
/// `input` do not affect it.
pub fn load_abi_pinned(input: &str, expected_hash: &str) -> Result<AbiDocument, AbiError> {
    let doc = parse_abi(input)?;
    verify_hash(&doc.canonical_json()?, expected_hash)?;
    Ok(doc)
}

/// Synthesizes a [`Contract`] for `contract_id` from `abi`, dispatching
/// through `transport`.
pub fn create_contract(
    abi: &AbiDocument,
    transport: Arc<dyn Transport>,
    contract_id: impl Into<String>,
) -> Result<Contract, AbiError> {
    Contract::new(abi, transport, contract_id)
}
