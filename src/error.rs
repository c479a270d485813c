//! Error definitions for ABI loading, schema resolution, and dispatch.

use thiserror::Error;

/// Opaque error produced by a [`Transport`](crate::transport::Transport).
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
/// Top-level error type returned by public APIs.
pub enum AbiError {
    /// A `$ref` names a definition absent from the definitions table.
    #[error("unresolved reference: '{reference}' not found in definitions")]
    UnresolvedReference { reference: String },
    /// A `$ref` chain revisits a definition that is already being resolved.
    #[error("cyclic reference: {chain}")]
    CyclicReference { chain: String },
    /// A parameterized function was called without an arguments object.
    #[error("missing required arguments for function '{function}'")]
    MissingRequiredArguments { function: String },
    /// Call arguments do not conform to the function's parameter shapes.
    #[error("invalid arguments for function '{function}': {message}")]
    InvalidArguments { function: String, message: String },
    /// No dispatch entry exists for the requested function name.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    /// Two function descriptors share a name.
    #[error("duplicate function '{0}' in ABI")]
    DuplicateFunction(String),
    /// The input is not a well-formed ABI document.
    #[error("abi document error: {0}")]
    Document(String),
    /// `schema_version` is not a supported semantic version.
    #[error("unsupported schema version: {0}")]
    UnsupportedSchemaVersion(String),
    /// Fingerprint pin mismatch or malformed pin.
    #[error("hash error: {0}")]
    Hash(String),
    /// Failure reported by the transport collaborator, passed through unchanged.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),
    /// Filesystem I/O error while reading an ABI file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
