//! ABI integrity checks: content hash pins and schema-version compatibility.

use sha2::{Digest, Sha256};

use crate::error::AbiError;

/// Schema versions this crate knows how to interpret.
pub const SUPPORTED_SCHEMA_VERSIONS: &str = ">=0.1.0, <1.0.0";

/// Verifies that `content` matches the expected hash string.
///
/// `expected` must be in `algorithm:hex_digest` format (e.g. `sha256:abcdef01...`).
/// Only `sha256` is currently supported.
pub fn verify_hash(content: &[u8], expected: &str) -> Result<(), AbiError> {
    let (algo, expected_hex) = expected.split_once(':').ok_or_else(|| {
        AbiError::Hash(format!(
            "invalid hash format '{}'; expected 'algorithm:hex_digest'",
            expected
        ))
    })?;

    match algo {
        "sha256" => {
            let actual = compute_sha256(content);
            let actual_hex = &actual["sha256:".len()..];
            if !actual_hex.eq_ignore_ascii_case(expected_hex) {
                return Err(AbiError::Hash(format!(
                    "sha256 mismatch: expected {expected_hex}, got {actual_hex}"
                )));
            }
            Ok(())
        }
        _ => Err(AbiError::Hash(format!(
            "unsupported hash algorithm '{algo}'; supported: sha256"
        ))),
    }
}

/// Checks that an ABI `schema_version` satisfies [`SUPPORTED_SCHEMA_VERSIONS`].
pub fn verify_schema_version(version: &str) -> Result<(), AbiError> {
    verify_schema_version_against(version, SUPPORTED_SCHEMA_VERSIONS)
}

/// Checks that an ABI `schema_version` satisfies `requirement`.
pub fn verify_schema_version_against(version: &str, requirement: &str) -> Result<(), AbiError> {
    let req = semver::VersionReq::parse(requirement).map_err(|e| {
        AbiError::UnsupportedSchemaVersion(format!(
            "invalid version requirement '{requirement}': {e}"
        ))
    })?;

    let parsed = semver::Version::parse(version).map_err(|e| {
        AbiError::UnsupportedSchemaVersion(format!("'{version}' is not valid semver: {e}"))
    })?;

    if !req.matches(&parsed) {
        return Err(AbiError::UnsupportedSchemaVersion(format!(
            "'{parsed}' does not satisfy '{requirement}'"
        )));
    }

    Ok(())
}

/// Computes the SHA-256 hash of `content` and returns it in `sha256:hex` format.
pub fn compute_sha256(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
