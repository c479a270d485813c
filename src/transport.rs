//! Boundary to the network layer that performs view queries and transactions.
//!
//! The dispatcher never talks to the network itself. It hands every call to a
//! [`Transport`], which owns signing, RPC, retries, and timeouts.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::TransportError;

const YOCTO_PER_NEAR: u128 = 1_000_000_000_000_000_000_000_000;
const GAS_PER_TGAS: u64 = 1_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Gas budget attached to a transaction.
pub struct Gas(pub u64);

impl Gas {
    /// Converts teragas to gas. `None` if the result does not fit in `u64`.
    pub const fn from_tgas(tgas: u64) -> Option<Self> {
        match tgas.checked_mul(GAS_PER_TGAS) {
            Some(gas) => Some(Self(gas)),
            None => None,
        }
    }
}

impl From<u64> for Gas {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Deposit attached to a transaction, in yoctoNEAR.
pub struct Deposit(pub u128);

impl Deposit {
    /// Converts NEAR to yoctoNEAR. `None` if the result does not fit in `u128`.
    pub const fn from_near(near: u128) -> Option<Self> {
        match near.checked_mul(YOCTO_PER_NEAR) {
            Some(yocto) => Some(Self(yocto)),
            None => None,
        }
    }
}

impl From<u128> for Deposit {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// How far a transaction must progress before the transport returns.
pub enum WaitPolicy {
    None,
    Included,
    ExecutedOptimistic,
    IncludedFinal,
    Executed,
    Final,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Transaction-only parameters, forwarded verbatim to [`Transport::call`].
pub struct TxOptions {
    pub gas: Option<Gas>,
    pub deposit: Option<Deposit>,
    pub wait_until: Option<WaitPolicy>,
}

/// Network collaborator consumed by [`Contract`](crate::contract::Contract).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read-only query against `contract_id`.
    async fn view(
        &self,
        contract_id: &str,
        method: &str,
        args: JsonValue,
    ) -> Result<JsonValue, TransportError>;

    /// State-mutating function call against `contract_id`.
    async fn call(
        &self,
        contract_id: &str,
        method: &str,
        args: JsonValue,
        options: TxOptions,
    ) -> Result<JsonValue, TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPath {
    View,
    Call,
}

#[derive(Debug, Clone, PartialEq)]
/// One call observed by [`RecordingTransport`].
pub struct RecordedCall {
    pub path: CallPath,
    pub contract_id: String,
    pub method: String,
    pub args: JsonValue,
    /// `None` for view queries.
    pub options: Option<TxOptions>,
}

#[derive(Debug, Default)]
/// [`Transport`] implementation that answers from canned per-method responses
/// and records every call it receives.
///
/// Methods without a canned response answer `null`.
pub struct RecordingTransport {
    responses: HashMap<String, Result<JsonValue, String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `method` with `result`.
    pub fn respond(mut self, method: &str, result: JsonValue) -> Self {
        self.responses.insert(method.to_string(), Ok(result));
        self
    }

    /// Fails `method` with a transport error carrying `message`.
    pub fn fail(mut self, method: &str, message: &str) -> Self {
        self.responses
            .insert(method.to_string(), Err(message.to_string()));
        self
    }

    /// Calls received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: RecordedCall) -> Result<JsonValue, TransportError> {
        let response = self.responses.get(&call.method).cloned();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        match response {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(message.into()),
            None => Ok(JsonValue::Null),
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn view(
        &self,
        contract_id: &str,
        method: &str,
        args: JsonValue,
    ) -> Result<JsonValue, TransportError> {
        self.record(RecordedCall {
            path: CallPath::View,
            contract_id: contract_id.to_string(),
            method: method.to_string(),
            args,
            options: None,
        })
    }

    async fn call(
        &self,
        contract_id: &str,
        method: &str,
        args: JsonValue,
        options: TxOptions,
    ) -> Result<JsonValue, TransportError> {
        self.record(RecordedCall {
            path: CallPath::Call,
            contract_id: contract_id.to_string(),
            method: method.to_string(),
            args,
            options: Some(options),
        })
    }
}
