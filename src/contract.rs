//! Contract synthesis: one dispatch entry per ABI function.
//!
//! [`Contract::new`] resolves every parameter and result schema up front, so a
//! document with a dangling or cyclic `$ref` is rejected before any call is
//! made. Each [`DispatchEntry`] then validates call arguments against its
//! resolved shapes and routes the call to the transport's view or call path.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::ast::{AbiDocument, AbiFunction, AbiParameters, AbiType};
use crate::error::AbiError;
use crate::resolve::{ObjectShape, PropertyShape, Resolver, Shape};
use crate::schema::{AdditionalProperties, Definitions};
use crate::transport::{Deposit, Gas, Transport, TxOptions, WaitPolicy};
use crate::validate::validate_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Dispatch behavior switches.
pub struct ContractConfig {
    /// Validate call arguments against resolved parameter shapes before dispatch.
    pub validate_args: bool,
    /// Log a warning when a transport result does not match the resolved
    /// result shape. Results are returned unmodified either way.
    pub check_results: bool,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            validate_args: true,
            check_results: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Per-invocation input to a dispatch entry.
pub struct CallOptions {
    /// Arguments object. Required when the function declares parameters.
    pub args: Option<JsonValue>,
    pub gas: Option<Gas>,
    pub deposit: Option<Deposit>,
    pub wait_until: Option<WaitPolicy>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args(args: JsonValue) -> Self {
        Self::new().args(args)
    }

    pub fn args(mut self, args: JsonValue) -> Self {
        self.args = Some(args);
        self
    }

    pub fn gas(mut self, gas: impl Into<Gas>) -> Self {
        self.gas = Some(gas.into());
        self
    }

    pub fn deposit(mut self, deposit: impl Into<Deposit>) -> Self {
        self.deposit = Some(deposit.into());
        self
    }

    pub fn wait_until(mut self, policy: WaitPolicy) -> Self {
        self.wait_until = Some(policy);
        self
    }

    fn has_tx_options(&self) -> bool {
        self.gas.is_some() || self.deposit.is_some() || self.wait_until.is_some()
    }
}

/// Callable bound to one ABI function, a transport, and a contract account.
pub struct DispatchEntry {
    function: AbiFunction,
    params: Vec<(String, Arc<Shape>)>,
    /// Shape of the whole arguments object.
    args_shape: Shape,
    result: Option<Shape>,
    transport: Arc<dyn Transport>,
    contract_id: Arc<str>,
    config: ContractConfig,
}

impl DispatchEntry {
    fn build(
        function: &AbiFunction,
        resolver: &mut Resolver<'_>,
        transport: Arc<dyn Transport>,
        contract_id: Arc<str>,
        config: ContractConfig,
    ) -> Result<Self, AbiError> {
        let mut params = Vec::new();
        let args_shape = match &function.params {
            Some(AbiParameters::Json { args }) => {
                let mut properties = Vec::with_capacity(args.len());
                for arg in args {
                    let shape = Arc::new(resolver.resolve_json(&arg.type_schema)?);
                    properties.push((
                        arg.name.clone(),
                        PropertyShape {
                            shape: Arc::clone(&shape),
                            required: true,
                        },
                    ));
                    params.push((arg.name.clone(), shape));
                }
                Shape::Object(ObjectShape {
                    properties,
                    additional: AdditionalProperties::Forbidden,
                })
            }
            Some(AbiParameters::Borsh { args }) => {
                params.extend(
                    args.iter()
                        .map(|arg| (arg.name.clone(), Arc::new(Shape::Any))),
                );
                Shape::Any
            }
            None => Shape::Object(ObjectShape {
                properties: Vec::new(),
                additional: AdditionalProperties::Forbidden,
            }),
        };

        let result = match &function.result {
            Some(AbiType::Json { type_schema }) => Some(resolver.resolve_json(type_schema)?),
            Some(AbiType::Borsh { .. }) => Some(Shape::Any),
            None => None,
        };

        Ok(Self {
            function: function.clone(),
            params,
            args_shape,
            result,
            transport,
            contract_id,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn descriptor(&self) -> &AbiFunction {
        &self.function
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    /// Resolved parameter shapes in declaration order.
    pub fn params(&self) -> &[(String, Arc<Shape>)] {
        &self.params
    }

    pub fn param_shape(&self, name: &str) -> Option<&Shape> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, shape)| shape.as_ref())
    }

    /// Resolved result shape, or `None` when the function declares no result.
    pub fn result_shape(&self) -> Option<&Shape> {
        self.result.as_ref()
    }

    /// Validates `options`, forwards the call to the transport, and returns
    /// the transport's result unmodified.
    pub async fn call(&self, options: CallOptions) -> Result<JsonValue, AbiError> {
        let has_tx_options = options.has_tx_options();
        let CallOptions {
            args,
            gas,
            deposit,
            wait_until,
        } = options;
        let args = self.normalize_args(args)?;

        let outcome = if self.function.is_view() {
            if has_tx_options {
                tracing::debug!(
                    function = %self.function.name,
                    "ignoring gas/deposit/wait options for view function"
                );
            }
            tracing::debug!(contract = %self.contract_id, function = %self.function.name, "view");
            self.transport
                .view(&self.contract_id, &self.function.name, args)
                .await
        } else {
            let tx = TxOptions {
                gas,
                deposit,
                wait_until,
            };
            tracing::debug!(
                contract = %self.contract_id,
                function = %self.function.name,
                gas = ?tx.gas,
                deposit = ?tx.deposit,
                "call"
            );
            self.transport
                .call(&self.contract_id, &self.function.name, args, tx)
                .await
        };
        let result = outcome.map_err(AbiError::Transport)?;

        if self.config.check_results {
            self.check_result(&result);
        }
        Ok(result)
    }

    fn normalize_args(&self, args: Option<JsonValue>) -> Result<JsonValue, AbiError> {
        let args = match args {
            Some(JsonValue::Null) | None if self.function.requires_args() => {
                return Err(AbiError::MissingRequiredArguments {
                    function: self.function.name.clone(),
                });
            }
            Some(JsonValue::Null) | None => JsonValue::Object(JsonMap::new()),
            Some(value) => value,
        };

        if self.config.validate_args {
            validate_value(&args, &self.args_shape, "args").map_err(|e| {
                AbiError::InvalidArguments {
                    function: self.function.name.clone(),
                    message: e.to_string(),
                }
            })?;
        }
        Ok(args)
    }

    fn check_result(&self, result: &JsonValue) {
        let Some(shape) = &self.result else {
            return;
        };
        if let Err(mismatch) = validate_value(result, shape, "result") {
            tracing::warn!(
                contract = %self.contract_id,
                function = %self.function.name,
                "result does not match declared shape: {mismatch}"
            );
        }
    }
}

impl fmt::Debug for DispatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("function", &self.function.name)
            .field("kind", &self.function.kind)
            .field("contract_id", &self.contract_id)
            .field(
                "params",
                &self.params.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field("has_result", &self.result.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
/// Dispatch table synthesized from an ABI document.
pub struct Contract {
    contract_id: Arc<str>,
    /// Function names in document order.
    names: Vec<String>,
    entries: BTreeMap<String, DispatchEntry>,
}

impl Contract {
    /// Builds a contract with the default [`ContractConfig`].
    pub fn new(
        abi: &AbiDocument,
        transport: Arc<dyn Transport>,
        contract_id: impl Into<String>,
    ) -> Result<Self, AbiError> {
        Self::with_config(abi, transport, contract_id, ContractConfig::default())
    }

    /// Builds a contract, resolving every schema in `abi` eagerly.
    ///
    /// Performs no transport calls.
    pub fn with_config(
        abi: &AbiDocument,
        transport: Arc<dyn Transport>,
        contract_id: impl Into<String>,
        config: ContractConfig,
    ) -> Result<Self, AbiError> {
        abi.check()?;

        let contract_id: Arc<str> = Arc::from(contract_id.into());
        let definitions = Definitions::from_raw(&abi.body.root_schema.raw_definitions());
        let mut resolver = Resolver::new(&definitions);

        let mut names = Vec::with_capacity(abi.body.functions.len());
        let mut entries = BTreeMap::new();
        for function in &abi.body.functions {
            let entry = DispatchEntry::build(
                function,
                &mut resolver,
                Arc::clone(&transport),
                Arc::clone(&contract_id),
                config,
            )?;
            names.push(function.name.clone());
            entries.insert(function.name.clone(), entry);
        }

        tracing::debug!(
            contract = %contract_id,
            functions = names.len(),
            definitions = definitions.len(),
            "synthesized contract"
        );

        Ok(Self {
            contract_id,
            names,
            entries,
        })
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    /// Function names in document order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn entry(&self, name: &str) -> Option<&DispatchEntry> {
        self.entries.get(name)
    }

    /// Dispatches `name` with `options`.
    pub async fn call(&self, name: &str, options: CallOptions) -> Result<JsonValue, AbiError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))?;
        entry.call(options).await
    }
}
