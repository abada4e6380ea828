//! Variable and function declarations embedded in card JSON.

use std::{rc::Rc, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::EvaluatorConfig,
    error::{DeclarationError, VariableError},
    functions::{FunctionDeclaration, FunctionRegistry},
    subscription::{CardRuntime, ErrorSink, LogSink},
    value::{Value, ValueType},
    variables::{Variable, VariableStore},
};

/// One entry of a card's `variables` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    pub value: serde_json::Value,
}

impl VariableDeclaration {
    pub fn to_variable(&self) -> Result<Variable, VariableError> {
        let value = Value::from_json_typed(self.value.clone(), self.ty).map_err(|source| {
            VariableError::InvalidValue {
                name: self.name.clone(),
                source,
            }
        })?;
        Variable::new(self.name.clone(), self.ty, value)
    }
}

/// The declaration part of a card.
///
/// ```
/// use divkit_expr::CardDeclarations;
///
/// let card = CardDeclarations::from_json(r#"{
///     "variables": [{"name": "count", "type": "integer", "value": 1}],
///     "functions": [{"name": "twice", "arguments": [{"name": "n", "type": "integer"}],
///                    "return_type": "integer", "body": "@{n * 2}"}]
/// }"#).unwrap();
///
/// let runtime = card.build_runtime(None).unwrap();
/// let value = runtime.evaluate(&runtime.expression("@{twice(count)}").unwrap());
/// assert_eq!(value.result.unwrap().to_string(), "2");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardDeclarations {
    #[serde(default)]
    pub variables: Vec<VariableDeclaration>,
    #[serde(default)]
    pub functions: Vec<FunctionDeclaration>,
}

impl CardDeclarations {
    pub fn from_json(text: &str) -> Result<Self, DeclarationError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Declares every variable in `store`, all or none.
    pub fn declare_variables(&self, store: &VariableStore) -> Result<(), DeclarationError> {
        let variables = self
            .variables
            .iter()
            .map(VariableDeclaration::to_variable)
            .collect::<Result<Vec<_>, _>>()?;
        store.declare_all(variables)?;
        Ok(())
    }

    /// A registry holding the card's functions over the built-ins.
    pub fn register_functions(&self) -> Result<Arc<FunctionRegistry>, DeclarationError> {
        if self.functions.is_empty() {
            return Ok(FunctionRegistry::builtins());
        }

        let mut registry = FunctionRegistry::child(FunctionRegistry::builtins());
        for function in &self.functions {
            registry.register_custom(function)?;
        }
        debug!(count = self.functions.len(), "registered custom functions");
        Ok(Arc::new(registry))
    }

    /// Creates the card's store, optionally over a shared global store, and
    /// a runtime with default configuration.
    pub fn build_runtime(&self, global: Option<&VariableStore>) -> Result<CardRuntime, DeclarationError> {
        self.build_runtime_with(global, EvaluatorConfig::default(), Rc::new(LogSink))
    }

    pub fn build_runtime_with(
        &self,
        global: Option<&VariableStore>,
        config: EvaluatorConfig,
        sink: Rc<dyn ErrorSink>,
    ) -> Result<CardRuntime, DeclarationError> {
        let store = match global {
            Some(global) => VariableStore::with_parent(global),
            None => VariableStore::new(),
        };
        self.declare_variables(&store)?;
        Ok(CardRuntime::with_config(
            store,
            self.register_functions()?,
            config,
            sink,
        ))
    }
}
