//! Evaluate one expression against variables from the command line

use std::rc::Rc;

use tracing::debug;

use crate::{
    config::EvaluatorConfig,
    declaration::CardDeclarations,
    evaluator::{VariableRead, Warning},
    subscription::LogSink,
    value::Value,
    variables::Variable,
};

use super::{CliError, declarations_from_json, parse_assignment};

/// Options for the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    pub expression: String,
    /// Contents of a variables file, see [`declarations_from_json`].
    pub variables: Option<String>,
    /// `NAME=VALUE` overrides applied after the variables file.
    pub assignments: Vec<String>,
    pub config: EvaluatorConfig,
}

/// Result of a successful evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutput {
    pub value: Value,
    pub reads: Vec<VariableRead>,
    pub warnings: Vec<Warning>,
}

pub fn execute_eval(options: &EvalOptions) -> Result<EvalOutput, CliError> {
    let declarations = match &options.variables {
        Some(text) => declarations_from_json(text)?,
        None => CardDeclarations::default(),
    };

    let runtime = declarations.build_runtime_with(None, options.config.clone(), Rc::new(LogSink))?;
    let store = runtime.store();

    for assignment in &options.assignments {
        let (name, json) = parse_assignment(assignment)?;
        match store.declared_type(&name) {
            Some(ty) => store.set(&name, Value::from_json_typed(json, ty)?)?,
            None => store.declare(Variable::infer(name, Value::from_json(json)?))?,
        }
    }
    debug!(variables = ?store.names(), "variables ready");

    let expression = runtime.expression(&options.expression)?;
    let evaluation = runtime.evaluate(&expression);
    let reads = evaluation.read_set.iter().cloned().collect();
    let value = evaluation.result?;

    Ok(EvalOutput {
        value,
        reads,
        warnings: evaluation.warnings,
    })
}
