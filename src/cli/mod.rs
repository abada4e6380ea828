//! Command implementations behind the `divx` binary.
//!
//! Each command takes an options struct and returns plain data, so the
//! binary only deals with argument parsing and printing.

mod check;
mod convert;
mod eval;
mod functions;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use convert::{declarations_from_json, parse_assignment};
pub use eval::{EvalOptions, EvalOutput, execute_eval};
pub use functions::{FunctionListing, list_functions};

use std::io;

use thiserror::Error;

use crate::error::{
    ConfigError, ConversionError, DeclarationError, EvaluationError, ExpressionError,
    VariableError,
};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Expression(#[from] ExpressionError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Invalid declarations: {0}")]
    Declaration(#[from] DeclarationError),

    #[error("Invalid variable: {0}")]
    Variable(#[from] VariableError),

    #[error("Invalid value: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid assignment '{0}', expected NAME=VALUE")]
    InvalidAssignment(String),

    #[error("No expression provided. Pass it as an argument or pipe it to stdin.")]
    NoInput,
}
