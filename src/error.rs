//! Error taxonomy for loading, evaluating and storing expression data.
//!
//! Load-time failures ([`LexError`], [`ParseError`]) are wrapped by
//! [`ExpressionError`]. Runtime failures are described by an [`EvalError`]
//! cause and surfaced to callers as an [`EvaluationError`] that also carries
//! the full source string of the failing expression.

use std::{fmt, io};

use thiserror::Error;

use crate::{lexer::Position, value::ValueType};

/// Errors produced while tokenizing an expression source string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal starting at {0}")]
    UnterminatedString(Position),

    #[error("unterminated expression: '@{{' at {0} has no closing '}}'")]
    UnterminatedExpression(Position),

    #[error("invalid escape sequence '\\{ch}' at {position}")]
    InvalidEscape { ch: char, position: Position },

    #[error("invalid number literal '{literal}' at {position}")]
    InvalidNumber { literal: String, position: Position },

    #[error("unexpected character '{ch}' at {position}")]
    UnexpectedCharacter { ch: char, position: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnterminatedString(position) | LexError::UnterminatedExpression(position) => {
                *position
            }
            LexError::InvalidEscape { position, .. }
            | LexError::InvalidNumber { position, .. }
            | LexError::UnexpectedCharacter { position, .. } => *position,
        }
    }
}

/// Malformed token sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} at {position}, found {found}")]
pub struct ParseError {
    pub position: Position,
    pub expected: String,
    pub found: String,
}

/// Any failure to turn a source string into an [`crate::Expression`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("expression is {length} characters long, the limit is {limit}")]
    TooLong { length: usize, limit: usize },
}

/// Whether a call was written as `name(...)` or `receiver.name(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Function,
    Method,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Function => f.write_str("function"),
            CallKind::Method => f.write_str("method"),
        }
    }
}

/// No registered signature matches a name and argument count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{name}' with {arity} argument(s)")]
pub struct UnknownFunction {
    pub kind: CallKind,
    pub name: String,
    pub arity: usize,
}

/// An argument's runtime type does not match the declared signature.
///
/// `position` is 1-based, counting the receiver of a method call as the
/// first argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("argument {position} of '{function}' must be {expected}, got {actual}")]
pub struct ArgumentTypeError {
    pub function: String,
    pub position: usize,
    pub expected: String,
    pub actual: ValueType,
}

/// The cause of a failed evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error(transparent)]
    UnknownFunction(#[from] UnknownFunction),

    #[error(transparent)]
    ArgumentType(#[from] ArgumentTypeError),

    #[error("operator '{operator}' cannot be applied to {left} and {right}")]
    InvalidOperands {
        operator: &'static str,
        left: ValueType,
        right: ValueType,
    },

    #[error("operator '{operator}' cannot be applied to {operand}")]
    InvalidOperand {
        operator: &'static str,
        operand: ValueType,
    },

    #[error("operator '{operator}' requires a boolean operand, got {actual}")]
    NonBooleanCondition {
        operator: &'static str,
        actual: ValueType,
    },

    #[error("integer overflow in '{operator}'")]
    IntegerOverflow { operator: &'static str },

    #[error("division by zero")]
    DivisionByZero,

    #[error("index {index} is out of bounds for array of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("missing key '{0}' in dict")]
    MissingKey(String),

    #[error("cannot index {target} with {key}")]
    NotIndexable { target: ValueType, key: ValueType },

    #[error("'{function}' must return {expected}, got {actual}")]
    ReturnType {
        function: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("maximum evaluation depth of {0} exceeded")]
    DepthLimitExceeded(usize),

    #[error("{function}: {message}")]
    Function { function: String, message: String },

    #[error("in custom function '{function}': {cause}")]
    CustomFunction {
        function: String,
        #[source]
        cause: Box<EvalError>,
    },
}

/// A failed evaluation of a complete expression.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to evaluate '{expression}': {cause}")]
pub struct EvaluationError {
    #[source]
    pub cause: EvalError,
    pub expression: String,
}

impl EvaluationError {
    pub fn new(cause: EvalError, expression: impl Into<String>) -> Self {
        EvaluationError {
            cause,
            expression: expression.into(),
        }
    }
}

/// A JSON value that cannot be read as the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot read {found} as {expected}")]
pub struct ConversionError {
    pub expected: ValueType,
    pub found: String,
}

/// Rejected reads and writes against a variable store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    #[error("variable '{0}' is not declared")]
    Unknown(String),

    #[error("variable '{name}' is declared as {expected}, cannot assign {actual}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("variable '{0}' is already declared in this scope")]
    AlreadyDeclared(String),

    #[error("invalid value for variable '{name}': {source}")]
    InvalidValue {
        name: String,
        source: ConversionError,
    },
}

/// Failures while registering functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("function '{name}' with {arity} argument(s) is already registered")]
    DuplicateFunction { name: String, arity: usize },

    #[error("function '{function}' declares argument '{argument}' more than once")]
    DuplicateArgument { function: String, argument: String },

    #[error("function '{function}' refers to '{variable}', which is not one of its arguments")]
    UnknownArgument { function: String, variable: String },

    #[error("invalid body for function '{function}': {source}")]
    InvalidBody {
        function: String,
        source: ExpressionError,
    },
}

/// Failures while loading card JSON declarations.
#[derive(Debug, Error)]
pub enum DeclarationError {
    #[error("invalid card JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Failures while loading an [`crate::EvaluatorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
