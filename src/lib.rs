//! Expression language and reactive variable store for DivKit cards.
//!
//! Card properties may hold plain strings or templates with embedded
//! `@{...}` expressions. An [`Expression`] is parsed once, then evaluated
//! against a [`VariableResolver`] and a [`FunctionRegistry`]. Every
//! evaluation reports the variables it read, which lets a [`CardRuntime`]
//! re-evaluate exactly the subscriptions affected by a store mutation.

pub mod ast;
pub mod color;
pub mod config;
pub mod declaration;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod subscription;
pub mod value;
pub mod variables;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod logging;

mod stack;

pub use ast::{BinOp, Expr, TemplatePart, Token, TokenKind, UnaryOp};
pub use color::{Channel, Color, ColorParseError};
pub use config::EvaluatorConfig;
pub use declaration::{CardDeclarations, VariableDeclaration};
pub use error::{
    ArgumentTypeError, CallKind, ConfigError, ConversionError, DeclarationError, EvalError,
    EvaluationError, ExpressionError, LexError, ParseError, RegistryError, UnknownFunction,
    VariableError,
};
pub use evaluator::{
    EvalContext, Evaluation, Evaluator, ReadSet, Resolved, VariableRead, VariableResolver,
    Warning, evaluate,
};
pub use expression::{Expression, ExpressionCache};
pub use functions::{
    ArgType, ArgumentDeclaration, Arity, CustomFunction, Function, FunctionDeclaration,
    FunctionRegistry, Signature,
};
pub use lexer::{Lexer, Position, tokenize};
pub use parser::{Parser, parse};
pub use subscription::{CardRuntime, ErrorSink, LogSink, SubscriptionHandle, SubscriptionId};
pub use value::{Value, ValueType};
pub use variables::{ScopeId, StoreChange, StoreObserver, Variable, VariableStore};
