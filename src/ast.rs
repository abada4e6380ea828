//! # DivKit Expression Language - Abstract Syntax Tree
//!
//! Expressions live inside JSON string fields of a card. Literal text is
//! interleaved with `@{ ... }` spans that are evaluated against the card's
//! variables:
//!
//! ```text
//! "Hello, @{user_name}! You have @{count + 1} new messages."
//! ```
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, references, operations, templates)
//! - **[operators]** - Unary and binary operators
//!
//! ## Typing of templates
//!
//! A source string consisting of exactly one span (`@{count}`) evaluates to
//! the native type of the inner expression. Anything else, including a single
//! span with surrounding whitespace, evaluates to a string: each span is
//! converted to its string form and concatenated with the literal text.
//!
//! ## Operators
//!
//! From tightest to loosest binding:
//!
//! ```text
//! f(x)  x.m()  x[i]        call, method call, index
//! !x  -x  +x               unary
//! *  /  %                  multiplicative
//! +  -                     additive
//! <  <=  >  >=             comparison
//! ==  !=                   equality
//! &&                       logical and (short-circuit)
//! ||                       logical or (short-circuit)
//! a !: b                   try: `b` when `a` fails to evaluate
//! c ? a : b                ternary (right associative)
//! ```
//!
//! ## String literals
//!
//! Inside a span, strings use single quotes and may embed spans of their own:
//!
//! ```text
//! @{ is_vip ? 'Welcome back, @{name}' : 'Hello' }
//! ```
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::{Expr, TemplatePart};
pub use operators::{BinOp, UnaryOp};
pub use tokens::{Token, TokenKind};
