use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use tracing::{trace, warn};

use crate::{
    ast::Expr, config::EvaluatorConfig, error::ExpressionError, parser, value::Value,
};

/// A parsed expression source string.
///
/// Sources without any `@{...}` span are constants and never touch the
/// evaluator. Everything else keeps its AST behind an `Arc`, so clones are
/// cheap and the tree can be shared between threads.
///
/// ```
/// use divkit_expr::Expression;
///
/// let title = Expression::parse("Inbox").unwrap();
/// assert!(title.is_constant());
///
/// let counter = Expression::parse("Unread: @{count}").unwrap();
/// assert!(counter.variables().contains("count"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: Arc<str>,
    kind: ExpressionKind,
}

#[derive(Debug, Clone, PartialEq)]
enum ExpressionKind {
    Constant(Value),
    Mutable(Arc<Expr>),
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        Self::parse_with(source, &EvaluatorConfig::default())
    }

    /// Parses `source`, rejecting it when longer than
    /// `config.max_expression_length` characters.
    pub fn parse_with(source: &str, config: &EvaluatorConfig) -> Result<Self, ExpressionError> {
        let length = source.chars().count();
        if length > config.max_expression_length {
            return Err(ExpressionError::TooLong {
                length,
                limit: config.max_expression_length,
            });
        }

        let kind = match parser::parse(source)? {
            Expr::String(text) => ExpressionKind::Constant(Value::String(text)),
            ast => ExpressionKind::Mutable(Arc::new(ast)),
        };
        Ok(Expression {
            source: Arc::from(source),
            kind,
        })
    }

    /// Parses `source`, substituting `fallback` when it is malformed.
    pub fn parse_or(source: &str, fallback: Value) -> Self {
        match Self::parse(source) {
            Ok(expression) => expression,
            Err(error) => {
                warn!(source, %error, "malformed expression, using fallback value");
                Expression {
                    source: Arc::from(source),
                    kind: ExpressionKind::Constant(fallback),
                }
            }
        }
    }

    pub fn constant(value: Value) -> Self {
        Expression {
            source: Arc::from(value.to_string()),
            kind: ExpressionKind::Constant(value),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ExpressionKind::Constant(_))
    }

    pub fn constant_value(&self) -> Option<&Value> {
        match &self.kind {
            ExpressionKind::Constant(value) => Some(value),
            ExpressionKind::Mutable(_) => None,
        }
    }

    pub fn ast(&self) -> Option<&Arc<Expr>> {
        match &self.kind {
            ExpressionKind::Constant(_) => None,
            ExpressionKind::Mutable(ast) => Some(ast),
        }
    }

    /// Variables referenced by name anywhere in the expression.
    ///
    /// This is a static upper bound on plain references; the read-set of an
    /// evaluation only covers the branches that ran, plus names read through
    /// the variable getter functions.
    pub fn variables(&self) -> BTreeSet<String> {
        self.ast().map(|ast| ast.variables()).unwrap_or_default()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parsed expressions keyed by source string.
///
/// Cards repeat the same expression across many properties and list items;
/// each distinct source is parsed once.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    config: EvaluatorConfig,
    entries: RefCell<HashMap<Arc<str>, Expression>>,
}

impl ExpressionCache {
    pub fn new(config: EvaluatorConfig) -> Self {
        ExpressionCache {
            config,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn get_or_parse(&self, source: &str) -> Result<Expression, ExpressionError> {
        if let Some(expression) = self.entries.borrow().get(source) {
            trace!(source, "expression cache hit");
            return Ok(expression.clone());
        }

        let expression = Expression::parse_with(source, &self.config)?;
        self.entries
            .borrow_mut()
            .insert(expression.source.clone(), expression.clone());
        Ok(expression)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
