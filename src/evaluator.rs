use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::{
    ast::{BinOp, Expr, TemplatePart, UnaryOp},
    config::EvaluatorConfig,
    error::{CallKind, EvalError, EvaluationError},
    expression::Expression,
    functions::{Args, CallContext, CustomFunction, FunctionBody, FunctionRegistry},
    stack::ensure_sufficient_stack,
    value::Value,
    variables::{ScopeId, StoreChange},
};

/// One variable observed during an evaluation.
///
/// `scope` is the store the name resolved in, or `None` when it did not
/// resolve at all.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableRead {
    pub name: String,
    pub scope: Option<ScopeId>,
}

/// Variables observed by one evaluation, in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSet {
    reads: BTreeSet<VariableRead>,
}

impl ReadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, scope: Option<ScopeId>) {
        self.reads.insert(VariableRead {
            name: name.to_string(),
            scope,
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.reads.iter().any(|read| read.name == name)
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.reads.iter().map(|read| read.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableRead> {
        self.reads.iter()
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Whether `change` can alter the result of the evaluation that produced
    /// this set.
    ///
    /// An update matters when it hits the scope a name resolved in. Any
    /// declaration of a read name matters: it may resolve a missing variable
    /// or shadow the one that was read.
    pub fn is_affected_by(&self, change: &StoreChange) -> bool {
        self.reads.iter().any(|read| {
            change.declared.contains(&read.name)
                || change.updated.iter().any(|(scope, name)| {
                    *name == read.name && read.scope.is_none_or(|s| s == *scope)
                })
        })
    }
}

impl<'a> IntoIterator for &'a ReadSet {
    type Item = &'a VariableRead;
    type IntoIter = std::collections::btree_set::Iter<'a, VariableRead>;

    fn into_iter(self) -> Self::IntoIter {
        self.reads.iter()
    }
}

/// A non-fatal problem noticed during evaluation, such as a variable getter
/// falling back to its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub function: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.function, self.message)
    }
}

/// A variable value and the scope it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub scope: Option<ScopeId>,
}

/// Source of variable values for the evaluator.
pub trait VariableResolver {
    fn resolve(&self, name: &str) -> Option<Resolved>;

    /// Whether reads through this resolver belong in the read-set.
    fn tracks_reads(&self) -> bool {
        true
    }
}

/// Plain name to value map, handy for one-off evaluation.
impl VariableResolver for BTreeMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Resolved> {
        self.get(name).map(|value| Resolved {
            value: value.clone(),
            scope: None,
        })
    }
}

/// Argument bindings of a custom function call.
struct ArgumentScope {
    bindings: BTreeMap<String, Value>,
}

impl VariableResolver for ArgumentScope {
    fn resolve(&self, name: &str) -> Option<Resolved> {
        self.bindings.resolve(name)
    }

    fn tracks_reads(&self) -> bool {
        false
    }
}

/// Everything an evaluation reads from outside the expression.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub variables: &'a dyn VariableResolver,
    pub functions: &'a FunctionRegistry,
    pub config: &'a EvaluatorConfig,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        variables: &'a dyn VariableResolver,
        functions: &'a FunctionRegistry,
        config: &'a EvaluatorConfig,
    ) -> Self {
        EvalContext {
            variables,
            functions,
            config,
        }
    }
}

/// Outcome of one evaluation.
///
/// The read-set is kept even when evaluation fails: a failure caused by a
/// missing variable must be retried once that variable appears.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub result: Result<Value, EvaluationError>,
    pub read_set: ReadSet,
    pub warnings: Vec<Warning>,
}

impl Evaluation {
    pub fn value(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    pub fn into_result(self) -> Result<Value, EvaluationError> {
        self.result
    }
}

/// Evaluates `expression` once.
///
/// # Examples
///
/// ```
/// use divkit_expr::{evaluate, EvalContext, EvaluatorConfig, Expression, FunctionRegistry, Value};
/// use std::collections::BTreeMap;
///
/// let mut variables = BTreeMap::new();
/// variables.insert("x".to_string(), Value::Integer(5));
///
/// let functions = FunctionRegistry::builtins();
/// let config = EvaluatorConfig::default();
/// let ctx = EvalContext::new(&variables, &functions, &config);
///
/// let expression = Expression::parse("Value: @{x}, done").unwrap();
/// let evaluation = evaluate(&expression, ctx);
///
/// assert_eq!(evaluation.result, Ok(Value::String("Value: 5, done".to_string())));
/// assert!(evaluation.read_set.contains("x"));
/// ```
pub fn evaluate(expression: &Expression, ctx: EvalContext<'_>) -> Evaluation {
    let Some(ast) = expression.ast() else {
        return Evaluation {
            result: Ok(expression.constant_value().cloned().unwrap_or(Value::String(String::new()))),
            read_set: ReadSet::new(),
            warnings: Vec::new(),
        };
    };

    let mut evaluator = Evaluator::new(ctx);
    let result = evaluator
        .eval(ast)
        .map_err(|cause| EvaluationError::new(cause, expression.source()));
    let (read_set, warnings) = evaluator.finish();

    Evaluation {
        result,
        read_set,
        warnings,
    }
}

/// Tree-walking evaluator.
///
/// Each evaluator collects the reads and warnings of the nodes it visits;
/// use one evaluator per evaluation.
pub struct Evaluator<'a> {
    ctx: EvalContext<'a>,
    reads: ReadSet,
    warnings: Vec<Warning>,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: EvalContext<'a>) -> Self {
        Evaluator {
            ctx,
            reads: ReadSet::new(),
            warnings: Vec::new(),
            depth: 0,
        }
    }

    /// Returns what was collected: the read-set and the warnings.
    pub fn finish(self) -> (ReadSet, Vec<Warning>) {
        (self.reads, self.warnings)
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        let limit = self.ctx.config.max_depth;
        if self.depth >= limit {
            return Err(EvalError::DepthLimitExceeded(limit));
        }

        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.eval_node(expr));
        self.depth -= 1;
        result
    }

    fn eval_node(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Variable(name) => self.read_variable(name),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                apply_unary(*op, value)
            }
            Expr::BinaryOp { op, left, right } if op.is_logical() => {
                // Short-circuit: the right operand is not evaluated (or read)
                // when the left one decides the result.
                let left = self.eval_condition(left, op.symbol())?;
                match (op, left) {
                    (BinOp::And, false) => Ok(Value::Boolean(false)),
                    (BinOp::Or, true) => Ok(Value::Boolean(true)),
                    _ => Ok(Value::Boolean(self.eval_condition(right, op.symbol())?)),
                }
            }
            Expr::BinaryOp { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                apply_binop(*op, &left, &right)
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(condition, "?:")? {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            Expr::Try { expr, fallback } => match self.eval(expr) {
                Ok(value) => Ok(value),
                Err(EvalError::DepthLimitExceeded(limit)) => Err(EvalError::DepthLimitExceeded(limit)),
                Err(_) => self.eval(fallback),
            },
            Expr::FunctionCall { name, args } => {
                let values = self.eval_all(args)?;
                self.call(CallKind::Function, name, values)
            }
            Expr::MethodCall {
                object,
                method,
                args,
            } => {
                let mut values = Vec::with_capacity(args.len() + 1);
                values.push(self.eval(object)?);
                values.extend(self.eval_all(args)?);
                self.call(CallKind::Method, method, values)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                apply_index(object, &index)
            }
            Expr::Template(parts) => {
                let mut result = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => result.push_str(text),
                        TemplatePart::Expr(expr) => {
                            let value = self.eval(expr)?;
                            result.push_str(&value.to_string());
                        }
                    }
                }
                Ok(Value::String(result))
            }
        }
    }

    /// Resolves a variable, recording the read before knowing whether the
    /// name exists.
    fn read_variable(&mut self, name: &str) -> Result<Value, EvalError> {
        let resolved = self.ctx.variables.resolve(name);
        if self.ctx.variables.tracks_reads() {
            self.reads.record(name, resolved.as_ref().and_then(|r| r.scope));
        }
        resolved
            .map(|r| r.value)
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    fn eval_condition(&mut self, expr: &Expr, operator: &'static str) -> Result<bool, EvalError> {
        match self.eval(expr)? {
            Value::Boolean(b) => Ok(b),
            other => Err(EvalError::NonBooleanCondition {
                operator,
                actual: other.value_type(),
            }),
        }
    }

    /// Evaluates arguments left to right.
    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn call(&mut self, kind: CallKind, name: &str, values: Vec<Value>) -> Result<Value, EvalError> {
        let functions = self.ctx.functions;
        let function = functions.select(kind, name, &values)?;
        let args = function.check_args(values)?;

        match &function.body {
            FunctionBody::Native(body) => {
                let mut call = CallContext::new(
                    &function.name,
                    self.ctx.variables,
                    &mut self.reads,
                    &mut self.warnings,
                    self.ctx.config,
                );
                body(&mut call, &args)
            }
            FunctionBody::Custom(custom) => self.call_custom(custom, args),
        }
    }

    /// Runs a custom function body with only its arguments in scope.
    ///
    /// The body shares this evaluation's depth budget, so runaway recursion
    /// between custom functions ends in [`EvalError::DepthLimitExceeded`].
    fn call_custom(&mut self, function: &CustomFunction, args: Args) -> Result<Value, EvalError> {
        let scope = ArgumentScope {
            bindings: function
                .arguments
                .iter()
                .map(|a| a.name.clone())
                .zip(args.values().iter().cloned())
                .collect(),
        };

        let result = match function.body.ast() {
            None => Ok(function.body.constant_value().cloned().unwrap_or(Value::String(String::new()))),
            Some(ast) => {
                let mut nested = Evaluator {
                    ctx: EvalContext {
                        variables: &scope,
                        ..self.ctx
                    },
                    reads: ReadSet::new(),
                    warnings: Vec::new(),
                    depth: self.depth,
                };
                let result = nested.eval(ast);
                self.warnings.append(&mut nested.warnings);
                result
            }
        };

        let value = result.map_err(|cause| match cause {
            EvalError::DepthLimitExceeded(limit) => EvalError::DepthLimitExceeded(limit),
            cause => EvalError::CustomFunction {
                function: function.name.clone(),
                cause: Box::new(cause),
            },
        })?;

        let actual = value.value_type();
        value.conform_to(function.return_type).ok_or(EvalError::ReturnType {
            function: function.name.clone(),
            expected: function.return_type,
            actual,
        })
    }
}

fn apply_unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOp::Not, other) => Err(EvalError::NonBooleanCondition {
            operator: op.symbol(),
            actual: other.value_type(),
        }),
        (UnaryOp::Negate, Value::Integer(n)) => n
            .checked_neg()
            .map(Value::Integer)
            .ok_or(EvalError::IntegerOverflow {
                operator: op.symbol(),
            }),
        (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Plus, value @ (Value::Integer(_) | Value::Number(_))) => Ok(value),
        (op, other) => Err(EvalError::InvalidOperand {
            operator: op.symbol(),
            operand: other.value_type(),
        }),
    }
}

fn apply_index(object: Value, index: &Value) -> Result<Value, EvalError> {
    match (object, index) {
        (Value::Array(mut items), Value::Integer(i)) => {
            let len = items.len();
            match usize::try_from(*i) {
                Ok(position) if position < len => Ok(items.swap_remove(position)),
                _ => Err(EvalError::IndexOutOfBounds { index: *i, len }),
            }
        }
        (Value::Dict(mut map), Value::String(key)) => map
            .remove(key)
            .ok_or_else(|| EvalError::MissingKey(key.clone())),
        (object, index) => Err(EvalError::NotIndexable {
            target: object.value_type(),
            key: index.value_type(),
        }),
    }
}

fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let operator = op.symbol();
    let invalid = || EvalError::InvalidOperands {
        operator,
        left: left.value_type(),
        right: right.value_type(),
    };
    let overflow = || EvalError::IntegerOverflow { operator };

    match op {
        BinOp::Add => match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => a.checked_add(*b).map(Value::Integer).ok_or_else(overflow),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            _ => numeric(left, right).map(|(a, b)| Value::Number(a + b)).ok_or_else(invalid),
        },
        BinOp::Subtract => match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => a.checked_sub(*b).map(Value::Integer).ok_or_else(overflow),
            _ => numeric(left, right).map(|(a, b)| Value::Number(a - b)).ok_or_else(invalid),
        },
        BinOp::Multiply => match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => a.checked_mul(*b).map(Value::Integer).ok_or_else(overflow),
            _ => numeric(left, right).map(|(a, b)| Value::Number(a * b)).ok_or_else(invalid),
        },
        // Division always produces a number, even for two integers
        BinOp::Divide => {
            let (a, b) = numeric(left, right).ok_or_else(invalid)?;
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(a / b))
        }
        BinOp::Modulo => match (left, right) {
            (Value::Integer(_), Value::Integer(0)) => Err(EvalError::DivisionByZero),
            (Value::Integer(a), Value::Integer(b)) => a.checked_rem(*b).map(Value::Integer).ok_or_else(overflow),
            _ => {
                let (a, b) = numeric(left, right).ok_or_else(invalid)?;
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(Value::Number(a % b))
            }
        },
        BinOp::Equal => values_equal(left, right).map(Value::Boolean).ok_or_else(invalid),
        BinOp::NotEqual => values_equal(left, right).map(|eq| Value::Boolean(!eq)).ok_or_else(invalid),
        BinOp::LessThan | BinOp::GreaterThan | BinOp::LessEqual | BinOp::GreaterEqual => {
            let ordering = compare(left, right).ok_or_else(invalid)?;
            let result = match (op, ordering) {
                // NaN compares false with everything
                (_, None) => false,
                (BinOp::LessThan, Some(o)) => o.is_lt(),
                (BinOp::GreaterThan, Some(o)) => o.is_gt(),
                (BinOp::LessEqual, Some(o)) => o.is_le(),
                (_, Some(o)) => o.is_ge(),
            };
            Ok(Value::Boolean(result))
        }
        BinOp::And | BinOp::Or => Err(invalid()),
    }
}

/// Both operands as numbers, when both are numeric.
fn numeric(left: &Value, right: &Value) -> Option<(f64, f64)> {
    Some((left.as_number()?, right.as_number()?))
}

/// Equality of same-typed values; integers and numbers compare by value.
/// `None` when the types cannot be compared.
fn values_equal(left: &Value, right: &Value) -> Option<bool> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a == b),
        (Value::Integer(_) | Value::Number(_), Value::Integer(_) | Value::Number(_)) => {
            let (a, b) = numeric(left, right)?;
            Some(a == b)
        }
        _ if left.value_type() == right.value_type() => Some(left == right),
        _ => None,
    }
}

/// Ordering of numerics and datetimes. The outer `None` marks incomparable
/// types, the inner one an unordered pair (NaN).
fn compare(left: &Value, right: &Value) -> Option<Option<std::cmp::Ordering>> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(Some(a.cmp(b))),
        (Value::DateTime(a), Value::DateTime(b)) => Some(Some(a.cmp(b))),
        _ => {
            let (a, b) = numeric(left, right)?;
            Some(a.partial_cmp(&b))
        }
    }
}
