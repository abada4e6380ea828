//! Typed function registry.
//!
//! Functions are looked up by name and argument count. Several overloads may
//! share a name and arity when their argument types differ (`abs(integer)`
//! and `abs(number)`); the first overload, in registration order, whose
//! signature accepts the evaluated arguments is invoked.
//!
//! Methods (`receiver.name(args)`) live in a separate table. A method's
//! signature lists the receiver as its first argument.
//!
//! The built-in registry is created once per process and shared. A card adds
//! its custom functions to a child registry layered over the built-ins.

mod collections;
mod colors;
mod convert;
mod custom;
mod datetime;
mod getters;
mod math;
mod strings;

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{Arc, OnceLock},
};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
    color::Color,
    config::EvaluatorConfig,
    error::{ArgumentTypeError, CallKind, EvalError, RegistryError, UnknownFunction},
    evaluator::{ReadSet, VariableResolver, Warning},
    value::{Value, ValueType},
};

pub use custom::{ArgumentDeclaration, CustomFunction, FunctionDeclaration};

/// Accepted type of one argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// Exactly this type. An integer passed for a number is widened.
    Of(ValueType),
    /// Integer or number, passed through unchanged.
    Numeric,
    Any,
    OneOf(&'static [ValueType]),
}

impl ArgType {
    pub fn accepts(&self, ty: ValueType) -> bool {
        match self {
            ArgType::Of(ValueType::Number) => matches!(ty, ValueType::Number | ValueType::Integer),
            ArgType::Of(expected) => *expected == ty,
            ArgType::Numeric => matches!(ty, ValueType::Integer | ValueType::Number),
            ArgType::Any => true,
            ArgType::OneOf(types) => types.contains(&ty),
        }
    }

    fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (ArgType::Of(ValueType::Number), Value::Integer(n)) => Value::Number(n as f64),
            (_, value) => value,
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::Of(ty) => write!(f, "{}", ty),
            ArgType::Numeric => f.write_str("integer or number"),
            ArgType::Any => f.write_str("any"),
            ArgType::OneOf(types) => {
                let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
                f.write_str(&names.join(" or "))
            }
        }
    }
}

/// Number of arguments a signature takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn matches(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }

    /// Whether some argument count satisfies both arities.
    pub fn overlaps(self, other: Arity) -> bool {
        match (self, other) {
            (Arity::Exact(a), Arity::Exact(b)) => a == b,
            (Arity::Exact(n), Arity::AtLeast(min)) | (Arity::AtLeast(min), Arity::Exact(n)) => {
                n >= min
            }
            (Arity::AtLeast(_), Arity::AtLeast(_)) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub args: Vec<ArgType>,
    pub variadic: Option<ArgType>,
    pub returns: ValueType,
}

impl Signature {
    pub fn new(args: impl Into<Vec<ArgType>>, returns: ValueType) -> Self {
        Signature {
            args: args.into(),
            variadic: None,
            returns,
        }
    }

    /// Accepts any number of further arguments of type `tail`.
    pub fn variadic(mut self, tail: ArgType) -> Self {
        self.variadic = Some(tail);
        self
    }

    pub fn arity(&self) -> Arity {
        match self.variadic {
            Some(_) => Arity::AtLeast(self.args.len()),
            None => Arity::Exact(self.args.len()),
        }
    }

    fn arg_type(&self, index: usize) -> Option<&ArgType> {
        self.args.get(index).or(self.variadic.as_ref())
    }
}

pub type NativeFn = fn(&mut CallContext<'_>, &Args) -> Result<Value, EvalError>;

#[derive(Clone)]
pub enum FunctionBody {
    Native(NativeFn),
    Custom(Arc<CustomFunction>),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Native(_) => f.write_str("Native"),
            FunctionBody::Custom(function) => f.debug_tuple("Custom").field(function).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub signature: Signature,
    pub body: FunctionBody,
}

impl Function {
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.signature.arity().matches(args.len())
            && args.iter().enumerate().all(|(i, arg)| {
                self.signature
                    .arg_type(i)
                    .is_some_and(|ty| ty.accepts(arg.value_type()))
            })
    }

    /// Validates `args` against the signature and applies the integer to
    /// number widening.
    pub fn check_args(&self, args: Vec<Value>) -> Result<Args, ArgumentTypeError> {
        let mut checked = Vec::with_capacity(args.len());
        for (i, arg) in args.into_iter().enumerate() {
            let expected = self.signature.arg_type(i).copied().unwrap_or(ArgType::Any);
            if !expected.accepts(arg.value_type()) {
                return Err(ArgumentTypeError {
                    function: self.name.clone(),
                    position: i + 1,
                    expected: expected.to_string(),
                    actual: arg.value_type(),
                });
            }
            checked.push(expected.coerce(arg));
        }
        Ok(Args {
            function: self.name.clone(),
            values: checked,
        })
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.body, FunctionBody::Custom(_))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params: Vec<String> = self.signature.args.iter().map(ToString::to_string).collect();
        if let Some(tail) = &self.signature.variadic {
            params.push(format!("{}...", tail));
        }
        write!(f, "{}({}) -> {}", self.name, params.join(", "), self.signature.returns)
    }
}

/// Checked arguments of one call.
#[derive(Debug, Clone)]
pub struct Args {
    function: String,
    values: Vec<Value>,
}

impl Args {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Result<&Value, EvalError> {
        self.values.get(index).ok_or_else(|| EvalError::Function {
            function: self.function.clone(),
            message: format!("missing argument {}", index + 1),
        })
    }

    fn mismatch(&self, index: usize, expected: ValueType) -> EvalError {
        let actual = self
            .values
            .get(index)
            .map(Value::value_type)
            .unwrap_or(expected);
        EvalError::ArgumentType(ArgumentTypeError {
            function: self.function.clone(),
            position: index + 1,
            expected: expected.to_string(),
            actual,
        })
    }

    pub fn integer(&self, index: usize) -> Result<i64, EvalError> {
        match self.get(index)? {
            Value::Integer(n) => Ok(*n),
            _ => Err(self.mismatch(index, ValueType::Integer)),
        }
    }

    /// Reads a number, widening an integer.
    pub fn number(&self, index: usize) -> Result<f64, EvalError> {
        self.get(index)?
            .as_number()
            .ok_or_else(|| self.mismatch(index, ValueType::Number))
    }

    pub fn string(&self, index: usize) -> Result<&str, EvalError> {
        match self.get(index)? {
            Value::String(s) => Ok(s),
            _ => Err(self.mismatch(index, ValueType::String)),
        }
    }

    pub fn boolean(&self, index: usize) -> Result<bool, EvalError> {
        match self.get(index)? {
            Value::Boolean(b) => Ok(*b),
            _ => Err(self.mismatch(index, ValueType::Boolean)),
        }
    }

    /// Reads a color, parsing string arguments.
    pub fn color(&self, index: usize) -> Result<Color, EvalError> {
        match self.get(index)? {
            Value::Color(c) => Ok(*c),
            Value::String(s) => Color::parse(s).map_err(|e| EvalError::Function {
                function: self.function.clone(),
                message: e.to_string(),
            }),
            _ => Err(self.mismatch(index, ValueType::Color)),
        }
    }

    pub fn datetime(&self, index: usize) -> Result<DateTime<Utc>, EvalError> {
        match self.get(index)? {
            Value::DateTime(dt) => Ok(*dt),
            _ => Err(self.mismatch(index, ValueType::DateTime)),
        }
    }

    pub fn array(&self, index: usize) -> Result<&[Value], EvalError> {
        match self.get(index)? {
            Value::Array(items) => Ok(items),
            _ => Err(self.mismatch(index, ValueType::Array)),
        }
    }

    pub fn dict(&self, index: usize) -> Result<&BTreeMap<String, Value>, EvalError> {
        match self.get(index)? {
            Value::Dict(map) => Ok(map),
            _ => Err(self.mismatch(index, ValueType::Dict)),
        }
    }

    /// Arguments from `index` on, for variadic functions.
    pub fn rest(&self, index: usize) -> &[Value] {
        self.values.get(index..).unwrap_or(&[])
    }
}

/// What a native function may observe and report during a call.
pub struct CallContext<'a> {
    function: &'a str,
    variables: &'a dyn VariableResolver,
    reads: &'a mut ReadSet,
    warnings: &'a mut Vec<Warning>,
    config: &'a EvaluatorConfig,
}

impl<'a> CallContext<'a> {
    pub fn new(
        function: &'a str,
        variables: &'a dyn VariableResolver,
        reads: &'a mut ReadSet,
        warnings: &'a mut Vec<Warning>,
        config: &'a EvaluatorConfig,
    ) -> Self {
        CallContext {
            function,
            variables,
            reads,
            warnings,
            config,
        }
    }

    pub fn function(&self) -> &str {
        self.function
    }

    pub fn config(&self) -> &EvaluatorConfig {
        self.config
    }

    /// Looks a variable up by name, recording the read whether or not the
    /// variable exists.
    pub fn read_variable(&mut self, name: &str) -> Option<Value> {
        let resolved = self.variables.resolve(name);
        if self.variables.tracks_reads() {
            self.reads
                .record(name, resolved.as_ref().and_then(|r| r.scope));
        }
        resolved.map(|r| r.value)
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(function = self.function, "{}", message);
        self.warnings.push(Warning {
            function: self.function.to_string(),
            message,
        });
    }

    /// Builds a failure attributed to the called function.
    pub fn fail(&self, message: impl Into<String>) -> EvalError {
        EvalError::Function {
            function: self.function.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FunctionRegistry {
    parent: Option<Arc<FunctionRegistry>>,
    functions: HashMap<String, Vec<Function>>,
    methods: HashMap<String, Vec<Function>>,
}

impl FunctionRegistry {
    /// An empty registry with no built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared registry of built-in functions and methods.
    pub fn builtins() -> Arc<FunctionRegistry> {
        static BUILTINS: OnceLock<Arc<FunctionRegistry>> = OnceLock::new();
        BUILTINS
            .get_or_init(|| {
                let mut registry = FunctionRegistry::new();
                strings::register(&mut registry);
                math::register(&mut registry);
                convert::register(&mut registry);
                colors::register(&mut registry);
                datetime::register(&mut registry);
                collections::register(&mut registry);
                getters::register(&mut registry);
                Arc::new(registry)
            })
            .clone()
    }

    /// A registry whose lookups fall through to `parent`.
    pub fn child(parent: Arc<FunctionRegistry>) -> Self {
        FunctionRegistry {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub(crate) fn add_function(&mut self, name: &str, signature: Signature, body: NativeFn) {
        insert(&mut self.functions, name, signature, FunctionBody::Native(body));
    }

    pub(crate) fn add_method(&mut self, name: &str, signature: Signature, body: NativeFn) {
        insert(&mut self.methods, name, signature, FunctionBody::Native(body));
    }

    /// Registers a native function, rejecting a name and arity that is
    /// already taken here or in a parent registry.
    pub fn register(
        &mut self,
        name: &str,
        signature: Signature,
        body: NativeFn,
    ) -> Result<(), RegistryError> {
        self.ensure_free(name, signature.arity())?;
        self.add_function(name, signature, body);
        Ok(())
    }

    /// Registers a card-declared function.
    pub fn register_custom(&mut self, declaration: &FunctionDeclaration) -> Result<(), RegistryError> {
        let function = CustomFunction::compile(declaration)?;
        let signature = function.signature();
        self.ensure_free(&declaration.name, signature.arity())?;
        insert(
            &mut self.functions,
            &declaration.name,
            signature,
            FunctionBody::Custom(Arc::new(function)),
        );
        Ok(())
    }

    fn ensure_free(&self, name: &str, arity: Arity) -> Result<(), RegistryError> {
        let mut registry = Some(self);
        while let Some(current) = registry {
            let taken = current
                .functions
                .get(name)
                .is_some_and(|overloads| overloads.iter().any(|f| f.signature.arity().overlaps(arity)));
            if taken {
                let arity = match arity {
                    Arity::Exact(n) | Arity::AtLeast(n) => n,
                };
                return Err(RegistryError::DuplicateFunction {
                    name: name.to_string(),
                    arity,
                });
            }
            registry = current.parent.as_deref();
        }
        Ok(())
    }

    /// First function named `name` that takes `arity` arguments.
    pub fn resolve(&self, name: &str, arity: usize) -> Result<&Function, UnknownFunction> {
        self.candidates(CallKind::Function, name, arity)
            .into_iter()
            .next()
            .ok_or_else(|| UnknownFunction {
                kind: CallKind::Function,
                name: name.to_string(),
                arity,
            })
    }

    /// First method named `name` taking `arity` arguments, receiver included.
    pub fn resolve_method(&self, name: &str, arity: usize) -> Result<&Function, UnknownFunction> {
        self.candidates(CallKind::Method, name, arity)
            .into_iter()
            .next()
            .ok_or_else(|| UnknownFunction {
                kind: CallKind::Method,
                name: name.to_string(),
                arity,
            })
    }

    /// Picks the overload that accepts `args`.
    ///
    /// When the name and arity exist but no overload accepts the argument
    /// types, the error describes the mismatch against the first overload.
    pub fn select(&self, kind: CallKind, name: &str, args: &[Value]) -> Result<&Function, EvalError> {
        let candidates = self.candidates(kind, name, args.len());
        if let Some(function) = candidates.iter().copied().find(|f| f.accepts(args)) {
            return Ok(function);
        }
        match candidates.first().copied() {
            Some(function) => match function.check_args(args.to_vec()) {
                Err(mismatch) => Err(mismatch.into()),
                Ok(_) => Ok(function),
            },
            None => Err(UnknownFunction {
                kind,
                name: name.to_string(),
                arity: args.len(),
            }
            .into()),
        }
    }

    fn candidates(&self, kind: CallKind, name: &str, arity: usize) -> Vec<&Function> {
        let mut found = Vec::new();
        let mut registry = Some(self);
        while let Some(current) = registry {
            let table = match kind {
                CallKind::Function => &current.functions,
                CallKind::Method => &current.methods,
            };
            if let Some(overloads) = table.get(name) {
                found.extend(overloads.iter().filter(|f| f.signature.arity().matches(arity)));
            }
            registry = current.parent.as_deref();
        }
        found
    }

    /// Every registered function and method, sorted by name.
    pub fn signatures(&self) -> Vec<(CallKind, &Function)> {
        let mut all = Vec::new();
        let mut registry = Some(self);
        while let Some(current) = registry {
            for overloads in current.functions.values() {
                all.extend(overloads.iter().map(|f| (CallKind::Function, f)));
            }
            for overloads in current.methods.values() {
                all.extend(overloads.iter().map(|f| (CallKind::Method, f)));
            }
            registry = current.parent.as_deref();
        }
        all.sort_by(|(ka, a), (kb, b)| {
            a.name
                .cmp(&b.name)
                .then_with(|| (*ka == CallKind::Method).cmp(&(*kb == CallKind::Method)))
                .then_with(|| a.signature.args.len().cmp(&b.signature.args.len()))
        });
        all
    }
}

fn insert(table: &mut HashMap<String, Vec<Function>>, name: &str, signature: Signature, body: FunctionBody) {
    table.entry(name.to_string()).or_default().push(Function {
        name: name.to_string(),
        signature,
        body,
    });
}

/// Element type of a typed lookup.
pub(crate) trait Element {
    const TYPE: ValueType;
    const SUFFIX: &'static str;
}

macro_rules! element {
    ($marker:ident, $ty:ident) => {
        pub(crate) struct $marker;

        impl Element for $marker {
            const TYPE: ValueType = ValueType::$ty;
            const SUFFIX: &'static str = stringify!($ty);
        }
    };
}

element!(IntegerElement, Integer);
element!(NumberElement, Number);
element!(StringElement, String);
element!(BooleanElement, Boolean);
element!(ColorElement, Color);
element!(UrlElement, Url);
element!(ArrayElement, Array);
element!(DictElement, Dict);

/// Reads `value` as `ty` for typed lookups: integers widen to numbers and
/// strings are accepted as colors and urls.
pub(crate) fn read_as(value: &Value, ty: ValueType) -> Option<Value> {
    match (ty, value) {
        (ValueType::Color, Value::String(s)) => Color::parse(s).ok().map(Value::Color),
        (ValueType::Url, Value::String(s)) => Some(Value::Url(s.clone())),
        _ => value.clone().conform_to(ty),
    }
}

/// Argument type of a fallback value for a lookup returning `ty`.
pub(crate) fn fallback_arg(ty: ValueType) -> ArgType {
    match ty {
        ValueType::Color => ArgType::OneOf(&[ValueType::Color, ValueType::String]),
        ValueType::Url => ArgType::OneOf(&[ValueType::Url, ValueType::String]),
        ty => ArgType::Of(ty),
    }
}

/// Registers the same native body under the same name for several
/// signatures.
pub(crate) fn add_overloads(
    registry: &mut FunctionRegistry,
    name: &str,
    signatures: impl IntoIterator<Item = Signature>,
    body: NativeFn,
) {
    for signature in signatures {
        registry.add_function(name, signature, body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_overlap() {
        assert!(Arity::Exact(2).overlaps(Arity::Exact(2)));
        assert!(!Arity::Exact(1).overlaps(Arity::Exact(2)));
        assert!(Arity::Exact(3).overlaps(Arity::AtLeast(1)));
        assert!(!Arity::Exact(0).overlaps(Arity::AtLeast(1)));
        assert!(Arity::AtLeast(4).overlaps(Arity::AtLeast(1)));
    }

    #[test]
    fn test_number_accepts_integer_and_widens() {
        let ty = ArgType::Of(ValueType::Number);
        assert!(ty.accepts(ValueType::Integer));
        assert_eq!(ty.coerce(Value::Integer(2)), Value::Number(2.0));
        assert_eq!(ArgType::Numeric.coerce(Value::Integer(2)), Value::Integer(2));
        assert!(!ArgType::Of(ValueType::Integer).accepts(ValueType::Number));
    }

    #[test]
    fn test_signature_display() {
        let registry = FunctionRegistry::builtins();
        let function = registry.resolve("padStart", 3).unwrap();
        assert_eq!(
            function.to_string(),
            "padStart(string or integer, integer, string) -> string"
        );
    }
}
