//! Reactive subscriptions over a card's variables.
//!
//! A [`CardRuntime`] owns the subscriptions of one card. Subscribing
//! evaluates the expression right away and remembers which variables the
//! evaluation read. When a store mutation touches any of them, the
//! subscription is evaluated again, its read-set replaced, and its callback
//! invoked with the new value.
//!
//! ```
//! use divkit_expr::{CardRuntime, Expression, FunctionRegistry, Value, Variable, VariableStore, ValueType};
//! use std::{cell::RefCell, rc::Rc};
//!
//! let store = VariableStore::new();
//! store.declare(Variable::new("count", ValueType::Integer, Value::Integer(1)).unwrap()).unwrap();
//!
//! let runtime = CardRuntime::new(store.clone(), FunctionRegistry::builtins());
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let sink = seen.clone();
//! let expression = Expression::parse("@{count * 2}").unwrap();
//! let _handle = runtime.subscribe(&expression, move |value| sink.borrow_mut().push(value.clone()));
//!
//! store.set("count", Value::Integer(5)).unwrap();
//! assert_eq!(*seen.borrow(), vec![Value::Integer(2), Value::Integer(10)]);
//! ```

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet},
    fmt,
    rc::{Rc, Weak},
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{
    config::EvaluatorConfig,
    error::{EvaluationError, ExpressionError},
    evaluator::{EvalContext, Evaluation, ReadSet, Warning, evaluate},
    expression::{Expression, ExpressionCache},
    functions::FunctionRegistry,
    value::Value,
    variables::{StoreChange, StoreObserver, VariableStore},
};

/// Receives problems that subscriptions recover from.
pub trait ErrorSink {
    /// An evaluation failed; the subscription keeps its previous value.
    fn report(&self, error: &EvaluationError);

    /// A non-fatal problem, such as a variable getter using its fallback.
    fn warning(&self, _warning: &Warning) {}
}

/// Reports through `tracing` only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, error: &EvaluationError) {
        warn!(expression = %error.expression, cause = %error.cause, "evaluation failed, keeping previous value");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Callback = Rc<dyn Fn(&Value)>;

struct Subscription {
    expression: Expression,
    callback: Callback,
    read_set: ReadSet,
    last_value: Option<Value>,
}

/// Subscriptions, expression cache and function registry of one card.
///
/// Cloning yields another handle to the same runtime.
#[derive(Clone)]
pub struct CardRuntime {
    inner: Rc<RuntimeInner>,
}

struct RuntimeInner {
    store: VariableStore,
    functions: Arc<FunctionRegistry>,
    config: EvaluatorConfig,
    cache: ExpressionCache,
    sink: Rc<dyn ErrorSink>,
    subscriptions: RefCell<BTreeMap<SubscriptionId, Subscription>>,
    next_id: Cell<u64>,
}

impl CardRuntime {
    pub fn new(store: VariableStore, functions: Arc<FunctionRegistry>) -> Self {
        Self::with_config(store, functions, EvaluatorConfig::default(), Rc::new(LogSink))
    }

    pub fn with_config(
        store: VariableStore,
        functions: Arc<FunctionRegistry>,
        config: EvaluatorConfig,
        sink: Rc<dyn ErrorSink>,
    ) -> Self {
        let inner = Rc::new(RuntimeInner {
            cache: ExpressionCache::new(config.clone()),
            store,
            functions,
            config,
            sink,
            subscriptions: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
        });

        // Changes anywhere in the scope chain may affect what we read
        let observer: Weak<dyn StoreObserver> = Rc::downgrade(&inner) as Weak<dyn StoreObserver>;
        for store in inner.store.chain() {
            store.observe(observer.clone());
        }

        CardRuntime { inner }
    }

    /// A runtime over a nested scope of this card's store, e.g. for one list
    /// item, sharing functions, configuration and error sink.
    pub fn child_scope(&self) -> CardRuntime {
        CardRuntime::with_config(
            self.inner.store.child(),
            self.inner.functions.clone(),
            self.inner.config.clone(),
            self.inner.sink.clone(),
        )
    }

    pub fn store(&self) -> &VariableStore {
        &self.inner.store
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.inner.functions
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.inner.config
    }

    /// Parses `source` through the runtime's expression cache.
    pub fn expression(&self, source: &str) -> Result<Expression, ExpressionError> {
        self.inner.cache.get_or_parse(source)
    }

    /// Evaluates once without subscribing.
    pub fn evaluate(&self, expression: &Expression) -> Evaluation {
        self.inner.evaluate(expression)
    }

    /// Subscribes `callback` to the value of `expression`.
    ///
    /// The expression is evaluated immediately; on success the callback
    /// receives the initial value before this returns. On failure the error
    /// goes to the error sink and the callback waits for a successful
    /// re-evaluation.
    pub fn subscribe(
        &self,
        expression: &Expression,
        callback: impl Fn(&Value) + 'static,
    ) -> SubscriptionHandle {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        let evaluation = self.inner.evaluate(expression);
        let callback: Callback = Rc::new(callback);

        debug!(
            subscription = %id,
            expression = expression.source(),
            reads = evaluation.read_set.len(),
            "subscribed"
        );

        self.inner.subscriptions.borrow_mut().insert(
            id,
            Subscription {
                expression: expression.clone(),
                callback: callback.clone(),
                read_set: evaluation.read_set,
                last_value: evaluation.result.as_ref().ok().cloned(),
            },
        );

        match evaluation.result {
            Ok(value) => callback(&value),
            Err(error) => self.inner.sink.report(&error),
        }

        SubscriptionHandle {
            runtime: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Parses `source` and subscribes to it.
    pub fn subscribe_source(
        &self,
        source: &str,
        callback: impl Fn(&Value) + 'static,
    ) -> Result<SubscriptionHandle, ExpressionError> {
        let expression = self.expression(source)?;
        Ok(self.subscribe(&expression, callback))
    }

    /// Ends a subscription. Dropping the handle has the same effect.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        drop(handle);
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.borrow().len()
    }
}

impl fmt::Debug for CardRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardRuntime")
            .field("store", &self.inner.store)
            .field("config", &self.inner.config)
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl RuntimeInner {
    fn evaluate(&self, expression: &Expression) -> Evaluation {
        let ctx = EvalContext::new(&self.store, &self.functions, &self.config);
        let evaluation = evaluate(expression, ctx);
        for warning in &evaluation.warnings {
            self.sink.warning(warning);
        }
        evaluation
    }

    /// Evaluates one subscription again and delivers the result.
    ///
    /// No borrow of the subscription table is held while evaluating or while
    /// the callback runs, so callbacks may write variables or drop handles.
    fn refresh(&self, id: SubscriptionId) {
        let (expression, callback) = match self.subscriptions.borrow().get(&id) {
            Some(subscription) => (subscription.expression.clone(), subscription.callback.clone()),
            None => return,
        };

        let evaluation = self.evaluate(&expression);
        debug!(
            subscription = %id,
            expression = expression.source(),
            ok = evaluation.result.is_ok(),
            "re-evaluated"
        );

        {
            let mut subscriptions = self.subscriptions.borrow_mut();
            let Some(subscription) = subscriptions.get_mut(&id) else {
                return;
            };
            subscription.read_set = evaluation.read_set;
            if let Ok(value) = &evaluation.result {
                subscription.last_value = Some(value.clone());
            }
        }

        match evaluation.result {
            Ok(value) => callback(&value),
            Err(error) => self.sink.report(&error),
        }
    }

    fn remove(&self, id: SubscriptionId) {
        let removed = self.subscriptions.borrow_mut().remove(&id);
        if removed.is_some() {
            debug!(subscription = %id, "unsubscribed");
        }
    }
}

impl StoreObserver for RuntimeInner {
    fn on_change(&self, change: &StoreChange) {
        let affected: Vec<SubscriptionId> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|(_, subscription)| subscription.read_set.is_affected_by(change))
            .map(|(id, _)| *id)
            .collect();

        for id in affected {
            self.refresh(id);
        }
    }
}

/// Keeps a subscription alive; dropping it unsubscribes.
#[must_use = "dropping the handle ends the subscription"]
pub struct SubscriptionHandle {
    runtime: Weak<RuntimeInner>,
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.runtime
            .upgrade()
            .is_some_and(|runtime| runtime.subscriptions.borrow().contains_key(&self.id))
    }

    /// Names read by the most recent evaluation.
    pub fn tracked_variables(&self) -> BTreeSet<String> {
        self.with_subscription(|s| s.read_set.names()).unwrap_or_default()
    }

    /// The most recent successfully evaluated value.
    pub fn last_value(&self) -> Option<Value> {
        self.with_subscription(|s| s.last_value.clone()).flatten()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }

    fn with_subscription<R>(&self, f: impl FnOnce(&Subscription) -> R) -> Option<R> {
        let runtime = self.runtime.upgrade()?;
        let subscriptions = runtime.subscriptions.borrow();
        subscriptions.get(&self.id).map(f)
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle").field("id", &self.id).finish()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.remove(self.id);
        }
    }
}
