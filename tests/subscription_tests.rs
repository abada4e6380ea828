// tests/subscription_tests.rs

use divkit_expr::{
    CardRuntime, ErrorSink, EvalError, EvaluationError, EvaluatorConfig, FunctionRegistry,
    SubscriptionHandle, Value, ValueType, Variable, VariableStore, Warning,
};
use std::{cell::RefCell, rc::Rc};

#[derive(Default)]
struct RecordingSink {
    errors: RefCell<Vec<EvaluationError>>,
    warnings: RefCell<Vec<Warning>>,
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &EvaluationError) {
        self.errors.borrow_mut().push(error.clone());
    }

    fn warning(&self, warning: &Warning) {
        self.warnings.borrow_mut().push(warning.clone());
    }
}

type Seen = Rc<RefCell<Vec<Value>>>;

fn integer(name: &str, value: i64) -> Variable {
    Variable::new(name, ValueType::Integer, Value::Integer(value)).unwrap()
}

fn runtime_with(variables: Vec<Variable>) -> (CardRuntime, Rc<RecordingSink>) {
    let store = VariableStore::new();
    store.declare_all(variables).unwrap();
    let sink = Rc::new(RecordingSink::default());
    let runtime = CardRuntime::with_config(
        store,
        FunctionRegistry::builtins(),
        EvaluatorConfig::default(),
        sink.clone(),
    );
    (runtime, sink)
}

fn watch(runtime: &CardRuntime, source: &str) -> (Seen, SubscriptionHandle) {
    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let handle = runtime
        .subscribe_source(source, move |value| sink.borrow_mut().push(value.clone()))
        .unwrap();
    (seen, handle)
}

fn integers(seen: &Seen) -> Vec<i64> {
    seen.borrow()
        .iter()
        .map(|value| match value {
            Value::Integer(n) => *n,
            other => panic!("expected integer, got {:?}", other),
        })
        .collect()
}

// ============================================================================
// Basic Delivery
// ============================================================================

#[test]
fn test_initial_value_and_update() {
    let (runtime, _sink) = runtime_with(vec![integer("count", 1)]);
    let (seen, _handle) = watch(&runtime, "@{count * 2}");

    runtime.store().set("count", Value::Integer(5)).unwrap();
    assert_eq!(integers(&seen), vec![2, 10]);
}

#[test]
fn test_unrelated_change_is_ignored() {
    let (runtime, _sink) = runtime_with(vec![integer("count", 1), integer("other", 0)]);
    let (seen, _handle) = watch(&runtime, "@{count}");

    runtime.store().set("other", Value::Integer(9)).unwrap();
    assert_eq!(integers(&seen), vec![1]);
}

#[test]
fn test_batch_update_delivers_once() {
    let (runtime, _sink) = runtime_with(vec![integer("a", 1), integer("b", 2)]);
    let (seen, _handle) = watch(&runtime, "@{a + b}");

    runtime
        .store()
        .batch_set([("a", Value::Integer(10)), ("b", Value::Integer(20))])
        .unwrap();
    assert_eq!(integers(&seen), vec![3, 30]);
}

#[test]
fn test_batch_of_three_delivers_once() {
    let (runtime, _sink) = runtime_with(vec![integer("a", 1), integer("b", 2), integer("c", 3)]);
    let (seen, _handle) = watch(&runtime, "@{a + b * c}");

    runtime
        .store()
        .batch_set([
            ("a", Value::Integer(10)),
            ("b", Value::Integer(20)),
            ("c", Value::Integer(30)),
        ])
        .unwrap();
    assert_eq!(integers(&seen), vec![7, 610]);
}

#[test]
fn test_handle_reports_state() {
    let (runtime, _sink) = runtime_with(vec![integer("count", 4)]);
    let (_seen, handle) = watch(&runtime, "@{count + 1}");

    assert!(handle.is_active());
    assert_eq!(handle.last_value(), Some(Value::Integer(5)));
    assert_eq!(
        handle.tracked_variables().into_iter().collect::<Vec<_>>(),
        vec!["count"]
    );
    assert_eq!(runtime.subscription_count(), 1);
}

#[test]
fn test_dropping_handle_unsubscribes() {
    let (runtime, _sink) = runtime_with(vec![integer("count", 1)]);
    let (seen, handle) = watch(&runtime, "@{count}");

    drop(handle);
    assert_eq!(runtime.subscription_count(), 0);

    runtime.store().set("count", Value::Integer(2)).unwrap();
    assert_eq!(integers(&seen), vec![1]);
}

#[test]
fn test_explicit_unsubscribe() {
    let (runtime, _sink) = runtime_with(vec![integer("count", 1)]);
    let (seen, handle) = watch(&runtime, "@{count}");

    runtime.unsubscribe(handle);
    runtime.store().set("count", Value::Integer(2)).unwrap();
    assert_eq!(integers(&seen), vec![1]);
}

#[test]
fn test_constant_expression_fires_once() {
    let (runtime, _sink) = runtime_with(vec![integer("count", 1)]);
    let (seen, handle) = watch(&runtime, "static text");

    runtime.store().set("count", Value::Integer(2)).unwrap();
    assert_eq!(*seen.borrow(), vec![Value::String("static text".into())]);
    assert!(handle.tracked_variables().is_empty());
}

// ============================================================================
// Dynamic Dependencies
// ============================================================================

#[test]
fn test_read_set_follows_taken_branch() {
    let store = VariableStore::new();
    store
        .declare_all(vec![
            Variable::new("flag", ValueType::Boolean, Value::Boolean(true)).unwrap(),
            integer("a", 1),
            integer("b", 2),
        ])
        .unwrap();
    let runtime = CardRuntime::new(store.clone(), FunctionRegistry::builtins());
    let (seen, handle) = watch(&runtime, "@{flag ? a : b}");

    // `b` is not read while the condition holds
    store.set("b", Value::Integer(20)).unwrap();
    assert_eq!(integers(&seen), vec![1]);

    store.set("flag", Value::Boolean(false)).unwrap();
    assert_eq!(integers(&seen), vec![1, 20]);
    assert_eq!(
        handle.tracked_variables().into_iter().collect::<Vec<_>>(),
        vec!["b", "flag"]
    );

    // Now `a` is irrelevant and `b` matters
    store.set("a", Value::Integer(100)).unwrap();
    store.set("b", Value::Integer(21)).unwrap();
    assert_eq!(integers(&seen), vec![1, 20, 21]);
}

#[test]
fn test_missing_variable_recovers_when_declared() {
    let (runtime, sink) = runtime_with(vec![]);
    let (seen, handle) = watch(&runtime, "@{late + 1}");

    assert!(seen.borrow().is_empty());
    assert_eq!(sink.errors.borrow().len(), 1);
    assert_eq!(
        sink.errors.borrow()[0].cause,
        EvalError::UndefinedVariable("late".into())
    );
    assert_eq!(handle.last_value(), None);

    runtime.store().declare(integer("late", 41)).unwrap();
    assert_eq!(integers(&seen), vec![42]);
}

#[test]
fn test_getter_dependency_on_undeclared_name() {
    let (runtime, sink) = runtime_with(vec![]);
    let (seen, _handle) = watch(&runtime, "@{getIntegerValue('x', 0)}");

    assert_eq!(sink.warnings.borrow().len(), 1);
    runtime.store().declare(integer("x", 5)).unwrap();
    runtime.store().set("x", Value::Integer(6)).unwrap();
    assert_eq!(integers(&seen), vec![0, 5, 6]);
}

#[test]
fn test_failed_reevaluation_keeps_last_value() {
    let (runtime, sink) = runtime_with(vec![integer("d", 2)]);
    let (seen, handle) = watch(&runtime, "@{div(10, d)}");

    runtime.store().set("d", Value::Integer(0)).unwrap();
    assert_eq!(sink.errors.borrow().len(), 1);
    assert_eq!(sink.errors.borrow()[0].cause, EvalError::DivisionByZero);
    assert_eq!(handle.last_value(), Some(Value::Integer(5)));

    runtime.store().set("d", Value::Integer(5)).unwrap();
    assert_eq!(integers(&seen), vec![5, 2]);
}

// ============================================================================
// Scopes
// ============================================================================

#[test]
fn test_child_scope_sees_parent_updates() {
    let (runtime, _sink) = runtime_with(vec![integer("count", 1)]);
    let item = runtime.child_scope();
    item.store().declare(integer("index", 3)).unwrap();

    let (seen, _handle) = watch(&item, "@{count * 10 + index}");
    runtime.store().set("count", Value::Integer(2)).unwrap();
    item.store().set("index", Value::Integer(4)).unwrap();

    assert_eq!(integers(&seen), vec![13, 23, 24]);
}

#[test]
fn test_shadowing_declaration_reevaluates() {
    let (runtime, _sink) = runtime_with(vec![integer("level", 1)]);
    let item = runtime.child_scope();
    let (seen, _handle) = watch(&item, "@{level}");

    item.store().declare(integer("level", 99)).unwrap();
    // The parent's variable is no longer the one read
    runtime.store().set("level", Value::Integer(2)).unwrap();

    assert_eq!(integers(&seen), vec![1, 99]);
}

#[test]
fn test_sibling_scopes_are_independent() {
    let (runtime, _sink) = runtime_with(vec![]);
    let first = runtime.child_scope();
    let second = runtime.child_scope();
    first.store().declare(integer("n", 1)).unwrap();
    second.store().declare(integer("n", 2)).unwrap();

    let (seen_first, _a) = watch(&first, "@{n}");
    let (seen_second, _b) = watch(&second, "@{n}");
    first.store().set("n", Value::Integer(10)).unwrap();

    assert_eq!(integers(&seen_first), vec![1, 10]);
    assert_eq!(integers(&seen_second), vec![2]);
}

// ============================================================================
// Re-entrancy
// ============================================================================

#[test]
fn test_callback_may_write_variables() {
    let (runtime, _sink) = runtime_with(vec![integer("count", 1), integer("doubled", 0)]);

    let store = runtime.store().clone();
    let _writer = runtime
        .subscribe_source("@{count * 2}", move |value| {
            store.set("doubled", value.clone()).unwrap();
        })
        .unwrap();
    let (seen, _reader) = watch(&runtime, "@{doubled}");

    runtime.store().set("count", Value::Integer(4)).unwrap();
    assert_eq!(integers(&seen), vec![2, 8]);
}

#[test]
fn test_expression_cache_is_shared() {
    let (runtime, _sink) = runtime_with(vec![integer("count", 1)]);
    let first = runtime.expression("@{count}").unwrap();
    let second = runtime.expression("@{count}").unwrap();
    assert_eq!(first, second);
    assert!(runtime.expression("@{count +}").is_err());
}
