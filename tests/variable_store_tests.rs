// tests/variable_store_tests.rs

use divkit_expr::{
    StoreChange, StoreObserver, Value, ValueType, Variable, VariableError, VariableStore,
};
use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

#[derive(Default)]
struct Recorder {
    changes: RefCell<Vec<StoreChange>>,
}

impl StoreObserver for Recorder {
    fn on_change(&self, change: &StoreChange) {
        self.changes.borrow_mut().push(change.clone());
    }
}

fn observe(store: &VariableStore) -> Rc<Recorder> {
    let recorder = Rc::new(Recorder::default());
    let weak: Weak<dyn StoreObserver> = Rc::downgrade(&recorder) as Weak<dyn StoreObserver>;
    store.observe(weak);
    recorder
}

fn integer(name: &str, value: i64) -> Variable {
    Variable::new(name, ValueType::Integer, Value::Integer(value)).unwrap()
}

fn store_with(variables: Vec<Variable>) -> VariableStore {
    let store = VariableStore::new();
    store.declare_all(variables).unwrap();
    store
}

// ============================================================================
// Declaration
// ============================================================================

#[test]
fn test_declare_and_get() {
    let store = store_with(vec![integer("count", 1)]);
    assert_eq!(store.get("count"), Some(Value::Integer(1)));
    assert_eq!(store.declared_type("count"), Some(ValueType::Integer));
    assert!(store.contains("count"));
    assert_eq!(store.get("other"), None);
}

#[test]
fn test_declare_twice_fails() {
    let store = store_with(vec![integer("count", 1)]);
    assert_eq!(
        store.declare(integer("count", 2)),
        Err(VariableError::AlreadyDeclared("count".into()))
    );
    assert_eq!(store.get("count"), Some(Value::Integer(1)));
}

#[test]
fn test_declare_all_is_all_or_none() {
    let store = VariableStore::new();
    let result = store.declare_all(vec![integer("a", 1), integer("b", 2), integer("a", 3)]);
    assert_eq!(result, Err(VariableError::AlreadyDeclared("a".into())));
    assert!(store.names().is_empty());
}

#[test]
fn test_variable_type_is_checked() {
    assert_eq!(
        Variable::new("title", ValueType::String, Value::Integer(1)),
        Err(VariableError::TypeMismatch {
            name: "title".into(),
            expected: ValueType::String,
            actual: ValueType::Integer,
        })
    );

    let ratio = Variable::new("ratio", ValueType::Number, Value::Integer(1)).unwrap();
    assert_eq!(ratio.value(), &Value::Number(1.0));
}

#[test]
fn test_declaration_notifies_once() {
    let store = VariableStore::new();
    let recorder = observe(&store);
    store.declare_all(vec![integer("a", 1), integer("b", 2)]).unwrap();

    let changes = recorder.changes.borrow();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].declared.contains("a"));
    assert!(changes[0].declared.contains("b"));
    assert!(changes[0].updated.is_empty());
}

// ============================================================================
// Writes
// ============================================================================

#[test]
fn test_set_notifies_with_owner_scope() {
    let store = store_with(vec![integer("count", 1)]);
    let recorder = observe(&store);

    store.set("count", Value::Integer(2)).unwrap();

    assert_eq!(store.get("count"), Some(Value::Integer(2)));
    let changes = recorder.changes.borrow();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].updated.contains(&(store.id(), "count".to_string())));
    assert!(changes[0].touches("count"));
}

#[test]
fn test_set_unknown_variable() {
    let store = VariableStore::new();
    assert_eq!(
        store.set("nope", Value::Integer(1)),
        Err(VariableError::Unknown("nope".into()))
    );
}

#[test]
fn test_set_wrong_type_changes_nothing() {
    let store = store_with(vec![integer("count", 1)]);
    let recorder = observe(&store);

    assert_eq!(
        store.set("count", Value::String("two".into())),
        Err(VariableError::TypeMismatch {
            name: "count".into(),
            expected: ValueType::Integer,
            actual: ValueType::String,
        })
    );
    assert_eq!(store.get("count"), Some(Value::Integer(1)));
    assert!(recorder.changes.borrow().is_empty());
}

#[test]
fn test_number_variable_accepts_integer() {
    let store = store_with(vec![Variable::new("ratio", ValueType::Number, Value::Number(0.5)).unwrap()]);
    store.set("ratio", Value::Integer(2)).unwrap();
    assert_eq!(store.get("ratio"), Some(Value::Number(2.0)));
}

#[test]
fn test_setting_same_value_is_silent() {
    let store = store_with(vec![integer("count", 1)]);
    let recorder = observe(&store);
    store.set("count", Value::Integer(1)).unwrap();
    assert!(recorder.changes.borrow().is_empty());
}

#[test]
fn test_batch_set_is_atomic() {
    let store = store_with(vec![integer("a", 1), integer("b", 2)]);
    let recorder = observe(&store);

    let result = store.batch_set([
        ("a", Value::Integer(10)),
        ("b", Value::Boolean(true)),
    ]);
    assert!(matches!(result, Err(VariableError::TypeMismatch { .. })));
    assert_eq!(store.get("a"), Some(Value::Integer(1)));
    assert!(recorder.changes.borrow().is_empty());

    store
        .batch_set([("a", Value::Integer(10)), ("b", Value::Integer(20))])
        .unwrap();
    let changes = recorder.changes.borrow();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].updated.len(), 2);
}

#[test]
fn test_dropped_observer_is_not_called() {
    let store = store_with(vec![integer("count", 1)]);
    let recorder = observe(&store);
    drop(recorder);
    store.set("count", Value::Integer(2)).unwrap();
    assert_eq!(store.get("count"), Some(Value::Integer(2)));
}

struct Mirror {
    store: VariableStore,
}

impl StoreObserver for Mirror {
    fn on_change(&self, change: &StoreChange) {
        if change.touches("source") {
            if let Some(value) = self.store.get("source") {
                self.store.set("mirror", value).unwrap();
            }
        }
    }
}

#[test]
fn test_observer_may_write_back() {
    let store = store_with(vec![integer("source", 0), integer("mirror", 0)]);
    let mirror = Rc::new(Mirror {
        store: store.clone(),
    });
    let weak: Weak<dyn StoreObserver> = Rc::downgrade(&mirror) as Weak<dyn StoreObserver>;
    store.observe(weak);

    store.set("source", Value::Integer(5)).unwrap();
    assert_eq!(store.get("mirror"), Some(Value::Integer(5)));
}

// ============================================================================
// Scopes
// ============================================================================

#[test]
fn test_child_sees_parent_variables() {
    let parent = store_with(vec![integer("count", 1)]);
    let child = parent.child();

    assert_eq!(child.get("count"), Some(Value::Integer(1)));
    assert_eq!(child.lookup("count"), Some((Value::Integer(1), parent.id())));
    assert!(child.names().is_empty());
}

#[test]
fn test_child_declaration_shadows_parent() {
    let parent = store_with(vec![integer("count", 1)]);
    let child = parent.child();
    child.declare(integer("count", 100)).unwrap();

    assert_eq!(child.get("count"), Some(Value::Integer(100)));
    assert_eq!(parent.get("count"), Some(Value::Integer(1)));
    assert_eq!(child.snapshot().get("count"), Some(&Value::Integer(100)));
}

#[test]
fn test_write_through_child_goes_to_owner() {
    let parent = store_with(vec![integer("count", 1)]);
    let child = parent.child();
    let recorder = observe(&parent);

    child.set("count", Value::Integer(7)).unwrap();

    assert_eq!(parent.get("count"), Some(Value::Integer(7)));
    let changes = recorder.changes.borrow();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].updated.contains(&(parent.id(), "count".to_string())));
}

#[test]
fn test_global_store_is_shared() {
    let global = store_with(vec![integer("theme", 0)]);
    let card_a = VariableStore::with_parent(&global);
    let card_b = VariableStore::with_parent(&global);

    card_a.set("theme", Value::Integer(1)).unwrap();
    assert_eq!(card_b.get("theme"), Some(Value::Integer(1)));
    assert_eq!(card_a.chain().len(), 2);
    assert!(card_a.parent().is_some_and(|p| p.same_store(&global)));
}

#[test]
fn test_scope_ids_are_unique() {
    let a = VariableStore::new();
    let b = VariableStore::new();
    assert_ne!(a.id(), b.id());
    assert_eq!(a.clone().id(), a.id());
}
