//! Typed variable storage with scopes and change notification.
//!
//! A [`VariableStore`] is one scope. Stores form a chain through their
//! parent: a list-item scope over a card scope over an optional global scope
//! shared between cards. Lookups walk the chain innermost first; writes go to
//! the store that declares the variable.
//!
//! Stores are single-threaded handles (`Rc`); cloning a store yields another
//! handle to the same scope. Observers are notified after every successful
//! mutation, never while a borrow of the store is held, so an observer may
//! read or write the store again.

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    fmt,
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};

use tracing::debug;

use crate::{
    error::VariableError,
    evaluator::{Resolved, VariableResolver},
    value::{Value, ValueType},
};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one [`VariableStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// A named value whose type is fixed at declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    ty: ValueType,
    value: Value,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: ValueType, value: Value) -> Result<Self, VariableError> {
        let name = name.into();
        let actual = value.value_type();
        match value.conform_to(ty) {
            Some(value) => Ok(Variable { name, ty, value }),
            None => Err(VariableError::TypeMismatch {
                name,
                expected: ty,
                actual,
            }),
        }
    }

    /// Declares a variable with the type of its initial value.
    pub fn infer(name: impl Into<String>, value: Value) -> Self {
        Variable {
            name: name.into(),
            ty: value.value_type(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ValueType {
        self.ty
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// What one mutation changed, delivered once to every interested observer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreChange {
    /// Variables whose value changed, with the scope that owns them.
    pub updated: BTreeSet<(ScopeId, String)>,
    /// Names newly declared in some scope; these may shadow outer variables.
    pub declared: BTreeSet<String>,
}

impl StoreChange {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.declared.is_empty()
    }

    pub fn touches(&self, name: &str) -> bool {
        self.declared.contains(name) || self.updated.iter().any(|(_, n)| n == name)
    }
}

/// Receives [`StoreChange`]s from every store it observes.
pub trait StoreObserver {
    fn on_change(&self, change: &StoreChange);
}

#[derive(Clone)]
pub struct VariableStore {
    inner: Rc<StoreInner>,
}

struct StoreInner {
    id: ScopeId,
    parent: Option<VariableStore>,
    variables: RefCell<BTreeMap<String, Variable>>,
    observers: RefCell<Vec<Weak<dyn StoreObserver>>>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableStore")
            .field("id", &self.inner.id)
            .field("variables", &self.inner.variables.borrow())
            .field("parent", &self.inner.parent)
            .finish()
    }
}

impl VariableStore {
    /// Creates a root scope, e.g. a card's own store or a global store.
    pub fn new() -> Self {
        Self::create(None)
    }

    /// Creates a scope whose lookups fall through to `parent`.
    ///
    /// A card opts in to a shared global store by using it as the parent of
    /// its own store.
    pub fn with_parent(parent: &VariableStore) -> Self {
        Self::create(Some(parent.clone()))
    }

    /// Creates a nested scope (e.g. for a list item) whose declarations
    /// shadow this store's.
    pub fn child(&self) -> Self {
        Self::with_parent(self)
    }

    fn create(parent: Option<VariableStore>) -> Self {
        VariableStore {
            inner: Rc::new(StoreInner {
                id: ScopeId::next(),
                parent,
                variables: RefCell::new(BTreeMap::new()),
                observers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn parent(&self) -> Option<&VariableStore> {
        self.inner.parent.as_ref()
    }

    /// This store followed by its ancestors, innermost first.
    pub fn chain(&self) -> Vec<VariableStore> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(store) = current {
            chain.push(store.clone());
            current = store.parent();
        }
        chain
    }

    pub fn same_store(&self, other: &VariableStore) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Adds a variable to this scope.
    pub fn declare(&self, variable: Variable) -> Result<(), VariableError> {
        self.declare_all([variable])
    }

    /// Adds several variables at once: all or none, with one notification.
    pub fn declare_all(
        &self,
        variables: impl IntoIterator<Item = Variable>,
    ) -> Result<(), VariableError> {
        let variables: Vec<Variable> = variables.into_iter().collect();
        let mut change = StoreChange::default();

        {
            let mut own = self.inner.variables.borrow_mut();
            let mut seen = BTreeSet::new();
            for variable in &variables {
                if own.contains_key(&variable.name) || !seen.insert(variable.name.as_str()) {
                    return Err(VariableError::AlreadyDeclared(variable.name.clone()));
                }
            }
            for variable in variables {
                change.declared.insert(variable.name.clone());
                own.insert(variable.name.clone(), variable);
            }
        }

        if !change.is_empty() {
            debug!(scope = %self.id(), names = ?change.declared, "declared variables");
            notify(&[self.clone()], &change);
        }
        Ok(())
    }

    /// Current value of `name`, looked up through the scope chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.lookup(name).map(|(value, _)| value)
    }

    /// Current value of `name` and the scope it was found in.
    pub fn lookup(&self, name: &str) -> Option<(Value, ScopeId)> {
        let mut current = Some(self);
        while let Some(store) = current {
            if let Some(variable) = store.inner.variables.borrow().get(name) {
                return Some((variable.value.clone(), store.id()));
            }
            current = store.parent();
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.owner(name).is_some()
    }

    pub fn declared_type(&self, name: &str) -> Option<ValueType> {
        let owner = self.owner(name)?;
        let ty = owner.inner.variables.borrow().get(name).map(|v| v.ty);
        ty
    }

    /// Names declared directly in this scope.
    pub fn names(&self) -> Vec<String> {
        self.inner.variables.borrow().keys().cloned().collect()
    }

    /// Every visible variable, inner declarations shadowing outer ones.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let mut values = BTreeMap::new();
        for store in self.chain().iter().rev() {
            for (name, variable) in store.inner.variables.borrow().iter() {
                values.insert(name.clone(), variable.value.clone());
            }
        }
        values
    }

    /// The innermost store in the chain that declares `name`.
    fn owner(&self, name: &str) -> Option<VariableStore> {
        let mut current = Some(self);
        while let Some(store) = current {
            if store.inner.variables.borrow().contains_key(name) {
                return Some(store.clone());
            }
            current = store.parent();
        }
        None
    }

    /// Writes one variable. The value must have the declared type; integers
    /// are widened for number variables.
    pub fn set(&self, name: &str, value: Value) -> Result<(), VariableError> {
        self.batch_set([(name.to_string(), value)])
    }

    /// Writes several variables atomically.
    ///
    /// Every write is validated before any is applied; on error nothing
    /// changes and no notification is sent. Observers receive one
    /// [`StoreChange`] covering all variables whose value actually changed.
    pub fn batch_set<K>(&self, updates: impl IntoIterator<Item = (K, Value)>) -> Result<(), VariableError>
    where
        K: Into<String>,
    {
        let mut staged: Vec<(VariableStore, String, Value)> = Vec::new();

        for (name, value) in updates {
            let name = name.into();
            let owner = self
                .owner(&name)
                .ok_or_else(|| VariableError::Unknown(name.clone()))?;
            let expected = owner
                .inner
                .variables
                .borrow()
                .get(&name)
                .map(|v| v.ty)
                .ok_or_else(|| VariableError::Unknown(name.clone()))?;
            let actual = value.value_type();
            let value = value.conform_to(expected).ok_or(VariableError::TypeMismatch {
                name: name.clone(),
                expected,
                actual,
            })?;
            staged.push((owner, name, value));
        }

        let mut change = StoreChange::default();
        let mut touched: Vec<VariableStore> = Vec::new();

        for (owner, name, value) in staged {
            let changed = {
                let mut variables = owner.inner.variables.borrow_mut();
                match variables.get_mut(&name) {
                    Some(variable) if variable.value != value => {
                        variable.value = value;
                        true
                    }
                    _ => false,
                }
            };
            if changed {
                change.updated.insert((owner.id(), name));
                if !touched.iter().any(|s| s.same_store(&owner)) {
                    touched.push(owner);
                }
            }
        }

        if !change.is_empty() {
            debug!(updated = change.updated.len(), "variables changed");
            notify(&touched, &change);
        }
        Ok(())
    }

    /// Registers an observer for changes made to this store.
    ///
    /// Observers are held weakly and dropped from the list once gone.
    pub fn observe(&self, observer: Weak<dyn StoreObserver>) {
        self.inner.observers.borrow_mut().push(observer);
    }

    fn live_observers(&self) -> Vec<Rc<dyn StoreObserver>> {
        let mut observers = self.inner.observers.borrow_mut();
        observers.retain(|weak| weak.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Delivers `change` once to each distinct observer of `stores`.
fn notify(stores: &[VariableStore], change: &StoreChange) {
    let mut observers: Vec<Rc<dyn StoreObserver>> = Vec::new();
    for store in stores {
        for observer in store.live_observers() {
            let duplicate = observers
                .iter()
                .any(|known| Rc::as_ptr(known) as *const () == Rc::as_ptr(&observer) as *const ());
            if !duplicate {
                observers.push(observer);
            }
        }
    }

    for observer in observers {
        observer.on_change(change);
    }
}

impl VariableResolver for VariableStore {
    fn resolve(&self, name: &str) -> Option<Resolved> {
        self.lookup(name).map(|(value, scope)| Resolved {
            value,
            scope: Some(scope),
        })
    }
}
