use std::{cell::RefCell, rc::Rc};

use derive_ex::derive_ex;
use parse_display::Display;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{subscribers::Subscribers, Batch, Callback, Subscription};

#[cfg(test)]
mod tests;

/// Input accepted by a store without a reducer.
pub enum SetState<T: 'static> {
    /// Replace the state with this value.
    Value(Rc<T>),
    /// Compute the next state from the current one.
    Update(Box<dyn FnOnce(&Rc<T>) -> Rc<T>>),
}

impl<T: 'static> SetState<T> {
    pub fn value(value: T) -> Self {
        Self::Value(Rc::new(value))
    }
    pub fn update(f: impl FnOnce(&T) -> T + 'static) -> Self {
        Self::Update(Box::new(move |state| Rc::new(f(state))))
    }

    /// Like [`update`](Self::update), but `f` may return the current `Rc` to leave the state unchanged.
    pub fn update_rc(f: impl FnOnce(&Rc<T>) -> Rc<T> + 'static) -> Self {
        Self::Update(Box::new(f))
    }

    fn apply(current: &Rc<T>, input: Self) -> Rc<T> {
        match input {
            SetState::Value(value) => value,
            SetState::Update(f) => f(current),
        }
    }
}
impl<T: 'static> From<Rc<T>> for SetState<T> {
    fn from(value: Rc<T>) -> Self {
        Self::Value(value)
    }
}
impl<T: std::fmt::Debug + 'static> std::fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetState::Value(value) => f.debug_tuple("Value").field(value).finish(),
            SetState::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// Whether a store was created with a reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(style = "snake_case")]
pub enum StoreMode {
    Direct,
    Reducer,
}

#[allow(clippy::type_complexity)]
enum Reduce<T: 'static, A: 'static> {
    /// `SetState::apply`, only constructed with `A = SetState<T>`.
    Direct(fn(&Rc<T>, A) -> Rc<T>),
    Reducer(Box<dyn Fn(&Rc<T>, A) -> Rc<T>>),
}
impl<T: 'static, A: 'static> Reduce<T, A> {
    fn mode(&self) -> StoreMode {
        match self {
            Reduce::Direct(_) => StoreMode::Direct,
            Reduce::Reducer(_) => StoreMode::Reducer,
        }
    }
    fn call(&self, current: &Rc<T>, input: A) -> Rc<T> {
        match self {
            Reduce::Direct(apply) => apply(current, input),
            Reduce::Reducer(reducer) => reducer(current, input),
        }
    }
}

/// A single piece of state shared by any number of subscribers.
///
/// `A` is the input accepted by [`dispatch`](Self::dispatch):
/// [`SetState<T>`] for a store created by [`new`](Self::new),
/// or the reducer's action type for a store created by [`with_reducer`](Self::with_reducer).
///
/// State changes are detected by identity of the `Rc` holding the state, not by comparing values.
#[derive_ex(Clone, bound())]
pub struct Store<T: 'static, A: 'static = SetState<T>>(Rc<StoreNode<T, A>>);

impl<T: 'static> Store<T> {
    /// Create a store without a reducer.
    pub fn new(value: T) -> Self {
        Self::from_rc(Rc::new(value))
    }
    pub fn from_rc(value: Rc<T>) -> Self {
        Self::from_reduce(value, Reduce::Direct(SetState::apply))
    }
}

impl<T: 'static, A: 'static> Store<T, A> {
    /// Create a store whose state is only changed through `reducer`.
    pub fn with_reducer(value: T, reducer: impl Fn(&T, A) -> T + 'static) -> Self {
        Self::with_rc_reducer(Rc::new(value), move |state, action| {
            Rc::new(reducer(state, action))
        })
    }

    /// Create a store with a reducer that may return the current `Rc` to leave the state unchanged.
    pub fn with_rc_reducer(value: Rc<T>, reducer: impl Fn(&Rc<T>, A) -> Rc<T> + 'static) -> Self {
        Self::from_reduce(value, Reduce::Reducer(Box::new(reducer)))
    }

    fn from_reduce(value: Rc<T>, reduce: Reduce<T, A>) -> Self {
        Self(Rc::new(StoreNode {
            state: RefCell::new(value),
            subscribers: RefCell::new(Subscribers::new()),
            reduce,
            batch: RefCell::new(None),
        }))
    }

    /// Notify subscribers inside `batch` from now on.
    pub fn with_batch(self, batch: Batch) -> Self {
        self.set_batch(Some(batch));
        self
    }
    pub fn set_batch(&self, batch: Option<Batch>) {
        *self.0.batch.borrow_mut() = batch;
    }
    pub fn batch(&self) -> Option<Batch> {
        self.0.batch.borrow().clone()
    }

    pub fn mode(&self) -> StoreMode {
        self.0.reduce.mode()
    }

    /// Returns the current state.
    ///
    /// Every call returns the same `Rc` until the state changes.
    pub fn state(&self) -> Rc<T> {
        self.0.state()
    }

    /// Returns a clone of the current state.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        (*self.state()).clone()
    }

    /// Returns the function-like handle that changes this store.
    ///
    /// All setters of the same store compare equal.
    pub fn setter(&self) -> Setter<T, A> {
        Setter(self.0.clone())
    }

    /// Computes the next state and, if it is a different `Rc`, stores it and notifies all subscribers.
    ///
    /// A panic in the reducer or the update function propagates to the caller and leaves the state unchanged.
    pub fn dispatch(&self, input: A) {
        self.0.dispatch(input)
    }

    /// Registers `callback`. Registering the same callback again has no effect.
    pub fn subscribe(&self, callback: &Callback<T>) {
        self.0.subscribe(callback)
    }

    /// Unregisters `callback`. Does nothing if it is not registered.
    pub fn unsubscribe(&self, callback: &Callback<T>) {
        self.0.unsubscribe(callback)
    }

    pub fn is_subscribed(&self, callback: &Callback<T>) -> bool {
        self.0.subscribers.borrow().contains(callback)
    }
    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    /// Calls `f` with the new state on each change until the returned [`Subscription`] is dropped.
    pub fn watch(&self, f: impl Fn(&Rc<T>) + 'static) -> Subscription {
        let callback = Callback::new(f);
        self.subscribe(&callback);
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |node| {
            node.unsubscribe(&callback)
        })
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }
}
impl<T: std::fmt::Debug + 'static, A: 'static> std::fmt::Debug for Store<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state())
            .field("mode", &self.mode())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
impl<T, A> Serialize for Store<T, A>
where
    T: Serialize + 'static,
    A: 'static,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        T::serialize(&*self.state(), serializer)
    }
}
impl<'de, T> Deserialize<'de> for Store<T>
where
    T: Deserialize<'de> + 'static,
{
    fn deserialize<D>(deserializer: D) -> Result<Store<T>, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Store::new)
    }
}

/// Changes the state of a [`Store`].
///
/// Setters are compared by the store they change, so a setter obtained before any change
/// is equal to one obtained after, and setters from different views of one store are equal.
#[derive_ex(Clone, bound())]
pub struct Setter<T: 'static, A: 'static = SetState<T>>(Rc<StoreNode<T, A>>);

impl<T: 'static, A: 'static> Setter<T, A> {
    /// See [`Store::dispatch`].
    pub fn dispatch(&self, input: A) {
        self.0.dispatch(input)
    }
    pub fn store(&self) -> Store<T, A> {
        Store(self.0.clone())
    }
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }
}
impl<T: 'static> Setter<T> {
    pub fn set(&self, value: T) {
        self.dispatch(SetState::value(value))
    }
    pub fn set_rc(&self, value: Rc<T>) {
        self.dispatch(SetState::Value(value))
    }
    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
        self.dispatch(SetState::update(f))
    }
    pub fn update_rc(&self, f: impl FnOnce(&Rc<T>) -> Rc<T> + 'static) {
        self.dispatch(SetState::update_rc(f))
    }

    /// Sets the state only if it is not equal to `value`.
    pub fn set_dedup(&self, value: T)
    where
        T: PartialEq,
    {
        if *self.0.state() != value {
            self.set(value)
        }
    }
}
impl<T: 'static, A: 'static> PartialEq for Setter<T, A> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}
impl<T: 'static, A: 'static> Eq for Setter<T, A> {}

impl<T: 'static, A: 'static> std::fmt::Debug for Setter<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Setter({:p})", Rc::as_ptr(&self.0))
    }
}

struct StoreNode<T: 'static, A: 'static> {
    state: RefCell<Rc<T>>,
    subscribers: RefCell<Subscribers<T>>,
    reduce: Reduce<T, A>,
    batch: RefCell<Option<Batch>>,
}
impl<T: 'static, A: 'static> StoreNode<T, A> {
    fn state(&self) -> Rc<T> {
        self.state.borrow().clone()
    }

    fn dispatch(&self, input: A) {
        let current = self.state();
        let next = self.reduce.call(&current, input);
        if Rc::ptr_eq(&current, &next) {
            trace!(mode = %self.reduce.mode(), "state unchanged");
            return;
        }
        *self.state.borrow_mut() = next;
        self.notify();
    }

    fn notify(&self) {
        if self.subscribers.borrow().is_empty() {
            return;
        }
        let subscribers = self.subscribers.borrow_mut().snapshot();
        let batch = self.batch.borrow().clone();
        debug!(
            subscribers = subscribers.len(),
            batched = batch.is_some(),
            "notify"
        );
        // A subscriber may dispatch again, so each one reads the latest state.
        let mut f = || {
            for subscriber in &subscribers {
                subscriber.call(&self.state());
            }
        };
        match batch {
            Some(batch) => batch.run(&mut f),
            None => f(),
        }
    }

    fn subscribe(&self, callback: &Callback<T>) {
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.insert(callback) {
            trace!(?callback, subscribers = subscribers.len(), "subscribe");
        }
    }
    fn unsubscribe(&self, callback: &Callback<T>) {
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.remove(callback) {
            trace!(?callback, subscribers = subscribers.len(), "unsubscribe");
        }
    }
}
