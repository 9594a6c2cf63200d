use std::{collections::HashMap, rc::Rc};

use derive_ex::derive_ex;
use slabmap::SlabMap;


/// A callback that receives the new state of a store.
///
/// Two `Callback`s are equal when they are clones of the same callback,
/// which is what [`Store::subscribe`](crate::Store::subscribe) and
/// [`Store::unsubscribe`](crate::Store::unsubscribe) match on.
#[derive_ex(Clone, bound())]
pub struct Callback<T: 'static>(Rc<dyn Fn(&Rc<T>)>);

impl<T: 'static> Callback<T> {
    pub fn new(f: impl Fn(&Rc<T>) + 'static) -> Self {
        Self(Rc::new(f))
    }
    pub fn call(&self, value: &Rc<T>) {
        (self.0)(value)
    }
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.key() == other.key()
    }
    fn key(&self) -> CallbackKey {
        CallbackKey(Rc::as_ptr(&self.0) as *const () as usize)
    }
}
impl<T: 'static> PartialEq for Callback<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}
impl<T: 'static> Eq for Callback<T> {}

impl<T: 'static> std::fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callback({:#x})", self.key().0)
    }
}

/// Address of the closure behind a `Callback`.
///
/// Stable while the entry is registered, because the registry keeps the `Rc` alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CallbackKey(usize);

/// Set of callbacks keyed by identity.
pub(crate) struct Subscribers<T: 'static> {
    entries: SlabMap<Callback<T>>,
    keys: HashMap<CallbackKey, usize>,
}

impl<T: 'static> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            entries: SlabMap::new(),
            keys: HashMap::new(),
        }
    }

    /// Returns `false` if `callback` was already registered.
    pub fn insert(&mut self, callback: &Callback<T>) -> bool {
        let key = callback.key();
        if self.keys.contains_key(&key) {
            return false;
        }
        let index = self.entries.insert(callback.clone());
        self.keys.insert(key, index);
        true
    }

    /// Returns `false` if `callback` was not registered.
    pub fn remove(&mut self, callback: &Callback<T>) -> bool {
        let Some(index) = self.keys.remove(&callback.key()) else {
            return false;
        };
        self.entries.remove(index);
        true
    }

    pub fn contains(&self, callback: &Callback<T>) -> bool {
        self.keys.contains_key(&callback.key())
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies the current members so they can be called without holding a borrow of the registry.
    pub fn snapshot(&mut self) -> Vec<Callback<T>> {
        self.entries.optimize();
        self.entries.values().cloned().collect()
    }
}
