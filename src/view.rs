use std::rc::Rc;

use derive_ex::derive_ex;
use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Callback, Hooks, SetState, Setter, Store, Subscription};


/// What a component takes from a store.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, FromStr, Serialize, Deserialize,
)]
#[display(style = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    /// The state and the setter. The component re-renders on every change.
    #[default]
    Full,
    /// The state only. The component re-renders on every change.
    JustState,
    /// The setter only. The component never re-renders because of the store.
    JustSetter,
}
impl ViewMode {
    pub fn observes_state(self) -> bool {
        self != ViewMode::JustSetter
    }
}

/// Result of [`UseStore::use_store`], shaped by the requested [`ViewMode`].
pub enum View<T: 'static, A: 'static = SetState<T>> {
    Full(Rc<T>, Setter<T, A>),
    State(Rc<T>),
    Setter(Setter<T, A>),
}
impl<T: 'static, A: 'static> View<T, A> {
    pub fn mode(&self) -> ViewMode {
        match self {
            View::Full(..) => ViewMode::Full,
            View::State(_) => ViewMode::JustState,
            View::Setter(_) => ViewMode::JustSetter,
        }
    }
    pub fn state(&self) -> Option<&Rc<T>> {
        match self {
            View::Full(state, _) | View::State(state) => Some(state),
            View::Setter(_) => None,
        }
    }
    pub fn setter(&self) -> Option<&Setter<T, A>> {
        match self {
            View::Full(_, setter) | View::Setter(setter) => Some(setter),
            View::State(_) => None,
        }
    }
}
impl<T: std::fmt::Debug + 'static, A: 'static> std::fmt::Debug for View<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            View::Full(state, setter) => f.debug_tuple("Full").field(state).field(setter).finish(),
            View::State(state) => f.debug_tuple("State").field(state).finish(),
            View::Setter(setter) => f.debug_tuple("Setter").field(setter).finish(),
        }
    }
}

/// Hook-shaped access to one [`Store`], created by [`make_store`] or [`make_store_with_reducer`].
///
/// Clones share the same store.
#[derive_ex(Clone, bound())]
pub struct UseStore<T: 'static, A: 'static = SetState<T>> {
    store: Store<T, A>,
}

/// Create a store without a reducer and return the hook that reads and changes it.
pub fn make_store<T: 'static>(value: T) -> UseStore<T> {
    UseStore::new(Store::new(value))
}

/// Create a store that is only changed through `reducer` and return the hook that reads and changes it.
pub fn make_store_with_reducer<T: 'static, A: 'static>(
    value: T,
    reducer: impl Fn(&T, A) -> T + 'static,
) -> UseStore<T, A> {
    UseStore::new(Store::with_reducer(value, reducer))
}

impl<T: 'static, A: 'static> UseStore<T, A> {
    pub fn new(store: Store<T, A>) -> Self {
        Self { store }
    }
    pub fn store(&self) -> &Store<T, A> {
        &self.store
    }

    /// Binds the calling component to the store and returns what `mode` asks for.
    ///
    /// Unless `mode` is [`ViewMode::JustSetter`], the component subscribes when it mounts and
    /// unsubscribes when it unmounts, and re-renders with the new state on every change.
    ///
    /// The mode is fixed when the component mounts; a different mode on a later render only
    /// changes the shape of the result. A component mounted as [`ViewMode::JustSetter`] keeps
    /// no snapshot of the state, so asking it for the state later reads the store directly.
    pub fn use_store(&self, cx: &mut impl Hooks, mode: ViewMode) -> View<T, A> {
        let (state, setter) = self.bind(cx, mode);
        match mode {
            ViewMode::Full => View::Full(state, setter),
            ViewMode::JustState => View::State(state),
            ViewMode::JustSetter => View::Setter(setter),
        }
    }

    /// Same as `use_store(cx, ViewMode::Full)`.
    pub fn use_full(&self, cx: &mut impl Hooks) -> (Rc<T>, Setter<T, A>) {
        self.bind(cx, ViewMode::Full)
    }

    /// Same as `use_store(cx, ViewMode::JustState)`.
    pub fn use_state(&self, cx: &mut impl Hooks) -> Rc<T> {
        self.bind(cx, ViewMode::JustState).0
    }

    /// Same as `use_store(cx, ViewMode::JustSetter)`.
    pub fn use_setter(&self, cx: &mut impl Hooks) -> Setter<T, A> {
        self.bind(cx, ViewMode::JustSetter).1
    }

    fn bind(&self, cx: &mut impl Hooks, mode: ViewMode) -> (Rc<T>, Setter<T, A>) {
        let (mounted_mode, _) = cx.use_slot(|| mode);
        if mounted_mode != mode {
            warn!(
                mounted = %mounted_mode,
                requested = %mode,
                "view mode changed after mount; keeping the mode from mount"
            );
        }
        let observes = mounted_mode.observes_state();
        let (state, set_state) = cx.use_slot(|| observes.then(|| self.store.state()));
        let (callback, _) = cx.use_slot(|| {
            observes.then(|| {
                Callback::new(move |value: &Rc<T>| set_state.set(Some(value.clone())))
            })
        });
        if let (Some(callback), Some(rendered)) = (callback, &state) {
            let store = self.store.clone();
            let rendered = rendered.clone();
            cx.use_mount_effect(move || {
                store.subscribe(&callback);
                // catch up with changes made between the first render and the subscription
                let current = store.state();
                if !Rc::ptr_eq(&current, &rendered) {
                    callback.call(&current);
                }
                Subscription::from_fn(move || store.unsubscribe(&callback))
            });
        }
        if self.store.batch().is_none() {
            self.store.set_batch(cx.batch());
        }
        let state = state.unwrap_or_else(|| self.store.state());
        (state, self.store.setter())
    }
}
