use std::rc::Rc;

use derive_ex::derive_ex;

use crate::{Batch, Subscription};

/// What a rendering host provides to a component while it renders.
///
/// Implemented by [`RenderContext`](crate::RenderContext) for the [`Runtime`](crate::Runtime) in this crate.
/// Another host needs to uphold the same guarantees:
///
/// - `use_slot` returns the slot created on the first render of the instance, and the same
///   [`SlotSetter`] every time.
/// - The effect passed to `use_mount_effect` runs once per mount, after the render that mounted
///   the instance, and the [`Subscription`] it returns is dropped exactly once when the instance unmounts.
pub trait Hooks {
    /// Returns the current value of a per-instance slot and the setter that changes it.
    ///
    /// `init` is called on the first render only.
    /// Calling the setter stores the value and schedules a re-render of the instance.
    fn use_slot<S: Clone + 'static>(&mut self, init: impl FnOnce() -> S) -> (S, SlotSetter<S>);

    /// Registers an effect that runs once when the instance mounts.
    ///
    /// Calls on later renders are ignored.
    fn use_mount_effect(&mut self, effect: impl FnOnce() -> Subscription + 'static);

    /// Returns the facility that coalesces slot updates into one render pass, if the host has one.
    fn batch(&self) -> Option<Batch> {
        None
    }
}

/// Sets the value of a slot obtained from [`Hooks::use_slot`].
#[derive_ex(Clone, bound())]
pub struct SlotSetter<S: 'static>(Rc<dyn Fn(S)>);

impl<S: 'static> SlotSetter<S> {
    pub fn new(f: impl Fn(S) + 'static) -> Self {
        Self(Rc::new(f))
    }
    pub fn set(&self, value: S) {
        (self.0)(value)
    }
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }
}
impl<S: 'static> std::fmt::Debug for SlotSetter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SlotSetter({:p})", Rc::as_ptr(&self.0))
    }
}
