use std::rc::Rc;

/// Host facility that coalesces the updates issued inside a callback into one render pass.
///
/// A store notifies its subscribers inside its `Batch`, if it has one.
/// Without a `Batch`, subscribers are notified one by one; the resulting state is the same.
#[derive(Clone)]
pub struct Batch(Rc<dyn Fn(&mut dyn FnMut())>);

impl Batch {
    /// Create a `Batch` from a function that must call the given callback exactly once.
    pub fn new(f: impl Fn(&mut dyn FnMut()) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn run(&self, f: &mut dyn FnMut()) {
        (self.0)(f)
    }
}
impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Batch")
    }
}
