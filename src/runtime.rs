use std::{
    any::Any,
    cell::{Cell, RefCell},
    mem::{replace, swap, take},
    rc::{Rc, Weak},
    thread::AccessError,
};

use derive_ex::derive_ex;
use parse_display::Display;
use slabmap::SlabMap;
use tracing::{debug, trace};

use crate::{Batch, Hooks, SlotSetter, Subscription};


thread_local! {
    static GLOBALS: RefCell<Globals> = RefCell::new(Globals::new());
}

struct Globals {
    is_runtime_exists: bool,
    pending: Vec<RenderTask>,
    batch_depth: usize,
    batch_pending: Vec<RenderTask>,
}
impl Globals {
    fn new() -> Self {
        Self {
            is_runtime_exists: false,
            pending: Vec::new(),
            batch_depth: 0,
            batch_pending: Vec::new(),
        }
    }
    fn with<T>(f: impl FnOnce(&mut Self) -> T) -> T {
        GLOBALS.with(|g| f(&mut g.borrow_mut()))
    }
    fn try_with<T>(f: impl FnOnce(&mut Self) -> T) -> Result<T, AccessError> {
        GLOBALS.try_with(|g| f(&mut g.borrow_mut()))
    }
    fn swap_vec<T>(f: impl FnOnce(&mut Self) -> &mut Vec<T>, values: &mut Vec<T>) -> bool {
        Self::with(|g| swap(f(g), values));
        !values.is_empty()
    }

    fn schedule_render(&mut self, task: RenderTask) {
        if self.batch_depth > 0 {
            self.batch_pending.push(task);
        } else {
            self.pending.push(task);
        }
    }
    fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }
    fn end_batch(&mut self) {
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            let tasks = take(&mut self.batch_pending);
            self.pending.extend(tasks);
        }
    }

    fn finish_runtime(&mut self) {
        self.is_runtime_exists = false;
        self.pending.clear();
        self.batch_pending.clear();
    }
}

/// Runs `f` so that the re-renders it schedules are held back until `f` returns.
///
/// A [`Runtime::update`] called inside `f` does not render them, so no component
/// observes the changes made by `f` half applied.
/// Nested calls join the outermost batch.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    struct BatchGuard;
    impl Drop for BatchGuard {
        fn drop(&mut self) {
            let _ = Globals::try_with(|g| g.end_batch());
        }
    }
    Globals::with(|g| g.begin_batch());
    let _guard = BatchGuard;
    f()
}

/// Identifies a component mounted on a [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("#{0}")]
pub struct ComponentId(usize);

/// Host for components that use [`Hooks`].
///
/// Renders are not performed when a slot changes; they are queued and performed by
/// [`update`](Self::update). Everything queued since the previous `update` is one render pass,
/// in which each component renders at most once.
#[derive_ex(Default)]
#[default(Self::new())]
pub struct Runtime {
    components: SlabMap<Rc<ComponentNode>>,
    pass_buffer: Vec<RenderTask>,
    render_passes: usize,
}
impl Runtime {
    pub fn new() -> Self {
        if Globals::with(|g| replace(&mut g.is_runtime_exists, true)) {
            panic!("Only one `Runtime` can exist in the same thread at the same time.");
        };
        Self {
            components: SlabMap::new(),
            pass_buffer: Vec::new(),
            render_passes: 0,
        }
    }

    /// Renders a new component and runs its mount effects.
    pub fn mount(&mut self, render: impl FnMut(&mut RenderContext) + 'static) -> ComponentId {
        let node = Rc::new(ComponentNode {
            render: RefCell::new(Box::new(render)),
            slots: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            render_count: Cell::new(0),
        });
        let id = ComponentId(self.components.insert(node.clone()));
        trace!(component = %id, "mount");
        node.render(id);
        id
    }

    /// Drops the component and the subscriptions returned by its mount effects.
    pub fn unmount(&mut self, id: ComponentId) -> Result<(), HookError> {
        let node = self
            .components
            .remove(id.0)
            .ok_or(HookError::NotMounted(id))?;
        trace!(component = %id, "unmount");
        node.run_cleanups();
        Ok(())
    }

    /// Renders the component immediately, outside of any render pass.
    pub fn rerender(&mut self, id: ComponentId) -> Result<(), HookError> {
        self.node(id)?.render(id);
        Ok(())
    }

    pub fn is_mounted(&self, id: ComponentId) -> bool {
        self.components.get(id.0).is_some()
    }
    pub fn render_count(&self, id: ComponentId) -> Result<usize, HookError> {
        Ok(self.node(id)?.render_count.get())
    }

    /// Number of render passes performed by [`update`](Self::update) so far.
    pub fn render_passes(&self) -> usize {
        self.render_passes
    }

    /// Returns a [`Batch`] backed by [`batch`].
    pub fn batcher(&self) -> Batch {
        batcher()
    }

    /// Renders every component queued since the previous call as one render pass.
    ///
    /// Renders queued while the pass runs, by render code or mount effects, form the next pass.
    /// Repeats until nothing is queued. Returns `true` if any component was rendered.
    pub fn update(&mut self) -> bool {
        let mut handled = false;
        let mut pass = take(&mut self.pass_buffer);
        while Globals::swap_vec(|g| &mut g.pending, &mut pass) {
            handled |= self.run_pass(&mut pass);
        }
        self.pass_buffer = pass;
        handled
    }

    fn run_pass(&mut self, pass: &mut Vec<RenderTask>) -> bool {
        let mut targets: Vec<(ComponentId, Rc<ComponentNode>)> = Vec::new();
        for task in pass.drain(..) {
            if let Some(node) = task.node.upgrade() {
                if !targets.iter().any(|(_, n)| Rc::ptr_eq(n, &node)) {
                    targets.push((task.id, node));
                }
            }
        }
        if targets.is_empty() {
            return false;
        }
        self.render_passes += 1;
        debug!(
            pass = self.render_passes,
            components = targets.len(),
            "render pass"
        );
        for (id, node) in targets {
            node.render(id);
        }
        true
    }

    fn node(&self, id: ComponentId) -> Result<&Rc<ComponentNode>, HookError> {
        self.components.get(id.0).ok_or(HookError::NotMounted(id))
    }
}
impl Drop for Runtime {
    fn drop(&mut self) {
        let components = take(&mut self.components);
        for node in components.values() {
            node.run_cleanups();
        }
        let _ = Globals::try_with(|g| g.finish_runtime());
    }
}

fn batcher() -> Batch {
    Batch::new(|f| batch(f))
}

struct RenderTask {
    id: ComponentId,
    node: Weak<ComponentNode>,
}

struct ComponentNode {
    render: RefCell<Box<dyn FnMut(&mut RenderContext)>>,
    slots: RefCell<Vec<Rc<dyn Any>>>,
    cleanups: RefCell<Vec<Subscription>>,
    render_count: Cell<usize>,
}
impl ComponentNode {
    fn render(self: &Rc<Self>, id: ComponentId) {
        let mut cx = RenderContext {
            id,
            node: self,
            index: 0,
            is_mount: self.render_count.get() == 0,
            effects: Vec::new(),
        };
        {
            let render = &mut *self.render.borrow_mut();
            render(&mut cx);
        }
        self.render_count.set(self.render_count.get() + 1);
        trace!(component = %id, render_count = self.render_count.get(), "render");

        let effects = take(&mut cx.effects);
        for effect in effects {
            let cleanup = effect();
            self.cleanups.borrow_mut().push(cleanup);
        }
    }
    fn run_cleanups(&self) {
        let cleanups = take(&mut *self.cleanups.borrow_mut());
        drop(cleanups);
    }
}

struct SlotCell<S: 'static> {
    value: RefCell<S>,
    setter: SlotSetter<S>,
}

/// The [`Hooks`] of a component while it renders on a [`Runtime`].
pub struct RenderContext<'a> {
    id: ComponentId,
    node: &'a Rc<ComponentNode>,
    index: usize,
    is_mount: bool,
    effects: Vec<Box<dyn FnOnce() -> Subscription>>,
}
impl RenderContext<'_> {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Returns `true` during the first render of the component.
    pub fn is_mount(&self) -> bool {
        self.is_mount
    }

    fn slot<S: 'static>(&self, index: usize) -> Option<Rc<SlotCell<S>>> {
        let slot = self.node.slots.borrow().get(index)?.clone();
        match slot.downcast::<SlotCell<S>>() {
            Ok(slot) => Some(slot),
            Err(_) => panic!(
                "{}",
                HookError::SlotMismatch {
                    component: self.id,
                    index,
                }
            ),
        }
    }
    fn new_slot<S: 'static>(&self, value: S) -> Rc<SlotCell<S>> {
        let id = self.id;
        let node = Rc::downgrade(self.node);
        let slot = Rc::new_cyclic(|this: &Weak<SlotCell<S>>| {
            let this = this.clone();
            SlotCell {
                value: RefCell::new(value),
                setter: SlotSetter::new(move |value| {
                    if let Some(this) = this.upgrade() {
                        *this.value.borrow_mut() = value;
                        let node = node.clone();
                        let _ = Globals::try_with(|g| g.schedule_render(RenderTask { id, node }));
                    }
                }),
            }
        });
        self.node.slots.borrow_mut().push(slot.clone());
        slot
    }
}
impl Hooks for RenderContext<'_> {
    fn use_slot<S: Clone + 'static>(&mut self, init: impl FnOnce() -> S) -> (S, SlotSetter<S>) {
        let index = self.index;
        self.index += 1;
        let slot = match self.slot::<S>(index) {
            Some(slot) => slot,
            None if self.is_mount => self.new_slot(init()),
            None => panic!(
                "{}",
                HookError::SlotMismatch {
                    component: self.id,
                    index,
                }
            ),
        };
        let value = slot.value.borrow().clone();
        (value, slot.setter.clone())
    }

    fn use_mount_effect(&mut self, effect: impl FnOnce() -> Subscription + 'static) {
        if self.is_mount {
            self.effects.push(Box::new(effect));
        }
    }

    fn batch(&self) -> Option<Batch> {
        Some(batcher())
    }
}

/// Misuse of a [`Runtime`] or of the [`Hooks`] it provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum HookError {
    #[display("component {0} is not mounted")]
    NotMounted(ComponentId),
    #[display("hook {index} of component {component} does not match the hook called there on mount")]
    SlotMismatch { component: ComponentId, index: usize },
}

impl std::error::Error for HookError {}
