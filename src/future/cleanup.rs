use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A shared, run-at-most-once resource release action.
///
/// Every clone refers to the same cell. The first call to [`Cleanup::run`]
/// retires the cell; later calls, from any clone, do nothing.
#[derive(Clone, Default)]
pub struct Cleanup {
    slot: Rc<RefCell<Slot>>,
}

#[derive(Default)]
enum Slot {
    #[default]
    Empty,
    Armed(Box<dyn FnOnce()>),
    Delegated(Cleanup),
    Retired,
}

impl Cleanup {
    /// A cleanup that runs `action`.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self::from_slot(Slot::Armed(Box::new(action)))
    }

    /// A cleanup with nothing to release. Running it is a no-op.
    pub fn none() -> Self {
        Self::default()
    }

    /// A cleanup that forwards to `target` until rebound.
    pub fn delegate(target: Cleanup) -> Self {
        Self::from_slot(Slot::Delegated(target))
    }

    /// A cleanup that runs every one of `cleanups`, in order.
    pub fn all<I>(cleanups: I) -> Self
    where
        I: IntoIterator<Item = Cleanup>,
    {
        let cleanups: Vec<Cleanup> = cleanups.into_iter().collect();
        Self::new(move || {
            for cleanup in cleanups {
                cleanup.run();
            }
        })
    }

    fn from_slot(slot: Slot) -> Self {
        Self {
            slot: Rc::new(RefCell::new(slot)),
        }
    }

    /// Run the action, unless this cleanup has already run.
    pub fn run(&self) {
        let slot = std::mem::replace(&mut *self.slot.borrow_mut(), Slot::Retired);
        match slot {
            Slot::Armed(action) => action(),
            Slot::Delegated(target) => target.run(),
            Slot::Empty | Slot::Retired => {}
        }
    }

    /// Point this cleanup at `target` instead of whatever it held.
    ///
    /// The previous action is dropped without running: it belonged to a
    /// resource that has been fully consumed. If this cleanup already ran,
    /// `target` runs right away so the new resource is not leaked.
    pub fn rebind(&self, target: Cleanup) {
        if Rc::ptr_eq(&self.slot, &target.slot) {
            return;
        }
        if self.is_retired() {
            target.run();
        } else {
            *self.slot.borrow_mut() = Slot::Delegated(target);
        }
    }

    /// Whether this cleanup has already run.
    pub fn is_retired(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Retired)
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.slot.borrow() {
            Slot::Empty => "empty",
            Slot::Armed(_) => "armed",
            Slot::Delegated(_) => "delegated",
            Slot::Retired => "retired",
        };
        f.debug_struct("Cleanup").field("state", &state).finish()
    }
}
