//! Critical-section guarded slot for an engine shared between contexts.
//!
//! Rendering into the back buffer and `swap_and_display` (or a stripe fill
//! and `flush_next`) must never overlap. Putting the engine in a `Shared`
//! slot makes every access go through one critical section, so a drawing
//! task and a flushing task or interrupt cannot interleave.

use core::cell::RefCell;

use critical_section::Mutex;

pub struct Shared<T> {
    slot: Mutex<RefCell<Option<T>>>,
}

impl<T> Shared<T> {
    /// Empty slot, usable in a `static`.
    pub const fn empty() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(None)),
        }
    }

    pub const fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(RefCell::new(Some(value))),
        }
    }

    /// Place `value` in the slot, returning what was there.
    pub fn install(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.slot.borrow_ref_mut(cs).replace(value))
    }

    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.slot.borrow_ref_mut(cs).take())
    }

    /// Run `f` on the value inside a critical section. `None` if empty.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|cs| self.slot.borrow_ref_mut(cs).as_mut().map(f))
    }

    pub fn is_installed(&self) -> bool {
        critical_section::with(|cs| self.slot.borrow_ref(cs).is_some())
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::empty()
    }
}
