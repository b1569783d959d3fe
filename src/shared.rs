//! Interrupt safe sharing of a radio between foreground code and an interrupt handler
//!
//! ```no_run
//! # use radio_sx127x_lora::shared::Shared;
//! # struct Radio;
//! # impl Radio { fn handle_interrupt(&mut self) {} }
//! static RADIO: Shared<Radio> = Shared::new();
//!
//! fn dio0_isr() {
//!     RADIO.lock(|r| r.handle_interrupt());
//! }
//! ```
//!
//! Copyright 2019 Ryan Kurte

use core::cell::RefCell;

use critical_section::Mutex;

/// Critical section guarded slot holding an optional value
pub struct Shared<T> {
    inner: Mutex<RefCell<Option<T>>>,
}

impl<T> Shared<T> {
    /// Create an empty slot
    pub const fn new() -> Self {
        Shared {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Store a value, returning any previously stored one
    pub fn install(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(value))
    }

    /// Remove the stored value
    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    /// Run `f` on the stored value inside a critical section
    ///
    /// Returns None if the slot is empty. Every register sequence issued from `f`
    /// completes before an interrupt handler using the same slot can run.
    pub fn lock<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::new()
    }
}
