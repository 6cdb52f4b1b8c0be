//! The bridge between the timer interrupt and the application's control code.

use core::cell::Cell;

use critical_section::Mutex;

/// Control code run on every timer overflow.
///
/// It runs in interrupt context: it must not block or allocate, it should
/// return quickly, and it is never re-entered.
pub type IntervalCallback = fn();

/// Holds the registered [`IntervalCallback`].
///
/// Meant to live in a `static` so the interrupt handler can reach it:
///
/// ```
/// use voltdrive_timer::CallbackSlot;
///
/// static CONTROL: CallbackSlot = CallbackSlot::new();
///
/// fn control_step() {}
///
/// CONTROL.register(control_step);
/// // in the timer interrupt handler:
/// CONTROL.fire();
/// ```
pub struct CallbackSlot {
    callback: Mutex<Cell<Option<IntervalCallback>>>,
}

impl CallbackSlot {
    pub const fn new() -> Self {
        Self {
            callback: Mutex::new(Cell::new(None)),
        }
    }

    /// Install `callback`, replacing any earlier one.
    pub fn register(&self, callback: IntervalCallback) {
        critical_section::with(|cs| self.callback.borrow(cs).set(Some(callback)));
    }

    pub fn clear(&self) {
        critical_section::with(|cs| self.callback.borrow(cs).set(None));
    }

    pub fn is_registered(&self) -> bool {
        critical_section::with(|cs| self.callback.borrow(cs).get().is_some())
    }

    /// Interrupt adapter: run the registered callback, if any.
    ///
    /// The callback runs outside the critical section. Returns whether a
    /// callback ran.
    #[inline]
    pub fn fire(&self) -> bool {
        let callback = critical_section::with(|cs| self.callback.borrow(cs).get());
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl Default for CallbackSlot {
    fn default() -> Self {
        Self::new()
    }
}
