//! User-adjustable parameters and their change notification.
//!
//! A [`ScalarParameter`] lives on the UI side and is only ever mutated there. Anything that
//! wants to follow it implements [`Observer`] and subscribes; the parameter keeps a weak
//! reference only, so an observer that is dropped simply stops receiving updates.
//!
//! The audio side never touches a parameter directly. It owns [`ParamTarget`]s, which are
//! observers that store the last value in an atomic and raise a flag that the audio context
//! reads once per block.

use crate::math::fuzzy_equals;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Receives values published by a [`Subject`].
pub trait Observer<T>: Send + Sync {
    fn on_changed(&self, value: T);
}

/// Publishes values to a list of weakly held observers.
pub struct Subject<T> {
    observers: Vec<Weak<dyn Observer<T>>>,
}

impl<T: Copy + 'static> Subject<T> {
    #[must_use]
    pub fn new() -> Self {
        Subject {
            observers: Vec::new(),
        }
    }

    /// Registers an observer. The subject does not keep it alive.
    pub fn attach<O: Observer<T> + 'static>(&mut self, observer: &Arc<O>) {
        let weak: Weak<O> = Arc::downgrade(observer);
        self.observers.push(weak);
    }

    /// Sends `value` to every live observer and forgets the dead ones.
    pub fn notify(&mut self, value: T) {
        self.observers.retain(|weak| match weak.upgrade() {
            Some(observer) => {
                observer.on_changed(value);
                true
            }
            None => false,
        });
    }

    /// Number of observers still registered, including ones not yet found dead.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl<T: Copy + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// A bounded, change-notifying numeric value.
///
/// `min <= value <= max` holds after every call. Moving one bound past the other drags the
/// other bound along with it.
#[derive(Debug)]
pub struct ScalarParameter {
    name: &'static str,
    value: f64,
    min: f64,
    max: f64,
    fixed: bool,
    subject: Subject<f64>,
}

impl ScalarParameter {
    #[must_use]
    pub fn new(name: &'static str, value: f64, min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        ScalarParameter {
            name,
            value: value.clamp(min, max),
            min,
            max,
            fixed: false,
            subject: Subject::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Follows this parameter. The observer receives every new value.
    pub fn subscribe<O: Observer<f64> + 'static>(&mut self, observer: &Arc<O>) {
        self.subject.attach(observer);
    }

    /// Clamps `value` into the bounds and notifies if it differs from the current value.
    /// `NaN` is ignored.
    pub fn set_value(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        if self.store(value.clamp(self.min, self.max)) {
            self.fixed = false;
        }
    }

    pub fn set_min(&mut self, min: f64) {
        if min.is_nan() {
            return;
        }
        if !fuzzy_equals(min, self.min) || self.max < min {
            self.fixed = false;
        }
        self.min = min;
        if self.max < min {
            self.max = min;
        }
        self.enforce_bounds();
    }

    pub fn set_max(&mut self, max: f64) {
        if max.is_nan() {
            return;
        }
        if !fuzzy_equals(max, self.max) || self.min > max {
            self.fixed = false;
        }
        self.max = max;
        if self.min > max {
            self.min = max;
        }
        self.enforce_bounds();
    }

    /// Pins the parameter: both bounds and the value become `value`.
    pub fn set_fixed(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.min = value;
        self.max = value;
        self.store(value);
        self.fixed = true;
    }

    fn enforce_bounds(&mut self) {
        let clamped = self.value.clamp(self.min, self.max);
        self.store(clamped);
    }

    /// Returns whether observers were notified.
    fn store(&mut self, value: f64) -> bool {
        if fuzzy_equals(value, self.value) {
            // keep the exact bound, not a value a rounding error away from it
            self.value = value;
            false
        } else {
            self.value = value;
            self.subject.notify(value);
            true
        }
    }
}

/// Boolean counterpart of [`ScalarParameter`].
#[derive(Debug)]
pub struct ToggleParameter {
    name: &'static str,
    value: bool,
    subject: Subject<bool>,
}

impl ToggleParameter {
    #[must_use]
    pub fn new(name: &'static str, value: bool) -> Self {
        ToggleParameter {
            name,
            value,
            subject: Subject::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn value(&self) -> bool {
        self.value
    }

    pub fn subscribe<O: Observer<bool> + 'static>(&mut self, observer: &Arc<O>) {
        self.subject.attach(observer);
    }

    pub fn set_value(&mut self, value: bool) {
        if self.value != value {
            self.value = value;
            self.subject.notify(value);
        }
    }
}

/// Last value set on the UI side, readable from the audio context without locks.
///
/// The audio context calls [`ParamTarget::take_change`] once per block; a change that lands
/// while a block is being rendered is picked up by the next one.
#[derive(Debug)]
pub struct ParamTarget {
    bits: AtomicU64,
    changed: AtomicBool,
}

impl ParamTarget {
    #[must_use]
    pub fn new(value: f64) -> Self {
        ParamTarget {
            bits: AtomicU64::new(value.to_bits()),
            changed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
        self.changed.store(true, Ordering::Release);
    }

    /// Returns the new value if it was set since the last call.
    pub fn take_change(&self) -> Option<f64> {
        if self.changed.swap(false, Ordering::Acquire) {
            Some(self.get())
        } else {
            None
        }
    }
}

impl Observer<f64> for ParamTarget {
    fn on_changed(&self, value: f64) {
        self.set(value);
    }
}

/// [`ParamTarget`] for booleans.
#[derive(Debug)]
pub struct ToggleTarget {
    value: AtomicBool,
    changed: AtomicBool,
}

impl ToggleTarget {
    #[must_use]
    pub fn new(value: bool) -> Self {
        ToggleTarget {
            value: AtomicBool::new(value),
            changed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Relaxed);
        self.changed.store(true, Ordering::Release);
    }

    pub fn take_change(&self) -> Option<bool> {
        if self.changed.swap(false, Ordering::Acquire) {
            Some(self.get())
        } else {
            None
        }
    }
}

impl Observer<bool> for ToggleTarget {
    fn on_changed(&self, value: bool) {
        self.set(value);
    }
}

/// Raised by any change of the parameters it observes.
#[derive(Debug, Default)]
pub struct ChangeFlag {
    raised: AtomicBool,
}

impl ChangeFlag {
    #[must_use]
    pub fn new(raised: bool) -> Self {
        ChangeFlag {
            raised: AtomicBool::new(raised),
        }
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Lowers the flag and reports whether it was raised.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::Acquire)
    }
}

impl Observer<f64> for ChangeFlag {
    fn on_changed(&self, _value: f64) {
        self.raise();
    }
}

impl Observer<bool> for ChangeFlag {
    fn on_changed(&self, _value: bool) {
        self.raise();
    }
}
