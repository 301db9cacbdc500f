//! This module works around limitations of the Rust programming language, and provides missing
//! functionalities that we may expect the Rust programming language and its standard libraries
//! to provide.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

/// InitializeOnce creates an uninitialized value that needs to be initialized later by an
/// external event. InitializeOnce guarantees the value is only initialized once, even if the
/// event fires on several threads at the same time. Unlike `lazy_static!`, the value is not
/// computed on first read: readers observe `None` until the event has fired.
pub struct InitializeOnce<T> {
    v: UnsafeCell<MaybeUninit<T>>,
    /// This is used to guarantee `init_fn` is only called once.
    once: Once,
    /// Set (with release ordering) after the value is written.
    ready: AtomicBool,
}

impl<T> InitializeOnce<T> {
    pub const fn new() -> Self {
        InitializeOnce {
            v: UnsafeCell::new(MaybeUninit::uninit()),
            once: Once::new(),
            ready: AtomicBool::new(false),
        }
    }

    /// Initialize the value. If this method is called by multiple threads, the first thread will
    /// initialize the value, and the other threads will be blocked until the
    /// initialization is done (`Once` returns). Returns true only for the call that ran `init_fn`.
    pub fn initialize_once<F: FnOnce() -> T>(&self, init_fn: F) -> bool {
        let mut initialized_here = false;
        self.once.call_once(|| {
            unsafe { &mut *self.v.get() }.write(init_fn());
            self.ready.store(true, Ordering::Release);
            initialized_here = true;
        });
        debug_assert!(self.once.is_completed());
        initialized_here
    }

    /// Has the value been initialized?
    pub fn is_initialized(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Get the value, or `None` before initialization.
    pub fn get(&self) -> Option<&T> {
        if self.is_initialized() {
            Some(unsafe { (*self.v.get()).assume_init_ref() })
        } else {
            None
        }
    }
}

impl<T> Default for InitializeOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for InitializeOnce<T> {
    fn drop(&mut self) {
        if *self.ready.get_mut() {
            unsafe { self.v.get_mut().assume_init_drop() };
        }
    }
}

// The value is only written once, inside `Once`, and published through `ready`.
unsafe impl<T: Send + Sync> Sync for InitializeOnce<T> {}
unsafe impl<T: Send> Send for InitializeOnce<T> {}
