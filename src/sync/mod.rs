//! Synchronization primitives with loom support.
//!
//! Under normal compilation, re-exports from std/parking_lot.
//! Under `cfg(loom)`, uses loom's equivalents so the shared traversal pool can
//! be model-checked.
//!
//! Import from this module instead of `parking_lot` or `std::sync` directly:
//!
//! ```ignore
//! use crate::sync::{Arc, Mutex};
//! ```

// Some items are only used under loom cfg
#![allow(unused)]

// ===========================================================================
// Arc
// ===========================================================================

#[cfg(not(loom))]
pub use std::sync::Arc;

#[cfg(loom)]
pub use loom::sync::Arc;

// ===========================================================================
// Mutex
// ===========================================================================

// parking_lot returns guards directly, loom wraps them in `LockResult`. The
// wrapper below gives loom's mutex the parking_lot API.

#[cfg(not(loom))]
pub use parking_lot::{Mutex, MutexGuard};

#[cfg(loom)]
mod loom_mutex {
	//! Wrapper types for loom's Mutex to match parking_lot's API.

	use loom::sync::{Mutex as LoomMutex, MutexGuard as LoomGuard};

	/// A wrapper around loom's Mutex that provides a parking_lot-compatible API.
	pub struct Mutex<T>(LoomMutex<T>);

	impl<T> Mutex<T> {
		/// Creates a new Mutex.
		pub fn new(value: T) -> Self {
			Mutex(LoomMutex::new(value))
		}

		/// Acquires the lock, blocking until available.
		pub fn lock(&self) -> MutexGuard<'_, T> {
			MutexGuard(self.0.lock().unwrap())
		}

		/// Attempts to acquire the lock without blocking.
		pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
			self.0.try_lock().ok().map(MutexGuard)
		}
	}

	/// Wrapper around loom's guard.
	pub struct MutexGuard<'a, T>(LoomGuard<'a, T>);

	impl<'a, T> std::ops::Deref for MutexGuard<'a, T> {
		type Target = T;
		fn deref(&self) -> &T {
			&self.0
		}
	}

	impl<'a, T> std::ops::DerefMut for MutexGuard<'a, T> {
		fn deref_mut(&mut self) -> &mut T {
			&mut self.0
		}
	}
}

#[cfg(loom)]
pub use loom_mutex::{Mutex, MutexGuard};
