//! Shared traversal resources.
//!
//! Every walk needs a traversal stack. A tree can own a [`SharedResources`]
//! slot holding one pre-grown stack that walks borrow instead of allocating.
//! Borrowing never blocks: if the slot is locked or its stack is already
//! leased out, the walk gets a private stack of its own.
//!
//! ```text
//!   walk A ──try_lock──► [ Some(stack) ] ──take──► Lease (pooled)
//!   walk B ──try_lock──► [ None ]        ────────► Lease (private)
//!   Lease A dropped ───► stack.reset() ──put back──► [ Some(stack) ]
//! ```
//!
//! Stack frames do not depend on the item type, so one slot can be shared by
//! trees of different types.

use std::fmt;

use crate::stack::{StackBuffer, DEFAULT_CAPACITY};
use crate::sync::{Arc, Mutex};
use crate::visit::Frame;

/// The resources one walk needs.
#[derive(Default)]
pub(crate) struct Resources {
	pub(crate) stack: StackBuffer<Frame>,
}

impl Resources {
	fn with_capacity(capacity: usize) -> Self {
		Resources {
			stack: StackBuffer::with_capacity(capacity),
		}
	}
}

/// A lendable slot of traversal resources.
///
/// Cloning yields another handle to the same slot.
#[derive(Clone)]
pub struct SharedResources {
	slot: Arc<Mutex<Option<Resources>>>,
	/// Capacity of the private stacks handed out while the slot is busy.
	capacity: usize,
}

impl Default for SharedResources {
	fn default() -> Self {
		Self::new()
	}
}

impl SharedResources {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CAPACITY)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		SharedResources {
			slot: Arc::new(Mutex::new(Some(Resources::with_capacity(capacity)))),
			capacity,
		}
	}

	/// Borrows the pooled resources, or creates private ones if they are busy.
	pub fn lease(&self) -> Lease<'_> {
		if let Some(mut slot) = self.slot.try_lock() {
			if let Some(resources) = slot.take() {
				return Lease {
					resources,
					home: Some(self),
				};
			}
		}
		tracing::trace!("shared traversal resources busy, using a private stack");
		Lease::private(self.capacity)
	}

	/// Returns `true` if the pooled resources are currently available.
	pub fn is_idle(&self) -> bool {
		self.slot.try_lock().is_some_and(|slot| slot.is_some())
	}
}

impl fmt::Debug for SharedResources {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SharedResources")
			.field("capacity", &self.capacity)
			.field("idle", &self.is_idle())
			.finish()
	}
}

/// Traversal resources held for the duration of one walk.
///
/// Pooled resources are reset and returned to their slot on drop.
pub struct Lease<'p> {
	resources: Resources,
	home: Option<&'p SharedResources>,
}

impl Lease<'_> {
	pub(crate) fn private(capacity: usize) -> Self {
		Lease {
			resources: Resources::with_capacity(capacity),
			home: None,
		}
	}

	/// Returns `true` if these resources came from a shared slot.
	pub fn is_pooled(&self) -> bool {
		self.home.is_some()
	}

	pub(crate) fn stack(&mut self) -> &mut StackBuffer<Frame> {
		&mut self.resources.stack
	}
}

impl Drop for Lease<'_> {
	fn drop(&mut self) {
		if let Some(home) = self.home {
			let mut resources = std::mem::take(&mut self.resources);
			resources.stack.reset(false);
			*home.slot.lock() = Some(resources);
		}
	}
}

/// Leases from `shared` if present, or creates private resources.
pub(crate) fn lease(shared: &Option<SharedResources>, capacity: usize) -> Lease<'_> {
	match shared {
		Some(shared) => shared.lease(),
		None => Lease::private(capacity),
	}
}
