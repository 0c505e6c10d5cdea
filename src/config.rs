//! Tree configuration.
//!
//! [`TreeConfig`] gathers the knobs fixed at construction time. It can be
//! built in code with the `with_*` setters or deserialized, e.g. from a JSON
//! section of an application config; missing fields take their defaults.

use bitflags::bitflags;
use serde::Deserialize;

use crate::stack::DEFAULT_CAPACITY;

/// What `insert` does when an equal item is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
	/// Store the new item as well, to the left of the equal ones.
	#[default]
	Allow,
	/// Fail with [`Error::Duplicate`](crate::Error::Duplicate).
	Reject,
	/// Keep the stored item and hand the new one back.
	Ignore,
	/// Store the new item in place of the old one.
	Replace,
}

bitflags! {
	/// Behaviour flags of a tree.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct TreeFlags: u8 {
		/// Removed and replaced payloads are handed back to the caller
		/// instead of being passed to the destructor.
		const NO_FREE_ON_REMOVE = 1 << 0;
		/// Walks requesting `Mode::PARALLEL` run sequentially.
		const PARALLEL_DISABLED = 1 << 1;
	}
}

/// Configuration for an [`AvlTree`](crate::AvlTree).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
	/// Handling of equal items on insert (default: `Allow`).
	pub duplicates: DuplicatePolicy,

	/// Whether removed payloads go to the destructor (default: true).
	pub free_on_remove: bool,

	/// Whether walks may be split across worker jobs (default: true).
	pub parallel: bool,

	/// Initial capacity of a traversal stack (default: 32).
	pub stack_capacity: usize,

	/// Worker count of a pool private to the tree. `None` uses the process-wide
	/// pool sized to the available parallelism.
	pub job_units: Option<usize>,
}

impl Default for TreeConfig {
	fn default() -> Self {
		Self {
			duplicates: DuplicatePolicy::default(),
			free_on_remove: true,
			parallel: true,
			stack_capacity: DEFAULT_CAPACITY,
			job_units: None,
		}
	}
}

impl TreeConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the duplicate policy.
	pub fn with_duplicates(mut self, policy: DuplicatePolicy) -> Self {
		self.duplicates = policy;
		self
	}

	/// Enables or disables passing removed payloads to the destructor.
	pub fn with_free_on_remove(mut self, enable: bool) -> Self {
		self.free_on_remove = enable;
		self
	}

	/// Enables or disables parallel walks.
	pub fn with_parallel(mut self, enable: bool) -> Self {
		self.parallel = enable;
		self
	}

	/// Sets the initial traversal stack capacity.
	pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
		self.stack_capacity = capacity;
		self
	}

	/// Gives the tree its own worker pool of `units` threads.
	pub fn with_job_units(mut self, units: usize) -> Self {
		self.job_units = Some(units.max(1));
		self
	}

	/// The flags implied by this configuration.
	pub fn flags(&self) -> TreeFlags {
		let mut flags = TreeFlags::empty();
		flags.set(TreeFlags::NO_FREE_ON_REMOVE, !self.free_on_remove);
		flags.set(TreeFlags::PARALLEL_DISABLED, !self.parallel);
		flags
	}
}
