//! # Alder: An AVL Tree Driven by Visitors
//!
//! This crate provides a self-balancing binary search tree whose every bulk
//! operation is a walk of one **iterative traversal engine**. Insertion,
//! removal, destruction, range queries and exports are all visitors plugged
//! into the same engine; none of them recurse.
//!
//! ## Design Overview
//!
//! ### Key Concepts
//!
//! **Visitors and phases**: A walk visits nodes in any combination of the
//! prefix, infix, suffix and breadth-first phases requested by its [`Mode`].
//! After each visit the visitor answers with a [`Visit`], steering the walk:
//! which children to descend into, whether to skip the node, whether its
//! current phase is satisfied, or whether to stop.
//!
//! **Stack-driven rebalancing**: Nodes have no parent link. The traversal
//! stack holds the path from the root to the visited node, and insert and
//! remove rebalance by letting the walk unwind that path in the suffix phase.
//!
//! **Shared traversal resources**: Walks need a stack. A tree may borrow it
//! from a [`SharedResources`] slot, which never blocks: a walk that finds the
//! slot busy simply uses a private stack.
//!
//! **Parallel walks**: With [`Mode::PARALLEL`], a deep enough tree is split
//! into one subtree per worker of a [`JobPool`]. Jobs accumulate into their
//! own visitor data, which is merged back on the calling thread.
//!
//! ### Tree Structure
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │ AvlTree                  │
//!                 │  nodes: arena, root      │
//!                 │  compare, destroy, flags │
//!                 └────────────┬─────────────┘
//!                              │ root
//!                              ▼
//!                        ┌───────────┐
//!                        │ 20  (b 0) │      b = height(right) - height(left)
//!                        └─────┬─────┘
//!                    ┌─────────┴─────────┐
//!                    ▼                   ▼
//!              ┌───────────┐       ┌───────────┐
//!              │ 10  (b 0) │       │ 30  (b 0) │
//!              └───────────┘       └───────────┘
//! ```
//!
//! ## Basic Usage
//!
//! ```
//! use alder::{AvlTree, Mode};
//!
//! let mut tree = AvlTree::new();
//! for key in [30, 10, 20] {
//! 	tree.insert(key).unwrap();
//! }
//!
//! assert_eq!(tree.find(&20), Some(&20));
//! assert_eq!(tree.to_vec(Mode::INFIX).unwrap(), vec![10, 20, 30]);
//!
//! tree.remove(&10).unwrap();
//! assert_eq!(tree.len(), 2);
//! ```
//!
//! ## Thread Safety
//!
//! Mutations take `&mut self`. Read-only walks take `&self`, so a tree shared
//! behind an `Arc` can be walked from several threads at once; parallel walks
//! additionally require the items to be `Sync`.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub mod config;
pub mod error;
mod export;
pub mod jobs;
mod mutate;
mod node;
mod parallel;
pub mod pool;
mod rotate;
pub mod stack;
mod sync;
pub mod visit;

pub use config::{DuplicatePolicy, TreeConfig, TreeFlags};
pub use error::{Error, JobFailure, Result};
pub use jobs::{JobBatch, JobHandle, JobPool, JobStatus};
pub use mutate::Insertion;
pub use node::Side;
pub use pool::{Lease, SharedResources};
pub use stack::StackBuffer;
pub use visit::{Completion, Mode, Phase, Route, Visit, VisitState, Visitor};

use node::Nodes;
use visit::{Driven, Start, Walking};

/// Orders two items. Must be a total order, consistent across calls.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Consumes an item leaving the tree.
pub type Destructor<T> = Arc<dyn Fn(T) + Send + Sync>;

// ---------------------------------------------------------------------------
// Core Tree Structure
// ---------------------------------------------------------------------------

/// A height-balanced binary search tree.
///
/// Items are ordered by the tree's comparator. Depending on the
/// [`DuplicatePolicy`], equal items may be stored side by side.
///
/// Dropping the tree passes every remaining item to its destructor, if one
/// is configured and `NO_FREE_ON_REMOVE` is not set.
pub struct AvlTree<T> {
	nodes: Nodes<T>,
	count: usize,
	compare: Comparator<T>,
	destroy: Option<Destructor<T>>,
	flags: TreeFlags,
	duplicates: DuplicatePolicy,
	shared: Option<SharedResources>,
	jobs: Option<Arc<JobPool>>,
	stack_capacity: usize,
}

impl<T: Ord + 'static> AvlTree<T> {
	/// Creates an empty tree ordered by `T`'s `Ord` implementation.
	pub fn new() -> Self {
		Self::with_comparator(T::cmp)
	}

	/// Creates an empty tree ordered by `Ord` with the given configuration.
	pub fn with_config(config: TreeConfig) -> Result<Self> {
		Self::builder().compare(T::cmp).config(config).build()
	}
}

impl<T: Ord + 'static> Default for AvlTree<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> AvlTree<T> {
	/// Creates an empty tree ordered by `compare`.
	pub fn with_comparator<F>(compare: F) -> Self
	where
		F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
	{
		Self::from_parts(Arc::new(compare), None, &TreeConfig::default(), None, None)
	}

	/// Starts building a tree with a custom comparator, destructor or configuration.
	pub fn builder() -> TreeBuilder<T> {
		TreeBuilder::new()
	}

	fn from_parts(
		compare: Comparator<T>,
		destroy: Option<Destructor<T>>,
		config: &TreeConfig,
		shared: Option<SharedResources>,
		jobs: Option<Arc<JobPool>>,
	) -> Self {
		AvlTree {
			nodes: Nodes::default(),
			count: 0,
			compare,
			destroy,
			flags: config.flags(),
			duplicates: config.duplicates,
			shared,
			jobs,
			stack_capacity: config.stack_capacity,
		}
	}

	/// Number of stored items.
	#[inline]
	pub fn len(&self) -> usize {
		self.count
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	pub fn flags(&self) -> TreeFlags {
		self.flags
	}

	/// Replaces the behaviour flags. Takes effect from the next operation.
	pub fn set_flags(&mut self, flags: TreeFlags) {
		self.flags = flags;
	}

	pub fn duplicates(&self) -> DuplicatePolicy {
		self.duplicates
	}

	/// Height of the tree in nodes; an empty tree has depth 0.
	pub fn depth(&self) -> usize {
		self.nodes.depth()
	}

	/// Returns the stored item equal to `key`.
	pub fn find(&self, key: &T) -> Option<&T> {
		let mut cursor = self.nodes.root;
		while let Some(id) = cursor {
			let node = self.nodes.get(id);
			cursor = match (self.compare)(key, &node.data) {
				Ordering::Less => node.left,
				Ordering::Greater => node.right,
				Ordering::Equal => return Some(&node.data),
			};
		}
		None
	}

	pub fn contains(&self, key: &T) -> bool {
		self.find(key).is_some()
	}

	/// The smallest item.
	pub fn min(&self) -> Option<&T> {
		self.extreme(Side::Left)
	}

	/// The largest item.
	pub fn max(&self) -> Option<&T> {
		self.extreme(Side::Right)
	}

	fn extreme(&self, side: Side) -> Option<&T> {
		let mut id = self.nodes.root?;
		while let Some(next) = self.nodes.get(id).child(side) {
			id = next;
		}
		Some(&self.nodes.get(id).data)
	}

	/// Items `x` with `low <= x <= high`, in ascending order.
	pub fn range(&self, low: &T, high: &T) -> Result<Vec<&T>> {
		let compare = &*self.compare;
		let mut found = Vec::new();
		self.walk(Mode::PREFIX | Mode::INFIX, |item, state| match state.phase() {
			Phase::Prefix => {
				// Equal items may sit on either side after rotations.
				let mut route = Route::empty();
				route.set(Route::LEFT, compare(item, low) != Ordering::Less);
				route.set(Route::RIGHT, compare(item, high) != Ordering::Greater);
				Visit::Go(route)
			}
			_ => {
				if compare(item, low) != Ordering::Less && compare(item, high) != Ordering::Greater {
					found.push(item);
				}
				Visit::CONTINUE
			}
		})?;
		Ok(found)
	}

	/// Walks the tree sequentially, calling `f` for each node in each requested phase.
	///
	/// `PARALLEL`, `MERGE` and `DUP_DATA` are ignored.
	///
	/// ```
	/// use alder::{AvlTree, Mode, Visit};
	///
	/// let mut tree = AvlTree::new();
	/// for key in 1..=7 {
	/// 	tree.insert(key).unwrap();
	/// }
	///
	/// let mut levels = Vec::new();
	/// tree.walk(Mode::BREADTH, |key, state| {
	/// 	levels.push((state.depth(), *key));
	/// 	Visit::CONTINUE
	/// })
	/// .unwrap();
	/// assert_eq!(levels[0], (0, 4));
	/// ```
	pub fn walk<'t, F>(&'t self, mode: Mode, f: F) -> Result<Completion>
	where
		F: FnMut(&'t T, &VisitState) -> Visit,
	{
		let mut lease = pool::lease(&self.shared, self.stack_capacity);
		let mut step = Walking::new(&self.nodes, f);
		visit::walk(&mut step, self.nodes.root.map(Start::root), mode, lease.stack())
	}

	/// Walks the tree with `visitor`, splitting the walk across the tree's job
	/// pool if `mode` requests `PARALLEL` and the tree is deep enough.
	pub fn visit<V>(&self, mode: Mode, visitor: &V, data: &mut V::Data) -> Result<Completion>
	where
		T: Sync,
		V: Visitor<T> + Sync,
	{
		let Some(root) = self.nodes.root else {
			return Ok(Completion::Exhausted);
		};
		if mode.contains(Mode::PARALLEL) {
			if let Some(jobs) = self.job_pool() {
				let units = jobs.available_units();
				if parallel::should_split(self.flags, mode, self.depth(), units) {
					return parallel::visit(&self.nodes, root, mode, visitor, data, jobs);
				}
			}
		}
		let mut lease = pool::lease(&self.shared, self.stack_capacity);
		let mut step = Driven::new(&self.nodes, visitor, data);
		visit::walk(&mut step, Some(Start::root(root)), mode, lease.stack())
	}

	/// The pool parallel walks run on: the tree's own, or the process-wide one.
	fn job_pool(&self) -> Option<&JobPool> {
		self.jobs.as_deref().or_else(|| JobPool::global())
	}

	/// Worker count parallel walks are split for.
	pub fn job_units(&self) -> usize {
		self.job_pool().map_or(1, JobPool::available_units)
	}

	/// The destructor removed items go to, unless `NO_FREE_ON_REMOVE` is set.
	fn destructor(&self) -> Option<&Destructor<T>> {
		if self.flags.contains(TreeFlags::NO_FREE_ON_REMOVE) {
			return None;
		}
		self.destroy.as_ref()
	}
}

impl<T: fmt::Debug> fmt::Debug for AvlTree<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut list = f.debug_list();
		let walked = self.walk(Mode::INFIX, |item, _| {
			list.entry(item);
			Visit::CONTINUE
		});
		if walked.is_err() {
			return Err(fmt::Error);
		}
		list.finish()
	}
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and creates an [`AvlTree`].
pub struct TreeBuilder<T> {
	compare: Option<Comparator<T>>,
	destroy: Option<Destructor<T>>,
	config: TreeConfig,
	shared: Option<SharedResources>,
	jobs: Option<Arc<JobPool>>,
}

impl<T> Default for TreeBuilder<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> TreeBuilder<T> {
	pub fn new() -> Self {
		TreeBuilder {
			compare: None,
			destroy: None,
			config: TreeConfig::default(),
			shared: None,
			jobs: None,
		}
	}

	/// Sets the comparator. Required.
	pub fn compare<F>(mut self, compare: F) -> Self
	where
		F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
	{
		self.compare = Some(Arc::new(compare));
		self
	}

	/// Sets the hook removed items are passed to.
	pub fn destroy<F>(mut self, destroy: F) -> Self
	where
		F: Fn(T) + Send + Sync + 'static,
	{
		self.destroy = Some(Arc::new(destroy));
		self
	}

	pub fn config(mut self, config: TreeConfig) -> Self {
		self.config = config;
		self
	}

	pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
		self.config.duplicates = policy;
		self
	}

	/// Borrows traversal stacks from `resources` instead of allocating per walk.
	pub fn shared(mut self, resources: SharedResources) -> Self {
		self.shared = Some(resources);
		self
	}

	/// Runs parallel walks on `pool`.
	pub fn jobs(mut self, pool: Arc<JobPool>) -> Self {
		self.jobs = Some(pool);
		self
	}

	/// Creates the tree.
	///
	/// Fails with [`Error::MissingComparator`] if no comparator was set, or
	/// with [`Error::ThreadPool`] if the configuration asks for a private pool
	/// that cannot be built.
	pub fn build(self) -> Result<AvlTree<T>> {
		let compare = self.compare.ok_or(Error::MissingComparator)?;
		let jobs = match (self.jobs, self.config.job_units) {
			(Some(jobs), _) => Some(jobs),
			(None, Some(units)) => Some(Arc::new(JobPool::new(units)?)),
			(None, None) => None,
		};
		Ok(AvlTree::from_parts(compare, self.destroy, &self.config, self.shared, jobs))
	}
}

// ===========================================================================
// Test-Only Validation
// ===========================================================================

#[cfg(any(test, feature = "test-utils"))]
impl<T: fmt::Debug> AvlTree<T> {
	/// Validates all tree invariants. Panics with diagnostic info if any is violated.
	///
	/// # Invariants Checked
	///
	/// 1. Ordering: every item sorts between the bounds set by its ancestors,
	///    strictly unless duplicates are allowed
	/// 2. Balance: each stored balance factor equals the height difference of
	///    the node's subtrees, and lies in `-1..=1`
	/// 3. Count: `len()` equals the number of reachable nodes, and no node
	///    slot is leaked
	/// 4. Depth: `depth()` equals the height of the tree
	pub fn assert_invariants(&self) {
		let (height, reachable) = match self.nodes.root {
			Some(root) => self.check_subtree(root, None, None),
			None => (0, 0),
		};
		assert_eq!(reachable, self.count, "len() disagrees with the reachable node count");
		assert_eq!(self.nodes.occupied(), self.count, "node slots leaked");
		assert_eq!(self.depth(), height, "depth() disagrees with the tree height");
	}

	/// Returns the height and node count of the subtree rooted at `id`.
	fn check_subtree(&self, id: node::NodeId, low: Option<&T>, high: Option<&T>) -> (usize, usize) {
		let node = self.nodes.get(id);
		let strict = self.duplicates != DuplicatePolicy::Allow;
		if let Some(low) = low {
			let ordering = (self.compare)(&node.data, low);
			assert!(
				ordering == Ordering::Greater || (!strict && ordering == Ordering::Equal),
				"{:?} is in the right subtree of {:?}",
				node.data,
				low
			);
		}
		if let Some(high) = high {
			let ordering = (self.compare)(&node.data, high);
			assert!(
				ordering == Ordering::Less || (!strict && ordering == Ordering::Equal),
				"{:?} is in the left subtree of {:?}",
				node.data,
				high
			);
		}

		let (left_height, left_count) =
			node.left.map_or((0, 0), |left| self.check_subtree(left, low, Some(&node.data)));
		let (right_height, right_count) =
			node.right.map_or((0, 0), |right| self.check_subtree(right, Some(&node.data), high));

		let balance = right_height as isize - left_height as isize;
		assert_eq!(
			node.balance as isize, balance,
			"stored balance of {:?} does not match its subtree heights",
			node.data
		);
		assert!(balance.abs() <= 1, "{:?} is out of balance: {}", node.data, balance);
		(1 + left_height.max(right_height), 1 + left_count + right_count)
	}
}
