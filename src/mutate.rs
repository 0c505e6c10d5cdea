//! Insertion, removal and destruction as traversal-engine walks.
//!
//! Both mutations walk in `PREFIX | SUFFIX` mode. The prefix phase searches
//! for the position of the item; once found, the visitor performs the
//! structural change and answers `NEXT_PHASE` so no further prefix visits
//! happen. What remains on the traversal stack is exactly the path back to
//! the root, and the suffix phase walks it upwards adjusting balance factors
//! and rotating until the height change has been absorbed.
//!
//! ```text
//!   prefix:   root ─► a ─► b ─► (absent)  attach leaf, NEXT_PHASE
//!   suffix:                b ◄─ a ◄─ root   after_growth, stop when absorbed
//! ```
//!
//! Removal of a node with two children first pushes the path down to the
//! in-order successor onto the stack, swaps the payloads and unlinks the
//! successor instead, so the suffix phase starts from the successor's parent.

use std::cmp::Ordering;

use crate::config::DuplicatePolicy;
use crate::error::{Error, Result};
use crate::node::{NodeId, Nodes, Side};
use crate::pool;
use crate::rotate;
use crate::visit::{self, Mode, Phase, Route, Start, Step, Visit, VisitContext};
use crate::AvlTree;

/// What [`AvlTree::insert`] did with the item.
#[derive(Debug, PartialEq, Eq)]
pub enum Insertion<T> {
	/// The item was stored in a new node.
	Inserted,
	/// An equal item was stored and kept. The tree is unchanged.
	///
	/// This carries the *new* item, not the stored one: the caller gets its
	/// rejected value back instead of having it dropped. The stored item
	/// stays in the tree and can be read with [`AvlTree::find`].
	Kept(T),
	/// An equal item was stored and has been replaced. The old payload is
	/// handed back unless it went to the destructor.
	Replaced(Option<T>),
}

const MUTATE: Mode = Mode::PREFIX.union(Mode::SUFFIX);

// ===========================================================================
// Insert
// ===========================================================================

enum Inserted<T> {
	Leaf,
	Kept(T),
	Replaced(T),
	Failed(Error),
}

struct InsertStep<'t, T> {
	nodes: &'t mut Nodes<T>,
	compare: &'t (dyn Fn(&T, &T) -> Ordering + Send + Sync),
	policy: DuplicatePolicy,
	item: Option<T>,
	/// Side the new leaf hangs from, consumed by its parent's suffix visit.
	attached: Option<Side>,
	outcome: Option<Inserted<T>>,
}

impl<T> InsertStep<'_, T> {
	fn fail(&mut self, error: Error) -> Visit {
		self.outcome = Some(Inserted::Failed(error));
		Visit::Error
	}

	fn search(&mut self, id: NodeId) -> Visit {
		let Some(item) = self.item.as_ref() else {
			return self.fail(Error::corrupted("insert searched after placing its item"));
		};
		let side = match ((self.compare)(item, &self.nodes.get(id).data), self.policy) {
			(Ordering::Equal, DuplicatePolicy::Reject) => return self.fail(Error::Duplicate),
			(Ordering::Equal, DuplicatePolicy::Ignore) => {
				self.outcome = self.item.take().map(Inserted::Kept);
				return Visit::Finished;
			}
			(Ordering::Equal, DuplicatePolicy::Replace) => {
				if let Some(item) = self.item.take() {
					let old = std::mem::replace(&mut self.nodes.get_mut(id).data, item);
					self.outcome = Some(Inserted::Replaced(old));
				}
				return Visit::Finished;
			}
			(Ordering::Greater, _) => Side::Right,
			(Ordering::Less | Ordering::Equal, _) => Side::Left,
		};
		if self.nodes.get(id).child(side).is_some() {
			return Visit::Go(side.into());
		}

		let Some(item) = self.item.take() else {
			return self.fail(Error::corrupted("insert searched after placing its item"));
		};
		let leaf = match self.nodes.alloc(item) {
			Ok(leaf) => leaf,
			Err(error) => return self.fail(error),
		};
		self.nodes.get_mut(id).set_child(side, Some(leaf));
		self.attached = Some(side);
		self.outcome = Some(Inserted::Leaf);
		Visit::NEXT_PHASE
	}

	fn rebalance(&mut self, cx: &VisitContext<'_>) -> Visit {
		let id = cx.state.node;
		let Some(side) = self.attached.take().or(cx.state.from()) else {
			return self.fail(Error::corrupted("grown subtree side unknown"));
		};
		let repaired = rotate::after_growth(self.nodes, id, side);
		if repaired.root != id {
			match cx.parent() {
				Ok(parent) => self.nodes.relink(parent, Some(repaired.root)),
				Err(error) => return self.fail(error),
			}
		}
		if repaired.propagate {
			Visit::CONTINUE
		} else {
			Visit::Finished
		}
	}
}

impl<T> Step for InsertStep<'_, T> {
	fn children(&self, node: NodeId) -> (Option<NodeId>, Option<NodeId>) {
		self.nodes.children(node)
	}

	fn visit(&mut self, cx: &mut VisitContext<'_>) -> Visit {
		match cx.state.phase() {
			Phase::Prefix => self.search(cx.state.node),
			Phase::Suffix => self.rebalance(cx),
			_ => Visit::CONTINUE,
		}
	}
}

// ===========================================================================
// Remove
// ===========================================================================

struct RemoveStep<'t, T> {
	nodes: &'t mut Nodes<T>,
	compare: &'t (dyn Fn(&T, &T) -> Ordering + Send + Sync),
	key: &'t T,
	removed: Option<T>,
	failure: Option<Error>,
}

impl<T> RemoveStep<'_, T> {
	fn fail(&mut self, error: Error) -> Visit {
		self.failure = Some(error);
		Visit::Error
	}

	fn search(&mut self, cx: &mut VisitContext<'_>) -> Visit {
		let id = cx.state.node;
		let node = self.nodes.get(id);
		let side = match (self.compare)(self.key, &node.data) {
			Ordering::Less => Side::Left,
			Ordering::Greater => Side::Right,
			Ordering::Equal => {
				return match self.unlink(cx) {
					Ok(()) => Visit::Go(Route::SKIP | Route::NEXT_PHASE),
					Err(error) => self.fail(error),
				};
			}
		};
		if node.child(side).is_none() {
			return self.fail(Error::NotFound);
		}
		Visit::Go(side.into())
	}

	/// Removes the visited node from the tree, keeping its payload.
	///
	/// On return the top of the stack is the parent of the slot whose subtree
	/// shrank, with `from` naming that slot.
	fn unlink(&mut self, cx: &mut VisitContext<'_>) -> Result<()> {
		let id = cx.state.node;
		match self.nodes.children(id) {
			(Some(_), Some(right)) => {
				// Walk down to the in-order successor, recording the path
				// so the suffix phase rebalances it bottom-up.
				let mut depth = cx.state.depth();
				cx.push_ancestor(id, Side::Right, depth)?;
				let mut parent = (id, Side::Right);
				let mut successor = right;
				while let Some(next) = self.nodes.get(successor).left {
					depth += 1;
					cx.push_ancestor(successor, Side::Left, depth)?;
					parent = (successor, Side::Left);
					successor = next;
				}
				let rest = self.nodes.get(successor).right;
				self.nodes.relink(Some(parent), rest);
				let data = self.nodes.release(successor);
				self.removed = Some(std::mem::replace(&mut self.nodes.get_mut(id).data, data));
			}
			(left, right) => {
				let parent = cx.parent()?;
				self.nodes.relink(parent, left.or(right));
				self.removed = Some(self.nodes.release(id));
			}
		}
		Ok(())
	}

	fn rebalance(&mut self, cx: &VisitContext<'_>) -> Visit {
		let id = cx.state.node;
		let Some(side) = cx.state.from() else {
			return self.fail(Error::corrupted("shrunk subtree side unknown"));
		};
		let repaired = rotate::after_shrink(self.nodes, id, side);
		if repaired.root != id {
			match cx.parent() {
				Ok(parent) => self.nodes.relink(parent, Some(repaired.root)),
				Err(error) => return self.fail(error),
			}
		}
		if repaired.propagate {
			Visit::CONTINUE
		} else {
			Visit::Finished
		}
	}
}

impl<T> Step for RemoveStep<'_, T> {
	fn children(&self, node: NodeId) -> (Option<NodeId>, Option<NodeId>) {
		self.nodes.children(node)
	}

	fn visit(&mut self, cx: &mut VisitContext<'_>) -> Visit {
		match cx.state.phase() {
			Phase::Prefix => self.search(cx),
			Phase::Suffix => self.rebalance(cx),
			_ => Visit::CONTINUE,
		}
	}
}

// ===========================================================================
// Clear
// ===========================================================================

/// Releases every node bottom-up, handing each payload to `sink`.
struct ClearStep<'t, T, F> {
	nodes: &'t mut Nodes<T>,
	sink: F,
}

impl<T, F: FnMut(T)> Step for ClearStep<'_, T, F> {
	fn children(&self, node: NodeId) -> (Option<NodeId>, Option<NodeId>) {
		self.nodes.children(node)
	}

	fn visit(&mut self, cx: &mut VisitContext<'_>) -> Visit {
		let data = self.nodes.release(cx.state.node);
		(self.sink)(data);
		Visit::CONTINUE
	}
}

// ===========================================================================
// Tree operations
// ===========================================================================

impl<T> AvlTree<T> {
	/// Inserts `item`, rebalancing on the way back up.
	///
	/// What happens to an item equal to a stored one depends on the tree's
	/// [`DuplicatePolicy`]; under `Reject` it fails with [`Error::Duplicate`]
	/// and the tree is left unchanged.
	pub fn insert(&mut self, item: T) -> Result<Insertion<T>> {
		let Some(root) = self.nodes.root else {
			let id = self.nodes.alloc(item)?;
			self.nodes.root = Some(id);
			self.count += 1;
			return Ok(Insertion::Inserted);
		};

		let mut lease = pool::lease(&self.shared, self.stack_capacity);
		let mut step = InsertStep {
			nodes: &mut self.nodes,
			compare: &*self.compare,
			policy: self.duplicates,
			item: Some(item),
			attached: None,
			outcome: None,
		};
		let walked = visit::walk(&mut step, Some(Start::root(root)), MUTATE, lease.stack());
		let outcome = step.outcome.take();
		drop(step);

		if let Some(Inserted::Leaf) = outcome {
			self.count += 1;
		}
		match (outcome, walked) {
			(Some(Inserted::Failed(error)), _) => Err(error),
			(_, Err(error)) => Err(error),
			(Some(Inserted::Leaf), Ok(_)) => Ok(Insertion::Inserted),
			(Some(Inserted::Kept(item)), Ok(_)) => Ok(Insertion::Kept(item)),
			(Some(Inserted::Replaced(old)), Ok(_)) => Ok(Insertion::Replaced(self.dispose(old))),
			(None, Ok(_)) => Err(Error::corrupted("insert walk ended without placing its item")),
		}
	}

	/// Removes an item equal to `key`.
	///
	/// Returns the removed payload unless it went to the destructor, or
	/// [`Error::NotFound`] if no equal item is stored.
	pub fn remove(&mut self, key: &T) -> Result<Option<T>> {
		let Some(root) = self.nodes.root else {
			return Err(Error::NotFound);
		};

		let mut lease = pool::lease(&self.shared, self.stack_capacity);
		let mut step = RemoveStep {
			nodes: &mut self.nodes,
			compare: &*self.compare,
			key,
			removed: None,
			failure: None,
		};
		let walked = visit::walk(&mut step, Some(Start::root(root)), MUTATE, lease.stack());
		let (removed, failure) = (step.removed.take(), step.failure.take());
		drop(step);

		if removed.is_some() {
			self.count -= 1;
		}
		if let Some(error) = failure {
			return Err(error);
		}
		walked?;
		match removed {
			Some(item) => Ok(self.dispose(item)),
			None => Err(Error::corrupted("remove walk ended without removing anything")),
		}
	}

	/// Removes every item, passing each to the destructor unless
	/// `NO_FREE_ON_REMOVE` is set.
	pub fn clear(&mut self) {
		let Some(root) = self.nodes.root else {
			return;
		};
		let destroy = self.destructor().cloned();
		let mut sink = |item: T| match &destroy {
			Some(destroy) => destroy(item),
			None => drop(item),
		};

		let walked = {
			let mut lease = pool::lease(&self.shared, self.stack_capacity);
			let mut step = ClearStep {
				nodes: &mut self.nodes,
				sink: &mut sink,
			};
			visit::walk(&mut step, Some(Start::root(root)), Mode::SUFFIX, lease.stack())
		};
		if let Err(error) = walked {
			tracing::warn!(%error, "clear walk failed, releasing remaining nodes directly");
		}
		// Picks up anything a failed walk left behind.
		for item in self.nodes.drain() {
			sink(item);
		}
		self.count = 0;
	}

	/// Hands `item` back to the caller, or to the destructor if one applies.
	fn dispose(&self, item: T) -> Option<T> {
		match self.destructor() {
			Some(destroy) => {
				destroy(item);
				None
			}
			None => Some(item),
		}
	}
}

impl<T> Drop for AvlTree<T> {
	fn drop(&mut self) {
		self.clear();
	}
}
