//! Copying a tree's items into flat collections.
//!
//! Every exporter takes the walk [`Mode`] to export in, and copies each item
//! once per requested phase. Parallel exports collect into one container per
//! job and splice them into the caller's container in the merge phase, which
//! is added to the mode automatically. Item order across jobs is not
//! specified, only the multiset of items.

use std::collections::LinkedList;

use crate::error::Result;
use crate::stack::StackBuffer;
use crate::visit::{Mode, Visit, VisitState, Visitor};
use crate::AvlTree;

struct ToList;

impl<T: Clone + Send> Visitor<T> for ToList {
	type Data = LinkedList<T>;

	fn visit(&self, item: &T, _: &VisitState, list: &mut LinkedList<T>) -> Visit {
		list.push_back(item.clone());
		Visit::CONTINUE
	}

	fn merge(&self, _: &T, _: &VisitState, list: &mut LinkedList<T>, mut job: LinkedList<T>) -> Visit {
		list.append(&mut job);
		Visit::CONTINUE
	}
}

struct ToRing;

impl<T: Clone + Send> Visitor<T> for ToRing {
	type Data = StackBuffer<T>;

	fn visit(&self, item: &T, _: &VisitState, ring: &mut StackBuffer<T>) -> Visit {
		match ring.push(item.clone()) {
			Ok(()) => Visit::CONTINUE,
			Err(_) => Visit::Error,
		}
	}

	fn merge(&self, _: &T, _: &VisitState, ring: &mut StackBuffer<T>, mut job: StackBuffer<T>) -> Visit {
		match ring.append(&mut job) {
			Ok(()) => Visit::CONTINUE,
			Err(_) => Visit::Error,
		}
	}
}

/// The mode an export actually walks in.
fn export_mode(mode: Mode) -> Mode {
	// Job containers must start out empty, or items would be copied twice.
	let mode = mode - Mode::DUP_DATA;
	if mode.contains(Mode::PARALLEL) {
		mode | Mode::MERGE
	} else {
		mode
	}
}

impl<T: Clone + Send + Sync> AvlTree<T> {
	/// Copies the items into a linked list, in walk order.
	pub fn to_list(&self, mode: Mode) -> Result<LinkedList<T>> {
		let mut list = LinkedList::new();
		self.visit(export_mode(mode), &ToList, &mut list)?;
		Ok(list)
	}

	/// Copies the items into a growable ring buffer, in walk order.
	pub fn to_ring_buffer(&self, mode: Mode) -> Result<StackBuffer<T>> {
		let mode = export_mode(mode);
		let capacity = if mode.contains(Mode::PARALLEL) {
			// Only the parents land here directly, the rest arrives by merge.
			self.len() / self.job_units().max(1)
		} else {
			self.len() * mode.phase_count()
		};
		let mut ring = StackBuffer::try_with_capacity(capacity)?;
		self.visit(mode, &ToRing, &mut ring)?;
		Ok(ring)
	}

	/// Copies the items into a vector, in walk order.
	pub fn to_vec(&self, mode: Mode) -> Result<Vec<T>> {
		if mode.contains(Mode::PARALLEL) {
			return Ok(self.to_ring_buffer(mode)?.into_vec());
		}
		let mut items = Vec::new();
		items.try_reserve_exact(self.len() * mode.phase_count())?;
		self.walk(mode, |item, _| {
			items.push(item.clone());
			Visit::CONTINUE
		})?;
		Ok(items)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tree(n: u32) -> AvlTree<u32> {
		let mut tree = AvlTree::new();
		for i in 0..n {
			tree.insert(i).unwrap();
		}
		tree
	}

	#[test]
	fn sequential_exports_agree() {
		let tree = tree(100);
		let expected: Vec<u32> = (0..100).collect();
		assert_eq!(tree.to_vec(Mode::INFIX).unwrap(), expected);
		assert_eq!(tree.to_list(Mode::INFIX).unwrap().into_iter().collect::<Vec<_>>(), expected);
		assert_eq!(tree.to_ring_buffer(Mode::INFIX).unwrap().into_vec(), expected);
	}

	#[test]
	fn one_copy_per_phase() {
		let tree = tree(10);
		let items = tree.to_vec(Mode::PREFIX | Mode::SUFFIX).unwrap();
		assert_eq!(items.len(), 20);
	}

	#[test]
	fn dup_data_is_ignored_by_exports() {
		let tree = tree(500);
		let mut items = tree.to_vec(Mode::INFIX | Mode::PARALLEL | Mode::DUP_DATA).unwrap();
		items.sort_unstable();
		assert_eq!(items, (0..500).collect::<Vec<_>>());
	}

	#[test]
	fn empty_tree_exports_nothing() {
		let tree = tree(0);
		assert!(tree.to_vec(Mode::INFIX | Mode::PARALLEL).unwrap().is_empty());
		assert!(tree.to_list(Mode::BREADTH).unwrap().is_empty());
	}
}
