//! Node storage for the AVL tree.
//!
//! Nodes live in an index arena owned by the tree. Links between nodes are
//! [`NodeId`]s rather than pointers, so the traversal stack can hold onto
//! ancestors while rotations rewrite the links below them. There is no parent
//! link: a node's ancestry is whatever the traversal stack currently holds.

use std::fmt;

use crate::error::{Error, Result};

/// Handle of a node in its tree's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
	#[inline]
	fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Debug for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// One of the two child slots of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
	Left,
	Right,
}

impl Side {
	#[inline]
	pub fn opposite(self) -> Side {
		match self {
			Side::Left => Side::Right,
			Side::Right => Side::Left,
		}
	}

	/// The balance-factor change caused by this side growing by one level.
	#[inline]
	pub(crate) fn weight(self) -> i8 {
		match self {
			Side::Left => -1,
			Side::Right => 1,
		}
	}
}

/// A binary node.
///
/// `balance` is `height(right) - height(left)`. It only leaves `-1..=1`
/// transiently, between a height change and the rotation that repairs it.
pub(crate) struct Node<T> {
	pub(crate) left: Option<NodeId>,
	pub(crate) right: Option<NodeId>,
	pub(crate) balance: i8,
	pub(crate) data: T,
}

impl<T> Node<T> {
	#[inline]
	pub(crate) fn child(&self, side: Side) -> Option<NodeId> {
		match side {
			Side::Left => self.left,
			Side::Right => self.right,
		}
	}

	#[inline]
	pub(crate) fn set_child(&mut self, side: Side, child: Option<NodeId>) {
		match side {
			Side::Left => self.left = child,
			Side::Right => self.right = child,
		}
	}
}

/// The arena holding every node of one tree, plus the root link.
pub(crate) struct Nodes<T> {
	slots: Vec<Option<Node<T>>>,
	free: Vec<u32>,
	pub(crate) root: Option<NodeId>,
}

impl<T> Default for Nodes<T> {
	fn default() -> Self {
		Nodes {
			slots: Vec::new(),
			free: Vec::new(),
			root: None,
		}
	}
}

impl<T> Nodes<T> {
	/// Allocates a detached leaf holding `data`.
	pub(crate) fn alloc(&mut self, data: T) -> Result<NodeId> {
		let node = Node {
			left: None,
			right: None,
			balance: 0,
			data,
		};
		if let Some(index) = self.free.pop() {
			self.slots[index as usize] = Some(node);
			return Ok(NodeId(index));
		}
		let index = slot_index(self.slots.len())?;
		self.slots.try_reserve(1)?;
		self.slots.push(Some(node));
		Ok(NodeId(index))
	}

	/// Frees the slot of `id` and returns its payload.
	///
	/// The caller must already have unlinked the node.
	pub(crate) fn release(&mut self, id: NodeId) -> T {
		let node = self.slots[id.index()].take().expect("released a vacant node slot");
		self.free.push(id.0);
		node.data
	}

	#[inline]
	pub(crate) fn get(&self, id: NodeId) -> &Node<T> {
		self.slots[id.index()].as_ref().expect("dangling node id")
	}

	#[inline]
	pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node<T> {
		self.slots[id.index()].as_mut().expect("dangling node id")
	}

	#[inline]
	pub(crate) fn children(&self, id: NodeId) -> (Option<NodeId>, Option<NodeId>) {
		let node = self.get(id);
		(node.left, node.right)
	}

	/// Points the `side` slot of `parent` (or the root, if `parent` is `None`) at `child`.
	pub(crate) fn relink(&mut self, parent: Option<(NodeId, Side)>, child: Option<NodeId>) {
		match parent {
			Some((parent, side)) => self.get_mut(parent).set_child(side, child),
			None => self.root = child,
		}
	}

	/// Number of occupied slots.
	pub(crate) fn occupied(&self) -> usize {
		self.slots.len() - self.free.len()
	}

	/// Number of nodes on the path from the root that follows the heavier
	/// child at every step. For a valid AVL tree this is its height.
	pub(crate) fn depth(&self) -> usize {
		let mut depth = 0;
		let mut cursor = self.root;
		while let Some(id) = cursor {
			depth += 1;
			let node = self.get(id);
			cursor = if node.balance > 0 {
				node.right
			} else {
				node.left
			};
		}
		depth
	}

	/// Empties the arena, yielding the payloads still stored in it.
	pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> {
		self.free = Vec::new();
		self.root = None;
		std::mem::take(&mut self.slots).into_iter().flatten().map(|node| node.data)
	}
}

/// The handle index of the slot appended after `slots` existing ones.
fn slot_index(slots: usize) -> Result<u32> {
	u32::try_from(slots).map_err(|_| Error::ArenaFull {
		slots,
	})
}
