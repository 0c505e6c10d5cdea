//! AVL rotations and balance propagation.
//!
//! Each rotation rewrites the links of the two or three nodes involved and
//! recomputes only their balance factors. The caller is responsible for
//! re-pointing the parent slot at the returned subtree root.
//!
//! ```text
//!  rotate_left(x):                  rotate_right_left(x):
//!
//!     x                z                x                   y
//!    / \              / \              / \                /   \
//!   a   z     =>     x   c            a   z      =>      x     z
//!      / \          / \                  / \            / \   / \
//!     b   c        a   b                y   d          a  b1 b2  d
//!                                      / \
//!                                     b1  b2
//! ```
//!
//! Propagation follows the usual AVL height argument. After a child subtree
//! grew, the parent's height grows too unless its balance became `0`, and a
//! rotation always restores the pre-insertion height. After a child subtree
//! shrank, the parent's height shrinks unless its balance became `±1`, and a
//! rotation shrinks it unless the heavy child was level.

use crate::node::{NodeId, Nodes, Side};

/// Rotates `x` down to the left; its right child becomes the subtree root.
pub(crate) fn rotate_left<T>(nodes: &mut Nodes<T>, x: NodeId) -> NodeId {
	let z = nodes.get(x).right.expect("rotate_left on a node without right child");
	let inner = nodes.get(z).left;
	nodes.get_mut(x).right = inner;
	nodes.get_mut(z).left = Some(x);

	if nodes.get(z).balance == 0 {
		nodes.get_mut(x).balance = 1;
		nodes.get_mut(z).balance = -1;
	} else {
		nodes.get_mut(x).balance = 0;
		nodes.get_mut(z).balance = 0;
	}
	z
}

/// Rotates `x` down to the right; its left child becomes the subtree root.
pub(crate) fn rotate_right<T>(nodes: &mut Nodes<T>, x: NodeId) -> NodeId {
	let z = nodes.get(x).left.expect("rotate_right on a node without left child");
	let inner = nodes.get(z).right;
	nodes.get_mut(x).left = inner;
	nodes.get_mut(z).right = Some(x);

	if nodes.get(z).balance == 0 {
		nodes.get_mut(x).balance = -1;
		nodes.get_mut(z).balance = 1;
	} else {
		nodes.get_mut(x).balance = 0;
		nodes.get_mut(z).balance = 0;
	}
	z
}

/// Double rotation for a right-heavy `x` whose right child leans left.
pub(crate) fn rotate_right_left<T>(nodes: &mut Nodes<T>, x: NodeId) -> NodeId {
	let z = nodes.get(x).right.expect("rotate_right_left on a node without right child");
	let y = nodes.get(z).left.expect("rotate_right_left on a right child without left child");
	let (y_left, y_right) = nodes.children(y);

	nodes.get_mut(x).right = y_left;
	nodes.get_mut(z).left = y_right;
	nodes.get_mut(y).left = Some(x);
	nodes.get_mut(y).right = Some(z);

	let (x_balance, z_balance) = match nodes.get(y).balance {
		b if b > 0 => (-1, 0),
		b if b < 0 => (0, 1),
		_ => (0, 0),
	};
	nodes.get_mut(x).balance = x_balance;
	nodes.get_mut(z).balance = z_balance;
	nodes.get_mut(y).balance = 0;
	y
}

/// Double rotation for a left-heavy `x` whose left child leans right.
pub(crate) fn rotate_left_right<T>(nodes: &mut Nodes<T>, x: NodeId) -> NodeId {
	let z = nodes.get(x).left.expect("rotate_left_right on a node without left child");
	let y = nodes.get(z).right.expect("rotate_left_right on a left child without right child");
	let (y_left, y_right) = nodes.children(y);

	nodes.get_mut(z).right = y_left;
	nodes.get_mut(x).left = y_right;
	nodes.get_mut(y).left = Some(z);
	nodes.get_mut(y).right = Some(x);

	let (x_balance, z_balance) = match nodes.get(y).balance {
		b if b < 0 => (1, 0),
		b if b > 0 => (0, -1),
		_ => (0, 0),
	};
	nodes.get_mut(x).balance = x_balance;
	nodes.get_mut(z).balance = z_balance;
	nodes.get_mut(y).balance = 0;
	y
}

/// Outcome of repairing one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rebalanced {
	/// Root of the subtree after any rotation.
	pub(crate) root: NodeId,
	/// The subtree height changed, so the parent must be adjusted too.
	pub(crate) propagate: bool,
}

/// Restores `|balance| <= 1` at `x` if it is out of range.
///
/// `propagate` reports whether the rotation lowered the subtree by one level.
fn rebalance<T>(nodes: &mut Nodes<T>, x: NodeId) -> Rebalanced {
	match nodes.get(x).balance {
		2 => {
			let z = nodes.get(x).right.expect("right-heavy node without right child");
			match nodes.get(z).balance {
				b if b < 0 => Rebalanced {
					root: rotate_right_left(nodes, x),
					propagate: true,
				},
				b => Rebalanced {
					root: rotate_left(nodes, x),
					propagate: b != 0,
				},
			}
		}
		-2 => {
			let z = nodes.get(x).left.expect("left-heavy node without left child");
			match nodes.get(z).balance {
				b if b > 0 => Rebalanced {
					root: rotate_left_right(nodes, x),
					propagate: true,
				},
				b => Rebalanced {
					root: rotate_right(nodes, x),
					propagate: b != 0,
				},
			}
		}
		_ => Rebalanced {
			root: x,
			propagate: false,
		},
	}
}

/// Accounts for the `side` subtree of `x` having grown by one level.
pub(crate) fn after_growth<T>(nodes: &mut Nodes<T>, x: NodeId, side: Side) -> Rebalanced {
	let balance = nodes.get(x).balance + side.weight();
	nodes.get_mut(x).balance = balance;
	match balance {
		0 => Rebalanced {
			root: x,
			propagate: false,
		},
		-1 | 1 => Rebalanced {
			root: x,
			propagate: true,
		},
		_ => Rebalanced {
			root: rebalance(nodes, x).root,
			propagate: false,
		},
	}
}

/// Accounts for the `side` subtree of `x` having shrunk by one level.
pub(crate) fn after_shrink<T>(nodes: &mut Nodes<T>, x: NodeId, side: Side) -> Rebalanced {
	let balance = nodes.get(x).balance - side.weight();
	nodes.get_mut(x).balance = balance;
	match balance {
		0 => Rebalanced {
			root: x,
			propagate: true,
		},
		-1 | 1 => Rebalanced {
			root: x,
			propagate: false,
		},
		_ => rebalance(nodes, x),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Builds nodes holding `values` and returns their ids in the same order.
	fn arena(values: &[i32]) -> (Nodes<i32>, Vec<NodeId>) {
		let mut nodes = Nodes::default();
		let ids = values.iter().map(|v| nodes.alloc(*v).unwrap()).collect();
		(nodes, ids)
	}

	fn link(nodes: &mut Nodes<i32>, parent: NodeId, left: Option<NodeId>, right: Option<NodeId>) {
		nodes.get_mut(parent).left = left;
		nodes.get_mut(parent).right = right;
	}

	#[test]
	fn single_left_rotation_levels_both_nodes() {
		// 10 -> 20 -> 30, a right chain
		let (mut nodes, ids) = arena(&[10, 20, 30]);
		link(&mut nodes, ids[0], None, Some(ids[1]));
		link(&mut nodes, ids[1], None, Some(ids[2]));
		nodes.get_mut(ids[0]).balance = 2;
		nodes.get_mut(ids[1]).balance = 1;

		let root = rebalance(&mut nodes, ids[0]);
		assert_eq!(root.root, ids[1]);
		assert!(root.propagate);
		assert_eq!(nodes.children(ids[1]), (Some(ids[0]), Some(ids[2])));
		assert_eq!(nodes.get(ids[0]).balance, 0);
		assert_eq!(nodes.get(ids[1]).balance, 0);
	}

	#[test]
	fn single_rotation_around_level_child_keeps_height() {
		//     x(-2)
		//    /    \
		//   z(0)   d
		//  / \
		// a   b
		let (mut nodes, ids) = arena(&[40, 20, 50, 10, 30]);
		let (x, z, d, a, b) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
		link(&mut nodes, x, Some(z), Some(d));
		link(&mut nodes, z, Some(a), Some(b));
		// `d` lost a child, leaving x two levels heavier on the left
		nodes.get_mut(x).balance = -2;

		let result = rebalance(&mut nodes, x);
		assert_eq!(result.root, z);
		assert!(!result.propagate, "rotation around a level child must not shrink the subtree");
		assert_eq!(nodes.get(z).balance, 1);
		assert_eq!(nodes.get(x).balance, -1);
		assert_eq!(nodes.children(z), (Some(a), Some(x)));
		assert_eq!(nodes.children(x), (Some(b), Some(d)));
	}

	#[test]
	fn right_left_rotation() {
		// 10 -> 30 -> 20 (right child leans left)
		let (mut nodes, ids) = arena(&[10, 30, 20]);
		link(&mut nodes, ids[0], None, Some(ids[1]));
		link(&mut nodes, ids[1], Some(ids[2]), None);
		nodes.get_mut(ids[0]).balance = 2;
		nodes.get_mut(ids[1]).balance = -1;

		let result = rebalance(&mut nodes, ids[0]);
		assert_eq!(result.root, ids[2]);
		assert_eq!(nodes.children(ids[2]), (Some(ids[0]), Some(ids[1])));
		for id in &ids {
			assert_eq!(nodes.get(*id).balance, 0);
		}
	}

	#[test]
	fn left_right_rotation_with_heavy_grandchild() {
		//        x(-2)
		//       /    \
		//     z(+1)    d
		//    /   \
		//   a    y(-1)
		//        /
		//       b1
		let (mut nodes, ids) = arena(&[50, 20, 60, 10, 40, 30]);
		let (x, z, d, a, y, b1) = (ids[0], ids[1], ids[2], ids[3], ids[4], ids[5]);
		link(&mut nodes, x, Some(z), Some(d));
		link(&mut nodes, z, Some(a), Some(y));
		link(&mut nodes, y, Some(b1), None);
		nodes.get_mut(x).balance = -2;
		nodes.get_mut(z).balance = 1;
		nodes.get_mut(y).balance = -1;

		let result = rebalance(&mut nodes, x);
		assert_eq!(result.root, y);
		assert_eq!(nodes.children(y), (Some(z), Some(x)));
		assert_eq!(nodes.children(z), (Some(a), Some(b1)));
		assert_eq!(nodes.children(x), (None, Some(d)));
		assert_eq!(nodes.get(z).balance, 0);
		assert_eq!(nodes.get(x).balance, 1);
		assert_eq!(nodes.get(y).balance, 0);
	}

	#[test]
	fn growth_propagates_until_balanced() {
		let (mut nodes, ids) = arena(&[1]);
		let grown = after_growth(&mut nodes, ids[0], Side::Left);
		assert!(grown.propagate);
		assert_eq!(nodes.get(ids[0]).balance, -1);

		let levelled = after_growth(&mut nodes, ids[0], Side::Right);
		assert!(!levelled.propagate);
		assert_eq!(nodes.get(ids[0]).balance, 0);
	}

	#[test]
	fn shrink_propagates_when_level() {
		let (mut nodes, ids) = arena(&[1]);
		nodes.get_mut(ids[0]).balance = 1;
		let shrunk = after_shrink(&mut nodes, ids[0], Side::Right);
		assert!(shrunk.propagate);
		assert_eq!(nodes.get(ids[0]).balance, 0);

		let leaning = after_shrink(&mut nodes, ids[0], Side::Left);
		assert!(!leaning.propagate);
		assert_eq!(nodes.get(ids[0]).balance, 1);
	}
}
