//! A growable ring buffer used as the traversal work-list.
//!
//! The same buffer serves as a LIFO stack for the depth-first phases and as a
//! FIFO queue for breadth-first walks: elements are pushed on top, and can be
//! taken back either from the top ([`StackBuffer::pop`]) or from the bottom
//! ([`StackBuffer::shift`]).
//!
//! ```text
//!            head                 head + len
//!             │                       │
//!   slots: [  B  x  x  x  T  .  .  .  ]      B = bottom, T = top
//!             ▲ shift()      ▲ pop() / push()
//! ```
//!
//! A full buffer doubles its capacity, unless it was created in fixed mode,
//! in which case it overwrites its oldest element.

use std::fmt;

use crate::error::Result;

/// Capacity used by [`StackBuffer::new`].
pub const DEFAULT_CAPACITY: usize = 32;

/// A circular buffer with stack and queue access.
#[derive(Clone)]
pub struct StackBuffer<T> {
	slots: Vec<Option<T>>,
	/// Physical index of the bottom element.
	head: usize,
	len: usize,
	/// Capacity restored by `reset(true)`.
	initial: usize,
	/// Overwrite the bottom element instead of growing.
	fixed: bool,
}

impl<T> Default for StackBuffer<T> {
	fn default() -> Self {
		Self::with_capacity(0)
	}
}

impl<T> StackBuffer<T> {
	/// Creates an empty growable buffer with [`DEFAULT_CAPACITY`].
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CAPACITY)
	}

	/// Creates an empty growable buffer holding `capacity` elements before it grows.
	pub fn with_capacity(capacity: usize) -> Self {
		StackBuffer {
			slots: empty_slots(capacity),
			head: 0,
			len: 0,
			initial: capacity,
			fixed: false,
		}
	}

	/// Like [`with_capacity`](Self::with_capacity), reporting allocation failure.
	pub fn try_with_capacity(capacity: usize) -> Result<Self> {
		let mut slots = Vec::new();
		slots.try_reserve_exact(capacity)?;
		slots.resize_with(capacity, || None);
		Ok(StackBuffer {
			slots,
			head: 0,
			len: 0,
			initial: capacity,
			fixed: false,
		})
	}

	/// Creates a fixed-capacity buffer that overwrites its oldest element when full.
	///
	/// A zero capacity is rounded up to one.
	pub fn fixed(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		StackBuffer {
			fixed: true,
			..Self::with_capacity(capacity)
		}
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.len
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	#[inline]
	pub fn capacity(&self) -> usize {
		self.slots.len()
	}

	/// Returns `true` if the buffer overwrites instead of growing.
	#[inline]
	pub fn is_fixed(&self) -> bool {
		self.fixed
	}

	#[inline]
	fn physical(&self, index: usize) -> usize {
		(self.head + index) % self.slots.len()
	}

	/// Pushes `value` on top of the buffer.
	///
	/// A full growable buffer doubles its capacity first; a full fixed buffer
	/// drops its bottom element.
	pub fn push(&mut self, value: T) -> Result<()> {
		if self.len == self.slots.len() {
			if self.fixed {
				let head = self.head;
				self.slots[head] = Some(value);
				self.head = (head + 1) % self.slots.len();
				return Ok(());
			}
			self.grow()?;
		}
		let at = self.physical(self.len);
		self.slots[at] = Some(value);
		self.len += 1;
		Ok(())
	}

	fn grow(&mut self) -> Result<()> {
		let capacity = (self.slots.len() * 2).max(1);
		let mut slots = Vec::new();
		slots.try_reserve_exact(capacity)?;
		for index in 0..self.len {
			let at = self.physical(index);
			slots.push(self.slots[at].take());
		}
		slots.resize_with(capacity, || None);
		self.slots = slots;
		self.head = 0;
		Ok(())
	}

	/// Removes and returns the top element (stack order).
	pub fn pop(&mut self) -> Option<T> {
		if self.len == 0 {
			return None;
		}
		self.len -= 1;
		let at = self.physical(self.len);
		self.slots[at].take()
	}

	/// Removes and returns the bottom element (queue order).
	pub fn shift(&mut self) -> Option<T> {
		if self.len == 0 {
			return None;
		}
		let value = self.slots[self.head].take();
		self.head = (self.head + 1) % self.slots.len();
		self.len -= 1;
		value
	}

	/// Returns the top element without removing it.
	pub fn top(&self) -> Option<&T> {
		self.len.checked_sub(1).and_then(|index| self.get(index))
	}

	pub fn top_mut(&mut self) -> Option<&mut T> {
		let index = self.len.checked_sub(1)?;
		let at = self.physical(index);
		self.slots[at].as_mut()
	}

	/// Returns the bottom element without removing it.
	pub fn bottom(&self) -> Option<&T> {
		self.get(0)
	}

	/// Returns the element at `index`, counted from the bottom.
	pub fn get(&self, index: usize) -> Option<&T> {
		if index >= self.len {
			return None;
		}
		self.slots[self.physical(index)].as_ref()
	}

	/// Replaces the element at `index` (counted from the bottom).
	///
	/// Returns the previous element, or hands `value` back if `index` is out
	/// of range.
	pub fn set(&mut self, index: usize, value: T) -> std::result::Result<T, T> {
		if index >= self.len {
			return Err(value);
		}
		let at = self.physical(index);
		match self.slots[at].replace(value) {
			Some(previous) => Ok(previous),
			None => unreachable!("occupied ring slot {} held no value", at),
		}
	}

	/// Drops every element. With `shrink`, capacity returns to its initial value.
	pub fn reset(&mut self, shrink: bool) {
		for slot in self.slots.iter_mut() {
			*slot = None;
		}
		self.head = 0;
		self.len = 0;
		if shrink && self.slots.len() > self.initial {
			self.slots.truncate(self.initial);
			self.slots.shrink_to_fit();
		}
	}

	/// Moves every element of `other` on top of `self`, bottom first.
	pub fn append(&mut self, other: &mut StackBuffer<T>) -> Result<()> {
		while let Some(value) = other.shift() {
			self.push(value)?;
		}
		Ok(())
	}

	/// Iterates from bottom to top.
	pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
		(0..self.len).filter_map(move |index| self.get(index))
	}

	/// Consumes the buffer, returning its elements from bottom to top.
	pub fn into_vec(mut self) -> Vec<T> {
		let mut out = Vec::with_capacity(self.len);
		while let Some(value) = self.shift() {
			out.push(value);
		}
		out
	}
}

fn empty_slots<T>(capacity: usize) -> Vec<Option<T>> {
	let mut slots = Vec::with_capacity(capacity);
	slots.resize_with(capacity, || None);
	slots
}

impl<T: fmt::Debug> fmt::Debug for StackBuffer<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn push_pop_is_lifo() {
		let mut stack = StackBuffer::with_capacity(4);
		for i in 0..4 {
			stack.push(i).unwrap();
		}
		assert_eq!(stack.top(), Some(&3));
		assert_eq!(stack.bottom(), Some(&0));
		assert_eq!(stack.pop(), Some(3));
		assert_eq!(stack.pop(), Some(2));
		assert_eq!(stack.len(), 2);
	}

	#[test]
	fn push_shift_is_fifo() {
		let mut queue = StackBuffer::with_capacity(2);
		for i in 0..5 {
			queue.push(i).unwrap();
		}
		let drained: Vec<_> = std::iter::from_fn(|| queue.shift()).collect();
		assert_eq!(drained, vec![0, 1, 2, 3, 4]);
		assert!(queue.is_empty());
	}

	#[test]
	fn grows_by_doubling_across_wraparound() {
		let mut buffer = StackBuffer::with_capacity(4);
		buffer.push(1).unwrap();
		buffer.push(2).unwrap();
		buffer.push(3).unwrap();
		assert_eq!(buffer.shift(), Some(1));
		assert_eq!(buffer.shift(), Some(2));
		// head is now in the middle of the slots; fill past the end
		for i in 4..=8 {
			buffer.push(i).unwrap();
		}
		assert_eq!(buffer.capacity(), 8);
		assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5, 6, 7, 8]);
	}

	#[test]
	fn zero_capacity_grows_on_first_push() {
		let mut buffer = StackBuffer::default();
		assert_eq!(buffer.capacity(), 0);
		buffer.push("a").unwrap();
		assert_eq!(buffer.capacity(), 1);
		assert_eq!(buffer.pop(), Some("a"));
		assert_eq!(buffer.pop(), None);
	}

	#[test]
	fn fixed_buffer_overwrites_oldest() {
		let mut ring = StackBuffer::fixed(3);
		for i in 0..5 {
			ring.push(i).unwrap();
		}
		assert_eq!(ring.capacity(), 3);
		assert_eq!(ring.into_vec(), vec![2, 3, 4]);
	}

	#[test]
	fn indexed_get_and_set() {
		let mut buffer = StackBuffer::with_capacity(2);
		buffer.push('a').unwrap();
		buffer.push('b').unwrap();
		buffer.push('c').unwrap();
		assert_eq!(buffer.get(1), Some(&'b'));
		assert_eq!(buffer.set(1, 'x'), Ok('b'));
		assert_eq!(buffer.set(7, 'y'), Err('y'));
		assert_eq!(buffer.get(1), Some(&'x'));
		assert_eq!(buffer.get(3), None);
		*buffer.top_mut().unwrap() = 'z';
		assert_eq!(buffer.pop(), Some('z'));
	}

	#[test]
	fn reset_optionally_shrinks() {
		let mut buffer = StackBuffer::with_capacity(2);
		for i in 0..10 {
			buffer.push(i).unwrap();
		}
		assert_eq!(buffer.capacity(), 16);

		buffer.reset(false);
		assert!(buffer.is_empty());
		assert_eq!(buffer.capacity(), 16);

		buffer.push(1).unwrap();
		buffer.reset(true);
		assert!(buffer.is_empty());
		assert_eq!(buffer.capacity(), 2);
	}

	#[test]
	fn append_moves_in_order() {
		let mut left = StackBuffer::with_capacity(1);
		let mut right = StackBuffer::with_capacity(1);
		left.push(1).unwrap();
		right.push(2).unwrap();
		right.push(3).unwrap();
		left.append(&mut right).unwrap();
		assert!(right.is_empty());
		assert_eq!(left.into_vec(), vec![1, 2, 3]);
	}
}
