//! The traversal engine.
//!
//! Every bulk operation of the tree, from insertion to destruction, is a walk
//! driven by a visitor. The engine never recurses: depth-first walks keep
//! their pending work on a [`StackBuffer`] used as a LIFO, breadth-first walks
//! use the same buffer as a FIFO.
//!
//! ## Depth-First State Machine
//!
//! Each node moves through up to three phases. The visitor is only called in
//! the phases requested by the [`Mode`], but the engine still passes through
//! the others to descend.
//!
//! ```text
//!            ┌──────────┐  first child   ┌──────────┐  second child  ┌──────────┐
//!  pop ────► │  Prefix  │ ─────────────► │  Infix   │ ─────────────► │  Suffix  │ ──► done
//!            └──────────┘  (push node    └──────────┘  (push node    └──────────┘
//!                 │         back first)       │         back first)
//!                 └─ SKIP: drop node          └─ SKIP: drop node
//! ```
//!
//! The visitor answers with a [`Visit`]. A [`Route`] restricts which children
//! are descended into, `SKIP` drops the node from the rest of the walk, and
//! `NEXT_PHASE` marks the current phase as satisfied for the remainder of the
//! walk. Insert and delete use the latter to stop searching and turn the rest
//! of the walk into the rebalancing pass back up the stack.
//!
//! The first child is the left one unless [`Mode::REVERSE`] is requested.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::node::{NodeId, Nodes, Side};
use crate::stack::StackBuffer;

bitflags! {
	/// Requested phases and modifiers of a walk.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct Mode: u16 {
		/// Visit a node before its children (pre-order).
		const PREFIX = 1 << 0;
		/// Visit a node between its children (in-order).
		const INFIX = 1 << 1;
		/// Visit a node after its children (post-order).
		const SUFFIX = 1 << 2;
		/// Visit level by level (level-order).
		const BREADTH = 1 << 3;
		/// Take the right child before the left one.
		const REVERSE = 1 << 4;
		/// Split the walk across worker jobs when the tree is large enough.
		const PARALLEL = 1 << 5;
		/// Revisit each job root to merge the job's data.
		const MERGE = 1 << 6;
		/// Start each job from a clone of the caller's data instead of `Default`.
		const DUP_DATA = 1 << 7;

		/// All visiting phases.
		const PHASES = Self::PREFIX.bits() | Self::INFIX.bits() | Self::SUFFIX.bits() | Self::BREADTH.bits();
		/// The depth-first phases.
		const DEPTH_FIRST = Self::PREFIX.bits() | Self::INFIX.bits() | Self::SUFFIX.bits();
	}
}

impl Mode {
	/// Number of visiting phases requested; a node is visited once per phase.
	pub fn phase_count(self) -> usize {
		(self & Mode::PHASES).bits().count_ones() as usize
	}

	#[inline]
	fn sides(self) -> [Side; 2] {
		if self.contains(Mode::REVERSE) {
			[Side::Right, Side::Left]
		} else {
			[Side::Left, Side::Right]
		}
	}
}

/// The phase a node is being visited in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	Prefix,
	Infix,
	Suffix,
	Breadth,
	/// A job root revisited after its parallel job completed.
	Merge,
}

impl Phase {
	/// The mode bit requesting this phase.
	pub fn flag(self) -> Mode {
		match self {
			Phase::Prefix => Mode::PREFIX,
			Phase::Infix => Mode::INFIX,
			Phase::Suffix => Mode::SUFFIX,
			Phase::Breadth => Mode::BREADTH,
			Phase::Merge => Mode::MERGE,
		}
	}
}

bitflags! {
	/// Where a walk continues after a visit.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct Route: u8 {
		/// Descend into the left child.
		const LEFT = 1 << 0;
		/// Descend into the right child.
		const RIGHT = 1 << 1;
		/// Do not descend any further from this node and do not revisit it.
		const SKIP = 1 << 2;
		/// The current phase is satisfied for the rest of the walk.
		const NEXT_PHASE = 1 << 3;

		const BOTH = Self::LEFT.bits() | Self::RIGHT.bits();
	}
}

impl Route {
	#[inline]
	pub fn allows(self, side: Side) -> bool {
		self.contains(Route::from(side))
	}
}

impl From<Side> for Route {
	fn from(side: Side) -> Self {
		match side {
			Side::Left => Route::LEFT,
			Side::Right => Route::RIGHT,
		}
	}
}

/// A visitor's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
	/// Keep walking along `route`.
	Go(Route),
	/// Abort the walk; it reports an error.
	Error,
	/// Stop the walk; it reports success.
	Finished,
}

impl Visit {
	/// Descend into both children.
	pub const CONTINUE: Visit = Visit::Go(Route::BOTH);
	pub const LEFT: Visit = Visit::Go(Route::LEFT);
	pub const RIGHT: Visit = Visit::Go(Route::RIGHT);
	pub const SKIP: Visit = Visit::Go(Route::SKIP);
	pub const NEXT_PHASE: Visit = Visit::Go(Route::NEXT_PHASE);
}

/// How a walk that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
	/// Every reachable node was walked.
	Exhausted,
	/// A visitor returned [`Visit::Finished`].
	Finished,
}

/// What a visitor knows about the node it is called for.
#[derive(Debug, Clone, Copy)]
pub struct VisitState {
	pub(crate) node: NodeId,
	pub(crate) phase: Phase,
	pub(crate) mode: Mode,
	pub(crate) depth: usize,
	pub(crate) index: u64,
	pub(crate) from: Option<Side>,
}

impl VisitState {
	#[inline]
	pub fn phase(&self) -> Phase {
		self.phase
	}

	/// The mode the walk was started with.
	#[inline]
	pub fn mode(&self) -> Mode {
		self.mode
	}

	/// Distance from the root; the root is at depth 0.
	#[inline]
	pub fn depth(&self) -> usize {
		self.depth
	}

	/// Position within the node's level, numbering a complete tree from the left.
	#[inline]
	pub fn index(&self) -> u64 {
		self.index
	}

	/// The child subtree the engine last returned from, if any.
	#[inline]
	pub fn from(&self) -> Option<Side> {
		self.from
	}
}

/// A unit of pending work on the traversal stack.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
	node: NodeId,
	phase: Phase,
	/// Children the visitor still allows.
	route: Route,
	depth: u32,
	index: u64,
	from: Option<Side>,
}

impl Frame {
	fn child(&self, node: NodeId, side: Side, phase: Phase) -> Frame {
		Frame {
			node,
			phase,
			route: Route::BOTH,
			depth: self.depth + 1,
			index: self.index * 2 + u64::from(side == Side::Right),
			from: None,
		}
	}

	fn state(&self, mode: Mode) -> VisitState {
		VisitState {
			node: self.node,
			phase: self.phase,
			mode,
			depth: self.depth as usize,
			index: self.index,
			from: self.from,
		}
	}
}

#[cfg(test)]
impl Frame {
	pub(crate) fn detached(node: NodeId) -> Frame {
		Start::root(node).frame(Phase::Prefix)
	}
}

/// The node a walk starts from, with its position in the whole tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Start {
	pub(crate) node: NodeId,
	pub(crate) depth: u32,
	pub(crate) index: u64,
}

impl Start {
	pub(crate) fn root(node: NodeId) -> Start {
		Start {
			node,
			depth: 0,
			index: 0,
		}
	}

	fn frame(&self, phase: Phase) -> Frame {
		Frame {
			node: self.node,
			phase,
			route: Route::BOTH,
			depth: self.depth,
			index: self.index,
			from: None,
		}
	}
}

/// The per-visit view handed to internal visitors.
///
/// Besides the [`VisitState`], it exposes the traversal stack, whose top frame
/// is the parent of the visited node during depth-first walks.
pub(crate) struct VisitContext<'a> {
	pub(crate) state: VisitState,
	stack: &'a mut StackBuffer<Frame>,
}

impl VisitContext<'_> {
	/// The visited node's parent and the slot the node hangs from, or `None` for the root.
	pub(crate) fn parent(&self) -> Result<Option<(NodeId, Side)>> {
		match self.stack.top() {
			None => Ok(None),
			Some(Frame {
				node,
				from: Some(side),
				..
			}) => Ok(Some((*node, *side))),
			Some(_) => Err(Error::corrupted("ancestor frame does not record the descended side")),
		}
	}

	/// Schedules `node` for a suffix visit as if the walk had descended from it into `side`.
	pub(crate) fn push_ancestor(&mut self, node: NodeId, side: Side, depth: usize) -> Result<()> {
		self.stack.push(Frame {
			node,
			phase: Phase::Suffix,
			route: Route::empty(),
			depth: depth as u32,
			index: 0,
			from: Some(side),
		})
	}
}

/// A visitor together with the topology it walks.
///
/// Children are read *after* each visit, so a visitor may rewrite the links of
/// the node it is visiting.
pub(crate) trait Step {
	fn children(&self, node: NodeId) -> (Option<NodeId>, Option<NodeId>);

	fn visit(&mut self, cx: &mut VisitContext<'_>) -> Visit;
}

fn pick(children: (Option<NodeId>, Option<NodeId>), side: Side) -> Option<NodeId> {
	match side {
		Side::Left => children.0,
		Side::Right => children.1,
	}
}

/// Walks the tree below `start` in the phases requested by `mode`.
///
/// A breadth-first pass runs first if `BREADTH` is requested, followed by a
/// depth-first pass for any requested depth-first phases. `stack` is reset
/// before use and left empty on success.
pub(crate) fn walk<S: Step>(
	step: &mut S,
	start: Option<Start>,
	mode: Mode,
	stack: &mut StackBuffer<Frame>,
) -> Result<Completion> {
	let Some(start) = start else {
		return Ok(Completion::Exhausted);
	};
	stack.reset(false);

	if mode.contains(Mode::BREADTH) {
		if let Completion::Finished = walk_breadth(step, start, mode, stack)? {
			return Ok(Completion::Finished);
		}
		stack.reset(false);
	}
	if mode.intersects(Mode::DEPTH_FIRST) {
		return walk_depth(step, start, mode, stack);
	}
	Ok(Completion::Exhausted)
}

fn walk_breadth<S: Step>(
	step: &mut S,
	start: Start,
	mode: Mode,
	queue: &mut StackBuffer<Frame>,
) -> Result<Completion> {
	queue.push(start.frame(Phase::Breadth))?;

	while let Some(frame) = queue.shift() {
		let mut cx = VisitContext {
			state: frame.state(mode),
			stack: &mut *queue,
		};
		let route = match step.visit(&mut cx) {
			Visit::Go(route) => route,
			Visit::Error => return Err(Error::Aborted),
			Visit::Finished => return Ok(Completion::Finished),
		};
		if route.contains(Route::NEXT_PHASE) {
			// Nothing left to do at this level order; hand over to the depth pass.
			return Ok(Completion::Exhausted);
		}
		if route.contains(Route::SKIP) {
			continue;
		}
		let children = step.children(frame.node);
		for side in mode.sides() {
			if let Some(child) = pick(children, side).filter(|_| route.allows(side)) {
				queue.push(frame.child(child, side, Phase::Breadth))?;
			}
		}
	}
	Ok(Completion::Exhausted)
}

/// Pushes `frame` back and descends into its `side` child, if allowed and present.
fn descend<S: Step>(
	step: &S,
	stack: &mut StackBuffer<Frame>,
	frame: &mut Frame,
	side: Side,
) -> Result<bool> {
	if !frame.route.allows(side) {
		return Ok(false);
	}
	let Some(child) = pick(step.children(frame.node), side) else {
		return Ok(false);
	};
	frame.from = Some(side);
	stack.push(*frame)?;
	stack.push(frame.child(child, side, Phase::Prefix))?;
	Ok(true)
}

fn walk_depth<S: Step>(
	step: &mut S,
	start: Start,
	mode: Mode,
	stack: &mut StackBuffer<Frame>,
) -> Result<Completion> {
	let [first, second] = mode.sides();
	let mut satisfied = Mode::empty();
	let wanted = |phase: Phase, satisfied: Mode| {
		mode.contains(phase.flag()) && !satisfied.contains(phase.flag())
	};

	stack.push(start.frame(Phase::Prefix))?;

	while let Some(mut frame) = stack.pop() {
		// Carry the frame through as many phases as possible before it
		// has to wait on the stack for a child subtree.
		loop {
			let route = if wanted(frame.phase, satisfied) {
				let mut cx = VisitContext {
					state: frame.state(mode),
					stack: &mut *stack,
				};
				match step.visit(&mut cx) {
					Visit::Go(route) => route,
					Visit::Error => return Err(Error::Aborted),
					Visit::Finished => return Ok(Completion::Finished),
				}
			} else {
				Route::BOTH
			};
			if route.contains(Route::NEXT_PHASE) {
				satisfied |= frame.phase.flag();
			}

			match frame.phase {
				Phase::Prefix => {
					if route.contains(Route::SKIP) {
						break;
					}
					frame.route = route & Route::BOTH;
					frame.phase = Phase::Infix;
					if descend(step, stack, &mut frame, first)? {
						break;
					}
				}
				Phase::Infix => {
					if route.contains(Route::SKIP) {
						break;
					}
					frame.route &= route;
					frame.phase = Phase::Suffix;
					if descend(step, stack, &mut frame, second)? {
						break;
					}
				}
				Phase::Suffix => break,
				Phase::Breadth | Phase::Merge => {
					return Err(Error::corrupted("depth-first stack holds a non depth-first frame"));
				}
			}
		}
	}
	Ok(Completion::Exhausted)
}

/// Drives a public [`Visitor`] over a shared node store.
pub(crate) struct Driven<'t, 'd, T, V: Visitor<T>> {
	nodes: &'t Nodes<T>,
	visitor: &'t V,
	data: &'d mut V::Data,
}

impl<'t, 'd, T, V: Visitor<T>> Driven<'t, 'd, T, V> {
	pub(crate) fn new(nodes: &'t Nodes<T>, visitor: &'t V, data: &'d mut V::Data) -> Self {
		Driven {
			nodes,
			visitor,
			data,
		}
	}
}

impl<T, V: Visitor<T>> Step for Driven<'_, '_, T, V> {
	fn children(&self, node: NodeId) -> (Option<NodeId>, Option<NodeId>) {
		self.nodes.children(node)
	}

	fn visit(&mut self, cx: &mut VisitContext<'_>) -> Visit {
		let item = &self.nodes.get(cx.state.node).data;
		self.visitor.visit(item, &cx.state, self.data)
	}
}

/// Drives a closure over a shared node store.
pub(crate) struct Walking<'t, T, F> {
	nodes: &'t Nodes<T>,
	f: F,
}

impl<'t, T, F> Walking<'t, T, F>
where
	F: FnMut(&'t T, &VisitState) -> Visit,
{
	pub(crate) fn new(nodes: &'t Nodes<T>, f: F) -> Self {
		Walking {
			nodes,
			f,
		}
	}
}

impl<'t, T, F> Step for Walking<'t, T, F>
where
	F: FnMut(&'t T, &VisitState) -> Visit,
{
	fn children(&self, node: NodeId) -> (Option<NodeId>, Option<NodeId>) {
		self.nodes.children(node)
	}

	fn visit(&mut self, cx: &mut VisitContext<'_>) -> Visit {
		let nodes: &'t Nodes<T> = self.nodes;
		(self.f)(&nodes.get(cx.state.node).data, &cx.state)
	}
}

/// A reusable visitor whose walks may be split across worker jobs.
///
/// Every job works on its own [`Data`](Visitor::Data): a clone of the
/// caller's when [`Mode::DUP_DATA`] is requested, a `Default` one otherwise.
/// With [`Mode::MERGE`], each job root is revisited on the calling thread in
/// [`Phase::Merge`] and [`merge`](Visitor::merge) folds the job's data into the
/// caller's.
///
/// # Example
///
/// ```
/// use alder::{AvlTree, Mode, Visit, VisitState, Visitor};
///
/// struct Sum;
///
/// impl Visitor<u64> for Sum {
/// 	type Data = u64;
///
/// 	fn visit(&self, item: &u64, _: &VisitState, total: &mut u64) -> Visit {
/// 		*total += item;
/// 		Visit::CONTINUE
/// 	}
///
/// 	fn merge(&self, _: &u64, _: &VisitState, total: &mut u64, job: u64) -> Visit {
/// 		*total += job;
/// 		Visit::CONTINUE
/// 	}
/// }
///
/// let mut tree = AvlTree::new();
/// for i in 1..=100u64 {
/// 	tree.insert(i).unwrap();
/// }
///
/// let mut total = 0;
/// tree.visit(Mode::INFIX | Mode::PARALLEL | Mode::MERGE, &Sum, &mut total).unwrap();
/// assert_eq!(total, 5050);
/// ```
pub trait Visitor<T> {
	/// Accumulated per-walk (and per-job) state.
	type Data: Clone + Default + Send;

	fn visit(&self, item: &T, state: &VisitState, data: &mut Self::Data) -> Visit;

	/// Folds the data of the job rooted at `item` into `data`.
	///
	/// The default discards the job's data.
	fn merge(&self, item: &T, state: &VisitState, data: &mut Self::Data, job: Self::Data) -> Visit {
		let _ = (item, state, data, job);
		Visit::CONTINUE
	}
}
