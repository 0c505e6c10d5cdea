//! Parallel decomposition of visitor walks.
//!
//! A walk requesting [`Mode::PARALLEL`] is split when the tree is deep enough
//! to give every worker a subtree of its own, i.e. when the full top levels
//! hold at least as many nodes as there are workers:
//!
//! ```text
//!   2^(depth - 1) >= units
//! ```
//!
//! The split is a breadth-first pass from the root. Every node on the first
//! level wide enough for all workers (`2^level >= units`) roots one job; the
//! nodes above it are "parents" and are visited on the calling thread.
//!
//! ```text
//!   units = 4           level 0:        P            parents, visited by
//!                       level 1:    P       P        the calling thread
//!                       level 2:  J   J   J   J      one job per subtree
//! ```
//!
//! Each job walks its subtree with the requested phases on a private stack.
//! Jobs only see their own subtree, so a visitor route or `SKIP` returned by
//! a parent has no effect on the jobs below it, and no ordering holds across
//! jobs. Parents are visited once per requested phase, top-down in
//! breadth-first order. After every job has been joined, and if
//! [`Mode::MERGE`] is requested, each job root is revisited in
//! [`Phase::Merge`] so the visitor can fold the job's data into the caller's.

use smallvec::SmallVec;

use crate::config::TreeFlags;
use crate::error::{Error, JobFailure, Result};
use crate::jobs::{JobHandle, JobPool, JobStatus};
use crate::node::{NodeId, Nodes};
use crate::stack::StackBuffer;
use crate::visit::{self, Completion, Driven, Mode, Phase, Start, Visit, VisitState, Visitor};

/// Order in which a parent's phases are visited on the calling thread.
const PARENT_PHASES: [Phase; 4] = [Phase::Breadth, Phase::Prefix, Phase::Infix, Phase::Suffix];

/// Returns `true` if a walk over a tree of `depth` levels should be split.
pub(crate) fn should_split(flags: TreeFlags, mode: Mode, depth: usize, units: usize) -> bool {
	if !mode.contains(Mode::PARALLEL) || units <= 1 || flags.contains(TreeFlags::PARALLEL_DISABLED)
	{
		return false;
	}
	let Some(levels) = depth.checked_sub(1) else {
		return false;
	};
	// Wider than any worker count once the shift would overflow.
	1u64.checked_shl(levels as u32).map_or(true, |width| width >= units as u64)
}

/// The outcome of the breadth-first split.
struct Split {
	parents: SmallVec<[Start; 16]>,
	jobs: SmallVec<[Start; 16]>,
}

fn split<T>(nodes: &Nodes<T>, root: NodeId, units: usize) -> Result<Split> {
	let mut parents = SmallVec::new();
	let mut jobs = SmallVec::new();
	let mut queue = StackBuffer::try_with_capacity(units * 2)?;
	queue.push(Start::root(root))?;

	while let Some(start) = queue.shift() {
		if 1u64.checked_shl(start.depth).map_or(true, |width| width >= units as u64) {
			jobs.push(start);
			continue;
		}
		parents.push(start);
		let (left, right) = nodes.children(start.node);
		if let Some(left) = left {
			queue.push(Start {
				node: left,
				depth: start.depth + 1,
				index: start.index * 2,
			})?;
		}
		if let Some(right) = right {
			queue.push(Start {
				node: right,
				depth: start.depth + 1,
				index: start.index * 2 + 1,
			})?;
		}
	}
	Ok(Split {
		parents,
		jobs,
	})
}

fn state(start: &Start, phase: Phase, mode: Mode) -> VisitState {
	VisitState {
		node: start.node,
		phase,
		mode,
		depth: start.depth as usize,
		index: start.index,
		from: None,
	}
}

/// Visits the parents of the split, once per requested phase each.
fn visit_parents<T, V: Visitor<T>>(
	nodes: &Nodes<T>,
	parents: &[Start],
	mode: Mode,
	visitor: &V,
	data: &mut V::Data,
) -> Result<Completion> {
	for parent in parents {
		let item = &nodes.get(parent.node).data;
		for phase in PARENT_PHASES.into_iter().filter(|phase| mode.contains(phase.flag())) {
			match visitor.visit(item, &state(parent, phase, mode), data) {
				Visit::Go(_) => {}
				Visit::Error => return Err(Error::Aborted),
				Visit::Finished => return Ok(Completion::Finished),
			}
		}
	}
	Ok(Completion::Exhausted)
}

/// Runs `visitor` over the tree rooted at `root`, split across `pool`.
pub(crate) fn visit<T, V>(
	nodes: &Nodes<T>,
	root: NodeId,
	mode: Mode,
	visitor: &V,
	data: &mut V::Data,
	pool: &JobPool,
) -> Result<Completion>
where
	T: Sync,
	V: Visitor<T> + Sync,
{
	let units = pool.available_units();
	let split = split(nodes, root, units)?;
	tracing::debug!(
		units,
		jobs = split.jobs.len(),
		parents = split.parents.len(),
		"splitting parallel walk"
	);

	let job_mode = mode - (Mode::PARALLEL | Mode::MERGE | Mode::DUP_DATA);
	let (handles, parents) = pool.batch(|batch| {
		let handles: SmallVec<[JobHandle<_>; 16]> = split
			.jobs
			.iter()
			.map(|&start| {
				let mut job_data = if mode.contains(Mode::DUP_DATA) {
					data.clone()
				} else {
					V::Data::default()
				};
				batch.run(move || {
					let mut stack = StackBuffer::new();
					let mut step = Driven::new(nodes, visitor, &mut job_data);
					let walked = visit::walk(&mut step, Some(start), job_mode, &mut stack);
					(walked.map(|_| ()), job_data)
				})
			})
			.collect();
		// The calling thread takes the parents while the jobs run.
		let parents = visit_parents(nodes, &split.parents, mode, visitor, data);
		(handles, parents)
	});

	let mut failure = None;
	let mut finished = false;
	match parents {
		Ok(Completion::Finished) => finished = true,
		Ok(Completion::Exhausted) => {}
		Err(error) => failure = Some(error),
	}

	for (index, (handle, start)) in handles.into_iter().zip(&split.jobs).enumerate() {
		let job_data = match handle.wait_and_free() {
			JobStatus::Done((Ok(()), job_data)) => job_data,
			JobStatus::Done((Err(error), _)) => {
				tracing::warn!(index, %error, "parallel job aborted");
				failure.get_or_insert(Error::Job {
					index,
					failure: JobFailure::Aborted,
				});
				continue;
			}
			JobStatus::NoResult => {
				tracing::warn!(index, "parallel job produced no result");
				failure.get_or_insert(Error::Job {
					index,
					failure: JobFailure::NoResult,
				});
				continue;
			}
			JobStatus::Panicked => {
				tracing::warn!(index, "parallel job panicked");
				failure.get_or_insert(Error::Job {
					index,
					failure: JobFailure::Panicked,
				});
				continue;
			}
		};
		if failure.is_some() || finished || !mode.contains(Mode::MERGE) {
			continue;
		}
		let item = &nodes.get(start.node).data;
		match visitor.merge(item, &state(start, Phase::Merge, mode), data, job_data) {
			Visit::Go(_) => {}
			Visit::Error => failure = Some(Error::Aborted),
			Visit::Finished => finished = true,
		}
	}

	match failure {
		Some(error) => Err(error),
		None if finished => Ok(Completion::Finished),
		None => Ok(Completion::Exhausted),
	}
}
