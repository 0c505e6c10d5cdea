//! Worker jobs for parallel walks.
//!
//! A [`JobPool`] wraps a rayon thread pool. Jobs are spawned inside a
//! [`JobPool::batch`], which may borrow from the caller's stack frame and does
//! not return before every job spawned in it has run. Each job reports through
//! its own [`JobHandle`]:
//!
//! ```text
//!   batch(|jobs| { ... })
//!      │
//!      ├─ jobs.run(f) ──► JobHandle ──┐
//!      ├─ jobs.run(g) ──► JobHandle ──┤     worker: catch_unwind(f) ──► slot
//!      │   (work on the calling thread)
//!      ▼                              │
//!   all jobs joined                   ▼
//!                              wait_and_free() ──► Done(r) | NoResult | Panicked
//! ```
//!
//! A panicking job is reported as [`JobStatus::Panicked`] rather than
//! unwinding into the caller, so one failing job never prevents the others
//! from being joined.
//!
//! Jobs run on rayon threads, outside of what loom can model, so this module
//! uses `parking_lot` directly rather than `crate::sync`.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use parking_lot::{Condvar, Mutex};

use crate::error::Result;

/// How a job ended.
#[derive(Debug, PartialEq, Eq)]
pub enum JobStatus<R> {
	/// The job ran to completion.
	Done(R),
	/// The job was dropped without running.
	NoResult,
	/// The job panicked.
	Panicked,
}

impl<R> JobStatus<R> {
	/// The job's value, if it completed.
	pub fn done(self) -> Option<R> {
		match self {
			JobStatus::Done(value) => Some(value),
			JobStatus::NoResult | JobStatus::Panicked => None,
		}
	}
}

/// A fixed-size pool of worker threads.
pub struct JobPool {
	pool: rayon::ThreadPool,
	units: usize,
}

static DEFAULT_POOL: OnceLock<Option<JobPool>> = OnceLock::new();

impl JobPool {
	/// Creates a pool of `units` worker threads (at least one).
	pub fn new(units: usize) -> Result<Self> {
		let units = units.max(1);
		let pool = rayon::ThreadPoolBuilder::new()
			.num_threads(units)
			.thread_name(|i| format!("alder-job-{i}"))
			.build()?;
		Ok(JobPool {
			pool,
			units,
		})
	}

	/// Creates a pool with one worker per available execution unit.
	pub fn from_available() -> Result<Self> {
		let units = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
		Self::new(units)
	}

	/// The process-wide pool used by trees without a pool of their own.
	///
	/// Built on first use. If it cannot be built, the failure is logged once
	/// and parallel walks fall back to sequential ones.
	pub fn global() -> Option<&'static JobPool> {
		DEFAULT_POOL
			.get_or_init(|| match JobPool::from_available() {
				Ok(pool) => Some(pool),
				Err(error) => {
					tracing::warn!(%error, "failed to build the default job pool");
					None
				}
			})
			.as_ref()
	}

	/// Number of worker threads.
	pub fn available_units(&self) -> usize {
		self.units
	}

	/// Runs `f` on the calling thread with a [`JobBatch`] to spawn jobs into.
	///
	/// Returns once `f` has returned and every job spawned in the batch has
	/// finished, so jobs may borrow anything that outlives the call.
	pub fn batch<'scope, F, O>(&self, f: F) -> O
	where
		F: for<'s> FnOnce(&JobBatch<'s, 'scope>) -> O,
	{
		self.pool.in_place_scope(|scope| {
			f(&JobBatch {
				scope,
			})
		})
	}
}

impl fmt::Debug for JobPool {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JobPool").field("units", &self.units).finish()
	}
}

/// Spawner for the jobs of one [`JobPool::batch`].
pub struct JobBatch<'s, 'scope> {
	scope: &'s rayon::Scope<'scope>,
}

impl<'scope> JobBatch<'_, 'scope> {
	/// Queues `job` on the pool.
	pub fn run<R, F>(&self, job: F) -> JobHandle<R>
	where
		F: FnOnce() -> R + Send + 'scope,
		R: Send + 'scope,
	{
		let slot = Arc::new(JobSlot {
			status: Mutex::new(None),
			done: Condvar::new(),
		});
		let filler = Filler {
			slot: Arc::clone(&slot),
			filled: false,
		};
		self.scope.spawn(move |_| {
			let status = match panic::catch_unwind(AssertUnwindSafe(job)) {
				Ok(value) => JobStatus::Done(value),
				Err(_) => JobStatus::Panicked,
			};
			filler.fill(status);
		});
		JobHandle {
			slot,
		}
	}
}

struct JobSlot<R> {
	status: Mutex<Option<JobStatus<R>>>,
	done: Condvar,
}

impl<R> JobSlot<R> {
	fn publish(&self, status: JobStatus<R>) {
		*self.status.lock() = Some(status);
		self.done.notify_all();
	}
}

/// Publishes `NoResult` if the job is dropped before it could run.
struct Filler<R> {
	slot: Arc<JobSlot<R>>,
	filled: bool,
}

impl<R> Filler<R> {
	fn fill(mut self, status: JobStatus<R>) {
		self.filled = true;
		self.slot.publish(status);
	}
}

impl<R> Drop for Filler<R> {
	fn drop(&mut self) {
		if !self.filled {
			self.slot.publish(JobStatus::NoResult);
		}
	}
}

/// The pending outcome of a job.
pub struct JobHandle<R> {
	slot: Arc<JobSlot<R>>,
}

impl<R> JobHandle<R> {
	/// Returns `true` once the job has reported.
	pub fn is_finished(&self) -> bool {
		self.slot.status.lock().is_some()
	}

	/// Blocks until the job has reported and takes its status.
	pub fn wait_and_free(self) -> JobStatus<R> {
		let mut status = self.slot.status.lock();
		loop {
			if let Some(status) = status.take() {
				return status;
			}
			self.slot.done.wait(&mut status);
		}
	}
}

impl<R> fmt::Debug for JobHandle<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JobHandle").field("finished", &self.is_finished()).finish()
	}
}
