//! # Error Types for the AVL Tree
//!
//! Every fallible operation in the crate returns [`Result`], so the "payload
//! or failure" answer is always carried out-of-band. A stored payload is never
//! used as a sentinel: a tree of `Option<U>` may legally hold `None`, and
//! [`crate::AvlTree::find`] answers `Some(&None)` for it.
//!
//! ## Error Flow
//!
//! ```text
//! insert / remove / visit
//!      │
//!      ▼
//! Lease traversal stack ─────────► Err(Alloc | ArenaFull) on growth failure
//!      │
//!      ▼
//! Drive visitor per node ────────► Visit::Error ──► Err(Aborted | Duplicate | NotFound)
//!      │                                  (the operation's own cause wins)
//!      ▼
//! Parallel jobs (optional) ──────► Err(Job { index, failure })
//!      │
//!      ▼
//! Ok(Completion)
//! ```

use std::collections::TryReserveError;
use std::fmt;

use thiserror::Error;

/// Errors that can occur during tree operations.
#[derive(Error, Debug)]
pub enum Error {
	/// A tree was built without a comparator.
	#[error("no comparator configured")]
	MissingComparator,

	/// The item to remove is not stored in the tree.
	#[error("item not found")]
	NotFound,

	/// An equal item is already stored and the duplicate policy rejects it.
	#[error("duplicate item rejected")]
	Duplicate,

	/// A visitor returned [`crate::Visit::Error`].
	#[error("traversal aborted by visitor")]
	Aborted,

	/// The traversal engine reached a state it cannot continue from.
	///
	/// This only happens if an internal visitor manipulated the traversal
	/// stack inconsistently. It is logged at warning level before it is
	/// returned.
	#[error("traversal state corrupted: {0}")]
	Corrupted(&'static str),

	/// Growing a node store, traversal stack or decomposition buffer failed.
	#[error("allocation failed: {0}")]
	Alloc(#[from] TryReserveError),

	/// The node store already holds as many slots as a node handle can address.
	#[error("node store full: {slots} slots in use")]
	ArenaFull {
		/// Number of slots at the time of the failed allocation.
		slots: usize,
	},

	/// A job of a parallel visit did not complete successfully.
	///
	/// All other jobs of the same visit were still joined before this error
	/// was reported.
	#[error("parallel job {index} failed: {failure}")]
	Job {
		/// Position of the job root in breadth-first order.
		index: usize,
		/// How the job failed.
		failure: JobFailure,
	},

	/// The worker pool for parallel visits could not be created.
	#[error("failed to build worker pool: {0}")]
	ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
	/// Reports an inconsistent traversal state at warning level.
	pub(crate) fn corrupted(what: &'static str) -> Self {
		tracing::warn!(what, "traversal state corrupted");
		Error::Corrupted(what)
	}
}

/// The way a parallel job failed, see [`Error::Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFailure {
	/// The job ran but its traversal returned an error.
	Aborted,
	/// The job never produced a result.
	NoResult,
	/// The job panicked before producing a result.
	Panicked,
}

impl fmt::Display for JobFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			JobFailure::Aborted => f.write_str("traversal aborted"),
			JobFailure::NoResult => f.write_str("no result"),
			JobFailure::Panicked => f.write_str("panicked"),
		}
	}
}

/// A Result type alias using the crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
