//! # Concurrency Tests for the Alder AVL Tree
//!
//! The tree has a single writer at a time, but read-only walks may run from
//! many threads at once and parallel walks fan out onto worker jobs. These
//! tests cover:
//!
//! - Concurrent read-only walks over a shared tree
//! - Contention on a shared traversal resource slot, which must degrade to
//!   private stacks and never block
//! - Parallel walks whose jobs fail or panic: every job is still joined
//!
//! Every multi-threaded test runs under a timeout so that a hang is reported
//! as a failure rather than stalling the suite.

use alder::{
	AvlTree, Completion, Error, JobFailure, JobPool, Mode, SharedResources, Visit, VisitState,
	Visitor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ===========================================================================
// Timeout Helper
// ===========================================================================

/// Runs a closure with a timeout, panicking if it does not complete in time.
fn run_with_timeout<F, R>(timeout: Duration, name: &str, f: F) -> R
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	let (tx, rx) = channel();
	let name = name.to_string();

	let handle = thread::spawn(move || {
		let result = f();
		let _ = tx.send(result);
	});

	match rx.recv_timeout(timeout) {
		Ok(result) => {
			handle.join().expect("Thread panicked");
			result
		}
		Err(RecvTimeoutError::Timeout) => {
			panic!("TIMEOUT: '{}' did not complete within {:?} - potential deadlock", name, timeout);
		}
		Err(RecvTimeoutError::Disconnected) => {
			handle.join().expect("Thread panicked without sending result");
			panic!("Thread terminated unexpectedly without completing");
		}
	}
}

const TIMEOUT: Duration = Duration::from_secs(30);

fn shared_tree(n: u64, shared: Option<SharedResources>, units: usize) -> AvlTree<u64> {
	let mut builder = AvlTree::builder()
		.compare(|a: &u64, b: &u64| a.cmp(b))
		.jobs(Arc::new(JobPool::new(units).unwrap()));
	if let Some(shared) = shared {
		builder = builder.shared(shared);
	}
	let mut tree = builder.build().unwrap();
	for key in 0..n {
		tree.insert(key).unwrap();
	}
	tree
}

struct Sum;

impl Visitor<u64> for Sum {
	type Data = u64;

	fn visit(&self, item: &u64, _: &VisitState, total: &mut u64) -> Visit {
		*total += item;
		Visit::CONTINUE
	}

	fn merge(&self, _: &u64, _: &VisitState, total: &mut u64, job: u64) -> Visit {
		*total += job;
		Visit::CONTINUE
	}
}

// ===========================================================================
// Concurrent Read Tests
// ===========================================================================

#[test]
fn concurrent_walks_share_one_resource_slot() {
	run_with_timeout(TIMEOUT, "concurrent_walks_share_one_resource_slot", || {
		let shared = SharedResources::new();
		let tree = Arc::new(shared_tree(2000, Some(shared.clone()), 2));
		let expected: u64 = (0..2000).sum();

		let handles: Vec<_> = (0..8)
			.map(|_| {
				let tree = Arc::clone(&tree);
				thread::spawn(move || {
					for _ in 0..50 {
						let mut total = 0;
						tree.visit(Mode::INFIX, &Sum, &mut total).unwrap();
						assert_eq!(total, expected);
					}
				})
			})
			.collect();
		for h in handles {
			h.join().unwrap();
		}

		// Every lease made its way back
		assert!(shared.is_idle());
	});
}

#[test]
fn concurrent_parallel_walks() {
	run_with_timeout(TIMEOUT, "concurrent_parallel_walks", || {
		let tree = Arc::new(shared_tree(5000, None, 4));
		let expected: u64 = (0..5000).sum();

		let handles: Vec<_> = (0..4)
			.map(|_| {
				let tree = Arc::clone(&tree);
				thread::spawn(move || {
					for _ in 0..20 {
						let mut total = 0;
						let mode = Mode::PREFIX | Mode::PARALLEL | Mode::MERGE;
						tree.visit(mode, &Sum, &mut total).unwrap();
						assert_eq!(total, expected);
					}
				})
			})
			.collect();
		for h in handles {
			h.join().unwrap();
		}
	});
}

#[test]
fn one_resource_slot_across_trees_of_different_types() {
	run_with_timeout(TIMEOUT, "one_resource_slot_across_trees", || {
		let shared = SharedResources::new();
		let numbers = Arc::new(shared_tree(500, Some(shared.clone()), 2));
		let mut words = AvlTree::builder()
			.compare(|a: &String, b: &String| a.cmp(b))
			.shared(shared.clone())
			.build()
			.unwrap();
		for i in 0..500 {
			words.insert(format!("{i:04}")).unwrap();
		}
		let words = Arc::new(words);

		let a = {
			let numbers = Arc::clone(&numbers);
			thread::spawn(move || {
				for _ in 0..100 {
					assert_eq!(numbers.to_vec(Mode::INFIX).unwrap().len(), 500);
				}
			})
		};
		let b = {
			let words = Arc::clone(&words);
			thread::spawn(move || {
				for _ in 0..100 {
					assert_eq!(words.to_vec(Mode::SUFFIX).unwrap().len(), 500);
				}
			})
		};
		a.join().unwrap();
		b.join().unwrap();
		assert!(shared.is_idle());
	});
}

#[test]
fn held_lease_does_not_block_walks() {
	run_with_timeout(TIMEOUT, "held_lease_does_not_block_walks", || {
		let shared = SharedResources::new();
		let tree = shared_tree(100, Some(shared.clone()), 2);

		let lease = shared.lease();
		assert!(lease.is_pooled());
		// The slot is taken; walks must fall back to private stacks
		assert_eq!(tree.to_vec(Mode::INFIX).unwrap().len(), 100);
		drop(lease);
		assert!(shared.is_idle());
	});
}

// ===========================================================================
// Failing Job Tests
// ===========================================================================

/// Fails (or panics) when it reaches `target`, counting every visit.
struct Tripwire {
	target: u64,
	panic: bool,
	visits: AtomicUsize,
}

impl Visitor<u64> for Tripwire {
	type Data = ();

	fn visit(&self, item: &u64, _: &VisitState, _: &mut ()) -> Visit {
		self.visits.fetch_add(1, Ordering::SeqCst);
		if *item == self.target {
			if self.panic {
				panic!("tripwire hit at {}", item);
			}
			return Visit::Error;
		}
		Visit::CONTINUE
	}
}

#[test]
fn failed_job_still_joins_the_others() {
	run_with_timeout(TIMEOUT, "failed_job_still_joins_the_others", || {
		let tree = shared_tree(1023, None, 2);
		// With two units the root (511) is visited by the caller and each
		// half of the tree is one job; 1000 is in the second one.
		let tripwire = Tripwire {
			target: 1000,
			panic: false,
			visits: AtomicUsize::new(0),
		};
		let failed = tree.visit(Mode::PREFIX | Mode::PARALLEL, &tripwire, &mut ());
		assert!(matches!(
			failed,
			Err(Error::Job {
				index: 1,
				failure: JobFailure::Aborted
			})
		));
		// The first job walked its whole half
		assert!(tripwire.visits.load(Ordering::SeqCst) > 511);
	});
}

#[test]
fn panicking_job_is_reported() {
	run_with_timeout(TIMEOUT, "panicking_job_is_reported", || {
		let tree = shared_tree(1023, None, 2);
		let tripwire = Tripwire {
			target: 3,
			panic: true,
			visits: AtomicUsize::new(0),
		};
		let failed = tree.visit(Mode::INFIX | Mode::PARALLEL, &tripwire, &mut ());
		assert!(matches!(
			failed,
			Err(Error::Job {
				index: 0,
				failure: JobFailure::Panicked
			})
		));

		// The tree is still usable afterwards
		let mut total = 0;
		assert_eq!(tree.visit(Mode::INFIX | Mode::PARALLEL | Mode::MERGE, &Sum, &mut total).unwrap(), Completion::Exhausted);
		assert_eq!(total, (0..1023).sum::<u64>());
	});
}
