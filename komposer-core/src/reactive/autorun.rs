//! Autorun Implementation
//!
//! An Autorun is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Autoruns Work
//!
//! 1. When created, the autorun runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the runtime schedules it and it re-runs
//!    synchronously on the writer's thread.
//!
//! 3. Before re-running, the autorun clears its old dependencies and tracks
//!    new ones during execution.
//!
//! # Cleanup
//!
//! The function may return a cleanup. It is called before the next run and
//! when the autorun is stopped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::warn;

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::SubscriberId;

/// Released before an autorun re-runs and when it stops.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Upper bound on back-to-back re-runs triggered from inside a run.
const MAX_CONSECUTIVE_RUNS: usize = 100;

type RunFn = Box<dyn Fn() -> Option<Cleanup> + Send + Sync>;

struct AutorunInner {
    subscriber_id: SubscriberId,
    run: RunFn,
    cleanup: Mutex<Option<Cleanup>>,
    dependencies: Mutex<SmallVec<[u64; 8]>>,
    running: AtomicBool,
    rerun: AtomicBool,
    stopped: AtomicBool,
    run_count: AtomicUsize,
}

impl AutorunInner {
    fn execute(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            // Writes made by the running function; picked up after it returns.
            self.rerun.store(true, Ordering::SeqCst);
            return;
        }

        let mut consecutive = 0;
        loop {
            self.rerun.store(false, Ordering::SeqCst);
            self.run_once();
            consecutive += 1;

            let again = self.rerun.load(Ordering::SeqCst) && !self.stopped.load(Ordering::SeqCst);
            if again && consecutive < MAX_CONSECUTIVE_RUNS {
                continue;
            }
            if again {
                warn!(
                    runs = consecutive,
                    "autorun keeps invalidating itself; dropping the pending re-run"
                );
            }

            self.running.store(false, Ordering::SeqCst);
            // A schedule that raced with the store above would otherwise be lost.
            if self.rerun.load(Ordering::SeqCst)
                && !self.stopped.load(Ordering::SeqCst)
                && consecutive < MAX_CONSECUTIVE_RUNS
                && !self.running.swap(true, Ordering::SeqCst)
            {
                continue;
            }
            break;
        }
    }

    fn run_once(&self) {
        let previous = self.cleanup.lock().take();
        if let Some(cleanup) = previous {
            cleanup();
        }

        Runtime::clear_dependencies(self.subscriber_id);
        let cleanup = {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            let cleanup = (self.run)();
            *self.dependencies.lock() = ReactiveContext::get_dependencies().into_iter().collect();
            cleanup
        };
        self.run_count.fetch_add(1, Ordering::SeqCst);

        if self.stopped.load(Ordering::SeqCst) {
            // Stopped from inside the run.
            if let Some(cleanup) = cleanup {
                cleanup();
            }
        } else {
            *self.cleanup.lock() = cleanup;
        }
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        Runtime::clear_dependencies(self.subscriber_id);
        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

impl Reactive for AutorunInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn schedule(&self) {
        self.execute();
    }
}

/// A side-effecting computation that re-runs when the signals it read change.
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let autorun = Autorun::new({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// autorun.stop();
/// ```
pub struct Autorun {
    inner: Arc<AutorunInner>,
    _handle: ReactiveHandle,
}

impl Autorun {
    /// Create an autorun and run it once.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_cleanup(move || {
            run();
            None
        })
    }

    /// Create an autorun whose runs may return a cleanup, and run it once.
    pub fn with_cleanup<F>(run: F) -> Self
    where
        F: Fn() -> Option<Cleanup> + Send + Sync + 'static,
    {
        let inner = Arc::new(AutorunInner {
            subscriber_id: SubscriberId::new(),
            run: Box::new(run),
            cleanup: Mutex::new(None),
            dependencies: Mutex::new(SmallVec::new()),
            running: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        let handle = Runtime::register(inner.clone() as Arc<dyn Reactive>);

        inner.execute();

        Self {
            inner,
            _handle: handle,
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Stop for good and run the last cleanup. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Get the number of times the autorun has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of signals read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl Drop for Autorun {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl std::fmt::Debug for Autorun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autorun")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
