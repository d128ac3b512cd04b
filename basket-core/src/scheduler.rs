use log::{debug, trace};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

pub use rayon::ThreadPoolBuildError;

/// Runs a batch of independent tasks, returning their outputs in input order.
///
/// Tasks receive their position in the batch along with the input.  Implementations are
/// free to run tasks concurrently, so a task must not depend on the side effects of
/// another task in the same batch.
pub trait Scheduler: Sync {

    /// Applies `f` to every input, returning outputs in the order of the inputs.
    fn batch_apply<A, B, F>(&self, inputs: Vec<A>, f: F) -> Vec<B>
        where A: Send,
              B: Send,
              F: Fn(usize, A) -> B + Send + Sync;

    /// Fallible variant of `batch_apply`.  The first error observed is returned; tasks
    /// which have not started yet may be skipped once an error occurs.
    fn try_batch_apply<A, B, E, F>(&self, inputs: Vec<A>, f: F) -> Result<Vec<B>, E>
        where A: Send,
              B: Send,
              E: Send,
              F: Fn(usize, A) -> Result<B, E> + Send + Sync {
        self.batch_apply(inputs, f).into_iter().collect()
    }

    /// Number of tasks which may run at the same time
    fn concurrency(&self) -> usize;
}

/// Runs each task on the calling thread, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialScheduler;

impl Scheduler for SerialScheduler {

    fn batch_apply<A, B, F>(&self, inputs: Vec<A>, f: F) -> Vec<B>
        where A: Send,
              B: Send,
              F: Fn(usize, A) -> B + Send + Sync {
        trace!("Running {} tasks serially", inputs.len());
        inputs.into_iter().enumerate().map(|(idx, a)| f(idx, a)).collect()
    }

    fn try_batch_apply<A, B, E, F>(&self, inputs: Vec<A>, f: F) -> Result<Vec<B>, E>
        where A: Send,
              B: Send,
              E: Send,
              F: Fn(usize, A) -> Result<B, E> + Send + Sync {
        // Stops at the first failure
        inputs.into_iter().enumerate().map(|(idx, a)| f(idx, a)).collect()
    }

    fn concurrency(&self) -> usize {
        1
    }
}

/// Runs tasks on a private rayon thread pool.
pub struct PoolScheduler {
    pool: ThreadPool,
    n_threads: usize
}

impl PoolScheduler {

    /// Creates a scheduler backed by `n_threads` worker threads.  Zero lets rayon pick
    /// the number of threads from the available cores.
    pub fn new(n_threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|idx| format!("basket-worker-{}", idx))
            .build()?;

        let n_threads = pool.current_num_threads();
        debug!("Started worker pool with {} threads", n_threads);
        Ok(PoolScheduler { pool: pool, n_threads: n_threads })
    }
}

impl Scheduler for PoolScheduler {

    fn batch_apply<A, B, F>(&self, inputs: Vec<A>, f: F) -> Vec<B>
        where A: Send,
              B: Send,
              F: Fn(usize, A) -> B + Send + Sync {
        trace!("Running {} tasks on {} threads", inputs.len(), self.n_threads);
        self.pool.install(|| {
            inputs.into_par_iter()
                .enumerate()
                .map(|(idx, a)| f(idx, a))
                .collect()
        })
    }

    fn try_batch_apply<A, B, E, F>(&self, inputs: Vec<A>, f: F) -> Result<Vec<B>, E>
        where A: Send,
              B: Send,
              E: Send,
              F: Fn(usize, A) -> Result<B, E> + Send + Sync {
        trace!("Running {} fallible tasks on {} threads", inputs.len(), self.n_threads);
        self.pool.install(|| {
            inputs.into_par_iter()
                .enumerate()
                .map(|(idx, a)| f(idx, a))
                .collect()
        })
    }

    fn concurrency(&self) -> usize {
        self.n_threads
    }
}
