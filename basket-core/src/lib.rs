//! basket-core
//!
//! `basket-core` provides the primitives for running batches of independent tasks.
//!
//! What is it?
//! ---
//!
//! Several stages of an external-memory aggregation are embarrassingly parallel: every
//! fragment of the input can be expanded and reduced on its own, and a single primary
//! fragment can be compared against each remaining fragment without the comparisons
//! touching each other.  `basket-core` defines a `Scheduler` which takes such a batch of
//! inputs and a task function, runs the task once per input and hands the outputs back
//! in input order.
//!
//! Two schedulers are provided:
//!
//! 1. `SerialScheduler` - runs every task on the calling thread, one after another.
//! 2. `PoolScheduler` - runs tasks on a dedicated rayon thread pool of fixed size.
//!
//! Example - Sum of squares
//! ---
//! ```rust
//! use basket_core::scheduler::{Scheduler, SerialScheduler, PoolScheduler};
//!
//! let inputs = vec![1u64, 2, 3, 4];
//! let serial = SerialScheduler.batch_apply(inputs.clone(), |_idx, x| x * x);
//! let pooled = PoolScheduler::new(2).unwrap().batch_apply(inputs, |_idx, x| x * x);
//! assert_eq!(serial, vec![1, 4, 9, 16]);
//! assert_eq!(serial, pooled);
//! ```

#![warn(missing_docs)]

/// Contains Scheduler trait definition and implementations
pub mod scheduler;
