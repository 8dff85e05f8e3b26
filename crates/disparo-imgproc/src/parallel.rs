use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use thiserror::Error;

/// Errors that can occur during parallel execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParallelError {
    /// The thread pool failed to build.
    #[error("failed to build thread pool: {0}")]
    BuildError(String),

    /// The requested thread count is invalid.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),

    /// The row stride must be non-zero.
    #[error("row stride must be > 0, got {0}")]
    InvalidRowStride(usize),

    /// The destination buffer is not a whole number of rows.
    #[error("destination length ({0}) is not a multiple of the row stride ({1})")]
    SizeMismatch(usize, usize),

    /// The pass was interrupted through its cancellation flag.
    #[error("execution was cancelled")]
    Cancelled,
}

/// Controls how a per-row pass is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Use the global Rayon thread pool and hand out one row per task.
    #[default]
    ParallelRows,

    /// Run sequentially on the current thread.
    ///
    /// Useful for small images, debugging, or when the overhead of parallelization
    /// outweighs the benefits.
    Serial,

    /// Run on a local thread pool with `n` threads.
    ///
    /// # Warning
    /// Creates a new thread pool on every call, which has significant overhead.
    /// Use this primarily for benchmarking or specific isolation needs.
    Fixed(usize),
}

/// Apply a function to every row of a destination buffer.
///
/// The closure receives the row index and the mutable row slice and returns a
/// count that is summed over all rows. Rows are disjoint, so no
/// synchronization is needed between tasks.
///
/// When `cancel` is given it is polled before each row; once raised the
/// remaining rows are skipped and [`ParallelError::Cancelled`] is returned.
///
/// # Arguments
///
/// * `dst` - The destination buffer, `rows * row_stride` elements long.
/// * `row_stride` - The number of elements per row (width * channels).
/// * `strategy` - The execution strategy.
/// * `cancel` - Optional cooperative cancellation flag.
/// * `op` - The per-row operation.
pub fn par_iter_rows_indexed<T, F>(
    dst: &mut [T],
    row_stride: usize,
    strategy: ExecutionStrategy,
    cancel: Option<&AtomicBool>,
    op: F,
) -> Result<usize, ParallelError>
where
    T: Send,
    F: Fn(usize, &mut [T]) -> usize + Send + Sync,
{
    if row_stride == 0 {
        return Err(ParallelError::InvalidRowStride(row_stride));
    }

    if dst.len() % row_stride != 0 {
        return Err(ParallelError::SizeMismatch(dst.len(), row_stride));
    }

    let is_cancelled = || cancel.is_some_and(|flag| flag.load(Ordering::Relaxed));

    let run_row = |(row, dst_row): (usize, &mut [T])| {
        if is_cancelled() {
            return 0;
        }
        op(row, dst_row)
    };

    let total: usize = match strategy {
        ExecutionStrategy::Serial => dst.chunks_mut(row_stride).enumerate().map(run_row).sum(),
        ExecutionStrategy::ParallelRows => dst
            .par_chunks_mut(row_stride)
            .enumerate()
            .map(run_row)
            .sum(),
        ExecutionStrategy::Fixed(n) => {
            if n == 0 {
                return Err(ParallelError::InvalidThreadCount(n));
            }
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| ParallelError::BuildError(e.to_string()))?;

            pool.install(|| {
                dst.par_chunks_mut(row_stride)
                    .enumerate()
                    .map(run_row)
                    .sum()
            })
        }
    };

    if is_cancelled() {
        return Err(ParallelError::Cancelled);
    }

    Ok(total)
}
