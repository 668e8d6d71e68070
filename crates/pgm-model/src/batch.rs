use crate::options::Threading;
use pgm_core::{BatchError, PgmError, PgmResult};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, warn};

/// Outcome of every scenario of one batch, in scenario order.
pub(crate) struct BatchOutcome<T> {
    pub results: Vec<PgmResult<T>>,
}

impl<T> BatchOutcome<T> {
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|result| result.is_err()).count()
    }

    /// Failed/succeeded scenario indices with one message per failure.
    pub fn batch_error(&self) -> BatchError {
        let mut error = BatchError::default();
        for (scenario, result) in self.results.iter().enumerate() {
            match result {
                Ok(_) => error.succeeded_scenarios.push(scenario),
                Err(err) => {
                    error.failed_scenarios.push(scenario);
                    error.error_messages.push(err.to_string());
                }
            }
        }
        error
    }
}

/// Run `job` for scenarios `0..batch_size`.
///
/// Scenarios are independent; results land in their scenario slot whatever
/// order the workers finish in.
pub(crate) fn run_scenarios<T, F>(
    threading: Threading,
    batch_size: usize,
    job: F,
) -> PgmResult<BatchOutcome<T>>
where
    T: Send,
    F: Fn(usize) -> PgmResult<T> + Sync,
{
    let run = |scenario: usize| {
        let result = job(scenario);
        if let Err(err) = &result {
            warn!(scenario, error = %err, "batch scenario failed");
        }
        result
    };

    let thread_count = match threading.thread_count() {
        Some(count) if batch_size > 1 => count.min(batch_size).max(1),
        _ => {
            debug!(batch_size, "running batch sequentially");
            return Ok(BatchOutcome {
                results: (0..batch_size).map(run).collect(),
            });
        }
    };

    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .map_err(|err| {
            PgmError::invalid_arguments(format!(
                "building thread pool for batch calculation: {err}"
            ))
        })?;
    debug!(batch_size, threads = thread_count, "running batch");
    let results: Vec<PgmResult<T>> =
        pool.install(|| (0..batch_size).into_par_iter().map(run).collect());
    Ok(BatchOutcome { results })
}
