//! Scenario offsets into a flattened sparse batch buffer.

use pgm_core::{PgmError, PgmResult};
use std::ops::Range;

/// `n + 1` offsets for `n` scenarios: scenario `i` occupies
/// `data[indptr[i]..indptr[i + 1]]`.
///
/// Construction does not check the invariants so malformed pointers coming
/// from callers can still be represented; [`IndexPointer::validate`] does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPointer(Vec<i64>);

impl IndexPointer {
    pub fn new(offsets: Vec<i64>) -> Self {
        IndexPointer(offsets)
    }

    /// Build a valid pointer from per-scenario record counts.
    pub fn from_counts(counts: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        let mut total = 0i64;
        offsets.push(0);
        for count in counts {
            total += *count as i64;
            offsets.push(total);
        }
        IndexPointer(offsets)
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Element 0 is 0 and the sequence never decreases.
    pub fn validate(&self) -> PgmResult<()> {
        let first = self
            .0
            .first()
            .ok_or_else(|| PgmError::dataset("indptr must contain at least one element"))?;
        if *first != 0 {
            return Err(PgmError::dataset(format!("indptr must start at 0, found {first}")));
        }
        if let Some(pos) = self.0.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(PgmError::dataset(format!(
                "indptr must be non-decreasing, but indptr[{}] = {} > indptr[{}] = {}",
                pos,
                self.0[pos],
                pos + 1,
                self.0[pos + 1]
            )));
        }
        Ok(())
    }

    /// Number of scenarios.
    pub fn batch_size(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Flattened length the data buffer must have.
    pub fn total(&self) -> i64 {
        self.0.last().copied().unwrap_or(0)
    }

    pub fn scenario_range(&self, scenario: usize) -> PgmResult<Range<usize>> {
        if scenario >= self.batch_size() {
            return Err(PgmError::invalid_arguments(format!(
                "scenario {} out of range for batch of size {}",
                scenario,
                self.batch_size()
            )));
        }
        let start = usize::try_from(self.0[scenario])
            .map_err(|_| PgmError::dataset("indptr holds a negative offset"))?;
        let end = usize::try_from(self.0[scenario + 1])
            .map_err(|_| PgmError::dataset("indptr holds a negative offset"))?;
        if end < start {
            return Err(PgmError::dataset("indptr must be non-decreasing"));
        }
        Ok(start..end)
    }

    /// Records per scenario; assumes a validated pointer.
    pub fn counts(&self) -> Vec<usize> {
        self.0
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).max(0) as usize)
            .collect()
    }
}

impl From<Vec<i64>> for IndexPointer {
    fn from(offsets: Vec<i64>) -> Self {
        IndexPointer::new(offsets)
    }
}
