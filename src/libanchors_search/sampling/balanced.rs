// Copyright 2020 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use anchors_core::{AnchorError, Candidate, DataInstance};

use crate::pool::WorkerPool;
use super::{EvaluationContext, ExecutionStrategy};

/// Splits the *total* registered sample count evenly over the worker pool,
/// regardless of how the samples are distributed over candidates. A worker
/// may evaluate slices of several candidates in one task, so the load stays
/// uniform even when only one or two candidates are registered.
pub struct BalancedParallelExecution {
    pool: Arc<WorkerPool>
}

impl BalancedParallelExecution {
    pub fn new() -> Self {
        Self::with_pool(Arc::new(WorkerPool::new()))
    }

    /// Creates a strategy that dispatches to an existing pool.
    ///
    /// # Arguments
    ///
    /// * `pool` -
    ///
    pub fn with_pool(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }
}

impl Default for BalancedParallelExecution {
    fn default() -> Self {
        Self::new()
    }
}

/// Assigns `total = sum(counts)` samples to `workers` workers, `total /
/// workers` each with the `total % workers` leftover spread one each over
/// the first workers. Returns per-worker lists of `(request index, count)`
/// slices in registration order.
///
/// # Arguments
///
/// * `counts` - the per-request sample counts, all non-zero
/// * `workers` -
///
fn partition(counts: &[usize], workers: usize) -> Vec<Vec<(usize, usize)>> {
    let total = counts.iter().sum::<usize>();
    let leftover = total % workers;
    let mut slices = vec! [vec! []; workers];
    let mut cursor = 0;
    let mut taken = 0;

    for (w, slice) in slices.iter_mut().enumerate() {
        let mut want = total / workers + if w < leftover { 1 } else { 0 };

        while want > 0 && cursor < counts.len() {
            let take = want.min(counts[cursor] - taken);

            slice.push((cursor, take));
            want -= take;
            taken += take;

            if taken == counts[cursor] {
                cursor += 1;
                taken = 0;
            }
        }
    }

    slices
}

impl<I: DataInstance> ExecutionStrategy<I> for BalancedParallelExecution {
    fn execute(
        &self,
        context: &EvaluationContext<I>,
        requests: &[(Arc<Candidate>, usize)]
    ) -> Result<(), AnchorError>
    {
        if requests.is_empty() {
            return Ok(());
        }

        let counts = requests.iter().map(|(_, count)| *count).collect::<Vec<_>>();
        let slices = partition(&counts, self.pool.capacity());
        let slices = slices.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>();
        let (tx, rx) = crossbeam_channel::bounded(slices.len());

        for slice in &slices {
            let work = slice.iter()
                .map(|&(index, count)| (requests[index].0.clone(), count))
                .collect::<Vec<_>>();
            let context = context.clone();
            let tx = tx.clone();

            self.pool.submit(Box::new(move || {
                let outcome = work.iter()
                    .try_for_each(|(candidate, count)| context.evaluate(candidate, *count));

                tx.send(outcome).expect("could not send evaluation outcome");
            }));
        }

        let mut first_error = None;

        for _ in 0..slices.len() {
            match rx.recv() {
                Ok(Ok(())) => {},
                Ok(Err(error)) => {
                    first_error.get_or_insert(error);
                },
                Err(_) => {
                    first_error.get_or_insert(AnchorError::Interrupted);
                    break;
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(())
        }
    }
}
