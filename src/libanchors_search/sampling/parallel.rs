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

/// Dispatches one task per registered candidate to a fixed-size worker
/// pool.
pub struct ParallelExecution {
    pool: Arc<WorkerPool>
}

impl ParallelExecution {
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

impl Default for ParallelExecution {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: DataInstance> ExecutionStrategy<I> for ParallelExecution {
    fn execute(
        &self,
        context: &EvaluationContext<I>,
        requests: &[(Arc<Candidate>, usize)]
    ) -> Result<(), AnchorError>
    {
        if requests.is_empty() {
            return Ok(());
        }

        let (tx, rx) = crossbeam_channel::bounded(requests.len());

        for (candidate, count) in requests {
            let context = context.clone();
            let candidate = candidate.clone();
            let count = *count;
            let tx = tx.clone();

            self.pool.submit(Box::new(move || {
                let outcome = context.evaluate(&candidate, count);

                tx.send(outcome).expect("could not send evaluation outcome");
            }));
        }

        // every task must have finished before we hand control back, even
        // when one of them failed
        let mut first_error = None;

        for _ in 0..requests.len() {
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

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[test]
    fn evaluates_all_candidates() {
        let pool = Arc::new(WorkerPool::with_capacity(4));
        let service = service_with(ParallelExecution::with_pool(pool));
        let candidates = (0..8).map(root).collect::<Vec<_>>();
        let mut session = service.session(1);

        for (i, candidate) in candidates.iter().enumerate() {
            session.register(candidate, 3 * (i + 1));
        }
        session.run().unwrap();

        for (i, candidate) in candidates.iter().enumerate() {
            assert_eq!(candidate.sampled_size(), 3 * (i as u64 + 1));
        }
    }

    #[test]
    fn failures_surface_after_every_task_finished() {
        use super::super::SamplingService;
        use anchors_core::TabularInstance;

        let service = SamplingService::new(
            Arc::new(FailingClassifier),
            Arc::new(CyclingPerturbation { origin: TabularInstance::new(vec! [1, 1]) }),
            Box::new(ParallelExecution::with_pool(Arc::new(WorkerPool::with_capacity(2))))
        );
        let candidate = root(0);
        let mut session = service.session(1);

        session.register(&candidate, 6);

        assert!(matches!(session.run(), Err(AnchorError::Classifier(_))));
    }
}
