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

mod balanced;
mod linear;
mod parallel;

pub use self::balanced::BalancedParallelExecution;
pub use self::linear::LinearExecution;
pub use self::parallel::ParallelExecution;

use std::convert::TryFrom;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anchors_core::{
    AnchorError, Candidate, ClassificationFunction, DataInstance, Label, PerturbationFunction
};

/// Everything a worker needs to evaluate one slice of samples for one
/// candidate. Cheap to clone, every field is shared.
pub struct EvaluationContext<I: DataInstance> {
    classifier: Arc<dyn ClassificationFunction<I>>,
    perturbation: Arc<dyn PerturbationFunction<I>>,
    label: Label,
    is_cancelled: Arc<AtomicBool>
}

impl<I: DataInstance> Clone for EvaluationContext<I> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            perturbation: self.perturbation.clone(),
            label: self.label,
            is_cancelled: self.is_cancelled.clone()
        }
    }
}

impl<I: DataInstance> EvaluationContext<I> {
    /// Draws `count` perturbations that hold the candidate's features
    /// fixed, classifies them, and commits the outcome to the candidate in
    /// a single atomic step.
    ///
    /// # Arguments
    ///
    /// * `candidate` -
    /// * `count` -
    ///
    pub fn evaluate(&self, candidate: &Arc<Candidate>, count: usize) -> Result<(), AnchorError> {
        if count == 0 {
            return Ok(());
        }
        if self.is_cancelled.load(Ordering::Acquire) {
            return Err(AnchorError::Interrupted);
        }

        let count_u32 = u32::try_from(count).map_err(|_| {
            AnchorError::InvalidArgument(format!("sample count {} does not fit in 32 bits", count))
        })?;
        let perturbed = self.perturbation.perturb(candidate.canonical_features(), count)?;

        if perturbed.len() != count {
            return Err(AnchorError::InvalidArgument(format!(
                "asked for {} perturbations but received {}",
                count,
                perturbed.len()
            )));
        }

        let labels = self.classifier.predict_batch(&perturbed.instances)?;

        if labels.len() != count {
            return Err(AnchorError::InvalidArgument(format!(
                "classifier returned {} labels for {} instances",
                labels.len(),
                count
            )));
        }

        let matches = labels.iter().filter(|&&label| label == self.label).count();

        candidate.register_samples(count_u32, matches as u32)
    }
}

/// How a session distributes its registered evaluations over the available
/// compute.
pub trait ExecutionStrategy<I: DataInstance>: Send + Sync {
    /// Evaluates every registered `(candidate, count)` pair. Every sample
    /// must have been committed to its candidate by the time this returns.
    ///
    /// # Arguments
    ///
    /// * `context` -
    /// * `requests` -
    ///
    fn execute(
        &self,
        context: &EvaluationContext<I>,
        requests: &[(Arc<Candidate>, usize)]
    ) -> Result<(), AnchorError>;
}

/// Evaluates candidates through the perturbation and classification
/// pipeline. One service is shared by the bandit identifiers and the
/// constructor of a single explanation run; a session is created per
/// explained label.
pub struct SamplingService<I: DataInstance> {
    classifier: Arc<dyn ClassificationFunction<I>>,
    perturbation: Arc<dyn PerturbationFunction<I>>,
    strategy: Box<dyn ExecutionStrategy<I>>,
    is_cancelled: Arc<AtomicBool>,

    /// Total wall time spent inside `run`, in nanoseconds.
    time_spent_sampling: AtomicU64
}

impl<I: DataInstance> SamplingService<I> {
    /// Creates a service evaluating candidates with the given strategy.
    ///
    /// # Arguments
    ///
    /// * `classifier` -
    /// * `perturbation` -
    /// * `strategy` -
    ///
    pub fn new(
        classifier: Arc<dyn ClassificationFunction<I>>,
        perturbation: Arc<dyn PerturbationFunction<I>>,
        strategy: Box<dyn ExecutionStrategy<I>>
    ) -> Self
    {
        Self {
            classifier,
            perturbation,
            strategy,
            is_cancelled: Arc::new(AtomicBool::new(false)),
            time_spent_sampling: AtomicU64::new(0)
        }
    }

    /// Starts a new session for the given label.
    ///
    /// # Arguments
    ///
    /// * `label` - the label whose precision is being estimated
    ///
    pub fn session(&self, label: Label) -> SamplingSession<'_, I> {
        SamplingSession {
            service: self,
            label,
            requests: vec! []
        }
    }

    /// Replaces the execution strategy of this service.
    ///
    /// # Arguments
    ///
    /// * `strategy` -
    ///
    pub fn set_strategy(&mut self, strategy: Box<dyn ExecutionStrategy<I>>) {
        self.strategy = strategy;
    }

    /// Cooperatively cancels all further sampling on this service. Slices
    /// that are already running complete and their samples remain
    /// committed.
    pub fn cancel(&self) {
        self.is_cancelled.store(true, Ordering::Release);
    }

    /// Returns the total wall time spent sampling across all sessions of
    /// this service.
    pub fn time_spent_sampling(&self) -> Duration {
        Duration::from_nanos(self.time_spent_sampling.load(Ordering::Acquire))
    }
}

/// A batch of pending evaluations. Counts accumulate if the same candidate
/// is registered twice.
pub struct SamplingSession<'a, I: DataInstance> {
    service: &'a SamplingService<I>,
    label: Label,
    requests: Vec<(Arc<Candidate>, usize)>
}

impl<'a, I: DataInstance> SamplingSession<'a, I> {
    /// Registers `count` additional samples to draw for the given
    /// candidate.
    ///
    /// # Arguments
    ///
    /// * `candidate` -
    /// * `count` -
    ///
    pub fn register(&mut self, candidate: &Arc<Candidate>, count: usize) -> &mut Self {
        match self.requests.iter_mut().find(|(c, _)| Arc::ptr_eq(c, candidate)) {
            Some((_, pending)) => *pending += count,
            None => self.requests.push((candidate.clone(), count))
        }

        self
    }

    /// Returns the number of distinct candidates registered so far.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Evaluates every registered candidate and returns the wall time
    /// spent. All samples have been committed to their candidates when
    /// this returns; on error, whatever was committed before the fault
    /// remains (statistics are monotonic).
    pub fn run(self) -> Result<Duration, AnchorError> {
        let context = EvaluationContext {
            classifier: self.service.classifier.clone(),
            perturbation: self.service.perturbation.clone(),
            label: self.label,
            is_cancelled: self.service.is_cancelled.clone()
        };
        let requests = self.requests.into_iter()
            .filter(|(_, count)| *count > 0)
            .collect::<Vec<_>>();
        let start = Instant::now();
        let result = self.service.strategy.execute(&context, &requests);
        let elapsed = start.elapsed();

        self.service.time_spent_sampling.fetch_add(elapsed.as_nanos() as u64, Ordering::AcqRel);
        result.map(|_| elapsed)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn register_accumulates_counts() {
        let service = service_with(LinearExecution::default());
        let candidate = root(0);
        let mut session = service.session(1);

        session.register(&candidate, 3);
        session.register(&candidate, 6);

        assert_eq!(session.len(), 1);
        session.run().unwrap();
        assert_eq!(candidate.sampled_size(), 9);
    }

    #[test]
    fn empty_session_is_a_noop() {
        let service = service_with(LinearExecution::default());
        let session = service.session(1);

        assert!(session.is_empty());
        session.run().unwrap();
    }

    #[test]
    fn cancelled_service_reports_interrupted() {
        let service = service_with(LinearExecution::default());
        let candidate = root(0);

        service.cancel();

        let mut session = service.session(1);
        session.register(&candidate, 3);

        assert!(matches!(session.run(), Err(AnchorError::Interrupted)));
        assert_eq!(candidate.sampled_size(), 0);
    }

    #[test]
    fn sampling_time_accumulates() {
        let service = service_with(LinearExecution::default());
        let candidate = root(0);

        let mut session = service.session(1);
        session.register(&candidate, 30);
        session.run().unwrap();

        assert!(service.time_spent_sampling() > Duration::from_nanos(0));
    }

    // the cycling perturbation flips both features on two of every three
    // samples, so holding feature 0 of (1, 1) fixed keeps the label at 1
    // whenever the offset is not -1
    #[test]
    fn evaluation_counts_matching_labels() {
        let service = service_with(LinearExecution::default());
        let candidate = root(0);

        let mut session = service.session(1);
        session.register(&candidate, 9);
        session.run().unwrap();

        assert_eq!(candidate.sampled_size(), 9);
        assert_eq!(candidate.positive_samples(), 6);
    }
}
