// Copyright 2021 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
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

use log::warn;

use anchors_core::{
    AnchorError, AnchorResult, ClassificationFunction, DataInstance, PerturbationFunction
};
use anchors_search::pool::WorkerPool;
use anchors_search::{
    AnchorConstruction, BestArmIdentification, ConstructionOptions, ParallelExecution
};
use anchors_utils::config;

use crate::importance::{AtomIdentity, ImportanceMode};
use crate::submodular::SubmodularPick;

/// Explains many instances and condenses the local anchors into a small
/// global summary of the model. Per-instance construction runs on the
/// aggregator's own worker pool; a failing instance is logged and skipped
/// without aborting the batch.
pub struct GlobalAggregator<I: DataInstance> {
    classifier: Arc<dyn ClassificationFunction<I>>,
    perturbation: Arc<dyn PerturbationFunction<I>>,
    options: ConstructionOptions,
    bandit: BestArmIdentification,
    identity: AtomIdentity,
    mode: ImportanceMode,
    worker_count: usize,
    parallel_sampling: bool
}

impl<I: DataInstance> GlobalAggregator<I> {
    /// Creates an aggregator. The perturbation function is `reconfigure`d
    /// onto each instance before its construction run.
    ///
    /// # Arguments
    ///
    /// * `classifier` -
    /// * `perturbation` -
    /// * `options` - the per-instance construction options
    ///
    pub fn new(
        classifier: Arc<dyn ClassificationFunction<I>>,
        perturbation: Arc<dyn PerturbationFunction<I>>,
        options: ConstructionOptions
    ) -> Result<Self, AnchorError>
    {
        options.validate()?;

        Ok(Self {
            classifier,
            perturbation,
            options,
            bandit: BestArmIdentification::default(),
            identity: AtomIdentity::Feature,
            mode: ImportanceMode::FeaturePrecision,
            worker_count: *config::NUM_WORKERS,
            parallel_sampling: false
        })
    }

    pub fn with_bandit(mut self, bandit: BestArmIdentification) -> Self {
        self.bandit = bandit;
        self
    }

    pub fn with_atom_identity(mut self, identity: AtomIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_importance_mode(mut self, mode: ImportanceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the number of instances explained concurrently, floored at
    /// one.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    /// Makes every per-instance construction sample through its own worker
    /// pool on top of the aggregator's pool.
    pub fn with_parallel_sampling(mut self, parallel_sampling: bool) -> Self {
        self.parallel_sampling = parallel_sampling;
        self
    }

    /// Explains every instance, in input order, skipping the ones whose
    /// construction failed.
    ///
    /// # Arguments
    ///
    /// * `instances` -
    ///
    pub fn explain(&self, instances: &[I]) -> Vec<AnchorResult<I>> {
        if instances.is_empty() {
            return vec! [];
        }
        if self.parallel_sampling && self.worker_count > 1 {
            warn!(
                "both per-instance sampling and the aggregator run in parallel, \
                 thread counts compose multiplicatively"
            );
        }

        let pool = WorkerPool::with_capacity(self.worker_count.min(instances.len()));
        let (tx, rx) = crossbeam_channel::bounded(instances.len());

        for (i, instance) in instances.iter().enumerate() {
            let classifier = self.classifier.clone();
            let perturbation = self.perturbation.clone();
            let options = self.options.clone();
            let bandit = self.bandit.clone();
            let parallel_sampling = self.parallel_sampling;
            let instance = instance.clone();
            let tx = tx.clone();

            pool.submit(Box::new(move || {
                let outcome = explain_one(
                    classifier,
                    perturbation,
                    instance,
                    options,
                    bandit,
                    parallel_sampling
                );

                tx.send((i, outcome)).expect("could not send explanation outcome");
            }));
        }

        let mut slots = (0..instances.len()).map(|_| None).collect::<Vec<_>>();

        for _ in 0..instances.len() {
            match rx.recv() {
                Ok((i, Ok(result))) => slots[i] = Some(result),
                Ok((i, Err(error))) => warn!("skipping instance {}: {}", i, error),
                Err(_) => break
            }
        }

        slots.into_iter().flatten().collect()
    }

    /// Explains every instance and returns the `count` local anchors that
    /// best summarize the model under this aggregator's importance mode.
    ///
    /// # Arguments
    ///
    /// * `instances` -
    /// * `count` -
    ///
    pub fn explain_global(&self, instances: &[I], count: usize) -> Vec<AnchorResult<I>> {
        let results = self.explain(instances);

        SubmodularPick::new(self.identity, self.mode).pick(results, count)
    }
}

/// One complete construction run for one instance.
fn explain_one<I: DataInstance>(
    classifier: Arc<dyn ClassificationFunction<I>>,
    perturbation: Arc<dyn PerturbationFunction<I>>,
    instance: I,
    options: ConstructionOptions,
    bandit: BestArmIdentification,
    parallel_sampling: bool
) -> Result<AnchorResult<I>, AnchorError>
{
    let label = classifier.predict(&instance)?;
    let perturbation: Arc<dyn PerturbationFunction<I>> =
        Arc::from(perturbation.reconfigure(&instance));
    let mut construction = AnchorConstruction::new(
        classifier,
        perturbation,
        instance,
        label,
        options
    )?.with_bandit(bandit);

    if parallel_sampling {
        construction = construction.with_execution(ParallelExecution::new());
    }

    construction.construct()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchors_core::{Label, PerturbationResult, TabularInstance};
    use std::collections::BTreeSet;

    /// Labels an instance `1` iff every feature value is positive.
    struct AllPositiveClassifier;

    impl ClassificationFunction<TabularInstance> for AllPositiveClassifier {
        fn predict(&self, instance: &TabularInstance) -> Result<Label, AnchorError> {
            Ok(if instance.values().iter().all(|&v| v > 0) { 1 } else { 0 })
        }
    }

    /// Cycles every mutable feature through the offsets `-1, 0, 1`.
    struct CyclingPerturbation {
        origin: TabularInstance
    }

    impl PerturbationFunction<TabularInstance> for CyclingPerturbation {
        fn perturb(&self, immutable_features: &BTreeSet<usize>, count: usize)
            -> Result<PerturbationResult<TabularInstance>, AnchorError>
        {
            const OFFSETS: [i64; 3] = [-1, 0, 1];

            let feature_count = self.origin.feature_count();
            let mut instances = Vec::with_capacity(count);
            let mut changed = Vec::with_capacity(count);

            for i in 0..count {
                let offset = OFFSETS[i % OFFSETS.len()];
                let mut values = Vec::with_capacity(feature_count);
                let mut mask = Vec::with_capacity(feature_count);

                for f in 0..feature_count {
                    if immutable_features.contains(&f) {
                        values.push(self.origin.value(f));
                        mask.push(false);
                    } else {
                        values.push(self.origin.value(f) + offset);
                        mask.push(offset != 0);
                    }
                }

                instances.push(TabularInstance::new(values));
                changed.push(mask);
            }

            PerturbationResult::new(instances, changed)
        }

        fn reconfigure(&self, origin: &TabularInstance) -> Box<dyn PerturbationFunction<TabularInstance>> {
            Box::new(Self { origin: origin.clone() })
        }
    }

    fn aggregator() -> GlobalAggregator<TabularInstance> {
        GlobalAggregator::new(
            Arc::new(AllPositiveClassifier),
            Arc::new(CyclingPerturbation { origin: TabularInstance::new(vec! [1, 1]) }),
            ConstructionOptions {
                tau: 0.8,
                init_sample_count: 10,
                ..Default::default()
            }
        ).unwrap()
    }

    #[test]
    fn explains_every_instance() {
        let instances = vec! [
            TabularInstance::new(vec! [1, 1]),
            TabularInstance::new(vec! [5, 5]),
            TabularInstance::new(vec! [1, -7])
        ];
        let results = aggregator().with_worker_count(2).explain(&instances);

        assert_eq!(results.len(), 3);

        for result in &results {
            assert!(result.precision() > 0.0);
        }
    }

    #[test]
    fn global_pick_returns_at_most_count_results() {
        let instances = vec! [
            TabularInstance::new(vec! [1, 1]),
            TabularInstance::new(vec! [2, 2]),
            TabularInstance::new(vec! [3, 3]),
            TabularInstance::new(vec! [4, 4])
        ];
        let picked = aggregator().with_worker_count(2).explain_global(&instances, 2);

        assert!(picked.len() <= 2);
        assert!(!picked.is_empty());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(aggregator().explain(&[]).is_empty());
    }
}
