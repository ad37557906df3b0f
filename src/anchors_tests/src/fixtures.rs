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

use std::collections::BTreeSet;
use std::sync::Mutex;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use anchors_core::{
    AnchorError, ClassificationFunction, DataInstance, Label, PerturbationFunction,
    PerturbationResult, TabularInstance
};

/// Labels an instance `1` iff both coordinates are strictly positive.
pub struct QuadrantClassifier;

impl ClassificationFunction<TabularInstance> for QuadrantClassifier {
    fn predict(&self, instance: &TabularInstance) -> Result<Label, AnchorError> {
        Ok(if instance.values().iter().all(|&v| v > 0) { 1 } else { 0 })
    }
}

/// Perturbs each mutable feature by an independent uniform integer offset
/// in `[-5, 5]`, drawn from a seeded generator so runs are reproducible.
pub struct UniformOffsetPerturbation {
    origin: TabularInstance,
    rng: Mutex<SmallRng>
}

impl UniformOffsetPerturbation {
    pub fn new(origin: TabularInstance, seed: u64) -> Self {
        Self {
            origin,
            rng: Mutex::new(SmallRng::seed_from_u64(seed))
        }
    }
}

impl PerturbationFunction<TabularInstance> for UniformOffsetPerturbation {
    fn perturb(&self, immutable_features: &BTreeSet<usize>, count: usize)
        -> Result<PerturbationResult<TabularInstance>, AnchorError>
    {
        let feature_count = self.origin.feature_count();
        let mut rng = self.rng.lock().expect("could not acquire rng lock");
        let mut instances = Vec::with_capacity(count);
        let mut changed = Vec::with_capacity(count);

        for _ in 0..count {
            let mut values = Vec::with_capacity(feature_count);
            let mut mask = Vec::with_capacity(feature_count);

            for f in 0..feature_count {
                if immutable_features.contains(&f) {
                    values.push(self.origin.value(f));
                    mask.push(false);
                } else {
                    let offset = rng.gen_range(-5i64..=5);

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
        let seed = self.rng.lock().expect("could not acquire rng lock").gen();

        Box::new(Self::new(origin.clone(), seed))
    }
}
