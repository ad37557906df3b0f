// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
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

use crate::error::AnchorError;
use crate::instance::DataInstance;
use crate::perturb::PerturbationFunction;

/// Estimates the fraction of the perturbation distribution that a feature
/// set matches.
pub trait CoverageEstimator: Send + Sync {
    /// Returns the coverage of the given feature set, in `[0, 1]`.
    ///
    /// # Arguments
    ///
    /// * `features` -
    ///
    fn coverage(&self, features: &BTreeSet<usize>) -> f64;
}

/// Coverage estimated against the perturbation distribution itself: a table
/// of change masks is drawn once, with no features held fixed, and the
/// coverage of a feature set is the fraction of masks that left all of its
/// features untouched. The table is immutable after construction so queries
/// need no lock.
pub struct PerturbationBasedCoverage {
    masks: Vec<Vec<bool>>
}

impl PerturbationBasedCoverage {
    /// Pre-samples `sample_count` perturbations and records their change
    /// masks.
    ///
    /// # Arguments
    ///
    /// * `perturbation` - the distribution to sample from
    /// * `sample_count` - the number of masks to draw
    ///
    pub fn new<I: DataInstance>(
        perturbation: &dyn PerturbationFunction<I>,
        sample_count: usize
    ) -> Result<Self, AnchorError>
    {
        let result = perturbation.perturb(&BTreeSet::new(), sample_count)?;

        Ok(Self::with_masks(result.changed))
    }

    /// Wraps an already materialized mask table.
    ///
    /// # Arguments
    ///
    /// * `masks` -
    ///
    pub fn with_masks(masks: Vec<Vec<bool>>) -> Self {
        Self { masks }
    }

    pub fn sample_count(&self) -> usize {
        self.masks.len()
    }
}

impl CoverageEstimator for PerturbationBasedCoverage {
    fn coverage(&self, features: &BTreeSet<usize>) -> f64 {
        if self.masks.is_empty() {
            return 0.0;
        }

        let matching = self.masks.iter()
            .filter(|mask| features.iter().all(|&f| !mask.get(f).cloned().unwrap_or(false)))
            .count();

        matching as f64 / self.masks.len() as f64
    }
}
