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

/// A batch of perturbed instances together with, for each instance, a mask
/// over the features recording which of them differ from the origin.
pub struct PerturbationResult<I> {
    pub instances: Vec<I>,
    pub changed: Vec<Vec<bool>>
}

impl<I> PerturbationResult<I> {
    /// Wraps the instances and their change masks, checking that the two
    /// have matching lengths.
    ///
    /// # Arguments
    ///
    /// * `instances` -
    /// * `changed` - one mask per instance, `changed[i][f]` is true iff
    ///   perturbation `i` differs from the origin on feature `f`
    ///
    pub fn new(instances: Vec<I>, changed: Vec<Vec<bool>>) -> Result<Self, AnchorError> {
        if instances.len() != changed.len() {
            return Err(AnchorError::InvalidArgument(format!(
                "{} perturbed instances but {} change masks",
                instances.len(),
                changed.len()
            )));
        }

        Ok(Self { instances, changed })
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// The user supplied perturbation distribution. Implementations must
/// preserve the immutable features exactly, failure to do so corrupts every
/// precision estimate built on top of them.
pub trait PerturbationFunction<I: DataInstance>: Send + Sync {
    /// Draws `count` perturbations of the origin instance that hold every
    /// feature in `immutable_features` fixed.
    ///
    /// # Arguments
    ///
    /// * `immutable_features` - the features that must not change
    /// * `count` - the number of perturbations to produce
    ///
    fn perturb(&self, immutable_features: &BTreeSet<usize>, count: usize)
        -> Result<PerturbationResult<I>, AnchorError>;

    /// Returns a copy of this perturbation function centered on a new
    /// origin instance. Used by the global aggregator before each
    /// per-instance run.
    ///
    /// # Arguments
    ///
    /// * `origin` - the instance the returned function perturbs around
    ///
    fn reconfigure(&self, origin: &I) -> Box<dyn PerturbationFunction<I>>;
}
