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

use anchors_core::AnchorError;

/// The recognized knobs of the anchor constructor. Every field has a named
/// default, so a caller usually writes
/// `ConstructionOptions { beam_size: 4, ..Default::default() }`.
#[derive(Clone, Debug)]
pub struct ConstructionOptions {
    /// The tolerated probability of identifying a wrong candidate set, in
    /// `(0, 1]`.
    pub delta: f64,

    /// The tolerated shortfall between the chosen candidates and the true
    /// best ones, in `(0, 1]`.
    pub epsilon: f64,

    /// The precision a rule must reach to count as an anchor, in `(0, 1]`.
    pub tau: f64,

    /// The slack allowed between the empirical mean and its confidence
    /// bound when verifying the anchor predicate, in `(0, 1]`.
    pub tau_discrepancy: f64,

    /// The number of candidates carried from one round to the next.
    pub beam_size: usize,

    /// The largest number of features an anchor may contain. `None` means
    /// the feature count of the explained instance.
    pub max_anchor_size: Option<usize>,

    /// The minimum number of samples a candidate holds before the bandit
    /// runs, and the batch size of the verification loop.
    pub init_sample_count: usize,

    /// When true, coverage is only computed at extension and return time
    /// instead of for every generated candidate.
    pub lazy_coverage: bool,

    /// When false, candidates whose precision fell below their parent's are
    /// pruned before the end of the round.
    pub allow_suboptimal_steps: bool
}

impl Default for ConstructionOptions {
    fn default() -> Self {
        Self {
            delta: 0.1,
            epsilon: 0.1,
            tau: 1.0,
            tau_discrepancy: 0.05,
            beam_size: 2,
            max_anchor_size: None,
            init_sample_count: 1,
            lazy_coverage: false,
            allow_suboptimal_steps: true
        }
    }
}

impl ConstructionOptions {
    /// Checks every field against its defined range.
    pub fn validate(&self) -> Result<(), AnchorError> {
        fn check_unit(name: &str, value: f64) -> Result<(), AnchorError> {
            if value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(AnchorError::InvalidArgument(format!("{} {} is outside (0, 1]", name, value)))
            }
        }

        check_unit("delta", self.delta)?;
        check_unit("epsilon", self.epsilon)?;
        check_unit("tau", self.tau)?;
        check_unit("tau_discrepancy", self.tau_discrepancy)?;

        if self.beam_size == 0 {
            return Err(AnchorError::InvalidArgument("beam_size must be at least one".into()));
        }
        if self.init_sample_count == 0 {
            return Err(AnchorError::InvalidArgument("init_sample_count must be at least one".into()));
        }
        if self.max_anchor_size == Some(0) {
            return Err(AnchorError::InvalidArgument("max_anchor_size must be at least one".into()));
        }

        Ok(())
    }
}
