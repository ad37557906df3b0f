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
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::candidate::Candidate;
use crate::classify::Label;
use crate::instance::DataInstance;

/// The outcome of one anchor construction: the winning candidate together
/// with the explained instance, its label, whether the rule was verified as
/// an anchor, and timing metadata. The candidate's statistics are copied by
/// value at construction time so the result stays stable even if the
/// candidate is sampled further.
pub struct AnchorResult<I: DataInstance> {
    candidate: Arc<Candidate>,
    instance: I,
    label: Label,
    is_anchor: bool,
    precision: f64,
    coverage: f64,
    sampled_size: u64,
    positive_samples: u64,
    time_to_result: Duration,
    time_spent_sampling: Duration
}

impl<I: DataInstance> AnchorResult<I> {
    /// Snapshots the candidate into a result.
    ///
    /// # Arguments
    ///
    /// * `candidate` - the winning rule; its coverage is expected to have
    ///   been computed by the constructor before this point
    /// * `instance` - the explained instance
    /// * `label` - the label being explained
    /// * `is_anchor` - whether the confidence-verified precision reached
    ///   the target
    /// * `time_to_result` - total wall time of the construction
    /// * `time_spent_sampling` - wall time spent inside sampling sessions
    ///
    pub fn new(
        candidate: Arc<Candidate>,
        instance: I,
        label: Label,
        is_anchor: bool,
        time_to_result: Duration,
        time_spent_sampling: Duration
    ) -> Self
    {
        let precision = candidate.precision();
        let coverage = candidate.coverage().unwrap_or(0.0);
        let sampled_size = candidate.sampled_size();
        let positive_samples = candidate.positive_samples();

        Self {
            candidate,
            instance,
            label,
            is_anchor,
            precision,
            coverage,
            sampled_size,
            positive_samples,
            time_to_result,
            time_spent_sampling
        }
    }

    /// Returns the winning candidate, whose parent chain links back to the
    /// root rule it was grown from.
    pub fn candidate(&self) -> &Arc<Candidate> {
        &self.candidate
    }

    pub fn instance(&self) -> &I {
        &self.instance
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn is_anchor(&self) -> bool {
        self.is_anchor
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    pub fn coverage(&self) -> f64 {
        self.coverage
    }

    pub fn sampled_size(&self) -> u64 {
        self.sampled_size
    }

    pub fn positive_samples(&self) -> u64 {
        self.positive_samples
    }

    pub fn time_to_result(&self) -> Duration {
        self.time_to_result
    }

    pub fn time_spent_sampling(&self) -> Duration {
        self.time_spent_sampling
    }

    pub fn ordered_features(&self) -> &[usize] {
        self.candidate.ordered_features()
    }

    pub fn canonical_features(&self) -> &BTreeSet<usize> {
        self.candidate.canonical_features()
    }
}

impl<I: DataInstance> fmt::Display for AnchorResult<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} with precision {:.4} and coverage {:.4} ({})",
            self.candidate,
            self.precision,
            self.coverage,
            if self.is_anchor { "anchor" } else { "best effort" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::TabularInstance;

    #[test]
    fn statistics_are_copied_by_value() {
        let candidate = Arc::new(Candidate::new(vec! [0], None).unwrap());
        candidate.register_samples(10, 9).unwrap();
        candidate.set_coverage(0.5).unwrap();

        let result = AnchorResult::new(
            candidate.clone(),
            TabularInstance::new(vec! [1, 2]),
            1,
            true,
            Duration::from_millis(12),
            Duration::from_millis(7)
        );

        // later samples must not move the recorded statistics
        candidate.register_samples(10, 0).unwrap();

        assert_eq!(result.precision(), 0.9);
        assert_eq!(result.sampled_size(), 10);
        assert_eq!(result.positive_samples(), 9);
        assert_eq!(result.coverage(), 0.5);
        assert!(result.is_anchor());
        assert_eq!(result.label(), 1);
    }
}
