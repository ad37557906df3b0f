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

use std::sync::Arc;

use thiserror::Error;

use crate::candidate::Candidate;

/// A collaborator failure, boxed so that any classifier or perturbation
/// implementation can surface its own error type.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All faults surfaced by the explanation engine. Bandits and the sampling
/// service recover from none of these locally, they propagate to the
/// constructor and from there to the caller.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// A numeric parameter is outside its defined range, a candidate was
    /// given an empty feature list, a count was negative, or a classifier
    /// returned a batch of the wrong size.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A candidate construction violated the data-model invariants. This is
    /// a bug in the calling code, not bad user input.
    #[error("invalid candidate: {0}")]
    InvalidCandidate(String),

    /// More positive samples than total samples were registered.
    #[error("registered {delta_k} positive samples out of only {delta_n} total")]
    InvalidCounts { delta_n: u32, delta_k: u32 },

    /// `set_coverage` was called a second time on the same candidate.
    #[error("coverage has already been set to {0}")]
    CoverageAlreadySet(f64),

    /// The constructor could not find any rule with positive precision.
    #[error("no candidate with positive precision was found")]
    NoCandidateFound,

    /// A best candidate exists but none reached the target precision. The
    /// best candidate found is attached.
    #[error("no anchor reached the target precision, best candidate was {best}")]
    NoAnchorFound { best: Arc<Candidate> },

    /// The worker pool was canceled while sampling was in flight.
    #[error("sampling was interrupted")]
    Interrupted,

    /// The classification function failed.
    #[error("classifier failed")]
    Classifier(#[source] SourceError),

    /// The perturbation function failed.
    #[error("perturbation failed")]
    Perturbation(#[source] SourceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_counts() {
        let message = format!("{}", AnchorError::InvalidCounts { delta_n: 3, delta_k: 5 });

        assert!(message.contains("5"), "{}", message);
        assert!(message.contains("3"), "{}", message);
    }

    #[test]
    fn classifier_error_preserves_source() {
        use std::error::Error;

        let inner: SourceError = "gpu fell off the bus".into();
        let error = AnchorError::Classifier(inner);

        assert!(error.source().is_some());
    }
}
