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
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::AnchorError;

/// A conjunction of feature predicates under evaluation during beam search.
///
/// The ordered feature list encodes the path by which the conjunction was
/// grown, the canonical (sorted) set is what equality and containment are
/// defined over. Every candidate except the roots points at the parent it
/// was derived from, forming an acyclic child-to-parent chain that the
/// global phase walks when attributing importance.
///
/// Sample statistics are shared between worker threads: the pair `(N, K)`
/// is packed into a single 64-bit atomic (N in the high half, K in the low
/// half) and updated by compare-and-swap, so readers always observe a
/// consistent pair and the derived precision can never exceed one.
pub struct Candidate {
    ordered_features: Vec<usize>,
    canonical: BTreeSet<usize>,
    parent: Option<Arc<Candidate>>,

    /// `sampled_size` in the high 32 bits, `positive_samples` in the low.
    stats: AtomicU64,

    /// Write-once fraction of the perturbation distribution matching this
    /// conjunction.
    coverage: OnceLock<f64>
}

fn pack(sampled_size: u32, positive_samples: u32) -> u64 {
    ((sampled_size as u64) << 32) | positive_samples as u64
}

fn unpack(stats: u64) -> (u32, u32) {
    ((stats >> 32) as u32, stats as u32)
}

impl Candidate {
    /// Creates a candidate over the given ordered features, validating the
    /// data-model invariants against the parent.
    ///
    /// # Arguments
    ///
    /// * `ordered_features` - the features in the order they were added
    /// * `parent` - the rule one feature shorter this one was derived from,
    ///   or `None` for a root candidate
    ///
    pub fn new(ordered_features: Vec<usize>, parent: Option<Arc<Candidate>>) -> Result<Self, AnchorError> {
        if ordered_features.is_empty() {
            return Err(AnchorError::InvalidCandidate("empty feature list".into()));
        }

        let canonical = ordered_features.iter().cloned().collect::<BTreeSet<_>>();

        if canonical.len() != ordered_features.len() {
            return Err(AnchorError::InvalidCandidate(format!(
                "duplicate feature in {:?}",
                ordered_features
            )));
        }

        match &parent {
            None => {
                if ordered_features.len() != 1 {
                    return Err(AnchorError::InvalidCandidate(format!(
                        "root candidate must contain exactly one feature, got {:?}",
                        ordered_features
                    )));
                }
            },
            Some(parent) => {
                if canonical.len() != parent.canonical.len() + 1 || !canonical.is_superset(&parent.canonical) {
                    return Err(AnchorError::InvalidCandidate(format!(
                        "{:?} does not extend its parent {:?} by exactly one feature",
                        ordered_features,
                        parent.ordered_features
                    )));
                }
            }
        }

        Ok(Self {
            ordered_features,
            canonical,
            parent,
            stats: AtomicU64::new(0),
            coverage: OnceLock::new()
        })
    }

    /// Creates the candidate that extends `parent` by one more feature.
    ///
    /// # Arguments
    ///
    /// * `parent` -
    /// * `feature` - the feature to add, must not already be present
    ///
    pub fn extend(parent: &Arc<Candidate>, feature: usize) -> Result<Self, AnchorError> {
        let mut ordered_features = parent.ordered_features.clone();
        ordered_features.push(feature);

        Self::new(ordered_features, Some(parent.clone()))
    }

    /// Atomically adds `delta_n` samples of which `delta_k` matched the
    /// explained label.
    ///
    /// # Arguments
    ///
    /// * `delta_n` - the number of samples taken
    /// * `delta_k` - the number of those samples whose label matched
    ///
    pub fn register_samples(&self, delta_n: u32, delta_k: u32) -> Result<(), AnchorError> {
        if delta_k > delta_n {
            return Err(AnchorError::InvalidCounts { delta_n, delta_k });
        }

        let mut current = self.stats.load(Ordering::Relaxed);

        loop {
            let (sampled_size, positive_samples) = unpack(current);
            let new_sampled_size = sampled_size.checked_add(delta_n).ok_or_else(|| {
                AnchorError::InvalidArgument(format!(
                    "sample count overflow, {} + {}",
                    sampled_size, delta_n
                ))
            })?;
            let next = pack(new_sampled_size, positive_samples + delta_k);

            match self.stats.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed
            }
        }
    }

    /// Sets the coverage of this candidate. Coverage can be set at most
    /// once and must lie in `[0, 1]`.
    ///
    /// # Arguments
    ///
    /// * `coverage` -
    ///
    pub fn set_coverage(&self, coverage: f64) -> Result<(), AnchorError> {
        if !(0.0..=1.0).contains(&coverage) {
            return Err(AnchorError::InvalidArgument(format!(
                "coverage {} is outside [0, 1]",
                coverage
            )));
        }

        self.coverage
            .set(coverage)
            .map_err(|_| AnchorError::CoverageAlreadySet(*self.coverage.get().unwrap()))
    }

    /// Returns `(N, K)` as a consistent snapshot.
    fn snapshot(&self) -> (u32, u32) {
        unpack(self.stats.load(Ordering::Acquire))
    }

    /// Returns the fraction of samples whose label matched, or zero if no
    /// samples have been registered yet.
    pub fn precision(&self) -> f64 {
        let (sampled_size, positive_samples) = self.snapshot();

        if sampled_size == 0 {
            0.0
        } else {
            positive_samples as f64 / sampled_size as f64
        }
    }

    pub fn sampled_size(&self) -> u64 {
        self.snapshot().0 as u64
    }

    pub fn positive_samples(&self) -> u64 {
        self.snapshot().1 as u64
    }

    pub fn coverage(&self) -> Option<f64> {
        self.coverage.get().cloned()
    }

    /// Returns the precision gained over the parent rule, or zero for a
    /// root candidate.
    pub fn added_precision(&self) -> f64 {
        match &self.parent {
            None => 0.0,
            Some(parent) => self.precision() - parent.precision()
        }
    }

    /// Returns the ratio of this candidate's coverage to its parent's, or
    /// one for a root candidate. Coverage of both ends of the ratio is
    /// expected to have been computed by the time this is called; the ratio
    /// degrades to one when it has not, and when the parent's coverage is
    /// zero.
    pub fn added_coverage_ratio(&self) -> f64 {
        let parent = match &self.parent {
            None => return 1.0,
            Some(parent) => parent
        };

        match (self.coverage(), parent.coverage()) {
            (Some(own), Some(above)) if above > 0.0 => own / above,
            _ => 1.0
        }
    }

    pub fn ordered_features(&self) -> &[usize] {
        &self.ordered_features
    }

    pub fn canonical_features(&self) -> &BTreeSet<usize> {
        &self.canonical
    }

    pub fn parent(&self) -> Option<&Arc<Candidate>> {
        self.parent.as_ref()
    }

    pub fn feature_count(&self) -> usize {
        self.ordered_features.len()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (sampled_size, positive_samples) = self.snapshot();

        f.debug_struct("Candidate")
            .field("features", &self.ordered_features)
            .field("sampled_size", &sampled_size)
            .field("positive_samples", &positive_samples)
            .field("coverage", &self.coverage())
            .finish()
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;

        for (i, feature) in self.ordered_features.iter().enumerate() {
            if i > 0 {
                write!(f, " & ")?;
            }
            write!(f, "x{}", feature)?;
        }

        write!(f, "}}")
    }
}
