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

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use log::debug;

use anchors_core::{
    AnchorError, AnchorResult, Candidate, ClassificationFunction, CoverageEstimator, DataInstance,
    Label, PerturbationBasedCoverage, PerturbationFunction
};
use anchors_utils::config;

use crate::bandit::{kl, BestArmIdentification};
use crate::options::ConstructionOptions;
use crate::sampling::{ExecutionStrategy, LinearExecution, SamplingService};

/// The phase the beam search is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SearchState {
    /// Still extending the beam.
    Searching,

    /// A rule passed the anchor predicate.
    FoundAnchor,

    /// No extension survived the shortlist, or the rule length limit was
    /// reached without a verified anchor.
    Exhausted,

    /// Not even a rule with positive precision exists.
    Failed
}

/// Beam search over feature conjunctions: each round extends the best rules
/// of the previous round by one feature, shortlists the extensions with a
/// bandit, and verifies the shortlist against the target precision until a
/// minimal high-precision rule is found.
pub struct AnchorConstruction<I: DataInstance> {
    perturbation: Arc<dyn PerturbationFunction<I>>,
    coverage: Option<Arc<dyn CoverageEstimator>>,
    sampling: SamplingService<I>,
    bandit: BestArmIdentification,
    options: ConstructionOptions,
    instance: I,
    label: Label
}

impl<I: DataInstance> AnchorConstruction<I> {
    /// Creates a construction run for one instance and its predicted
    /// label, with linear sampling, the default bandit, and a perturbation
    /// based coverage estimator.
    ///
    /// # Arguments
    ///
    /// * `classifier` -
    /// * `perturbation` -
    /// * `instance` - the instance being explained
    /// * `label` - the label the classifier assigned to it
    /// * `options` -
    ///
    pub fn new(
        classifier: Arc<dyn ClassificationFunction<I>>,
        perturbation: Arc<dyn PerturbationFunction<I>>,
        instance: I,
        label: Label,
        options: ConstructionOptions
    ) -> Result<Self, AnchorError>
    {
        options.validate()?;

        if instance.feature_count() == 0 {
            return Err(AnchorError::InvalidArgument("instance has no features".into()));
        }

        let sampling = SamplingService::new(
            classifier,
            perturbation.clone(),
            Box::new(LinearExecution::default())
        );

        Ok(Self {
            perturbation,
            coverage: None,
            sampling,
            bandit: BestArmIdentification::default(),
            options,
            instance,
            label
        })
    }

    /// Replaces the default perturbation based coverage estimator.
    pub fn with_coverage_estimator(mut self, coverage: Arc<dyn CoverageEstimator>) -> Self {
        self.coverage = Some(coverage);
        self
    }

    /// Replaces the default bandit identifier.
    pub fn with_bandit(mut self, bandit: BestArmIdentification) -> Self {
        self.bandit = bandit;
        self
    }

    /// Replaces the default linear execution strategy.
    pub fn with_execution<S>(mut self, strategy: S) -> Self
        where S: ExecutionStrategy<I> + 'static
    {
        self.sampling.set_strategy(Box::new(strategy));
        self
    }

    /// Runs the beam search and returns the best rule found. The result is
    /// flagged `is_anchor` iff its verified precision reached the target;
    /// otherwise the single best candidate encountered is returned as a
    /// best effort.
    pub fn construct(self) -> Result<AnchorResult<I>, AnchorError> {
        let start = Instant::now();
        let feature_count = self.instance.feature_count();
        let coverage: Arc<dyn CoverageEstimator> = match &self.coverage {
            Some(coverage) => coverage.clone(),
            None => Arc::new(PerturbationBasedCoverage::new(
                self.perturbation.as_ref(),
                *config::COVERAGE_SAMPLE_COUNT
            )?)
        };
        let max_rounds = self.options.max_anchor_size.unwrap_or(feature_count).min(feature_count);
        let mut all_candidates: Vec<Arc<Candidate>> = vec! [];
        let mut best_anchor: Option<Arc<Candidate>> = None;
        let mut beam: Vec<Arc<Candidate>> = vec! [];
        let mut state = SearchState::Searching;
        let mut round = 1;

        while state == SearchState::Searching && round <= max_rounds {
            let candidates = self.generate_candidates(
                &beam,
                feature_count,
                coverage.as_ref(),
                best_anchor.as_ref()
            )?;

            if candidates.is_empty() {
                state = SearchState::Exhausted;
                break;
            }

            all_candidates.extend(candidates.iter().cloned());
            self.pre_sample(&candidates)?;

            let shortlist = if candidates.len() <= self.options.beam_size {
                candidates
            } else {
                self.bandit.identify(
                    &candidates,
                    &self.sampling,
                    self.label,
                    self.options.epsilon,
                    self.options.delta,
                    self.options.beam_size
                )?
            };

            // rules that explain nothing, or that made the rule worse than
            // the one they extend, are dead ends
            let shortlist = shortlist.into_iter()
                .filter(|c| c.precision() > 0.0)
                .filter(|c| self.options.allow_suboptimal_steps || c.is_root() || c.added_precision() > 0.0)
                .collect::<Vec<_>>();

            if shortlist.is_empty() {
                state = SearchState::Exhausted;
                break;
            }

            for candidate in &shortlist {
                let is_valid = self.verify(candidate, feature_count)?;

                ensure_coverage(candidate, coverage.as_ref())?;

                if is_valid {
                    let replace = match &best_anchor {
                        None => true,
                        Some(best) => {
                            candidate.coverage().unwrap_or(0.0) > best.coverage().unwrap_or(0.0)
                        }
                    };

                    if replace {
                        best_anchor = Some((*candidate).clone());
                    }
                }
            }

            debug!(
                "round {}: beam of {} candidate(s), best anchor {:?}",
                round,
                shortlist.len(),
                best_anchor.as_ref().map(|b| b.to_string())
            );

            if best_anchor.as_ref().and_then(|b| b.coverage()) == Some(1.0) {
                state = SearchState::FoundAnchor;
                break;
            }

            beam = shortlist;
            round += 1;
        }

        if state == SearchState::Searching {
            state = if best_anchor.is_some() { SearchState::FoundAnchor } else { SearchState::Exhausted };
        }

        match best_anchor {
            Some(best) => {
                debug!("returning {} in state {:?}", best, state);
                Ok(self.into_result(best, true, start))
            },
            None => match self.best_effort(&all_candidates, coverage.as_ref())? {
                Some(best) => {
                    debug!("no anchor met the target, returning best effort {} in state {:?}", best, state);
                    Ok(self.into_result(best, false, start))
                },
                None => {
                    state = SearchState::Failed;
                    debug!("no candidate with positive precision, state {:?}", state);
                    Err(AnchorError::NoCandidateFound)
                }
            }
        }
    }

    /// Like `construct`, but a best-effort result is an error that carries
    /// the best candidate instead of a result with `is_anchor` unset.
    pub fn construct_required(self) -> Result<AnchorResult<I>, AnchorError> {
        let result = self.construct()?;

        if result.is_anchor() {
            Ok(result)
        } else {
            Err(AnchorError::NoAnchorFound { best: result.candidate().clone() })
        }
    }

    /// Produces every one-feature extension of the beam, deduplicated by
    /// canonical feature set, minus the ones whose coverage already fell
    /// below the best verified anchor.
    fn generate_candidates(
        &self,
        beam: &[Arc<Candidate>],
        feature_count: usize,
        coverage: &dyn CoverageEstimator,
        best_anchor: Option<&Arc<Candidate>>
    ) -> Result<Vec<Arc<Candidate>>, AnchorError>
    {
        let mut seen = HashSet::new();
        let mut out = vec! [];

        if beam.is_empty() {
            for feature in 0..feature_count {
                out.push(Arc::new(Candidate::new(vec! [feature], None)?));
            }
        } else {
            for parent in beam {
                for feature in 0..feature_count {
                    if parent.canonical_features().contains(&feature) {
                        continue;
                    }

                    let mut canonical = parent.canonical_features().clone();
                    canonical.insert(feature);

                    if seen.insert(canonical) {
                        out.push(Arc::new(Candidate::extend(parent, feature)?));
                    }
                }
            }
        }

        if !self.options.lazy_coverage {
            for candidate in &out {
                ensure_coverage(candidate, coverage)?;
            }
        }

        if let Some(best_coverage) = best_anchor.and_then(|best| best.coverage()) {
            let mut kept = Vec::with_capacity(out.len());

            for candidate in out {
                ensure_coverage(&candidate, coverage)?;

                if candidate.coverage().unwrap_or(0.0) >= best_coverage {
                    kept.push(candidate);
                }
            }

            return Ok(kept);
        }

        Ok(out)
    }

    /// Tops every candidate up to `init_sample_count` samples so the
    /// precision filters and the bandit have something to work with.
    fn pre_sample(&self, candidates: &[Arc<Candidate>]) -> Result<(), AnchorError> {
        let mut session = self.sampling.session(self.label);

        for candidate in candidates {
            let deficit = (self.options.init_sample_count as u64).saturating_sub(candidate.sampled_size());

            if deficit > 0 {
                session.register(candidate, deficit as usize);
            }
        }

        if !session.is_empty() {
            session.run()?;
        }

        Ok(())
    }

    /// Verifies the anchor predicate: samples in batches until the KL
    /// bounds place the mean decisively on one side of the target
    /// precision. Returns whether the rule is a valid anchor.
    fn verify(&self, candidate: &Arc<Candidate>, feature_count: usize) -> Result<bool, AnchorError> {
        let options = &self.options;
        let beta = ((1.0 + (options.beam_size - 1) as f64 * feature_count as f64) / options.delta).ln();

        loop {
            let mean = candidate.precision();
            let sampled = candidate.sampled_size();
            let level = if sampled == 0 { f64::INFINITY } else { beta / sampled as f64 };

            if mean >= options.tau {
                if kl::lower_bound(mean, level) > options.tau - options.tau_discrepancy {
                    return Ok(true);
                }
            } else if kl::upper_bound(mean, level) < options.tau + options.tau_discrepancy {
                return Ok(false);
            }

            let mut session = self.sampling.session(self.label);
            session.register(candidate, options.init_sample_count);
            session.run()?;
        }
    }

    /// One last bandit pass over every candidate ever generated, returning
    /// the single best one if it explains anything at all.
    fn best_effort(
        &self,
        all_candidates: &[Arc<Candidate>],
        coverage: &dyn CoverageEstimator
    ) -> Result<Option<Arc<Candidate>>, AnchorError>
    {
        if all_candidates.is_empty() {
            return Ok(None);
        }

        let top = self.bandit.identify(
            all_candidates,
            &self.sampling,
            self.label,
            self.options.epsilon,
            self.options.delta,
            1
        )?;

        match top.into_iter().next() {
            Some(best) if best.precision() > 0.0 => {
                ensure_coverage(&best, coverage)?;
                Ok(Some(best))
            },
            _ => Ok(None)
        }
    }

    fn into_result(self, candidate: Arc<Candidate>, is_anchor: bool, start: Instant) -> AnchorResult<I> {
        let time_spent_sampling = self.sampling.time_spent_sampling();

        AnchorResult::new(
            candidate,
            self.instance,
            self.label,
            is_anchor,
            start.elapsed(),
            time_spent_sampling
        )
    }
}

/// Computes and records the candidate's coverage if it has none yet. A
/// concurrent writer winning the race is fine, the value is identical.
fn ensure_coverage(candidate: &Arc<Candidate>, estimator: &dyn CoverageEstimator) -> Result<(), AnchorError> {
    if candidate.coverage().is_none() {
        match candidate.set_coverage(estimator.coverage(candidate.canonical_features())) {
            Ok(()) | Err(AnchorError::CoverageAlreadySet(_)) => {},
            Err(error) => return Err(error)
        }
    }

    Ok(())
}
