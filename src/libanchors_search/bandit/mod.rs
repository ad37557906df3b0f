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

//! Best-arm identification over noisy candidate precisions.

mod batch_racing;
mod batch_sar;
pub mod kl;
mod kl_lucb;

use std::sync::Arc;

use ordered_float::OrderedFloat;

use anchors_core::{AnchorError, Candidate, DataInstance, Label};
use anchors_utils::config;

use crate::sampling::SamplingService;

/// The recognized best-arm identification algorithms. Given candidates with
/// noisy precision estimates, each returns the top `top_n` of them with a
/// probabilistic `(epsilon, delta)` guarantee, drawing whatever additional
/// samples it needs through the sampling service.
#[derive(Clone, Debug)]
pub enum BestArmIdentification {
    /// Fixed-confidence identification with Bernoulli KL confidence bounds,
    /// sampling the weakest member of the current top set and its strongest
    /// challenger each iteration. May loop for a long time under
    /// pathological noise; callers bound the total number of batches
    /// externally.
    KlLucb {
        /// The number of samples added to each of the two focus arms per
        /// iteration.
        batch_size: usize
    },

    /// Fixed-confidence racing with batched, uniform arm pulls. Accepts and
    /// rejects arms as their deviation bounds separate. Ignores `epsilon`.
    BatchRacing {
        /// The total number of samples pulled per round.
        batch_size: usize,

        /// The cap on samples any one arm receives within a round.
        round_cap: usize
    },

    /// Fixed-budget successive-accepts-rejects with batched pulls. Spends
    /// `batch_budget` batches of `batch_size` samples, eliminating one arm
    /// per round.
    BatchSar {
        /// The total number of batches to spend.
        batch_budget: usize,

        /// The number of samples per batch.
        batch_size: usize,

        /// The cap on samples any one arm receives within a batch.
        round_cap: usize
    }
}

impl Default for BestArmIdentification {
    fn default() -> Self {
        BestArmIdentification::KlLucb { batch_size: *config::SAMPLE_BATCH_SIZE }
    }
}

impl BestArmIdentification {
    /// Returns the top `top_n` candidates by precision. If fewer than
    /// `top_n` candidates are supplied they are all returned without any
    /// sampling.
    ///
    /// # Arguments
    ///
    /// * `arms` - the candidates to choose between
    /// * `service` - the sampling service used to draw additional samples
    /// * `label` - the label whose precision is being estimated
    /// * `epsilon` - the tolerated gap between the chosen arms and the true
    ///   top arms
    /// * `delta` - the tolerated probability of a wrong selection
    /// * `top_n` - how many arms to select
    ///
    pub fn identify<I: DataInstance>(
        &self,
        arms: &[Arc<Candidate>],
        service: &SamplingService<I>,
        label: Label,
        epsilon: f64,
        delta: f64,
        top_n: usize
    ) -> Result<Vec<Arc<Candidate>>, AnchorError>
    {
        if delta <= 0.0 || delta > 1.0 {
            return Err(AnchorError::InvalidArgument(format!("delta {} is outside (0, 1]", delta)));
        }
        if epsilon <= 0.0 || epsilon > 1.0 {
            return Err(AnchorError::InvalidArgument(format!("epsilon {} is outside (0, 1]", epsilon)));
        }
        if top_n == 0 {
            return Ok(vec! []);
        }
        if arms.len() <= top_n {
            return Ok(arms.to_vec());
        }

        match *self {
            BestArmIdentification::KlLucb { batch_size } => {
                kl_lucb::identify(arms, service, label, epsilon, delta, top_n, batch_size)
            },
            BestArmIdentification::BatchRacing { batch_size, round_cap } => {
                batch_racing::identify(arms, service, label, delta, top_n, batch_size, round_cap)
            },
            BestArmIdentification::BatchSar { batch_budget, batch_size, round_cap } => {
                batch_sar::identify(arms, service, label, top_n, batch_budget, batch_size, round_cap)
            }
        }
    }
}

/// Returns the arm indices sorted by precision in ascending order. The sort
/// is stable, so equal precisions keep their index order.
///
/// # Arguments
///
/// * `precisions` -
///
pub(crate) fn rank_ascending(precisions: &[f64]) -> Vec<usize> {
    let mut order = (0..precisions.len()).collect::<Vec<_>>();
    order.sort_by_key(|&i| OrderedFloat(precisions[i]));
    order
}

/// Returns the `top_n` arms with the highest precision, best first.
///
/// # Arguments
///
/// * `arms` -
/// * `top_n` -
///
pub(crate) fn top_by_precision(arms: &[Arc<Candidate>], top_n: usize) -> Vec<Arc<Candidate>> {
    let precisions = arms.iter().map(|arm| arm.precision()).collect::<Vec<_>>();

    rank_ascending(&precisions).iter()
        .rev()
        .take(top_n)
        .map(|&i| arms[i].clone())
        .collect()
}
