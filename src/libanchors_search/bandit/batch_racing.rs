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

use std::sync::Arc;

use ordered_float::OrderedFloat;

use anchors_core::{AnchorError, Candidate, DataInstance, Label};

use crate::sampling::SamplingService;
use super::top_by_precision;

/// Returns the deviation of an arm's empirical mean after `sampled_size`
/// pulls, at confidence `delta` over `num_arms` arms.
///
/// # Arguments
///
/// * `sampled_size` -
/// * `delta` -
/// * `num_arms` -
///
fn deviation(sampled_size: u64, delta: f64, num_arms: usize) -> f64 {
    if sampled_size == 0 {
        return f64::INFINITY;
    }

    let tau = sampled_size as f64;
    let omega = (delta / (6.0 * num_arms as f64)).sqrt();

    (4.0 * ((2.0 * tau).log2() / omega).ln() / tau).sqrt()
}

/// Distributes `batch_size` pulls over the surviving arms one at a time,
/// least-sampled arms first, with no arm receiving more than `round_cap`
/// pulls. Returns the per-arm pull counts in `surviving` order.
///
/// # Arguments
///
/// * `sampled_sizes` - the current total pull counts, in `surviving` order
/// * `batch_size` -
/// * `round_cap` -
///
fn assign_round(sampled_sizes: &[u64], batch_size: usize, round_cap: usize) -> Vec<usize> {
    let mut pulls = vec! [0; sampled_sizes.len()];
    let mut budget = batch_size;

    while budget > 0 {
        let next = (0..sampled_sizes.len())
            .filter(|&i| pulls[i] < round_cap)
            .min_by_key(|&i| (sampled_sizes[i] + pulls[i] as u64, i));

        match next {
            Some(i) => {
                pulls[i] += 1;
                budget -= 1;
            },
            None => break
        }
    }

    pulls
}

/// Fixed-confidence racing: arms survive until their deviation bounds prove
/// them to be inside or outside the top `top_n`, with uniform batched
/// sampling in between.
pub(crate) fn identify<I: DataInstance>(
    arms: &[Arc<Candidate>],
    service: &SamplingService<I>,
    label: Label,
    delta: f64,
    top_n: usize,
    batch_size: usize,
    round_cap: usize
) -> Result<Vec<Arc<Candidate>>, AnchorError>
{
    let num_arms = arms.len();
    let batch_size = batch_size.max(1);
    let round_cap = round_cap.max(1);
    let mut surviving = (0..num_arms).collect::<Vec<usize>>();
    let mut accepted: Vec<usize> = vec! [];

    while accepted.len() < top_n && !surviving.is_empty() {
        // keep the sample counts uniform across the survivors
        let sampled_sizes = surviving.iter().map(|&i| arms[i].sampled_size()).collect::<Vec<_>>();
        let pulls = assign_round(&sampled_sizes, batch_size, round_cap);
        let mut session = service.session(label);

        for (&i, &count) in surviving.iter().zip(pulls.iter()) {
            session.register(&arms[i], count);
        }
        session.run()?;

        let bounds = surviving.iter().map(|&i| {
            let mean = arms[i].precision();
            let d = deviation(arms[i].sampled_size(), delta, num_arms);

            (mean - d, mean + d)
        }).collect::<Vec<_>>();

        let remaining_n = top_n - accepted.len();
        let mut keep = vec! [true; surviving.len()];

        // an arm is in the top if it provably beats all but at most
        // `remaining_n - 1` of the other survivors, and out of it if at
        // least `remaining_n` survivors provably beat it
        let mut newly_accepted = vec! [];

        for (si, &i) in surviving.iter().enumerate() {
            let provably_worse = bounds.iter().enumerate()
                .filter(|&(sj, &(_, ub))| sj != si && bounds[si].0 >= ub)
                .count();

            if provably_worse >= surviving.len().saturating_sub(remaining_n) {
                newly_accepted.push((si, i));
            }
        }

        newly_accepted.sort_by_key(|&(_, i)| OrderedFloat(-arms[i].precision()));

        for &(si, i) in newly_accepted.iter().take(remaining_n) {
            accepted.push(i);
            keep[si] = false;
        }

        let remaining_n = top_n - accepted.len();

        for (si, &_i) in surviving.iter().enumerate() {
            if !keep[si] {
                continue;
            }

            let provably_better = bounds.iter().enumerate()
                .filter(|&(sj, &(lb, _))| sj != si && keep[sj] && bounds[si].1 <= lb)
                .count();

            if provably_better >= remaining_n && remaining_n > 0 {
                keep[si] = false;
            }
        }

        surviving = surviving.iter().enumerate()
            .filter(|&(si, _)| keep[si])
            .map(|(_, &i)| i)
            .collect();
    }

    let chosen = accepted.iter().map(|&i| arms[i].clone()).collect::<Vec<_>>();

    Ok(top_by_precision(&chosen, chosen.len()))
}
