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

/// Returns `1/2 + sum(1/i for i in 2..=n)`, the normalizer of the
/// successive-accepts-rejects budget split.
///
/// # Arguments
///
/// * `n` -
///
fn log_bar(n: usize) -> f64 {
    0.5 + (2..=n).map(|i| 1.0 / i as f64).sum::<f64>()
}

/// Returns the cumulative per-arm sample target of round `s`.
///
/// # Arguments
///
/// * `n` - the total number of arms
/// * `total_budget` - the total number of samples, batches times batch size
/// * `s` - the round number, starting at one
///
fn round_target(n: usize, total_budget: usize, s: usize) -> u64 {
    let numerator = total_budget.saturating_sub(n) as f64;

    (numerator / (log_bar(n) * (n + 1 - s) as f64)).ceil() as u64
}

/// Fixed-budget successive-accepts-rejects with batched pulls: every round
/// tops each surviving arm up to the round's sample target, then removes
/// the arm at whichever end of the precision ranking has the larger gap,
/// accepting it when it was the top one.
pub(crate) fn identify<I: DataInstance>(
    arms: &[Arc<Candidate>],
    service: &SamplingService<I>,
    label: Label,
    top_n: usize,
    batch_budget: usize,
    batch_size: usize,
    round_cap: usize
) -> Result<Vec<Arc<Candidate>>, AnchorError>
{
    let n = arms.len();
    let batch_size = batch_size.max(1);
    let round_cap = round_cap.max(1);
    let nn = ((batch_size + round_cap - 1) / round_cap).max(2);
    let rounds = n.saturating_sub(nn) + 1;
    let total_budget = batch_budget * batch_size;
    let mut surviving = (0..n).collect::<Vec<usize>>();
    let mut accepted: Vec<usize> = vec! [];

    for s in 1..=rounds {
        let target = round_target(n, total_budget, s);
        let mut session = service.session(label);

        for &i in &surviving {
            let deficit = target.saturating_sub(arms[i].sampled_size());

            if deficit > 0 {
                session.register(&arms[i], deficit as usize);
            }
        }
        if !session.is_empty() {
            session.run()?;
        }

        if s < rounds {
            // rank the survivors by precision, best first
            let mut ranked = surviving.clone();
            ranked.sort_by_key(|&i| OrderedFloat(-arms[i].precision()));

            let remaining_n = top_n - accepted.len();
            let last = ranked.len() - 1;
            let gap_top = arms[ranked[0]].precision() - arms[ranked[remaining_n]].precision();
            let gap_bottom = arms[ranked[remaining_n - 1]].precision() - arms[ranked[last]].precision();

            if gap_top >= gap_bottom {
                // the top arm is the most separated, accept it
                accepted.push(ranked[0]);
                surviving.retain(|&i| i != ranked[0]);
            } else {
                surviving.retain(|&i| i != ranked[last]);
            }
        }

        if accepted.len() == top_n || surviving.len() == top_n - accepted.len() {
            break;
        }
    }

    // hand the remaining slots to the best survivors
    let remaining_n = top_n - accepted.len();
    let mut ranked = surviving;
    ranked.sort_by_key(|&i| OrderedFloat(-arms[i].precision()));
    accepted.extend(ranked.into_iter().take(remaining_n));

    Ok(accepted.into_iter().map(|i| arms[i].clone()).collect())
}
