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

use anchors_core::{AnchorError, Candidate, DataInstance, Label};

use crate::sampling::SamplingService;
use super::{kl, rank_ascending, top_by_precision};

const ALPHA: f64 = 1.1;
const K: f64 = 405.5;

/// Returns the exploration rate at iteration `t`.
///
/// # Arguments
///
/// * `num_arms` -
/// * `t` -
/// * `delta` -
///
fn beta(num_arms: usize, t: u64, delta: f64) -> f64 {
    let inner = K * num_arms as f64 * (t as f64).powf(ALPHA) / delta;

    inner.ln() + inner.ln().ln()
}

fn level(beta: f64, sampled_size: u64) -> f64 {
    if sampled_size == 0 {
        f64::INFINITY
    } else {
        beta / sampled_size as f64
    }
}

/// Recomputes the upper bounds of every arm outside the current top set and
/// the lower bounds of every arm inside it, and returns `(u, l)` where `u`
/// is the strongest challenger (largest upper bound outside the top) and
/// `l` the weakest member (smallest lower bound inside the top). On ties
/// the arm with the lowest precision rank wins.
///
/// # Arguments
///
/// * `t` - the iteration number, starting at one
/// * `precisions` -
/// * `sampled_sizes` -
/// * `delta` -
/// * `top_n` -
/// * `ub` -
/// * `lb` -
///
pub(crate) fn update_bounds(
    t: u64,
    precisions: &[f64],
    sampled_sizes: &[u64],
    delta: f64,
    top_n: usize,
    ub: &mut [f64],
    lb: &mut [f64]
) -> (usize, usize)
{
    let order = rank_ascending(precisions);
    let beta = beta(precisions.len(), t, delta);
    let (complement, top) = order.split_at(order.len() - top_n);

    for &f in complement {
        ub[f] = kl::upper_bound(precisions[f], level(beta, sampled_sizes[f]));
    }
    for &f in top {
        lb[f] = kl::lower_bound(precisions[f], level(beta, sampled_sizes[f]));
    }

    let mut u = complement[0];
    for &f in complement {
        if ub[f] > ub[u] {
            u = f;
        }
    }

    let mut l = top[0];
    for &f in top {
        if lb[f] < lb[l] {
            l = f;
        }
    }

    (u, l)
}

/// Fixed-confidence identification: keep sampling the strongest challenger
/// and the weakest current leader until their bounds are within `epsilon`
/// of each other.
pub(crate) fn identify<I: DataInstance>(
    arms: &[Arc<Candidate>],
    service: &SamplingService<I>,
    label: Label,
    epsilon: f64,
    delta: f64,
    top_n: usize,
    batch_size: usize
) -> Result<Vec<Arc<Candidate>>, AnchorError>
{
    let batch_size = batch_size.max(1);
    let mut ub = vec! [0.0; arms.len()];
    let mut lb = vec! [0.0; arms.len()];
    let mut t = 1;

    loop {
        let precisions = arms.iter().map(|arm| arm.precision()).collect::<Vec<_>>();
        let sampled_sizes = arms.iter().map(|arm| arm.sampled_size()).collect::<Vec<_>>();
        let (u, l) = update_bounds(t, &precisions, &sampled_sizes, delta, top_n, &mut ub, &mut lb);

        if ub[u] - lb[l] <= epsilon {
            break;
        }

        let mut session = service.session(label);
        session.register(&arms[u], batch_size);
        session.register(&arms[l], batch_size);
        session.run()?;
        t += 1;
    }

    Ok(top_by_precision(arms, top_n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::testing::{root, AllPositiveClassifier, CyclingPerturbation};
    use crate::sampling::{LinearExecution, SamplingService};
    use anchors_core::TabularInstance;

    #[test]
    fn update_bounds_with_uniform_single_samples() {
        let mut ub = vec! [0.0; 5];
        let mut lb = vec! [0.0; 5];
        let (u, l) = update_bounds(
            1,
            &[0.0, 1.0, 1.0, 1.0, 0.0],
            &[1, 1, 1, 1, 1],
            0.1,
            1,
            &mut ub,
            &mut lb
        );

        assert_eq!((u, l), (0, 3));
    }

    #[test]
    fn update_bounds_with_mixed_sample_sizes() {
        let mut ub = vec! [1.0, 1.0, 1.0, 0.0, 1.0, 1.0];
        let mut lb = vec! [0.0; 6];
        let (u, l) = update_bounds(
            2,
            &[0.45544554, 1.0, 1.0, 0.82178218, 0.0, 0.0],
            &[101, 1, 1, 101, 1, 1],
            0.1,
            1,
            &mut ub,
            &mut lb
        );

        assert_eq!((u, l), (4, 2));
    }

    #[test]
    fn bounds_bracket_the_means() {
        let precisions = [0.2, 0.5, 0.9, 0.4];
        let sampled_sizes = [50, 50, 50, 50];
        let mut ub = vec! [0.0; 4];
        let mut lb = vec! [0.0; 4];
        let order = rank_ascending(&precisions);
        let (complement, top) = order.split_at(2);

        update_bounds(3, &precisions, &sampled_sizes, 0.1, 2, &mut ub, &mut lb);

        for &f in complement {
            assert!(ub[f] >= precisions[f], "ub[{}] = {} < mean", f, ub[f]);
        }
        for &f in top {
            assert!(lb[f] <= precisions[f], "lb[{}] = {} > mean", f, lb[f]);
        }
    }

    #[test]
    fn identifies_the_dominant_arm() {
        // holding both features of (1, 1) fixed keeps the label at 1 for
        // every sample, while the single-feature rules lose every third
        // sample to the -1 offset
        let service = SamplingService::new(
            std::sync::Arc::new(AllPositiveClassifier),
            std::sync::Arc::new(CyclingPerturbation { origin: TabularInstance::new(vec! [1, 1]) }),
            Box::new(LinearExecution::default())
        );
        let weak_x = root(0);
        let weak_y = root(1);
        let strong = Arc::new(Candidate::extend(&weak_x, 1).unwrap());
        let arms = vec! [weak_x, strong.clone(), weak_y];

        let mut session = service.session(1);
        for arm in &arms {
            session.register(arm, 3);
        }
        session.run().unwrap();

        let chosen = identify(&arms, &service, 1, 0.1, 0.1, 1, 30).unwrap();

        assert_eq!(chosen.len(), 1);
        assert!(Arc::ptr_eq(&chosen[0], &strong));
    }

    #[test]
    fn beta_grows_with_t() {
        assert!(beta(5, 2, 0.1) > beta(5, 1, 0.1));
        assert!(beta(5, 1, 0.05) > beta(5, 1, 0.1));
    }

    #[test]
    fn zero_samples_yield_the_widest_bounds() {
        assert_eq!(level(10.0, 0), f64::INFINITY);
        assert_eq!(kl::upper_bound(0.0, f64::INFINITY), 1.0);
    }
}
