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

//! Confidence bounds on a Bernoulli mean derived from the Kullback-Leibler
//! divergence, solved by bisection.

/// Lower clamp applied to both arguments of the divergence, to keep the
/// logarithms finite.
const FLOOR: f64 = 1e-7;

/// Upper clamp applied to both arguments of the divergence.
const CEILING: f64 = 1.0 - 1e-16;

/// The number of halvings each bound is bisected for, giving a tolerance of
/// `2^-17` of the bracket width.
const BISECTION_STEPS: usize = 17;

/// Returns the Kullback-Leibler divergence between two Bernoulli
/// distributions with success probabilities `p` and `q`.
///
/// # Arguments
///
/// * `p` -
/// * `q` -
///
pub fn bernoulli_kl(p: f64, q: f64) -> f64 {
    let p = p.max(FLOOR).min(CEILING);
    let q = q.max(FLOOR).min(CEILING);

    p * (p / q).ln() + (1.0 - p) * ((1.0 - p) / (1.0 - q)).ln()
}

/// Returns the largest `q >= p` such that `KL(p, q) <= level`, up to the
/// bisection tolerance. The upper cursor of the bracket is returned, so the
/// result errs on the side of a wider confidence interval.
///
/// # Arguments
///
/// * `p` - the observed mean
/// * `level` - the divergence budget
///
pub fn upper_bound(p: f64, level: f64) -> f64 {
    let mut lower = p;
    let mut upper = (p + (level / 2.0).sqrt()).min(1.0);

    for _ in 0..BISECTION_STEPS {
        let q = 0.5 * (upper + lower);

        if bernoulli_kl(p, q) > level {
            upper = q;
        } else {
            lower = q;
        }
    }

    upper
}

/// Returns the smallest `q <= p` such that `KL(p, q) <= level`, up to the
/// bisection tolerance. The inner cursor of the bracket is returned, so the
/// result never violates the divergence budget.
///
/// # Arguments
///
/// * `p` - the observed mean
/// * `level` - the divergence budget
///
pub fn lower_bound(p: f64, level: f64) -> f64 {
    let mut upper = p;
    let mut lower = (p - (level / 2.0).sqrt()).max(0.0);

    for _ in 0..BISECTION_STEPS {
        let q = 0.5 * (upper + lower);

        if bernoulli_kl(p, q) > level {
            lower = q;
        } else {
            upper = q;
        }
    }

    upper
}
